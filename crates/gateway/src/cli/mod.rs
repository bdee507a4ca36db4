//! CLI surface: `flowline` defaults to `serve` when given no subcommand,
//! plus `run` (one-shot turn), `chat` (REPL), and `sessions show` (dump
//! a transcript) for exercising the same turn runner the HTTP inbound
//! endpoint uses.

pub mod chat;
pub mod run;
pub mod sessions;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "flowline", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP gateway (default when no subcommand is given).
    Serve,
    /// Send a single message through the turn runner and print the reply.
    Run {
        /// The message text to send.
        message: String,
        /// Channel to resolve the flow/tenant from.
        #[arg(long, default_value = "support")]
        channel: String,
        /// User id for the session.
        #[arg(long, default_value = "cli-user")]
        user: String,
        /// Pass as an admin caller (enables modify_flow).
        #[arg(long)]
        admin: bool,
    },
    /// Interactive REPL driving the turn runner turn by turn.
    Chat {
        #[arg(long, default_value = "support")]
        channel: String,
        #[arg(long, default_value = "cli-user")]
        user: String,
        #[arg(long)]
        admin: bool,
    },
    /// Session introspection.
    #[command(subcommand)]
    Sessions(SessionsCommand),
}

#[derive(Debug, Subcommand)]
pub enum SessionsCommand {
    /// Print a session's transcript.
    Show {
        /// Session key, e.g. the flow id used as the session id.
        session_id: String,
    },
}
