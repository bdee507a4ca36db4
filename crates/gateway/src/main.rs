use clap::Parser;
use tracing_subscriber::EnvFilter;

use flowline_domain::config::Config;
use flowline_gateway::cli::{Cli, Command, SessionsCommand};
use flowline_gateway::state::AppState;
use flowline_gateway::{api, bootstrap, cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            let config = bootstrap::load_config(None)?;
            run_server(config).await
        }
        Some(Command::Run { message, channel, user, admin }) => {
            init_tracing();
            let config = bootstrap::load_config(None)?;
            cli::run::run(config, message, channel, user, admin).await
        }
        Some(Command::Chat { channel, user, admin }) => {
            init_tracing();
            let config = bootstrap::load_config(None)?;
            cli::chat::chat(config, channel, user, admin).await
        }
        Some(Command::Sessions(SessionsCommand::Show { session_id })) => {
            init_tracing();
            let config = bootstrap::load_config(None)?;
            cli::sessions::show(config, session_id).await
        }
    }
}

/// JSON-formatted tracing, matching the teacher's `init_tracing`.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,flowline_gateway=debug")))
        .json()
        .init();
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    tracing::info!("flowline gateway starting");

    let state: AppState = bootstrap::build_app_state(config, None).await?;
    bootstrap::spawn_background_tasks(&state);

    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let app = api::router().with_state(state);

    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
