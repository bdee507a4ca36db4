//! `flowline chat` — interactive REPL, grounded in the teacher's
//! `cli/chat.rs` readline loop, simplified since a flow turn has no
//! streaming deltas to forward: each line in, one reply out.

use flowline_domain::config::Config;

use crate::bootstrap;
use crate::runtime::{process_turn, TurnOutcome};

const HISTORY_PATH: &str = ".flowline_chat_history";

pub async fn chat(config: Config, channel: String, user: String, admin: bool) -> anyhow::Result<()> {
    let state = bootstrap::build_app_state(config, None).await?;
    bootstrap::spawn_background_tasks(&state);

    let mut rl = rustyline::DefaultEditor::new()?;
    let _ = rl.load_history(HISTORY_PATH);

    eprintln!("flowline interactive chat");
    eprintln!("channel: {channel}  user: {user}  |  Ctrl+D to exit");
    eprintln!();

    loop {
        let readline = rl.readline("you> ");
        match readline {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(&line).ok();

                let message_id = uuid::Uuid::new_v4().to_string();
                match process_turn(&state, &channel, &user, trimmed.to_string(), message_id, admin).await {
                    Ok(TurnOutcome::Superseded) => eprintln!("(superseded — no reply)"),
                    Ok(TurnOutcome::Replied(result)) => {
                        for message in &result.messages {
                            println!("bot> {}", message.text);
                        }
                        if result.escalate {
                            eprintln!("(escalated to a human)");
                        }
                    }
                    Err(e) => eprintln!("\x1b[31merror: {e}\x1b[0m"),
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                eprintln!("(Use Ctrl+D to quit)");
                continue;
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("readline error: {e}");
                break;
            }
        }
    }

    rl.save_history(HISTORY_PATH).ok();
    eprintln!("goodbye!");
    Ok(())
}
