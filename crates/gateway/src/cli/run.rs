//! `flowline run` — one-shot turn execution, useful for scripting and
//! quick manual checks against a flow without a transport webhook.

use flowline_domain::config::Config;

use crate::bootstrap;
use crate::runtime::{process_turn, TurnOutcome};

pub async fn run(config: Config, message: String, channel: String, user: String, admin: bool) -> anyhow::Result<()> {
    let state = bootstrap::build_app_state(config, None).await?;
    let message_id = uuid::Uuid::new_v4().to_string();

    match process_turn(&state, &channel, &user, message, message_id, admin).await? {
        TurnOutcome::Superseded => {
            eprintln!("(superseded — no reply)");
        }
        TurnOutcome::Replied(result) => {
            for message in &result.messages {
                println!("{}", message.text);
            }
            if result.escalate {
                eprintln!("(escalated to a human)");
            }
        }
    }

    Ok(())
}
