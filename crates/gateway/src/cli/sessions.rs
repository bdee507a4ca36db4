//! `flowline sessions show` — dump a session's append-only transcript
//! (§4.10), independent of the bounded `FlowContext.history` used for
//! prompt assembly.

use flowline_domain::config::Config;

use crate::bootstrap;

pub async fn show(config: Config, session_id: String) -> anyhow::Result<()> {
    let state = bootstrap::build_app_state(config, None).await?;
    let lines = state.transcripts.read(&session_id).await?;

    if lines.is_empty() {
        eprintln!("no transcript for session '{session_id}'");
        return Ok(());
    }

    for line in &lines {
        println!("[{}] {}: {}", line.timestamp, line.role, line.content);
    }

    Ok(())
}
