use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ─────────────────────────────────────────────────────────────────
// Flow definitions
// ─────────────────────────────────────────────────────────────────

/// Where flow definitions are loaded from (C2): one JSON file per flow,
/// named `<flow_id>.json`. Matches the teacher's path-based registry
/// configs (`workspace.path`, `skills.path`) — a directory the gateway
/// scans once at startup rather than a database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowsConfig {
    #[serde(default = "d_dir")]
    pub dir: PathBuf,
}

impl Default for FlowsConfig {
    fn default() -> Self {
        Self { dir: d_dir() }
    }
}

fn d_dir() -> PathBuf {
    PathBuf::from("flows")
}
