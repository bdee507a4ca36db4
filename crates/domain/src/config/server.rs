use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────
// Server
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_port")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
    /// Environment variable holding the admin bearer token for the
    /// `/v1/flows/:id/modify` surface. If unset, admin endpoints are
    /// disabled (403).
    #[serde(default = "d_admin_token_env")]
    pub admin_token_env: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: d_port(),
            host: d_host(),
            admin_token_env: d_admin_token_env(),
        }
    }
}

fn d_port() -> u16 {
    8088
}
fn d_host() -> String {
    "0.0.0.0".into()
}
fn d_admin_token_env() -> String {
    "FLOWLINE_ADMIN_TOKEN".into()
}
