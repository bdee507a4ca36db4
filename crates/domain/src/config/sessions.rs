use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ─────────────────────────────────────────────────────────────────
// Session store
// ─────────────────────────────────────────────────────────────────

/// Configuration for the session store (C9): key namespace, TTLs, and
/// per-tenant lifecycle resets. Matches the key-pattern table in spec.md
/// §4.9 — `namespace` is the first segment of every key the key builder
/// produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStoreConfig {
    #[serde(default = "d_namespace")]
    pub namespace: String,
    /// TTL applied to a session's state and event-log entries.
    #[serde(default = "d_state_ttl_days")]
    pub state_ttl_days: u64,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            namespace: d_namespace(),
            state_ttl_days: d_state_ttl_days(),
            lifecycle: LifecycleConfig::default(),
        }
    }
}

fn d_namespace() -> String {
    "flowline".into()
}
fn d_state_ttl_days() -> u64 {
    30
}

/// Idle/daily session reset policy, resolved per-channel then globally
/// (teacher's `sessions::lifecycle` precedence, generalized here to flow
/// sessions instead of agent chat sessions).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LifecycleConfig {
    /// Hour of day (0-23, local time) at which a session is force-reset
    /// if it has any history from a prior day. `None` disables daily
    /// resets.
    #[serde(default)]
    pub daily_reset_hour: Option<u8>,
    /// Minutes of inactivity after which a session is force-reset.
    /// `None` disables idle resets.
    #[serde(default)]
    pub idle_minutes: Option<u64>,
    /// Overrides keyed by channel id (e.g. a specific WhatsApp number).
    #[serde(default)]
    pub reset_by_channel: HashMap<String, ResetOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResetOverride {
    #[serde(default)]
    pub daily_reset_hour: Option<u8>,
    #[serde(default)]
    pub idle_minutes: Option<u64>,
}

impl LifecycleConfig {
    /// Resolve the effective (daily_reset_hour, idle_minutes) pair for a
    /// channel, letting a channel override take precedence field-by-field
    /// over the global default.
    pub fn resolve_params(&self, channel: &str) -> (Option<u8>, Option<u64>) {
        let over = self.reset_by_channel.get(channel);
        let daily = over.and_then(|o| o.daily_reset_hour).or(self.daily_reset_hour);
        let idle = over.and_then(|o| o.idle_minutes).or(self.idle_minutes);
        (daily, idle)
    }
}
