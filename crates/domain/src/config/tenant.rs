use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────
// Per-tenant behavior
// ─────────────────────────────────────────────────────────────────

/// Tenant-level knobs consumed by the debounce manager (C10), the
/// responder's prompt header (C6) and the feedback loop (C11). One
/// `TenantConfig` per agent/tenant id; `Config::tenants` keys by it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    /// Inactivity window the debounce manager waits before aggregating a
    /// burst of inbound messages (spec.md §4.8).
    #[serde(default = "d_wait_time_before_replying_ms")]
    pub wait_time_before_replying_ms: u64,
    #[serde(default = "d_true")]
    pub typing_indicator_enabled: bool,
    #[serde(default = "d_min_typing_duration_ms")]
    pub min_typing_duration_ms: u64,
    #[serde(default = "d_max_typing_duration_ms")]
    pub max_typing_duration_ms: u64,
    /// Randomize outbound delays within `delay_variance_percent` of the
    /// nominal value instead of sending them exactly.
    #[serde(default = "d_true")]
    pub natural_delays_enabled: bool,
    #[serde(default = "d_delay_variance_percent")]
    pub delay_variance_percent: u8,
    /// Free-text tone guidance folded into the responder's prompt header;
    /// mutable at runtime via the `update_communication_style` external
    /// action (§4.7).
    #[serde(default)]
    pub communication_style: String,
    #[serde(default)]
    pub project_description: String,
    #[serde(default)]
    pub target_audience: String,
    /// Seconds after an escalation before the session's escalation flag
    /// is cleared and normal flow processing resumes (§4.9).
    #[serde(default = "d_escalation_context_clear_delay_seconds")]
    pub escalation_context_clear_delay_seconds: u64,
}

impl Default for TenantConfig {
    fn default() -> Self {
        Self {
            wait_time_before_replying_ms: d_wait_time_before_replying_ms(),
            typing_indicator_enabled: true,
            min_typing_duration_ms: d_min_typing_duration_ms(),
            max_typing_duration_ms: d_max_typing_duration_ms(),
            natural_delays_enabled: true,
            delay_variance_percent: d_delay_variance_percent(),
            communication_style: String::new(),
            project_description: String::new(),
            target_audience: String::new(),
            escalation_context_clear_delay_seconds: d_escalation_context_clear_delay_seconds(),
        }
    }
}

fn d_wait_time_before_replying_ms() -> u64 {
    60_000
}
fn d_min_typing_duration_ms() -> u64 {
    1_000
}
fn d_max_typing_duration_ms() -> u64 {
    4_000
}
fn d_delay_variance_percent() -> u8 {
    20
}
fn d_escalation_context_clear_delay_seconds() -> u64 {
    300
}
fn d_true() -> bool {
    true
}
