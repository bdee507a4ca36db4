use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────
// LLM provider
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider kind; `"stub"` selects the deterministic in-process
    /// adapter used by tests and local `flowline chat` sessions without
    /// credentials.
    #[serde(default = "d_provider")]
    pub provider: String,
    #[serde(default = "d_api_base")]
    pub api_base: String,
    /// Name of the environment variable holding the provider API key.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_model")]
    pub model: String,
    #[serde(default = "d_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Bounded retries for schema-invalid responder output (§4.5).
    #[serde(default = "d_max_schema_retries")]
    pub max_schema_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: d_provider(),
            api_base: d_api_base(),
            api_key_env: d_api_key_env(),
            model: d_model(),
            request_timeout_ms: d_timeout_ms(),
            max_schema_retries: d_max_schema_retries(),
        }
    }
}

fn d_provider() -> String {
    "openai".into()
}
fn d_api_base() -> String {
    "https://api.openai.com/v1".into()
}
fn d_api_key_env() -> String {
    "FLOWLINE_LLM_API_KEY".into()
}
fn d_model() -> String {
    "gpt-5".into()
}
fn d_timeout_ms() -> u64 {
    20_000
}
fn d_max_schema_retries() -> u32 {
    crate::tool_schema::MAX_SCHEMA_VALIDATION_RETRIES
}
