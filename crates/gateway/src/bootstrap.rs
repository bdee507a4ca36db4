//! Config loading and `AppState` construction, split the way the
//! teacher's `bootstrap.rs` splits them: `load_config` is pure file/env
//! I/O, `build_app_state` wires every subsystem in sequence logging as
//! it goes, and `spawn_background_tasks` is only called by long-lived
//! entry points (the server and the chat REPL), not the one-shot `run`
//! CLI command.

use flowline_domain::config::Config;
use flowline_llm::{LlmProvider, OpenAiProvider, StubProvider};
use flowline_sessions::{CancellationEpoch, ContextStore, DebounceManager, EscalationTracker, InMemoryStore, InboundBuffer, KeyBuilder, KeyValueStore, LifecycleManager, TranscriptWriter};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::flows::FlowRegistry;
use crate::state::AppState;

pub const CONFIG_PATH_ENV: &str = "FLOWLINE_CONFIG";

/// Load the config from `path`, or the `FLOWLINE_CONFIG` env var, or
/// `./config.toml`, falling back to `Config::default()` when none of
/// those exist — a credential-less `flowline chat` with the stub
/// provider should always be able to boot.
pub fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    let path = path.or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from)).unwrap_or_else(|| PathBuf::from("config.toml"));

    if !path.exists() {
        tracing::warn!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }

    let raw = std::fs::read_to_string(&path)?;
    let config: Config = toml::from_str(&raw)?;
    Ok(config)
}

/// Validate `config`, aborting startup if any issue is `Error`
/// severity. Warnings are logged and startup proceeds.
fn validate_or_bail(config: &Config) -> anyhow::Result<()> {
    let issues = config.validate();
    let mut error_count = 0;
    for issue in &issues {
        match issue.severity {
            flowline_domain::config::ConfigSeverity::Error => {
                error_count += 1;
                tracing::error!(%issue, "config validation error");
            }
            flowline_domain::config::ConfigSeverity::Warning => {
                tracing::warn!(%issue, "config validation warning");
            }
        }
    }
    if error_count > 0 {
        anyhow::bail!("config has {error_count} validation error(s), refusing to start");
    }
    Ok(())
}

fn build_llm_provider(config: &Config) -> anyhow::Result<Arc<dyn LlmProvider>> {
    match config.llm.provider.as_str() {
        "stub" => Ok(Arc::new(StubProvider::new())),
        "openai" => {
            let api_key = std::env::var(&config.llm.api_key_env).unwrap_or_default();
            Ok(Arc::new(OpenAiProvider::new(config.llm.api_base.clone(), api_key, config.llm.request_timeout_ms)))
        }
        other => anyhow::bail!("unknown llm.provider '{other}', expected 'openai' or 'stub'"),
    }
}

/// Hash `env_var`'s value if set and non-empty, logging a dev-mode
/// warning when it is absent (matching the teacher's admin/API token
/// bootstrap pattern).
fn hash_token_env(env_var: &str, purpose: &str) -> Option<Vec<u8>> {
    match std::env::var(env_var) {
        Ok(token) if !token.is_empty() => Some(Sha256::digest(token.as_bytes()).to_vec()),
        _ => {
            tracing::warn!(env_var, purpose, "token env var unset; endpoints gated by it run in dev mode (no auth)");
            None
        }
    }
}

pub async fn build_app_state(config: Config, flows_dir_override: Option<&Path>) -> anyhow::Result<AppState> {
    validate_or_bail(&config)?;

    let llm = build_llm_provider(&config)?;
    tracing::info!(provider = config.llm.provider, model = config.llm.model, "llm provider ready");

    let flows_dir = flows_dir_override.unwrap_or(&config.flows.dir);
    let flows = Arc::new(FlowRegistry::load_dir(flows_dir)?);
    tracing::info!(dir = %flows_dir.display(), count = flows.ids().len(), "flow registry loaded");

    let kv_store: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
    let keys = KeyBuilder::new(config.sessions.namespace.clone());

    let context_store = Arc::new(ContextStore::new(kv_store.clone(), &config.sessions));
    let buffer = InboundBuffer::new(kv_store.clone(), keys.clone());
    let epoch = Arc::new(CancellationEpoch::new(kv_store.clone(), keys.clone()));
    let debounce = Arc::new(DebounceManager::new(buffer, (*epoch).clone(), Duration::from_millis(50)));
    let escalation = Arc::new(EscalationTracker::new(kv_store.clone(), keys.clone()));
    let lifecycle = Arc::new(LifecycleManager::new(config.sessions.lifecycle.clone()));
    let transcripts = Arc::new(TranscriptWriter::new(kv_store, keys));
    tracing::info!(namespace = config.sessions.namespace, "session store ready");

    let admin_token_hash = hash_token_env(&config.server.admin_token_env, "admin");

    Ok(AppState {
        config: Arc::new(config),
        llm,
        flows,
        context_store,
        debounce,
        epoch,
        escalation,
        lifecycle,
        transcripts,
        tenant_style_overrides: Arc::new(RwLock::new(HashMap::new())),
        admin_token_hash: Arc::new(admin_token_hash),
    })
}

/// Spawn the gateway's long-running maintenance tasks. Only called by
/// entry points that stay up (`serve`, `chat`) — the one-shot `run`
/// command has no use for a background loop that outlives it.
pub fn spawn_background_tasks(_state: &AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            tracing::debug!("gateway heartbeat");
        }
    });
}
