//! The gateway's shared application state. Grouped by concern the way
//! the teacher's `state.rs` is, scaled down to what this engine actually
//! needs: one config, one LLM provider, the flow registry, and the
//! session-management primitives from `flowline-sessions`.

use flowline_domain::config::Config;
use flowline_llm::LlmProvider;
use flowline_sessions::{CancellationEpoch, ContextStore, DebounceManager, EscalationTracker, KeyBuilder, LifecycleManager, TranscriptWriter};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::flows::FlowRegistry;

#[derive(Clone)]
pub struct AppState {
    // ── Core services ───────────────────────────────────────────
    pub config: Arc<Config>,
    pub llm: Arc<dyn LlmProvider>,
    pub flows: Arc<FlowRegistry>,

    // ── Session management (C9, C10) ────────────────────────────
    pub context_store: Arc<ContextStore>,
    pub debounce: Arc<DebounceManager>,
    pub epoch: Arc<CancellationEpoch>,
    pub escalation: Arc<EscalationTracker>,
    pub lifecycle: Arc<LifecycleManager>,
    pub transcripts: Arc<TranscriptWriter>,

    // ── Runtime overlays ─────────────────────────────────────────
    /// Per-tenant `communication_style` overrides written by the
    /// `update_communication_style` external action (§4.7). A tenant
    /// absent here falls back to its static `TenantConfig`.
    pub tenant_style_overrides: Arc<RwLock<HashMap<String, String>>>,

    // ── Security ─────────────────────────────────────────────────
    /// SHA-256 of the admin bearer token, if configured. `None` means
    /// admin endpoints and admin-gated actions are disabled.
    pub admin_token_hash: Arc<Option<Vec<u8>>>,
}

impl AppState {
    /// Effective communication style for a tenant: the runtime override
    /// if one has been applied, else the configured default.
    pub fn communication_style(&self, tenant_id: &str) -> String {
        if let Some(style) = self.tenant_style_overrides.read().get(tenant_id) {
            return style.clone();
        }
        self.config.tenant(tenant_id).communication_style
    }

    pub fn key_builder(&self) -> KeyBuilder {
        self.context_store.keys().clone()
    }
}
