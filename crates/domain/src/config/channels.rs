use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────
// Channel → (flow, tenant) mapping
// ─────────────────────────────────────────────────────────────────

/// Which flow and tenant a given inbound channel id routes to. The
/// tenant/channel/contact data model itself is explicitly out of scope
/// (spec.md §1); this is the thin seam the gateway needs to turn an
/// inbound envelope's `channel` string into a `flow_id`/`tenant_id` pair
/// without building one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub flow_id: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

impl ChannelConfig {
    /// The tenant id to use for this channel, falling back to the
    /// channel's own flow id when no tenant override is configured.
    pub fn tenant_id(&self) -> &str {
        self.tenant_id.as_deref().unwrap_or(&self.flow_id)
    }
}
