use serde::Serialize;

/// Structured trace events emitted across the Flowline crates.
///
/// Each variant is a single `tracing::info!` record with a JSON-encoded
/// payload; this gives operators one grep-able event stream instead of
/// ad-hoc `info!(...)` call sites scattered through the codebase.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionResolved {
        session_key: String,
        session_id: String,
        is_new: bool,
    },
    SessionReset {
        session_key: String,
        old_session_id: String,
        new_session_id: String,
        reason: String,
    },
    BurstAggregated {
        session_key: String,
        message_count: usize,
        wait_ms: u64,
    },
    BurstSuperseded {
        session_key: String,
        worker_epoch: u64,
        current_epoch: u64,
    },
    LlmCall {
        prompt_type: String,
        model: String,
        attempt: u32,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    LlmSchemaRetry {
        attempt: u32,
        errors: Vec<String>,
    },
    LlmFallback {
        reason: String,
    },
    ToolExecuted {
        tool_name: String,
        actions: Vec<String>,
        success: bool,
    },
    ExternalActionApplied {
        action: String,
        success: bool,
    },
    FlowModified {
        flow_id: String,
        new_version: u32,
    },
    Escalated {
        session_key: String,
        reason: String,
    },
    Superseded {
        session_key: String,
    },
    TranscriptAppend {
        session_id: String,
        lines: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "flowline_event");
    }
}
