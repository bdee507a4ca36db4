//! Append-only transcript (spec §4.9 supplement): every inbound and
//! outbound message, independent of the bounded `FlowContext.history`
//! the engine uses for prompting. Kept for operator tooling and audit,
//! not read by the engine. Grounded in the teacher's JSONL
//! `TranscriptWriter`, adapted from per-session files to the store's
//! key-value model — each line is one `rpush` onto the session's
//! history key, so it rides the same backend as everything else C9
//! manages instead of touching the filesystem.

use crate::key::KeyBuilder;
use crate::store::KeyValueStore;
use chrono::Utc;
use flowline_domain::trace::TraceEvent;
use flowline_domain::Error;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptLine {
    pub timestamp: String,
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
}

impl TranscriptLine {
    pub fn new(role: impl Into<String>, content: impl Into<String>, node_id: Option<String>) -> Self {
        Self { timestamp: Utc::now().to_rfc3339(), role: role.into(), content: content.into(), node_id }
    }
}

pub struct TranscriptWriter {
    store: Arc<dyn KeyValueStore>,
    keys: KeyBuilder,
}

impl TranscriptWriter {
    pub fn new(store: Arc<dyn KeyValueStore>, keys: KeyBuilder) -> Self {
        Self { store, keys }
    }

    /// Append one or more lines to a session's transcript, in order.
    pub async fn append(&self, session_id: &str, lines: &[TranscriptLine]) -> Result<(), Error> {
        if lines.is_empty() {
            return Ok(());
        }
        for line in lines {
            let encoded = serde_json::to_string(line).map_err(Error::Json)?;
            self.store.rpush(&self.keys.history(session_id), encoded).await?;
        }
        TraceEvent::TranscriptAppend { session_id: session_id.to_string(), lines: lines.len() }.emit();
        Ok(())
    }

    /// Read back a session's full transcript, oldest first.
    pub async fn read(&self, session_id: &str) -> Result<Vec<TranscriptLine>, Error> {
        let raw = self.store.lrange(&self.keys.history(session_id)).await?;
        let mut lines = Vec::with_capacity(raw.len());
        for entry in raw {
            match serde_json::from_str::<TranscriptLine>(&entry) {
                Ok(line) => lines.push(line),
                Err(e) => tracing::warn!(session_id, error = %e, "skipping malformed transcript line"),
            }
        }
        Ok(lines)
    }
}
