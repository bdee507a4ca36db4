//! The ephemeral inbound buffer (spec §3, §4.8): messages accumulate
//! here while a session's burst is in flight, then are drained
//! atomically by the worker that wins the inactivity race.

use crate::key::KeyBuilder;
use crate::store::KeyValueStore;
use chrono::{DateTime, Utc};
use flowline_domain::Error;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One buffered inbound message. `sequence` is assigned at append time
/// and is the tie-breaker when two messages share a timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BufferedMessage {
    pub id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub sequence: u64,
}

pub struct InboundBuffer {
    store: Arc<dyn KeyValueStore>,
    keys: KeyBuilder,
}

impl InboundBuffer {
    pub fn new(store: Arc<dyn KeyValueStore>, keys: KeyBuilder) -> Self {
        Self { store, keys }
    }

    /// Append one message, assigning it the next sequence number and
    /// recording it as the session's newest arrival. Returns the
    /// message as stored, for the caller to compare against later
    /// arrivals when deciding supersession (§4.8 step 2).
    pub async fn append(&self, session_id: &str, id: impl Into<String>, content: impl Into<String>) -> Result<BufferedMessage, Error> {
        let seq_key = format!("{}:seq", self.keys.buffer(session_id));
        let sequence = self.store.incr(&seq_key).await? as u64;
        let message = BufferedMessage {
            id: id.into(),
            content: content.into(),
            timestamp: Utc::now(),
            sequence,
        };
        let encoded = serde_json::to_string(&message).map_err(Error::Json)?;
        self.store.rpush(&self.keys.buffer(session_id), encoded).await?;

        let last_ts_key = format!("{}:last_ts", self.keys.buffer(session_id));
        self.store.set(&last_ts_key, message.timestamp.to_rfc3339()).await?;

        Ok(message)
    }

    /// The timestamp of the most recently appended message, if any.
    pub async fn last_message_ts(&self, session_id: &str) -> Result<Option<DateTime<Utc>>, Error> {
        let last_ts_key = format!("{}:last_ts", self.keys.buffer(session_id));
        match self.store.get(&last_ts_key).await? {
            Some(raw) => Ok(DateTime::parse_from_rfc3339(&raw).ok().map(|dt| dt.with_timezone(&Utc))),
            None => Ok(None),
        }
    }

    /// Non-destructive read of the buffer's current contents, ordered
    /// by (timestamp, sequence).
    pub async fn peek(&self, session_id: &str) -> Result<Vec<BufferedMessage>, Error> {
        let raw = self.store.lrange(&self.keys.buffer(session_id)).await?;
        Ok(decode_sorted(raw))
    }

    /// Atomically drain the buffer, returning its contents ordered by
    /// (timestamp, sequence) — spec.md §4.8 step 3 ("Atomically drains
    /// the buffer"). This must happen at emit time, not before the LLM
    /// call (spec.md §9's Open Question resolution).
    pub async fn drain(&self, session_id: &str) -> Result<Vec<BufferedMessage>, Error> {
        let raw = self.store.drain(&self.keys.buffer(session_id)).await?;
        Ok(decode_sorted(raw))
    }

    /// Concatenate a burst's texts in sequence order, newline-joined —
    /// the aggregated user message handed to the LLM (§4.8 step 3).
    pub fn aggregate_text(messages: &[BufferedMessage]) -> String {
        messages.iter().map(|m| m.content.as_str()).collect::<Vec<_>>().join("\n")
    }
}

fn decode_sorted(raw: Vec<String>) -> Vec<BufferedMessage> {
    let mut messages: Vec<BufferedMessage> = raw.iter().filter_map(|s| serde_json::from_str(s).ok()).collect();
    messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.sequence.cmp(&b.sequence)));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn buffer() -> InboundBuffer {
        InboundBuffer::new(Arc::new(InMemoryStore::new()), KeyBuilder::new("flowline"))
    }

    #[tokio::test]
    async fn append_assigns_increasing_sequence_numbers() {
        let buf = buffer();
        let m1 = buf.append("s1", "id1", "oi").await.unwrap();
        let m2 = buf.append("s1", "id2", "tudo bem?").await.unwrap();
        assert_eq!(m1.sequence, 1);
        assert_eq!(m2.sequence, 2);
    }

    #[tokio::test]
    async fn drain_returns_messages_in_timestamp_then_sequence_order_and_empties_the_buffer() {
        let buf = buffer();
        buf.append("s1", "id1", "oi").await.unwrap();
        buf.append("s1", "id2", "tudo bem?").await.unwrap();
        buf.append("s1", "id3", "quero comprar LED").await.unwrap();

        let drained = buf.drain("s1").await.unwrap();
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[0].content, "oi");
        assert_eq!(drained[2].content, "quero comprar LED");

        assert!(buf.peek("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn s2_aggregates_a_burst_with_newlines_in_order() {
        let buf = buffer();
        buf.append("s1", "id1", "oi").await.unwrap();
        buf.append("s1", "id2", "tudo bem?").await.unwrap();
        buf.append("s1", "id3", "quero comprar LED").await.unwrap();

        let drained = buf.drain("s1").await.unwrap();
        let aggregated = InboundBuffer::aggregate_text(&drained);
        assert_eq!(aggregated, "oi\ntudo bem?\nquero comprar LED");
    }

    #[tokio::test]
    async fn last_message_ts_tracks_the_newest_append() {
        let buf = buffer();
        assert_eq!(buf.last_message_ts("s1").await.unwrap(), None);
        buf.append("s1", "id1", "oi").await.unwrap();
        assert!(buf.last_message_ts("s1").await.unwrap().is_some());
    }
}
