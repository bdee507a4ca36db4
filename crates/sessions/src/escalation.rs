//! Delayed context clear after a human handoff (spec.md §4.9 supplement):
//! escalating a conversation doesn't wipe state immediately, since the
//! human agent may want the bot's context for a while. A grace period
//! after escalation, a later inbound message clears it and lets the
//! flow resume fresh.

use crate::key::KeyBuilder;
use crate::store::KeyValueStore;
use chrono::{DateTime, Utc};
use flowline_domain::Error;
use std::sync::Arc;
use std::time::Duration;

pub struct EscalationTracker {
    store: Arc<dyn KeyValueStore>,
    keys: KeyBuilder,
}

impl EscalationTracker {
    pub fn new(store: Arc<dyn KeyValueStore>, keys: KeyBuilder) -> Self {
        Self { store, keys }
    }

    /// Record that escalation happened now, starting the grace period.
    pub async fn mark_escalated(&self, user_id: &str, agent_type: &str) -> Result<(), Error> {
        self.store.set(&self.keys.escalation(user_id, agent_type), Utc::now().to_rfc3339()).await
    }

    /// True if escalation was marked and the grace period has elapsed —
    /// the caller should clear the flow context and start over.
    pub async fn should_clear_context(&self, user_id: &str, agent_type: &str, grace_period: Duration, now: DateTime<Utc>) -> Result<bool, Error> {
        match self.store.get(&self.keys.escalation(user_id, agent_type)).await? {
            Some(raw) => match DateTime::parse_from_rfc3339(&raw) {
                Ok(escalated_at) => {
                    let elapsed = now.signed_duration_since(escalated_at.with_timezone(&Utc));
                    Ok(elapsed >= chrono::Duration::from_std(grace_period).unwrap_or(chrono::Duration::zero()))
                }
                Err(_) => Ok(false),
            },
            None => Ok(false),
        }
    }

    pub async fn clear(&self, user_id: &str, agent_type: &str) -> Result<(), Error> {
        self.store.del(&self.keys.escalation(user_id, agent_type)).await
    }
}
