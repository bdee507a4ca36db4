//! The durable half of C9 (spec §4.9): loading and saving a
//! `FlowContext` through the key-value store, with the configured TTL
//! and the "current reply" marker that lets a later webhook detect a
//! reply is already in flight for a user.

use crate::key::KeyBuilder;
use crate::store::KeyValueStore;
use chrono::{DateTime, Utc};
use flowline_domain::config::SessionStoreConfig;
use flowline_domain::Error;
use flowline_flow::context::FlowContext;
use std::sync::Arc;
use std::time::Duration;

pub struct SessionMeta {
    pub last_inbound_ts: Option<DateTime<Utc>>,
    pub window_start_ts: Option<DateTime<Utc>>,
}

pub struct ContextStore {
    store: Arc<dyn KeyValueStore>,
    keys: KeyBuilder,
    ttl: Duration,
}

impl ContextStore {
    pub fn new(store: Arc<dyn KeyValueStore>, config: &SessionStoreConfig) -> Self {
        Self {
            store,
            keys: KeyBuilder::new(config.namespace.clone()),
            ttl: Duration::from_secs(config.state_ttl_days * 24 * 60 * 60),
        }
    }

    pub fn keys(&self) -> &KeyBuilder {
        &self.keys
    }

    /// Load the persisted context for `(user_id, session_id)`, if any.
    pub async fn load(&self, user_id: &str, session_id: &str) -> Result<Option<FlowContext>, Error> {
        match self.store.get(&self.keys.state(user_id, session_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw).map_err(Error::Json)?)),
            None => Ok(None),
        }
    }

    /// Persist a context, refreshing its TTL from the configured retention.
    pub async fn save(&self, ctx: &FlowContext) -> Result<(), Error> {
        let encoded = serde_json::to_string(ctx).map_err(Error::Json)?;
        self.store
            .setex(&self.keys.state(&ctx.user_id, &ctx.session_id), encoded, self.ttl)
            .await
    }

    pub async fn delete(&self, user_id: &str, session_id: &str) -> Result<(), Error> {
        self.store.del(&self.keys.state(user_id, session_id)).await
    }

    /// Read the per-`(user, agent_type)` debounce/lifecycle timestamps.
    pub async fn meta(&self, user_id: &str, agent_type: &str) -> Result<SessionMeta, Error> {
        match self.store.get(&self.keys.meta(user_id, agent_type)).await? {
            Some(raw) => {
                let parsed: RawMeta = serde_json::from_str(&raw).map_err(Error::Json)?;
                Ok(SessionMeta {
                    last_inbound_ts: parsed.last_inbound_ts,
                    window_start_ts: parsed.window_start_ts,
                })
            }
            None => Ok(SessionMeta { last_inbound_ts: None, window_start_ts: None }),
        }
    }

    pub async fn set_meta(&self, user_id: &str, agent_type: &str, meta: SessionMeta) -> Result<(), Error> {
        let raw = RawMeta { last_inbound_ts: meta.last_inbound_ts, window_start_ts: meta.window_start_ts };
        let encoded = serde_json::to_string(&raw).map_err(Error::Json)?;
        self.store.setex(&self.keys.meta(user_id, agent_type), encoded, self.ttl).await
    }

    /// Mark a reply as currently being composed for this user — guards
    /// against two concurrent turns replying to the same person.
    pub async fn mark_reply_in_flight(&self, user_id: &str, session_id: &str) -> Result<(), Error> {
        self.store
            .setex(&self.keys.current_reply(user_id), session_id.to_string(), Duration::from_secs(120))
            .await
    }

    pub async fn reply_in_flight(&self, user_id: &str) -> Result<Option<String>, Error> {
        self.store.get(&self.keys.current_reply(user_id)).await
    }

    pub async fn clear_reply_in_flight(&self, user_id: &str) -> Result<(), Error> {
        self.store.del(&self.keys.current_reply(user_id)).await
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct RawMeta {
    #[serde(default)]
    last_inbound_ts: Option<DateTime<Utc>>,
    #[serde(default)]
    window_start_ts: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn config() -> SessionStoreConfig {
        SessionStoreConfig { namespace: "flowline".into(), state_ttl_days: 7, ..Default::default() }
    }

    fn new_store() -> ContextStore {
        ContextStore::new(Arc::new(InMemoryStore::new()), &config())
    }

    #[tokio::test]
    async fn round_trips_a_context_through_save_and_load() {
        let store = new_store();
        let ctx = FlowContext::new("flow-1", "user-1", "session-1");
        store.save(&ctx).await.unwrap();
        let loaded = store.load("user-1", "session-1").await.unwrap().unwrap();
        assert_eq!(loaded, ctx);
    }

    #[tokio::test]
    async fn load_returns_none_for_a_session_never_saved() {
        let store = new_store();
        assert!(store.load("user-1", "session-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn meta_round_trips_debounce_timestamps() {
        let store = new_store();
        let now = Utc::now();
        store
            .set_meta("user-1", "order_bot", SessionMeta { last_inbound_ts: Some(now), window_start_ts: Some(now) })
            .await
            .unwrap();
        let meta = store.meta("user-1", "order_bot").await.unwrap();
        assert_eq!(meta.last_inbound_ts, Some(now));
    }

    #[tokio::test]
    async fn reply_in_flight_marker_round_trips_and_clears() {
        let store = new_store();
        assert_eq!(store.reply_in_flight("user-1").await.unwrap(), None);
        store.mark_reply_in_flight("user-1", "session-1").await.unwrap();
        assert_eq!(store.reply_in_flight("user-1").await.unwrap(), Some("session-1".to_string()));
        store.clear_reply_in_flight("user-1").await.unwrap();
        assert_eq!(store.reply_in_flight("user-1").await.unwrap(), None);
    }
}
