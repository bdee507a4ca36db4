//! The session store's key-value primitives (C9, spec §4.9): a durable
//! store with second-granularity TTL and the atomic primitives the
//! debounce protocol needs — `get`/`set`/`setex`/`rpush`/`lrange`/`del`
//! plus an atomic list-drain and a monotonic counter bump. One
//! in-process implementation is provided; the trait is the seam a
//! Redis-backed implementation would sit behind in a multi-process
//! deployment (see DESIGN.md's Open Question resolution).

use async_trait::async_trait;
use flowline_domain::Error;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

/// The store's atomic primitives. Implementations must make `rpush`,
/// `drain`, and `incr` atomic with respect to concurrent callers — the
/// debounce protocol (§4.8) depends on this, not on cross-key atomicity.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;
    async fn set(&self, key: &str, value: String) -> Result<(), Error>;
    async fn setex(&self, key: &str, value: String, ttl: Duration) -> Result<(), Error>;
    async fn del(&self, key: &str) -> Result<(), Error>;
    /// Append one element to a list value, creating it if absent.
    async fn rpush(&self, key: &str, value: String) -> Result<(), Error>;
    async fn lrange(&self, key: &str) -> Result<Vec<String>, Error>;
    /// Atomically read and clear a list's contents.
    async fn drain(&self, key: &str) -> Result<Vec<String>, Error>;
    /// Atomically increment and return a monotonic counter, creating it
    /// at 0 if absent (so the first call returns 1).
    async fn incr(&self, key: &str) -> Result<i64, Error>;
    /// Read a counter's current value without incrementing it.
    async fn peek_counter(&self, key: &str) -> Result<i64, Error>;
}

enum StoredValue {
    Scalar(Entry),
    List(Vec<String>),
    Counter(i64),
}

/// An in-process, `parking_lot::Mutex`-guarded key-value store. Shared
/// across webhook workers inside one process via `Arc` (spec §5:
/// "multiple webhook workers" is satisfied here by concurrent tokio
/// tasks over shared, lock-protected state). No critical section here
/// ever holds the lock across an `.await`, so a sync mutex is fine.
pub struct InMemoryStore {
    data: Mutex<HashMap<String, StoredValue>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self { data: Mutex::new(HashMap::new()) }
    }

    fn is_live(entry: &Entry) -> bool {
        entry.expires_at.map(|at| Instant::now() < at).unwrap_or(true)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let mut data = self.data.lock();
        match data.get(key) {
            Some(StoredValue::Scalar(entry)) if Self::is_live(entry) => Ok(Some(entry.value.clone())),
            Some(StoredValue::Scalar(_)) => {
                data.remove(key);
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), Error> {
        let mut data = self.data.lock();
        data.insert(key.to_string(), StoredValue::Scalar(Entry { value, expires_at: None }));
        Ok(())
    }

    async fn setex(&self, key: &str, value: String, ttl: Duration) -> Result<(), Error> {
        let mut data = self.data.lock();
        data.insert(
            key.to_string(),
            StoredValue::Scalar(Entry { value, expires_at: Some(Instant::now() + ttl) }),
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), Error> {
        let mut data = self.data.lock();
        data.remove(key);
        Ok(())
    }

    async fn rpush(&self, key: &str, value: String) -> Result<(), Error> {
        let mut data = self.data.lock();
        match data.get_mut(key) {
            Some(StoredValue::List(list)) => list.push(value),
            _ => {
                data.insert(key.to_string(), StoredValue::List(vec![value]));
            }
        }
        Ok(())
    }

    async fn lrange(&self, key: &str) -> Result<Vec<String>, Error> {
        let data = self.data.lock();
        match data.get(key) {
            Some(StoredValue::List(list)) => Ok(list.clone()),
            _ => Ok(Vec::new()),
        }
    }

    async fn drain(&self, key: &str) -> Result<Vec<String>, Error> {
        let mut data = self.data.lock();
        match data.remove(key) {
            Some(StoredValue::List(list)) => Ok(list),
            Some(other) => {
                data.insert(key.to_string(), other);
                Ok(Vec::new())
            }
            None => Ok(Vec::new()),
        }
    }

    async fn incr(&self, key: &str) -> Result<i64, Error> {
        let mut data = self.data.lock();
        let next = match data.get(key) {
            Some(StoredValue::Counter(n)) => n + 1,
            _ => 1,
        };
        data.insert(key.to_string(), StoredValue::Counter(next));
        Ok(next)
    }

    async fn peek_counter(&self, key: &str) -> Result<i64, Error> {
        let data = self.data.lock();
        match data.get(key) {
            Some(StoredValue::Counter(n)) => Ok(*n),
            _ => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = InMemoryStore::new();
        store.set("k", "v".into()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn setex_expires_after_ttl() {
        let store = InMemoryStore::new();
        store.setex("k", "v".into(), Duration::from_millis(20)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn rpush_and_lrange_preserve_order() {
        let store = InMemoryStore::new();
        store.rpush("buf", "a".into()).await.unwrap();
        store.rpush("buf", "b".into()).await.unwrap();
        store.rpush("buf", "c".into()).await.unwrap();
        assert_eq!(store.lrange("buf").await.unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn drain_clears_the_list_atomically() {
        let store = InMemoryStore::new();
        store.rpush("buf", "a".into()).await.unwrap();
        store.rpush("buf", "b".into()).await.unwrap();
        let drained = store.drain("buf").await.unwrap();
        assert_eq!(drained, vec!["a", "b"]);
        assert!(store.lrange("buf").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn incr_is_monotonic_starting_at_one() {
        let store = InMemoryStore::new();
        assert_eq!(store.incr("epoch").await.unwrap(), 1);
        assert_eq!(store.incr("epoch").await.unwrap(), 2);
        assert_eq!(store.peek_counter("epoch").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn del_removes_any_value_kind() {
        let store = InMemoryStore::new();
        store.set("k", "v".into()).await.unwrap();
        store.del("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
