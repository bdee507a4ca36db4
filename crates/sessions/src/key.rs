//! The session store key builder (C9, spec §4.9): the single code path
//! allowed to construct a store key. Every pattern named in spec.md's
//! table is one function here; storage and cleanup both go through the
//! same function, which is what §8 invariant 6 tests.

/// Builds every key the session store reads or writes, under one
/// namespace prefix (`SessionStoreConfig::namespace`).
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    namespace: String,
}

impl KeyBuilder {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self { namespace: namespace.into() }
    }

    /// `<ns>:state:<user_id>:<session_id>` — the persisted `FlowContext`.
    pub fn state(&self, user_id: &str, session_id: &str) -> String {
        format!("{}:state:{user_id}:{session_id}", self.namespace)
    }

    /// `<ns>:state:<user_id>:meta:<agent_type>` — last-inbound / window
    /// timestamps used by the debounce manager and lifecycle resets.
    pub fn meta(&self, user_id: &str, agent_type: &str) -> String {
        format!("{}:state:{user_id}:meta:{agent_type}", self.namespace)
    }

    /// `<ns>:buffer:<session_id>` — the ephemeral inbound message buffer.
    pub fn buffer(&self, session_id: &str) -> String {
        format!("{}:buffer:{session_id}", self.namespace)
    }

    /// `<ns>:cancel:<session_id>` — the monotonic cancellation epoch.
    pub fn cancel(&self, session_id: &str) -> String {
        format!("{}:cancel:{session_id}", self.namespace)
    }

    /// `<ns>:state:system:current_reply:<user_id>` — the marker for the
    /// reply currently in flight for a user, across sessions.
    pub fn current_reply(&self, user_id: &str) -> String {
        format!("{}:state:system:current_reply:{user_id}", self.namespace)
    }

    /// `<ns>:history:<session_id>` — the append-only transcript key used
    /// by operator transcript tooling (independent of `FlowContext.history`).
    pub fn history(&self, session_id: &str) -> String {
        format!("{}:history:{session_id}", self.namespace)
    }

    /// `<ns>:escalation:<user_id>:<agent_type>` — escalation timestamp
    /// for delayed context clearing (§4.9 supplement).
    pub fn escalation(&self, user_id: &str, agent_type: &str) -> String {
        format!("{}:escalation:{user_id}:{agent_type}", self.namespace)
    }

    /// Every key pattern this builder can produce, as a prefix glob
    /// usable for cleanup sweeps (`<ns>:state:*`, `<ns>:buffer:*`, ...).
    /// Exercised by the key-discipline test (§8 invariant 6): any key
    /// actually written by the runner must match one of these prefixes.
    pub fn cleanup_prefixes(&self) -> Vec<String> {
        vec![
            format!("{}:state:", self.namespace),
            format!("{}:buffer:", self.namespace),
            format!("{}:cancel:", self.namespace),
            format!("{}:history:", self.namespace),
            format!("{}:escalation:", self.namespace),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kb() -> KeyBuilder {
        KeyBuilder::new("flowline")
    }

    #[test]
    fn state_key_matches_spec_pattern() {
        assert_eq!(kb().state("u1", "s1"), "flowline:state:u1:s1");
    }

    #[test]
    fn meta_key_matches_spec_pattern() {
        assert_eq!(kb().meta("u1", "order_bot"), "flowline:state:u1:meta:order_bot");
    }

    #[test]
    fn buffer_key_matches_spec_pattern() {
        assert_eq!(kb().buffer("s1"), "flowline:buffer:s1");
    }

    #[test]
    fn cancel_key_matches_spec_pattern() {
        assert_eq!(kb().cancel("s1"), "flowline:cancel:s1");
    }

    #[test]
    fn current_reply_key_matches_spec_pattern() {
        assert_eq!(kb().current_reply("u1"), "flowline:state:system:current_reply:u1");
    }

    #[test]
    fn history_key_matches_spec_pattern() {
        assert_eq!(kb().history("s1"), "flowline:history:s1");
    }

    #[test]
    fn every_produced_key_matches_a_cleanup_prefix() {
        let kb = kb();
        let produced = vec![
            kb.state("u1", "s1"),
            kb.meta("u1", "order_bot"),
            kb.buffer("s1"),
            kb.cancel("s1"),
            kb.history("s1"),
            kb.escalation("u1", "order_bot"),
        ];
        let prefixes = kb.cleanup_prefixes();
        for key in produced {
            assert!(
                prefixes.iter().any(|p| key.starts_with(p.as_str())),
                "key '{key}' matches no cleanup prefix"
            );
        }
    }
}
