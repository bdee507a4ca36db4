//! `FlowContext` (spec §3): the durable, per-`(user, flow)` runtime state
//! the session store persists and the engine reads and writes one
//! snapshot at a time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    NotVisited,
    InProgress,
    Completed,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeState {
    pub status: NodeStatus,
    #[serde(default)]
    pub visits: u32,
    #[serde(default)]
    pub last_visited: Option<DateTime<Utc>>,
    #[serde(default)]
    pub validation_errors: Vec<String>,
    #[serde(default)]
    pub meta: HashMap<String, Value>,
}

impl Default for NodeState {
    fn default() -> Self {
        Self {
            status: NodeStatus::NotVisited,
            visits: 0,
            last_visited: None,
            validation_errors: Vec::new(),
            meta: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryTurn {
    pub timestamp: DateTime<Utc>,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub meta: HashMap<String, Value>,
}

/// Durable per-`(user_id, flow_id)` runtime state. See spec §3's
/// invariants: `pending_field` is set iff the current node is an
/// unanswered Question; `is_complete` implies the current node is
/// Terminal; `turn_count == history.len()`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlowContext {
    pub flow_id: String,
    pub user_id: String,
    pub session_id: String,
    #[serde(default)]
    pub tenant_id: Option<String>,

    #[serde(default)]
    pub current_node_id: Option<String>,
    #[serde(default)]
    pub answers: HashMap<String, Value>,
    #[serde(default)]
    pub pending_field: Option<String>,

    #[serde(default)]
    pub node_states: HashMap<String, NodeState>,

    #[serde(default)]
    pub history: Vec<HistoryTurn>,
    #[serde(default)]
    pub turn_count: u32,

    #[serde(default)]
    pub available_paths: Vec<String>,
    #[serde(default)]
    pub active_path: Option<String>,
    #[serde(default)]
    pub path_confidence: HashMap<String, f64>,
    #[serde(default)]
    pub path_locked: bool,
    #[serde(default)]
    pub path_labels: HashMap<String, String>,
    #[serde(default)]
    pub path_corrections: u32,

    #[serde(default)]
    pub user_intent: Option<String>,
    #[serde(default)]
    pub conversation_style: Option<String>,
    #[serde(default)]
    pub clarification_count: u32,

    #[serde(default)]
    pub is_complete: bool,
    #[serde(default)]
    pub escalation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FlowContext {
    pub fn new(flow_id: impl Into<String>, user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            flow_id: flow_id.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
            tenant_id: None,
            current_node_id: None,
            answers: HashMap::new(),
            pending_field: None,
            node_states: HashMap::new(),
            history: Vec::new(),
            turn_count: 0,
            available_paths: Vec::new(),
            active_path: None,
            path_confidence: HashMap::new(),
            path_locked: false,
            path_labels: HashMap::new(),
            path_corrections: 0,
            user_intent: None,
            conversation_style: None,
            clarification_count: 0,
            is_complete: false,
            escalation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn push_history(&mut self, role: Role, content: impl Into<String>, node_id: Option<String>) {
        self.history.push(HistoryTurn {
            timestamp: Utc::now(),
            role,
            content: content.into(),
            node_id,
            meta: HashMap::new(),
        });
        self.turn_count = self.history.len() as u32;
        self.updated_at = Utc::now();
    }

    pub fn node_state(&self, node_id: &str) -> NodeState {
        self.node_states.get(node_id).cloned().unwrap_or_default()
    }

    pub fn node_state_mut(&mut self, node_id: &str) -> &mut NodeState {
        self.node_states.entry(node_id.to_string()).or_default()
    }
}
