//! Transient per-turn result types (spec §3): produced fresh each turn,
//! never persisted directly — the caller folds `answers_diff` and the
//! escalation/terminal flags into the persisted `FlowContext` itself.

use crate::tool_schema::OutboundMessage;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// The outcome of one turn runner pass (C8).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TurnResult {
    pub messages: Vec<OutboundMessage>,
    pub tool_name: String,
    pub answers_diff: HashMap<String, Value>,
    pub terminal: bool,
    pub escalate: bool,
    #[serde(default)]
    pub reasoning: Option<String>,
    pub confidence: f64,
}

/// The outcome of an external action application (C11/C12). Executors
/// must never throw into the runner — this is the only channel they use
/// to report failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionResult {
    pub success: bool,
    pub user_message: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl ActionResult {
    pub fn ok(user_message: impl Into<String>) -> Self {
        Self { success: true, user_message: user_message.into(), error: None, data: None }
    }

    pub fn failed(user_message: impl Into<String>, error: impl Into<String>) -> Self {
        Self { success: false, user_message: user_message.into(), error: Some(error.into()), data: None }
    }
}
