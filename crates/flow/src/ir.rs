//! Authoring-time flow IR (spec §3): the graph a tenant writes, before
//! compilation. Node/edge/guard shapes are tagged unions — unknown tags
//! are rejected at deserialization rather than silently ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub const SCHEMA_VERSION: &str = "v1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Flow {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub id: String,
    pub entry: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub policies: Option<Policies>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    /// Version counter bumped by the flow-modification executor (C12) on
    /// each successful live edit.
    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}
fn default_version() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Policies {
    #[serde(default)]
    pub meta: HashMap<String, Value>,
}

/// A field's primitive type, used only for validator hints — the engine
/// itself treats every answer value as an opaque JSON value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    String,
    Number,
    Boolean,
    Date,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    Automatic,
    LlmAssisted,
}

/// One node in the authored graph. Tagged by `kind` so a malformed or
/// future node shape fails to parse instead of silently degrading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Question {
        id: String,
        #[serde(default)]
        label: Option<String>,
        key: String,
        prompt: String,
        #[serde(default)]
        allowed_values: Option<Vec<String>>,
        #[serde(default)]
        clarification: Option<String>,
        #[serde(default)]
        examples: Option<Vec<String>>,
        #[serde(default)]
        dependencies: Option<Vec<String>>,
        #[serde(default)]
        validator: Option<String>,
        #[serde(default)]
        required: Option<bool>,
        #[serde(default)]
        skippable: Option<bool>,
        #[serde(default)]
        revisitable: Option<bool>,
        #[serde(default)]
        max_attempts: Option<u32>,
        #[serde(default)]
        data_type: Option<DataType>,
        #[serde(default)]
        meta: HashMap<String, Value>,
    },
    Decision {
        id: String,
        #[serde(default)]
        label: Option<String>,
        decision_type: DecisionType,
        #[serde(default)]
        decision_prompt: Option<String>,
        #[serde(default)]
        meta: HashMap<String, Value>,
    },
    Terminal {
        id: String,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        reason: Option<String>,
        #[serde(default)]
        success: Option<bool>,
        #[serde(default)]
        meta: HashMap<String, Value>,
    },
}

impl Node {
    pub fn id(&self) -> &str {
        match self {
            Node::Question { id, .. } => id,
            Node::Decision { id, .. } => id,
            Node::Terminal { id, .. } => id,
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Node::Question { label, .. } => label.as_deref(),
            Node::Decision { label, .. } => label.as_deref(),
            Node::Terminal { label, .. } => label.as_deref(),
        }
    }

    pub fn is_question(&self) -> bool {
        matches!(self, Node::Question { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Node::Terminal { .. })
    }
}

/// A named guard plus its argument map. Evaluated with a read-only view
/// of the current context (crate::guards).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuardRef {
    #[serde(rename = "fn")]
    pub function: String,
    #[serde(default)]
    pub args: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Edge {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub guard: Option<GuardRef>,
    pub priority: i64,
    #[serde(default)]
    pub condition_description: Option<String>,
}
