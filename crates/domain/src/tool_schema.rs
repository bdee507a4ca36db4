//! The closed tool/action schema the LLM responder is allowed to emit.
//!
//! Every shape here mirrors the original implementation's pydantic models
//! one field at a time: a response is a small ordered list of tool calls
//! (1..=3), each carrying a WhatsApp-style message batch (1..=5 messages)
//! plus a confidence and a free-text `reasoning`. `PerformAction` is the
//! workhorse; `RequestHumanHandoff` and `ModifyFlowLive` are siblings
//! offered alongside it in the same tool set (spec.md §4.4).

use serde::{Deserialize, Serialize};

/// First message must carry zero delay; WhatsApp-style text length/delay
/// bounds are enforced in [`MessageBatch::normalize`].
pub const NO_DELAY_MS: u32 = 0;
pub const MIN_FOLLOWUP_DELAY_MS: u32 = 2200;
pub const MAX_FOLLOWUP_DELAY_MS: u32 = 4000;
pub const MAX_MESSAGE_LENGTH: usize = 150;
pub const MESSAGE_TRUNCATION_LENGTH: usize = 147;
pub const TRUNCATION_SUFFIX: &str = "...";
pub const MIN_MESSAGES_PER_TURN: usize = 1;
pub const MAX_MESSAGES_PER_TURN: usize = 5;
pub const MAX_CONTEXT_SUMMARY_LENGTH: usize = 500;
pub const MIN_CONFIDENCE: f64 = 0.0;
pub const MAX_CONFIDENCE: f64 = 1.0;
pub const DEFAULT_CONFIDENCE: f64 = 0.8;
pub const MAX_SCHEMA_VALIDATION_RETRIES: u32 = 2;
pub const MIN_TOOLS_PER_RESPONSE: usize = 1;
pub const MAX_TOOLS_PER_RESPONSE: usize = 3;
pub const DEFAULT_ERROR_MESSAGE: &str =
    "Desculpe, tive um problema. Pode repetir sua mensagem?";

/// One outbound WhatsApp-style message: text plus a typing delay before it
/// is sent, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutboundMessage {
    pub text: String,
    pub delay_ms: u32,
}

/// A validated batch of 1..=5 outbound messages.
///
/// [`MessageBatch::normalize`] is the single place that enforces the delay
/// and truncation bounds; callers should always go through it rather than
/// constructing a batch by hand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageBatch(Vec<OutboundMessage>);

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MessageBatchError {
    #[error("at least one message is required")]
    Empty,
    #[error("at most {MAX_MESSAGES_PER_TURN} messages are allowed per turn, got {0}")]
    TooMany(usize),
}

impl MessageBatch {
    /// Build a batch from raw messages, clamping delays and truncating
    /// overlong text the way the original `MessageList` validator does.
    pub fn normalize(mut messages: Vec<OutboundMessage>) -> Result<Self, MessageBatchError> {
        if messages.is_empty() {
            return Err(MessageBatchError::Empty);
        }
        if messages.len() > MAX_MESSAGES_PER_TURN {
            return Err(MessageBatchError::TooMany(messages.len()));
        }

        messages[0].delay_ms = NO_DELAY_MS;
        for msg in messages.iter_mut().skip(1) {
            msg.delay_ms = msg.delay_ms.clamp(MIN_FOLLOWUP_DELAY_MS, MAX_FOLLOWUP_DELAY_MS);
        }
        for msg in messages.iter_mut() {
            if msg.text.chars().count() > MAX_MESSAGE_LENGTH {
                let truncated: String = msg.text.chars().take(MESSAGE_TRUNCATION_LENGTH).collect();
                msg.text = format!("{truncated}{TRUNCATION_SUFFIX}");
            }
        }

        Ok(Self(messages))
    }

    pub fn single(text: impl Into<String>) -> Self {
        Self(vec![OutboundMessage {
            text: text.into(),
            delay_ms: NO_DELAY_MS,
        }])
    }

    pub fn as_slice(&self) -> &[OutboundMessage] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<OutboundMessage> {
        self.0
    }
}

/// One of the six atomic actions `PerformAction` can request, applied in
/// the order they appear in the list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PerformActionKind {
    Stay,
    Update,
    Navigate,
    Handoff,
    Complete,
    Restart,
    ModifyFlow,
    UpdateCommunicationStyle,
}

/// Reason codes for a handoff request, shared by `PerformAction`'s
/// `handoff` action and the standalone `RequestHumanHandoff` tool.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HandoffReason {
    UserFrustrated,
    ExplicitRequest,
    TooComplex,
    TechnicalIssue,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModificationType {
    Prompt,
    Routing,
    Validation,
    General,
}

/// The unified action tool: a sequence of [`PerformActionKind`]s plus the
/// data each one needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformAction {
    pub actions: Vec<PerformActionKind>,
    pub messages: MessageBatch,
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default)]
    pub updates: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub target_node_id: Option<String>,
    #[serde(default)]
    pub clarification_reason: Option<String>,
    #[serde(default)]
    pub handoff_reason: Option<HandoffReason>,
    /// Required when `actions` contains `modify_flow` (admin only).
    #[serde(default)]
    pub flow_modification_instruction: Option<String>,
    /// Required when `actions` contains `update_communication_style`.
    #[serde(default)]
    pub updated_communication_style: Option<String>,
}

/// Sibling tool: request escalation to a human operator without going
/// through `PerformAction`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestHumanHandoff {
    pub messages: MessageBatch,
    pub confidence: f64,
    pub reasoning: String,
    pub reason: HandoffReason,
    pub context_summary: String,
    #[serde(default = "default_urgency")]
    pub urgency: Urgency,
}

fn default_urgency() -> Urgency {
    Urgency::Medium
}

/// Sibling tool: request a live edit to the active flow. Admin-gated at
/// the executor layer (C12), not here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModifyFlowLive {
    pub messages: MessageBatch,
    pub confidence: f64,
    pub reasoning: String,
    pub instruction: String,
    #[serde(default)]
    pub target_node: Option<String>,
    #[serde(default = "default_modification_type")]
    pub modification_type: ModificationType,
}

fn default_modification_type() -> ModificationType {
    ModificationType::General
}

/// The closed union of tools the responder may select, tagged by name on
/// the wire to match the original's discriminated `ToolCallUnion`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "tool_name")]
pub enum ToolCall {
    PerformAction(PerformAction),
    RequestHumanHandoff(RequestHumanHandoff),
    ModifyFlowLive(ModifyFlowLive),
}

impl ToolCall {
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::PerformAction(_) => "PerformAction",
            ToolCall::RequestHumanHandoff(_) => "RequestHumanHandoff",
            ToolCall::ModifyFlowLive(_) => "ModifyFlowLive",
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            ToolCall::PerformAction(a) => a.confidence,
            ToolCall::RequestHumanHandoff(a) => a.confidence,
            ToolCall::ModifyFlowLive(a) => a.confidence,
        }
    }

    pub fn messages(&self) -> &MessageBatch {
        match self {
            ToolCall::PerformAction(a) => &a.messages,
            ToolCall::RequestHumanHandoff(a) => &a.messages,
            ToolCall::ModifyFlowLive(a) => &a.messages,
        }
    }
}

/// The full schema-validated response the LLM responder extracts from a
/// provider completion: 1..=3 tool calls plus overall reasoning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmResponse {
    pub tools: Vec<ToolCall>,
    pub reasoning: String,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LlmResponseError {
    #[error("response must contain between {MIN_TOOLS_PER_RESPONSE} and {MAX_TOOLS_PER_RESPONSE} tools, got {0}")]
    ToolCountOutOfRange(usize),
    #[error("confidence must be within [{MIN_CONFIDENCE}, {MAX_CONFIDENCE}], got {0}")]
    ConfidenceOutOfRange(f64),
    #[error("each tool's message batch must carry between {MIN_MESSAGES_PER_TURN} and {MAX_MESSAGES_PER_TURN} messages, got {0}")]
    MessageCountOutOfRange(usize),
}

impl LlmResponse {
    pub fn validate(&self) -> Result<(), LlmResponseError> {
        if self.tools.len() < MIN_TOOLS_PER_RESPONSE || self.tools.len() > MAX_TOOLS_PER_RESPONSE {
            return Err(LlmResponseError::ToolCountOutOfRange(self.tools.len()));
        }
        for tool in &self.tools {
            let c = tool.confidence();
            if !(MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&c) {
                return Err(LlmResponseError::ConfidenceOutOfRange(c));
            }
            let message_count = tool.messages().as_slice().len();
            if message_count < MIN_MESSAGES_PER_TURN || message_count > MAX_MESSAGES_PER_TURN {
                return Err(LlmResponseError::MessageCountOutOfRange(message_count));
            }
        }
        Ok(())
    }

    /// The primary tool (first in the list), falling back to a default
    /// `stay` action when the response somehow carries none — mirrors the
    /// original's `get_tool_name` default of `"PerformAction"`.
    pub fn primary_tool_name(&self) -> &'static str {
        self.tools.first().map(ToolCall::name).unwrap_or("PerformAction")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_clamps_first_message_delay_to_zero() {
        let batch = MessageBatch::normalize(vec![OutboundMessage {
            text: "oi".into(),
            delay_ms: 9999,
        }])
        .unwrap();
        assert_eq!(batch.as_slice()[0].delay_ms, NO_DELAY_MS);
    }

    #[test]
    fn normalize_clamps_followup_delay_into_bounds() {
        let batch = MessageBatch::normalize(vec![
            OutboundMessage { text: "a".into(), delay_ms: 0 },
            OutboundMessage { text: "b".into(), delay_ms: 100 },
            OutboundMessage { text: "c".into(), delay_ms: 999_999 },
        ])
        .unwrap();
        assert_eq!(batch.as_slice()[1].delay_ms, MIN_FOLLOWUP_DELAY_MS);
        assert_eq!(batch.as_slice()[2].delay_ms, MAX_FOLLOWUP_DELAY_MS);
    }

    #[test]
    fn normalize_truncates_overlong_text() {
        let long = "x".repeat(200);
        let batch = MessageBatch::normalize(vec![OutboundMessage { text: long, delay_ms: 0 }]).unwrap();
        let text = &batch.as_slice()[0].text;
        assert_eq!(text.chars().count(), MESSAGE_TRUNCATION_LENGTH + TRUNCATION_SUFFIX.len());
        assert!(text.ends_with("..."));
    }

    #[test]
    fn normalize_rejects_empty_batch() {
        assert_eq!(MessageBatch::normalize(vec![]), Err(MessageBatchError::Empty));
    }

    #[test]
    fn normalize_rejects_too_many_messages() {
        let messages = (0..6)
            .map(|i| OutboundMessage { text: i.to_string(), delay_ms: 0 })
            .collect();
        assert_eq!(
            MessageBatch::normalize(messages),
            Err(MessageBatchError::TooMany(6))
        );
    }

    #[test]
    fn response_validates_tool_count_and_confidence() {
        let action = PerformAction {
            actions: vec![PerformActionKind::Stay],
            messages: MessageBatch::single("ok"),
            confidence: 1.5,
            reasoning: "r".into(),
            updates: None,
            target_node_id: None,
            clarification_reason: None,
            handoff_reason: None,
            flow_modification_instruction: None,
            updated_communication_style: None,
        };
        let response = LlmResponse {
            tools: vec![ToolCall::PerformAction(action)],
            reasoning: "r".into(),
        };
        assert_eq!(
            response.validate(),
            Err(LlmResponseError::ConfidenceOutOfRange(1.5))
        );
    }

    #[test]
    fn tool_call_round_trips_through_json_with_tag() {
        let call = ToolCall::RequestHumanHandoff(RequestHumanHandoff {
            messages: MessageBatch::single("um momento"),
            confidence: 0.9,
            reasoning: "escalating".into(),
            reason: HandoffReason::UserFrustrated,
            context_summary: "user asked for a human twice".into(),
            urgency: Urgency::High,
        });
        let json = serde_json::to_string(&call).unwrap();
        assert!(json.contains("\"tool_name\":\"RequestHumanHandoff\""));
        let back: ToolCall = serde_json::from_str(&json).unwrap();
        assert_eq!(back, call);
    }
}
