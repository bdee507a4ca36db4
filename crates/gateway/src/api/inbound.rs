//! `POST /v1/inbound` (spec §6): the single HTTP surface a transport
//! webhook posts a normalized message record to. Signature validation,
//! media download and STT are out-of-scope stubs — a caller-supplied
//! `text`, optionally accompanied by `media`, is all this endpoint
//! needs; a present `media` with empty `text` becomes the
//! `[AUDIO_ERROR: ...]` sentinel the spec describes.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;
use crate::runtime::{process_turn, TurnOutcome};
use crate::state::AppState;
use flowline_domain::tool_schema::OutboundMessage;

#[derive(Debug, Deserialize)]
pub struct InboundEnvelope {
    pub user_id: String,
    #[serde(default)]
    pub text: String,
    pub channel: String,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub media: Option<Value>,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Serialize)]
pub struct InboundResponse {
    pub superseded: bool,
    #[serde(default)]
    pub messages: Vec<OutboundMessage>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub escalate: bool,
    #[serde(default)]
    pub terminal: bool,
}

fn resolve_content(envelope: &InboundEnvelope) -> String {
    if !envelope.text.trim().is_empty() {
        return envelope.text.clone();
    }
    match &envelope.media {
        Some(media) => {
            let reason = media.get("transcription_error").and_then(Value::as_str).unwrap_or("no transcription available");
            format!("[AUDIO_ERROR: {reason}]")
        }
        None => String::new(),
    }
}

pub async fn inbound(State(state): State<AppState>, Json(envelope): Json<InboundEnvelope>) -> Result<Json<InboundResponse>, ApiError> {
    let content = resolve_content(&envelope);
    let message_id = envelope.message_id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let outcome = process_turn(&state, &envelope.channel, &envelope.user_id, content, message_id, envelope.is_admin).await?;

    let response = match outcome {
        TurnOutcome::Superseded => InboundResponse { superseded: true, messages: Vec::new(), tool_name: None, escalate: false, terminal: false },
        TurnOutcome::Replied(result) => InboundResponse {
            superseded: false,
            messages: result.messages,
            tool_name: Some(result.tool_name),
            escalate: result.escalate,
            terminal: result.terminal,
        },
    };

    Ok(Json(response))
}
