//! The LLM adapter seam (spec §6, "Consumed from LLM adapter"): a single
//! `complete` call that hands a fully-assembled prompt to a provider and
//! gets back raw text. Schema parsing and retry policy live in the
//! responder crate, not here — this crate only knows how to talk to a
//! model.

use async_trait::async_trait;
use flowline_domain::Error;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub model: String,
    /// Ask the provider to constrain output to a JSON object when it
    /// supports doing so natively; the responder still validates the
    /// result itself regardless.
    pub json_mode: bool,
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub usage: Option<Usage>,
}

/// A chat-completion backend. Implementations must be cheaply cloneable
/// or already wrapped in an `Arc` by the caller — the turn runner shares
/// one instance across concurrent sessions.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, Error>;

    fn provider_id(&self) -> &str;
}
