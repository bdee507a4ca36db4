//! A deterministic in-process provider: no network, no credentials.
//! Used by the test suites across the workspace and by `flowline chat`
//! when no provider is configured. Responses are scripted ahead of time;
//! once the script is exhausted it falls back to a canned `stay` action.

use crate::traits::{CompletionRequest, CompletionResponse, LlmProvider};
use async_trait::async_trait;
use flowline_domain::Error;
use parking_lot::Mutex;
use std::collections::VecDeque;

pub struct StubProvider {
    scripted: Mutex<VecDeque<String>>,
}

impl StubProvider {
    pub fn new() -> Self {
        Self { scripted: Mutex::new(VecDeque::new()) }
    }

    /// Queue a raw JSON completion body to be returned on the next
    /// `complete` call, in FIFO order.
    pub fn push_response(&self, raw_json: impl Into<String>) {
        self.scripted.lock().push_back(raw_json.into());
    }

    fn fallback_response() -> String {
        r#"{"tools":[{"tool_name":"PerformAction","actions":["stay"],"messages":[{"text":"Pode repetir, por favor?","delay_ms":0}],"confidence":0.5,"reasoning":"stub default"}],"reasoning":"stub default"}"#.to_string()
    }
}

impl Default for StubProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for StubProvider {
    async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse, Error> {
        let content = self
            .scripted
            .lock()
            .pop_front()
            .unwrap_or_else(Self::fallback_response);
        Ok(CompletionResponse { content, usage: None })
    }

    fn provider_id(&self) -> &str {
        "stub"
    }
}
