//! The bounded schema-validation retry loop (C6, spec §4.5): call the
//! provider, parse the tool call against the typed schema, and on
//! failure append a correction hint and retry up to `max_schema_retries`
//! times before falling back to a deterministic `stay` response.

use crate::prompt::append_schema_hint;
use flowline_domain::trace::TraceEvent;
use flowline_domain::tool_schema::{
    DEFAULT_ERROR_MESSAGE, LlmResponse, MessageBatch, PerformAction, PerformActionKind, ToolCall,
};
use flowline_llm::{CompletionRequest, LlmProvider};
use std::time::Instant;

pub struct ResponderConfig {
    pub model: String,
    pub max_schema_retries: u32,
}

/// Strip a leading/trailing markdown code fence (```json ... ``` or
/// ``` ... ```) some providers wrap JSON responses in.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse a completion's content into a validated [`LlmResponse`],
/// tolerating a JSON-encoded-as-string wrapper (`"{...}"`) the way the
/// provider's `arguments` field sometimes arrives in the wild (§6).
fn parse_response(content: &str) -> Result<LlmResponse, String> {
    let candidate = strip_code_fence(content);

    let parsed: LlmResponse = match serde_json::from_str(candidate) {
        Ok(value) => value,
        Err(direct_err) => {
            // Tolerate a JSON string containing JSON: `"{\"tools\":...}"`.
            match serde_json::from_str::<String>(candidate).ok().and_then(|inner| serde_json::from_str(&inner).ok()) {
                Some(value) => value,
                None => return Err(format!("invalid JSON: {direct_err}")),
            }
        }
    };

    parsed.validate().map_err(|e| e.to_string())?;
    Ok(parsed)
}

fn deterministic_fallback() -> LlmResponse {
    LlmResponse {
        tools: vec![ToolCall::PerformAction(PerformAction {
            actions: vec![PerformActionKind::Stay],
            messages: MessageBatch::single(DEFAULT_ERROR_MESSAGE),
            confidence: 0.0,
            reasoning: "schema validation retries exhausted".into(),
            updates: None,
            target_node_id: None,
            clarification_reason: None,
            handoff_reason: None,
            flow_modification_instruction: None,
            updated_communication_style: None,
        })],
        reasoning: "deterministic fallback".into(),
    }
}

/// Invoke the provider under the bounded retry policy described above.
/// Never returns an `Err` — exhausting retries yields the deterministic
/// fallback response instead, matching the spec's "never fatal" design
/// for schema violations (§7).
pub async fn respond(provider: &dyn LlmProvider, config: &ResponderConfig, initial_prompt: String) -> LlmResponse {
    let mut prompt = initial_prompt;

    for attempt in 0..=config.max_schema_retries {
        let request = CompletionRequest { prompt: prompt.clone(), model: config.model.clone(), json_mode: true };
        let started = Instant::now();
        let completion = match provider.complete(&request).await {
            Ok(response) => response,
            Err(err) => {
                TraceEvent::LlmSchemaRetry { attempt, errors: vec![err.to_string()] }.emit();
                if attempt == config.max_schema_retries {
                    TraceEvent::LlmFallback { reason: err.to_string() }.emit();
                    return deterministic_fallback();
                }
                continue;
            }
        };

        TraceEvent::LlmCall {
            prompt_type: "turn".into(),
            model: config.model.clone(),
            attempt,
            duration_ms: started.elapsed().as_millis() as u64,
            prompt_tokens: completion.usage.as_ref().and_then(|u| u.prompt_tokens),
            completion_tokens: completion.usage.as_ref().and_then(|u| u.completion_tokens),
        }
        .emit();

        match parse_response(&completion.content) {
            Ok(response) => return response,
            Err(error) => {
                TraceEvent::LlmSchemaRetry { attempt, errors: vec![error.clone()] }.emit();
                if attempt == config.max_schema_retries {
                    TraceEvent::LlmFallback { reason: "schema validation retries exhausted".into() }.emit();
                    return deterministic_fallback();
                }
                prompt = append_schema_hint(prompt, std::slice::from_ref(&error));
            }
        }
    }

    deterministic_fallback()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowline_llm::StubProvider;

    #[tokio::test]
    async fn parses_a_well_formed_response_on_first_attempt() {
        let provider = StubProvider::new();
        provider.push_response(
            r#"{"tools":[{"tool_name":"PerformAction","actions":["update"],"messages":[{"text":"ok","delay_ms":0}],"confidence":0.9,"reasoning":"r","updates":{"name":"Alice"}}],"reasoning":"r"}"#,
        );
        let config = ResponderConfig { model: "stub".into(), max_schema_retries: 2 };
        let response = respond(&provider, &config, "prompt".into()).await;
        assert_eq!(response.tools.len(), 1);
    }

    #[tokio::test]
    async fn falls_back_after_exhausting_retries_on_malformed_json() {
        let provider = StubProvider::new();
        provider.push_response("not json");
        provider.push_response("still not json");
        provider.push_response("nope");
        let config = ResponderConfig { model: "stub".into(), max_schema_retries: 2 };
        let response = respond(&provider, &config, "prompt".into()).await;
        let ToolCall::PerformAction(action) = &response.tools[0] else { panic!("expected PerformAction") };
        assert_eq!(action.confidence, 0.0);
        assert_eq!(action.actions, vec![PerformActionKind::Stay]);
    }

    #[tokio::test]
    async fn tolerates_json_encoded_as_a_string() {
        let provider = StubProvider::new();
        let inner = r#"{"tools":[{"tool_name":"PerformAction","actions":["stay"],"messages":[{"text":"ok","delay_ms":0}],"confidence":0.5,"reasoning":"r"}],"reasoning":"r"}"#;
        let wrapped = serde_json::to_string(inner).unwrap();
        provider.push_response(wrapped);
        let config = ResponderConfig { model: "stub".into(), max_schema_retries: 1 };
        let response = respond(&provider, &config, "prompt".into()).await;
        assert_eq!(response.tools.len(), 1);
    }
}
