//! The turn runner (C8, spec §4.6): the orchestrator that drives one
//! debounce → session-load → engine-snapshot → responder → executor →
//! engine-follow → session-save round trip and assembles the outbound
//! message list. This is the only place the workspace's seven crates
//! meet.
//!
//! Unlike the teacher's `runtime::run_turn`, which streams incremental
//! `TurnEvent`s over an `mpsc` channel for SSE display, this runner
//! returns one [`flowline_domain::TurnResult`] per burst — the engine
//! never produces partial output mid-turn, so there is nothing to
//! stream.

use chrono::Utc;
use flowline_domain::tool_schema::{
    HandoffReason, MessageBatch, MessageBatchError, OutboundMessage, ToolCall, DEFAULT_ERROR_MESSAGE, MAX_MESSAGES_PER_TURN,
};
use flowline_domain::{ActionResult, Error, TurnResult};
use flowline_executor::{apply_actions, deterministic_feedback_message, passes_truthfulness_heuristic, propose_edits};
use flowline_executor::flow_mod::apply_batch;
use flowline_executor::tool_executor::ExternalActionRequest;
use flowline_flow::context::Role;
use flowline_flow::{engine, FlowContext};
use flowline_responder::{build_feedback_prompt, build_prompt, respond, PromptInput, ResponderConfig};
use flowline_sessions::{DebounceOutcome, InboundBuffer, TranscriptLine};
use std::collections::HashMap;
use std::time::Duration;

use crate::state::AppState;

#[derive(Debug, Clone)]
pub enum TurnOutcome {
    /// A newer message superseded this burst before it reached the
    /// point of sending a reply. No user-visible output was produced
    /// and nothing was persisted for this turn.
    Superseded,
    Replied(TurnResult),
}

fn handoff_reason_str(reason: HandoffReason) -> &'static str {
    match reason {
        HandoffReason::UserFrustrated => "user_frustrated",
        HandoffReason::ExplicitRequest => "explicit_request",
        HandoffReason::TooComplex => "too_complex",
        HandoffReason::TechnicalIssue => "technical_issue",
    }
}

/// Process one already-transcribed inbound message end to end. `admin`
/// gates `modify_flow` / `ModifyFlowLive`, matching the closed tool
/// set's admin-only siblings (spec §4.4).
pub async fn process_turn(
    state: &AppState,
    channel: &str,
    user_id: &str,
    content: String,
    message_id: String,
    admin: bool,
) -> Result<TurnOutcome, Error> {
    let (flow_id, tenant_id) = state.config.resolve_channel(channel);
    let flow = state
        .flows
        .compiled(&flow_id)
        .ok_or_else(|| Error::Other(format!("no compiled flow for id '{flow_id}'")))?;
    let tenant = state.config.tenant(&tenant_id);
    // Per (user, flow): two users on the same flow must not share a
    // debounce buffer, cancellation epoch, or transcript.
    let session_id = format!("{flow_id}:{user_id}");

    let wait_ms = tenant.wait_time_before_replying_ms;
    let outcome = state
        .debounce
        .handle_inbound(&session_id, message_id, content, wait_ms, tenant.delay_variance_percent as u32)
        .await?;

    let (messages, held_epoch, pre_reply_delay) = match outcome {
        DebounceOutcome::Superseded => return Ok(TurnOutcome::Superseded),
        DebounceOutcome::ProcessAggregated { messages, held_epoch, pre_reply_delay } => (messages, held_epoch, pre_reply_delay),
    };

    if tenant.natural_delays_enabled && !pre_reply_delay.is_zero() {
        tokio::time::sleep(pre_reply_delay).await;
    }

    if state.epoch.is_cancelled(&session_id, held_epoch).await? {
        return Ok(TurnOutcome::Superseded);
    }

    let aggregated_text = InboundBuffer::aggregate_text(&messages);
    state.context_store.mark_reply_in_flight(user_id, &session_id).await?;

    let mut ctx = match state.context_store.load(user_id, &session_id).await? {
        Some(ctx) => ctx,
        None => FlowContext::new(flow_id.clone(), user_id.to_string(), session_id.clone()),
    };

    if let Some(reason) = state.lifecycle.should_reset(ctx.updated_at, channel, Utc::now()) {
        let old_session_id = ctx.session_id.clone();
        engine::reset(&flow, &mut ctx);
        state.lifecycle.emit_reset(&format!("{channel}:{user_id}"), &old_session_id, &ctx.session_id, &reason);
    }

    if ctx.escalation_reason.is_some() {
        let grace = Duration::from_secs(tenant.escalation_context_clear_delay_seconds);
        if state.escalation.should_clear_context(user_id, &tenant_id, grace, Utc::now()).await? {
            ctx.escalation_reason = None;
            state.escalation.clear(user_id, &tenant_id).await?;
        }
    }

    engine::initialize(&flow, &mut ctx);
    let answers_before = ctx.answers.clone();
    let snapshot = engine::get_state(&flow, &mut ctx, Some(&aggregated_text))?;

    let allowed_values: Option<Vec<String>> = flow.node(&snapshot.node_id).and_then(|node| match node {
        flowline_flow::ir::Node::Question { allowed_values, .. } => allowed_values.clone(),
        _ => None,
    });

    let communication_style = state.communication_style(&tenant_id);
    let prompt = build_prompt(&PromptInput {
        pending_field: ctx.pending_field.as_deref(),
        prompt_text: snapshot.question.as_ref().map(|q| q.prompt.as_str()),
        allowed_values: allowed_values.as_deref(),
        user_message: &aggregated_text,
        answers: &ctx.answers,
        recent_history: &ctx.history,
        available_edges: &snapshot.transitions,
        available_paths: &snapshot.available_paths,
        active_path: ctx.active_path.as_deref(),
        admin,
        communication_style: &communication_style,
        project_description: &tenant.project_description,
        target_audience: &tenant.target_audience,
    });

    let responder_config = ResponderConfig { model: state.config.llm.model.clone(), max_schema_retries: state.config.llm.max_schema_retries };
    let response = respond(state.llm.as_ref(), &responder_config, prompt).await;

    if state.epoch.is_cancelled(&session_id, held_epoch).await? {
        state.context_store.clear_reply_in_flight(user_id).await?;
        return Ok(TurnOutcome::Superseded);
    }

    let primary_tool_name = response.primary_tool_name().to_string();
    let mut reply_messages: Vec<OutboundMessage> = Vec::new();
    let mut terminal = false;
    let mut escalate = false;
    let mut confidence = 0.0;

    for tool in &response.tools {
        match tool {
            ToolCall::PerformAction(action) => {
                confidence = action.confidence;
                let outcome = apply_actions(&flow, &mut ctx, action, admin);
                reply_messages.extend(action.messages.as_slice().iter().cloned());

                if outcome.escalate {
                    escalate = true;
                    state.escalation.mark_escalated(user_id, &tenant_id).await?;
                }
                if outcome.terminal {
                    terminal = true;
                }
                for external in outcome.external_actions {
                    let feedback = apply_external_action(state, &flow_id, &tenant_id, external, &action.reasoning, &responder_config).await?;
                    reply_messages.extend(feedback);
                }
                if outcome.escalate || outcome.terminal {
                    break;
                }
            }
            ToolCall::RequestHumanHandoff(handoff) => {
                confidence = handoff.confidence;
                ctx.escalation_reason = Some(handoff_reason_str(handoff.reason).to_string());
                escalate = true;
                reply_messages.extend(handoff.messages.as_slice().iter().cloned());
                state.escalation.mark_escalated(user_id, &tenant_id).await?;
                break;
            }
            ToolCall::ModifyFlowLive(modify) => {
                confidence = modify.confidence;
                reply_messages.extend(modify.messages.as_slice().iter().cloned());
                if !admin {
                    tracing::warn!(flow_id, "ModifyFlowLive requested by a non-admin caller; ignoring");
                    continue;
                }
                let external = ExternalActionRequest::ModifyFlow { instruction: modify.instruction.clone() };
                let feedback = apply_external_action(state, &flow_id, &tenant_id, external, &modify.reasoning, &responder_config).await?;
                reply_messages.extend(feedback);
            }
        }
    }

    if state.epoch.is_cancelled(&session_id, held_epoch).await? {
        state.context_store.clear_reply_in_flight(user_id).await?;
        return Ok(TurnOutcome::Superseded);
    }

    let combined_count = reply_messages.len();
    if combined_count > MAX_MESSAGES_PER_TURN {
        // Each tool's own batch is capped at the wire limit (enforced by
        // `LlmResponse::validate`), but up to three tools can each
        // contribute that many messages; truncate the combined reply
        // rather than discard it outright.
        tracing::warn!(flow_id, combined_count, "combined reply exceeded the per-turn message cap; truncating to the first five");
        reply_messages.truncate(MAX_MESSAGES_PER_TURN);
    }

    let messages = match MessageBatch::normalize(reply_messages) {
        Ok(batch) => batch.into_vec(),
        Err(MessageBatchError::Empty) => vec![OutboundMessage { text: DEFAULT_ERROR_MESSAGE.to_string(), delay_ms: 0 }],
        Err(MessageBatchError::TooMany(count)) => unreachable!("truncated to {MAX_MESSAGES_PER_TURN} above, got {count}"),
    };

    let joined_reply = messages.iter().map(|m| m.text.as_str()).collect::<Vec<_>>().join(" ");
    ctx.push_history(Role::Assistant, joined_reply.clone(), ctx.current_node_id.clone());
    state.context_store.save(&ctx).await?;
    state
        .transcripts
        .append(
            &session_id,
            &[
                TranscriptLine::new("user", aggregated_text, Some(snapshot.node_id.clone())),
                TranscriptLine::new("assistant", joined_reply, ctx.current_node_id.clone()),
            ],
        )
        .await?;
    state.context_store.clear_reply_in_flight(user_id).await?;

    let mut answers_diff = HashMap::new();
    for (key, value) in &ctx.answers {
        if answers_before.get(key) != Some(value) {
            answers_diff.insert(key.clone(), value.clone());
        }
    }

    Ok(TurnOutcome::Replied(TurnResult {
        messages,
        tool_name: primary_tool_name,
        answers_diff,
        terminal,
        escalate,
        reasoning: Some(response.reasoning),
        confidence,
    }))
}

/// Run one external action (C11/C12) through to its feedback-loop
/// reply: apply the action for real, re-invoke the responder with the
/// honest outcome, and accept or replace its reply text under the
/// truthfulness heuristic (spec §4.7).
async fn apply_external_action(
    state: &AppState,
    flow_id: &str,
    tenant_id: &str,
    external: ExternalActionRequest,
    user_instruction: &str,
    responder_config: &ResponderConfig,
) -> Result<Vec<OutboundMessage>, Error> {
    let (action_name, result) = match external {
        ExternalActionRequest::ModifyFlow { instruction } => {
            let action_name = "modify_flow";
            let result = match state.flows.ir(flow_id) {
                None => ActionResult::failed("Nao encontrei o fluxo para editar.", format!("unknown flow '{flow_id}'")),
                Some(current) => match propose_edits(state.llm.as_ref(), &responder_config.model, &current, &instruction).await {
                    Err(err) => ActionResult::failed("Nao consegui interpretar a instrucao de edicao.", err),
                    Ok(edits) => match apply_batch(&current, &edits) {
                        Ok(updated) => {
                            let new_version = updated.version;
                            match state.flows.insert(updated) {
                                Ok(()) => {
                                    flowline_domain::trace::TraceEvent::FlowModified { flow_id: flow_id.to_string(), new_version }.emit();
                                    ActionResult::ok("Fluxo atualizado com sucesso.")
                                }
                                Err(err) => ActionResult::failed("Falha ao salvar o fluxo atualizado.", err.to_string()),
                            }
                        }
                        Err(err) => ActionResult::failed("A edicao proposta nao passou na validacao.", err.to_string()),
                    },
                },
            };
            (action_name, result)
        }
        ExternalActionRequest::UpdateCommunicationStyle { new_style } => {
            state.tenant_style_overrides.write().insert(tenant_id.to_string(), new_style);
            ("update_communication_style", ActionResult::ok("Estilo de comunicacao atualizado."))
        }
    };

    flowline_domain::trace::TraceEvent::ExternalActionApplied { action: action_name.to_string(), success: result.success }.emit();

    let feedback_prompt = build_feedback_prompt(action_name, result.success, &result.user_message, result.error.as_deref(), user_instruction, &[]);
    let feedback_response = respond(state.llm.as_ref(), responder_config, feedback_prompt).await;

    let mut candidate_messages: Vec<OutboundMessage> = Vec::new();
    for tool in &feedback_response.tools {
        candidate_messages.extend(tool.messages().as_slice().iter().cloned());
    }
    let candidate_text = candidate_messages.iter().map(|m| m.text.as_str()).collect::<Vec<_>>().join(" ");

    if !candidate_messages.is_empty() && passes_truthfulness_heuristic(result.success, &candidate_text) {
        Ok(candidate_messages)
    } else {
        Ok(vec![OutboundMessage { text: deterministic_feedback_message(result.success).to_string(), delay_ms: 0 }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowline_domain::config::{Config, TenantConfig};
    use flowline_flow::ir::{Edge, Flow, Node};
    use flowline_llm::StubProvider;
    use flowline_sessions::{CancellationEpoch, ContextStore, DebounceManager, EscalationTracker, InMemoryStore, InboundBuffer, KeyBuilder, KeyValueStore, LifecycleManager, TranscriptWriter};
    use std::collections::HashMap as Map;
    use std::sync::Arc;

    fn question_flow() -> Flow {
        Flow {
            schema_version: "v1".into(),
            id: "greeter".into(),
            entry: "q_name".into(),
            nodes: vec![
                Node::Question {
                    id: "q_name".into(),
                    label: None,
                    key: "name".into(),
                    prompt: "Qual o seu nome?".into(),
                    allowed_values: None,
                    clarification: None,
                    examples: None,
                    dependencies: None,
                    validator: None,
                    required: None,
                    skippable: None,
                    revisitable: None,
                    max_attempts: None,
                    data_type: None,
                    meta: Map::new(),
                },
                Node::Terminal { id: "end".into(), label: None, reason: None, success: Some(true), meta: Map::new() },
            ],
            edges: vec![Edge { source: "q_name".into(), target: "end".into(), guard: None, priority: 0, condition_description: None }],
            policies: None,
            metadata: Map::new(),
            version: 1,
        }
    }

    /// Hand-build an `AppState` around a pre-scripted `StubProvider`,
    /// the way `bootstrap::build_app_state` does but without touching
    /// the filesystem or environment the way a full config load would.
    fn test_state(provider: StubProvider, tenant: TenantConfig) -> AppState {
        let mut config = Config::default();
        config.llm.provider = "stub".into();
        config.tenants.insert("greeter".into(), tenant);

        let flows = Arc::new(crate::flows::FlowRegistry::empty());
        flows.insert(question_flow()).unwrap();

        let kv_store: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
        let keys = KeyBuilder::new(config.sessions.namespace.clone());
        let context_store = Arc::new(ContextStore::new(kv_store.clone(), &config.sessions));
        let buffer = InboundBuffer::new(kv_store.clone(), keys.clone());
        let epoch = Arc::new(CancellationEpoch::new(kv_store.clone(), keys.clone()));
        let debounce = Arc::new(DebounceManager::new(buffer, (*epoch).clone(), std::time::Duration::from_millis(10)));
        let escalation = Arc::new(EscalationTracker::new(kv_store.clone(), keys.clone()));
        let lifecycle = Arc::new(LifecycleManager::new(config.sessions.lifecycle.clone()));
        let transcripts = Arc::new(TranscriptWriter::new(kv_store, keys));

        AppState {
            config: Arc::new(config),
            llm: Arc::new(provider),
            flows,
            context_store,
            debounce,
            epoch,
            escalation,
            lifecycle,
            transcripts,
            tenant_style_overrides: Arc::new(parking_lot::RwLock::new(Map::new())),
            admin_token_hash: Arc::new(None),
        }
    }

    fn stub_stay_response(text: &str) -> String {
        format!(
            r#"{{"tools":[{{"tool_name":"PerformAction","actions":["update","navigate","complete"],"messages":[{{"text":"{text}","delay_ms":0}}],"confidence":0.9,"reasoning":"r","updates":{{"name":"Alice"}},"target_node_id":"end"}}],"reasoning":"r"}}"#
        )
    }

    #[tokio::test]
    async fn answers_a_question_then_reaches_the_terminal_node() {
        let provider = StubProvider::new();
        provider.push_response(stub_stay_response("Ola Alice!"));
        let tenant = TenantConfig { wait_time_before_replying_ms: 5, natural_delays_enabled: false, ..Default::default() };
        let state = test_state(provider, tenant);

        let outcome = process_turn(&state, "greeter", "user-1", "Alice".into(), "m1".into(), false).await.unwrap();
        match outcome {
            TurnOutcome::Replied(result) => {
                assert_eq!(result.messages[0].text, "Ola Alice!");
                assert_eq!(result.answers_diff.get("name").and_then(|v| v.as_str()), Some("Alice"));
                assert!(result.terminal);
            }
            TurnOutcome::Superseded => panic!("expected a reply"),
        }
    }

    #[tokio::test]
    async fn a_superseding_message_during_the_debounce_window_yields_no_reply() {
        let provider = StubProvider::new();
        provider.push_response(stub_stay_response("Ola Alice!"));
        let tenant = TenantConfig { wait_time_before_replying_ms: 200, natural_delays_enabled: false, ..Default::default() };
        let state = test_state(provider, tenant);

        let first = process_turn(&state, "greeter", "user-1", "oi".into(), "m1".into(), false);
        let second = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            process_turn(&state, "greeter", "user-1", "Alice".into(), "m2".into(), false).await
        };
        let (first_outcome, _second_outcome) = tokio::join!(first, second);
        assert!(matches!(first_outcome.unwrap(), TurnOutcome::Superseded));
    }

    /// Two different users messaging the same flow concurrently must not
    /// share a debounce window, cancellation epoch, or transcript — each
    /// should get their own reply rather than one superseding the other.
    #[tokio::test]
    async fn two_distinct_users_on_the_same_flow_do_not_collide() {
        let provider = StubProvider::new();
        provider.push_response(stub_stay_response("Ola Alice!"));
        provider.push_response(stub_stay_response("Ola Bob!"));
        let tenant = TenantConfig { wait_time_before_replying_ms: 20, natural_delays_enabled: false, ..Default::default() };
        let state = test_state(provider, tenant);

        let alice = process_turn(&state, "greeter", "user-alice", "Alice".into(), "m1".into(), false);
        let bob = process_turn(&state, "greeter", "user-bob", "Bob".into(), "m2".into(), false);
        let (alice_outcome, bob_outcome) = tokio::join!(alice, bob);

        match alice_outcome.unwrap() {
            TurnOutcome::Replied(result) => assert_eq!(result.messages[0].text, "Ola Alice!"),
            TurnOutcome::Superseded => panic!("user-alice's turn should not be superseded by user-bob's"),
        }
        match bob_outcome.unwrap() {
            TurnOutcome::Replied(result) => assert_eq!(result.messages[0].text, "Ola Bob!"),
            TurnOutcome::Superseded => panic!("user-bob's turn should not be superseded by user-alice's"),
        }

        let alice_transcript = state.transcripts.read("greeter:user-alice").await.unwrap();
        let bob_transcript = state.transcripts.read("greeter:user-bob").await.unwrap();
        assert!(alice_transcript.iter().any(|line| line.content.contains("Alice")));
        assert!(bob_transcript.iter().any(|line| line.content.contains("Bob")));
    }
}
