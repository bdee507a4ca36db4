//! The tool executor (C7, spec §4.6): applies the ordered list of
//! actions from a validated `PerformAction` to the context, one engine
//! call per action. Action order is the LLM's declared order; the
//! executor never reorders it.

use flowline_domain::tool_schema::{HandoffReason, PerformAction, PerformActionKind};
use flowline_flow::{engine, CompiledFlow, FlowContext};
use serde_json::Value;

/// An action whose real-world effect the executor cannot predict; the
/// caller must route it through an `ActionExecutor` and the feedback
/// loop (§4.7) rather than apply it directly here.
#[derive(Debug, Clone, PartialEq)]
pub enum ExternalActionRequest {
    ModifyFlow { instruction: String },
    UpdateCommunicationStyle { new_style: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyOutcome {
    pub terminal: bool,
    pub escalate: bool,
    pub errors: Vec<String>,
    pub external_actions: Vec<ExternalActionRequest>,
}

fn handoff_reason_str(reason: HandoffReason) -> &'static str {
    match reason {
        HandoffReason::UserFrustrated => "user_frustrated",
        HandoffReason::ExplicitRequest => "explicit_request",
        HandoffReason::TooComplex => "too_complex",
        HandoffReason::TechnicalIssue => "technical_issue",
    }
}

/// Apply `action.actions` in order. Stops early on `handoff` (escalation
/// short-circuits the turn, §4.3's `handoff` semantics).
pub fn apply_actions(flow: &CompiledFlow, ctx: &mut FlowContext, action: &PerformAction, admin: bool) -> ApplyOutcome {
    let mut outcome = ApplyOutcome::default();

    for kind in &action.actions {
        match kind {
            PerformActionKind::Stay => {
                if action.clarification_reason.as_deref() == Some("needs_explanation") {
                    ctx.clarification_count += 1;
                }
            }
            PerformActionKind::Update => match &action.updates {
                Some(updates) if !updates.is_empty() => {
                    for (key, value) in updates {
                        engine::update_answer(flow, ctx, key, Value::clone(value));
                    }
                }
                _ => outcome.errors.push("update action requires non-empty updates".to_string()),
            },
            PerformActionKind::Navigate => match &action.target_node_id {
                Some(target) => {
                    if let Err(err) = engine::navigate_to(flow, ctx, target, true) {
                        outcome.errors.push(err.to_string());
                    }
                }
                None => outcome.errors.push("navigate action requires target_node_id".to_string()),
            },
            PerformActionKind::Handoff => match action.handoff_reason {
                Some(reason) => {
                    ctx.escalation_reason = Some(handoff_reason_str(reason).to_string());
                    outcome.escalate = true;
                    break;
                }
                None => outcome.errors.push("handoff action requires handoff_reason".to_string()),
            },
            PerformActionKind::Complete => {
                engine::advance_from_current(flow, ctx);
                ctx.is_complete = true;
                outcome.terminal = true;
            }
            PerformActionKind::Restart => {
                engine::reset(flow, ctx);
            }
            PerformActionKind::ModifyFlow => {
                if !admin {
                    outcome.errors.push("modify_flow requires an admin caller".to_string());
                } else {
                    match &action.flow_modification_instruction {
                        Some(instruction) => outcome.external_actions.push(ExternalActionRequest::ModifyFlow {
                            instruction: instruction.clone(),
                        }),
                        None => outcome
                            .errors
                            .push("modify_flow requires flow_modification_instruction".to_string()),
                    }
                }
            }
            PerformActionKind::UpdateCommunicationStyle => match &action.updated_communication_style {
                Some(new_style) => outcome
                    .external_actions
                    .push(ExternalActionRequest::UpdateCommunicationStyle { new_style: new_style.clone() }),
                None => outcome
                    .errors
                    .push("update_communication_style requires updated_communication_style".to_string()),
            },
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowline_domain::tool_schema::MessageBatch;
    use flowline_flow::compile;
    use flowline_flow::ir::{Edge, Flow, Node};
    use std::collections::HashMap;

    fn sample_flow() -> CompiledFlow {
        let flow = Flow {
            schema_version: "v1".into(),
            id: "f1".into(),
            entry: "q1".into(),
            nodes: vec![
                Node::Question {
                    id: "q1".into(),
                    label: None,
                    key: "name".into(),
                    prompt: "name?".into(),
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
                    meta: HashMap::new(),
                },
                Node::Terminal { id: "end".into(), label: None, reason: None, success: Some(true), meta: HashMap::new() },
            ],
            edges: vec![Edge { source: "q1".into(), target: "end".into(), guard: None, priority: 0, condition_description: None }],
            policies: None,
            metadata: HashMap::new(),
            version: 1,
        };
        compile(&flow).unwrap()
    }

    fn base_action(actions: Vec<PerformActionKind>) -> PerformAction {
        PerformAction {
            actions,
            messages: MessageBatch::single("ok"),
            confidence: 0.9,
            reasoning: "r".into(),
            updates: None,
            target_node_id: None,
            clarification_reason: None,
            handoff_reason: None,
            flow_modification_instruction: None,
            updated_communication_style: None,
        }
    }

    #[test]
    fn update_then_navigate_applies_both_in_order() {
        let flow = sample_flow();
        let mut ctx = FlowContext::new("f1", "u1", "s1");
        engine::initialize(&flow, &mut ctx);

        let mut action = base_action(vec![PerformActionKind::Update, PerformActionKind::Navigate]);
        let mut updates = serde_json::Map::new();
        updates.insert("name".into(), Value::String("Alice".into()));
        action.updates = Some(updates);
        action.target_node_id = Some("end".into());

        let outcome = apply_actions(&flow, &mut ctx, &action, false);
        assert!(outcome.errors.is_empty());
        assert_eq!(ctx.answers.get("name"), Some(&Value::String("Alice".into())));
        assert_eq!(ctx.current_node_id.as_deref(), Some("end"));
    }

    #[test]
    fn handoff_stops_further_actions() {
        let flow = sample_flow();
        let mut ctx = FlowContext::new("f1", "u1", "s1");
        engine::initialize(&flow, &mut ctx);

        let mut action = base_action(vec![PerformActionKind::Handoff, PerformActionKind::Navigate]);
        action.handoff_reason = Some(HandoffReason::UserFrustrated);
        action.target_node_id = Some("end".into());

        let outcome = apply_actions(&flow, &mut ctx, &action, false);
        assert!(outcome.escalate);
        assert_eq!(ctx.escalation_reason.as_deref(), Some("user_frustrated"));
        assert_eq!(ctx.current_node_id.as_deref(), Some("q1"), "navigate after handoff must not run");
    }

    #[test]
    fn modify_flow_requires_admin() {
        let flow = sample_flow();
        let mut ctx = FlowContext::new("f1", "u1", "s1");
        engine::initialize(&flow, &mut ctx);

        let mut action = base_action(vec![PerformActionKind::ModifyFlow]);
        action.flow_modification_instruction = Some("change scale".into());

        let outcome = apply_actions(&flow, &mut ctx, &action, false);
        assert!(outcome.errors.iter().any(|e| e.contains("admin")));
        assert!(outcome.external_actions.is_empty());
    }

    #[test]
    fn modify_flow_by_admin_queues_external_action() {
        let flow = sample_flow();
        let mut ctx = FlowContext::new("f1", "u1", "s1");
        engine::initialize(&flow, &mut ctx);

        let mut action = base_action(vec![PerformActionKind::ModifyFlow]);
        action.flow_modification_instruction = Some("change scale".into());

        let outcome = apply_actions(&flow, &mut ctx, &action, true);
        assert_eq!(
            outcome.external_actions,
            vec![ExternalActionRequest::ModifyFlow { instruction: "change scale".into() }]
        );
    }
}
