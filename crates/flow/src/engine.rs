//! The state machine engine (C4, spec §4.3): a **pure** state machine.
//! Given a compiled flow, a context, and an optional event, it returns a
//! snapshot and the available transitions. It never calls the LLM and
//! never invents state — every mutation here is one spec-named operation.

use crate::compiler::CompiledFlow;
use crate::context::{FlowContext, NodeStatus, Role};
use crate::guards::{self, GuardContext};
use crate::ir::Node;
use chrono::Utc;
use flowline_domain::Error;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Question,
    Decision,
    Terminal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionState {
    pub key: String,
    pub prompt: String,
    pub is_answered: bool,
    pub current_answer: Option<Value>,
    pub validator: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOption {
    pub target: String,
    pub description: Option<String>,
    pub guard_satisfied: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    pub kind: StateKind,
    pub node_id: String,
    pub question: Option<QuestionState>,
    pub available_paths: Vec<String>,
    pub transitions: Vec<TransitionOption>,
    pub is_complete: bool,
}

/// If `ctx.current_node_id` is empty, set it to the flow's entry node.
pub fn initialize(flow: &CompiledFlow, ctx: &mut FlowContext) {
    if ctx.current_node_id.is_none() {
        ctx.current_node_id = Some(flow.entry.clone());
    }
}

fn guard_context<'a>(ctx: &'a FlowContext, event: Option<&'a str>) -> GuardContext<'a> {
    GuardContext {
        answers: &ctx.answers,
        pending_field: ctx.pending_field.as_deref(),
        active_path: ctx.active_path.as_deref(),
        path_locked: ctx.path_locked,
        event,
    }
}

fn transitions_for(flow: &CompiledFlow, node_id: &str, ctx: &FlowContext, event: Option<&str>) -> Vec<TransitionOption> {
    let gctx = guard_context(ctx, event);
    flow.edges_from(node_id)
        .iter()
        .map(|edge| {
            let guard_satisfied = match &edge.guard {
                None => true,
                Some(guard_ref) => guards::evaluate(&guard_ref.function, &guard_ref.args, &gctx).unwrap_or(false),
            };
            TransitionOption {
                target: edge.target.clone(),
                description: edge.condition_description.clone(),
                guard_satisfied,
            }
        })
        .collect()
}

/// Human-readable path label derived from a condition description: the
/// tail after the first colon, or the whole description if there is none.
fn path_label(description: &str) -> String {
    match description.split_once(':') {
        Some((_, tail)) => tail.trim().to_string(),
        None => description.trim().to_string(),
    }
}

/// Resolve the current node and return its snapshot. Appends a `user`
/// turn to history first when `user_message` is present (spec §4.3).
pub fn get_state(flow: &CompiledFlow, ctx: &mut FlowContext, user_message: Option<&str>) -> Result<StateSnapshot, Error> {
    if let Some(message) = user_message {
        let node_id = ctx.current_node_id.clone();
        ctx.push_history(Role::User, message, node_id);
    }

    let node_id = ctx
        .current_node_id
        .clone()
        .ok_or_else(|| Error::InvalidTransition("context has no current node".into()))?;
    let node = flow
        .node(&node_id)
        .ok_or_else(|| Error::Other(format!("unknown node kind for id '{node_id}'")))?
        .clone();

    match node {
        Node::Question { key, prompt, validator, .. } => {
            ctx.pending_field = Some(key.clone());
            let current_answer = ctx.answers.get(&key).cloned();
            let is_answered = current_answer
                .as_ref()
                .map(|v| !guards::value_is_empty(v))
                .unwrap_or(false);
            let transitions = transitions_for(flow, &node_id, ctx, user_message);
            Ok(StateSnapshot {
                kind: StateKind::Question,
                node_id,
                question: Some(QuestionState { key, prompt, is_answered, current_answer, validator }),
                available_paths: Vec::new(),
                transitions,
                is_complete: false,
            })
        }
        Node::Decision { .. } => {
            let transitions = transitions_for(flow, &node_id, ctx, user_message);
            let available_paths = transitions
                .iter()
                .filter_map(|t| t.description.as_deref().map(path_label))
                .collect();
            Ok(StateSnapshot {
                kind: StateKind::Decision,
                node_id,
                question: None,
                available_paths,
                transitions,
                is_complete: false,
            })
        }
        Node::Terminal { .. } => {
            ctx.is_complete = true;
            Ok(StateSnapshot {
                kind: StateKind::Terminal,
                node_id,
                question: None,
                available_paths: Vec::new(),
                transitions: Vec::new(),
                is_complete: true,
            })
        }
    }
}

/// Navigate to `target_node_id`. When `validate` is set, the target must
/// either be a direct neighbour of the current node or itself be a
/// Question (cross-graph revisits are allowed for corrections, §4.3).
pub fn navigate_to(flow: &CompiledFlow, ctx: &mut FlowContext, target_node_id: &str, validate: bool) -> Result<(), Error> {
    if !flow.nodes.contains_key(target_node_id) {
        return Err(Error::InvalidTransition(format!("target node '{target_node_id}' does not exist")));
    }

    if validate {
        let current = ctx.current_node_id.as_deref().unwrap_or(&flow.entry);
        let is_direct_neighbour = flow
            .edges_from(current)
            .iter()
            .any(|edge| edge.target == target_node_id);
        let target_is_question = flow.node(target_node_id).map(Node::is_question).unwrap_or(false);
        if !is_direct_neighbour && !target_is_question {
            return Err(Error::InvalidTransition(format!(
                "'{target_node_id}' is neither a neighbour of '{current}' nor a question node"
            )));
        }
    }

    ctx.current_node_id = Some(target_node_id.to_string());
    let state = ctx.node_state_mut(target_node_id);
    state.visits += 1;
    state.last_visited = Some(Utc::now());
    if state.status == NodeStatus::NotVisited {
        state.status = NodeStatus::InProgress;
    }
    ctx.updated_at = Utc::now();
    Ok(())
}

/// Write `value` into `answers`. If the current node is a Question with
/// this key, mark it completed and clear `pending_field`.
pub fn update_answer(flow: &CompiledFlow, ctx: &mut FlowContext, key: &str, value: Value) {
    ctx.answers.insert(key.to_string(), value);

    if let Some(current) = ctx.current_node_id.clone() {
        if let Some(Node::Question { key: node_key, .. }) = flow.node(&current) {
            if node_key == key {
                ctx.node_state_mut(&current).status = NodeStatus::Completed;
                ctx.pending_field = None;
            }
        }
    }
    ctx.updated_at = Utc::now();
}

/// Follow the first outgoing edge whose guard evaluates true, in
/// priority order. If none is satisfied, stay on the current node.
pub fn advance_from_current(flow: &CompiledFlow, ctx: &mut FlowContext) {
    let Some(current) = ctx.current_node_id.clone() else {
        return;
    };
    let gctx = guard_context(ctx, None);
    let next = flow.edges_from(&current).iter().find(|edge| match &edge.guard {
        None => true,
        Some(guard_ref) => guards::evaluate(&guard_ref.function, &guard_ref.args, &gctx).unwrap_or(false),
    });
    let Some(next) = next else {
        return;
    };
    let target = next.target.clone();
    drop(gctx);
    ctx.current_node_id = Some(target.clone());
    let state = ctx.node_state_mut(&target);
    state.visits += 1;
    state.last_visited = Some(Utc::now());
    ctx.updated_at = Utc::now();
}

/// Restore the context to its initial state: current node back to
/// entry, answers/history/path-selection/clarification counters
/// cleared.
pub fn reset(flow: &CompiledFlow, ctx: &mut FlowContext) {
    ctx.current_node_id = Some(flow.entry.clone());
    ctx.answers.clear();
    ctx.node_states.clear();
    ctx.history.clear();
    ctx.turn_count = 0;
    ctx.pending_field = None;
    ctx.available_paths.clear();
    ctx.active_path = None;
    ctx.path_confidence.clear();
    ctx.path_locked = false;
    ctx.path_labels.clear();
    ctx.path_corrections = 0;
    ctx.clarification_count = 0;
    ctx.is_complete = false;
    ctx.escalation_reason = None;
    ctx.updated_at = Utc::now();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::ir::{Edge, Flow, GuardRef};
    use std::collections::HashMap;

    fn question(id: &str, key: &str, prompt: &str) -> Node {
        Node::Question {
            id: id.into(),
            label: None,
            key: key.into(),
            prompt: prompt.into(),
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
        }
    }

    fn terminal(id: &str) -> Node {
        Node::Terminal { id: id.into(), label: None, reason: None, success: Some(true), meta: HashMap::new() }
    }

    fn linear_flow() -> CompiledFlow {
        let flow = Flow {
            schema_version: "v1".into(),
            id: "f1".into(),
            entry: "q_name".into(),
            nodes: vec![question("q_name", "name", "What is your name?"), question("q_age", "age", "How old are you?"), terminal("end")],
            edges: vec![
                Edge { source: "q_name".into(), target: "q_age".into(), guard: None, priority: 0, condition_description: None },
                Edge { source: "q_age".into(), target: "end".into(), guard: None, priority: 0, condition_description: None },
            ],
            policies: None,
            metadata: HashMap::new(),
            version: 1,
        };
        compile(&flow).unwrap()
    }

    #[test]
    fn initialize_sets_entry_when_unset() {
        let flow = linear_flow();
        let mut ctx = FlowContext::new("f1", "u1", "s1");
        initialize(&flow, &mut ctx);
        assert_eq!(ctx.current_node_id.as_deref(), Some("q_name"));
    }

    #[test]
    fn get_state_does_not_mutate_answers_or_unrelated_fields() {
        let flow = linear_flow();
        let mut ctx = FlowContext::new("f1", "u1", "s1");
        initialize(&flow, &mut ctx);
        let before = ctx.answers.clone();
        let snapshot = get_state(&flow, &mut ctx, None).unwrap();
        assert_eq!(ctx.answers, before);
        assert_eq!(snapshot.kind, StateKind::Question);
    }

    #[test]
    fn full_s1_linear_flow_scenario() {
        let flow = linear_flow();
        let mut ctx = FlowContext::new("f1", "u1", "s1");
        initialize(&flow, &mut ctx);

        get_state(&flow, &mut ctx, Some("Alice")).unwrap();
        update_answer(&flow, &mut ctx, "name", Value::String("Alice".into()));
        advance_from_current(&flow, &mut ctx);
        assert_eq!(ctx.answers.get("name"), Some(&Value::String("Alice".into())));
        assert_eq!(ctx.current_node_id.as_deref(), Some("q_age"));

        get_state(&flow, &mut ctx, Some("30")).unwrap();
        update_answer(&flow, &mut ctx, "age", Value::String("30".into()));
        advance_from_current(&flow, &mut ctx);
        let snapshot = get_state(&flow, &mut ctx, None).unwrap();

        assert_eq!(ctx.answers.get("age"), Some(&Value::String("30".into())));
        assert!(ctx.is_complete);
        assert_eq!(snapshot.kind, StateKind::Terminal);
    }

    #[test]
    fn navigate_to_rejects_non_neighbour_non_question_target() {
        let flow = linear_flow();
        let mut ctx = FlowContext::new("f1", "u1", "s1");
        initialize(&flow, &mut ctx);
        let result = navigate_to(&flow, &mut ctx, "end", true);
        assert!(result.is_err());
    }

    #[test]
    fn navigate_to_allows_cross_graph_question_revisit() {
        let flow = linear_flow();
        let mut ctx = FlowContext::new("f1", "u1", "s1");
        ctx.current_node_id = Some("q_age".into());
        let result = navigate_to(&flow, &mut ctx, "q_name", true);
        assert!(result.is_ok());
        assert_eq!(ctx.current_node_id.as_deref(), Some("q_name"));
    }

    #[test]
    fn reset_clears_everything_back_to_entry() {
        let flow = linear_flow();
        let mut ctx = FlowContext::new("f1", "u1", "s1");
        initialize(&flow, &mut ctx);
        update_answer(&flow, &mut ctx, "name", Value::String("Alice".into()));
        ctx.push_history(Role::User, "hi", None);
        ctx.clarification_count = 3;

        reset(&flow, &mut ctx);

        assert_eq!(ctx.current_node_id.as_deref(), Some("q_name"));
        assert!(ctx.answers.is_empty());
        assert!(ctx.history.is_empty());
        assert_eq!(ctx.clarification_count, 0);
        assert!(!ctx.is_complete);
    }

    #[test]
    fn advance_from_current_follows_lowest_priority_satisfied_guard() {
        let flow = Flow {
            schema_version: "v1".into(),
            id: "f2".into(),
            entry: "d1".into(),
            nodes: vec![
                Node::Decision { id: "d1".into(), label: None, decision_type: crate::ir::DecisionType::Automatic, decision_prompt: None, meta: HashMap::new() },
                terminal("path_a"),
                terminal("path_b"),
            ],
            edges: vec![
                Edge {
                    source: "d1".into(),
                    target: "path_b".into(),
                    guard: Some(GuardRef { function: "always".into(), args: HashMap::new() }),
                    priority: 5,
                    condition_description: None,
                },
                Edge {
                    source: "d1".into(),
                    target: "path_a".into(),
                    guard: Some(GuardRef { function: "always".into(), args: HashMap::new() }),
                    priority: 1,
                    condition_description: None,
                },
            ],
            policies: None,
            metadata: HashMap::new(),
            version: 1,
        };
        let compiled = compile(&flow).unwrap();
        let mut ctx = FlowContext::new("f2", "u1", "s1");
        initialize(&compiled, &mut ctx);
        advance_from_current(&compiled, &mut ctx);
        assert_eq!(ctx.current_node_id.as_deref(), Some("path_a"));
    }
}
