//! The flow-modification executor (C12, spec §4.7): applies a batch of
//! graph edits atomically to a deep copy of the flow definition, then
//! re-validates the whole thing with the compiler before anything is
//! considered committed.

use flowline_domain::Error;
use flowline_flow::compiler::compile;
use flowline_flow::ir::{Edge, Flow, Node};
use serde::{Deserialize, Serialize};

/// One sub-action of a live-modification batch. Tagged so a malformed
/// batch fails to deserialize rather than silently dropping an edit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FlowEdit {
    AddNode { node: Node },
    UpdateNode { id: String, node: Node },
    DeleteNode { id: String },
    AddEdge { edge: Edge },
    UpdateEdge { source: String, target: String, edge: Edge },
    DeleteEdge { source: String, target: String },
    SetEntry { entry: String },
}

fn apply_edit(flow: &mut Flow, edit: &FlowEdit) -> Result<(), String> {
    match edit {
        FlowEdit::AddNode { node } => {
            if flow.nodes.iter().any(|n| n.id() == node.id()) {
                return Err(format!("add_node: node '{}' already exists", node.id()));
            }
            flow.nodes.push(node.clone());
        }
        FlowEdit::UpdateNode { id, node } => {
            let existing = flow.nodes.iter_mut().find(|n| n.id() == id);
            match existing {
                Some(slot) => *slot = node.clone(),
                None => return Err(format!("update_node: node '{id}' does not exist")),
            }
        }
        FlowEdit::DeleteNode { id } => {
            let before = flow.nodes.len();
            flow.nodes.retain(|n| n.id() != id);
            if flow.nodes.len() == before {
                return Err(format!("delete_node: node '{id}' does not exist"));
            }
            // Cascade to all incident edges.
            flow.edges.retain(|e| &e.source != id && &e.target != id);
        }
        FlowEdit::AddEdge { edge } => {
            flow.edges.push(edge.clone());
        }
        FlowEdit::UpdateEdge { source, target, edge } => {
            let existing = flow
                .edges
                .iter_mut()
                .find(|e| &e.source == source && &e.target == target);
            match existing {
                Some(slot) => *slot = edge.clone(),
                None => return Err(format!("update_edge: edge '{source}' -> '{target}' does not exist")),
            }
        }
        FlowEdit::DeleteEdge { source, target } => {
            let before = flow.edges.len();
            flow.edges.retain(|e| !(&e.source == source && &e.target == target));
            if flow.edges.len() == before {
                return Err(format!("delete_edge: edge '{source}' -> '{target}' does not exist"));
            }
        }
        FlowEdit::SetEntry { entry } => {
            flow.entry = entry.clone();
        }
    }
    Ok(())
}

/// Apply `edits` to a clone of `flow`, re-validate via the compiler, and
/// return the new flow with its version bumped. Any failure — a sub-edit
/// that fails fast, or a compile error on the resulting graph — aborts
/// the whole batch; `flow` itself is never touched.
pub fn apply_batch(flow: &Flow, edits: &[FlowEdit]) -> Result<Flow, Error> {
    let mut candidate = flow.clone();

    for edit in edits {
        apply_edit(&mut candidate, edit).map_err(Error::Compile)?;
    }

    compile(&candidate)?;

    candidate.version += 1;
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn question(id: &str, key: &str, allowed_values: Option<Vec<String>>) -> Node {
        Node::Question {
            id: id.into(),
            label: None,
            key: key.into(),
            prompt: "prompt".into(),
            allowed_values,
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

    fn base_flow() -> Flow {
        Flow {
            schema_version: "v1".into(),
            id: "f1".into(),
            entry: "q_intensidade".into(),
            nodes: vec![
                question(
                    "q_intensidade",
                    "intensidade_dor",
                    Some(vec!["1".into(), "2".into(), "3".into(), "4".into(), "5".into(), "6".into(), "7".into(), "8".into(), "9".into(), "10".into()]),
                ),
                terminal("end"),
            ],
            edges: vec![Edge { source: "q_intensidade".into(), target: "end".into(), guard: None, priority: 0, condition_description: None }],
            policies: None,
            metadata: HashMap::new(),
            version: 1,
        }
    }

    #[test]
    fn s5_narrows_an_allowed_values_scale_and_bumps_version() {
        let flow = base_flow();
        let narrowed = question("q_intensidade", "intensidade_dor", Some(vec!["1".into(), "2".into(), "3".into(), "4".into(), "5".into()]));
        let edits = vec![FlowEdit::UpdateNode { id: "q_intensidade".into(), node: narrowed }];

        let updated = apply_batch(&flow, &edits).unwrap();
        assert_eq!(updated.version, 2);
        let Node::Question { allowed_values, .. } = updated.nodes.iter().find(|n| n.id() == "q_intensidade").unwrap() else {
            panic!("expected question node");
        };
        assert_eq!(allowed_values.as_deref(), Some(&["1".to_string(), "2".into(), "3".into(), "4".into(), "5".into()][..]));
    }

    #[test]
    fn delete_node_cascades_to_incident_edges() {
        let mut flow = base_flow();
        flow.nodes.push(terminal("end_b"));
        flow.edges.push(Edge { source: "q_intensidade".into(), target: "end_b".into(), guard: None, priority: 1, condition_description: None });

        let edits = vec![FlowEdit::DeleteNode { id: "end_b".into() }];
        let updated = apply_batch(&flow, &edits).unwrap();

        assert!(updated.nodes.iter().all(|n| n.id() != "end_b"));
        assert!(updated.edges.iter().all(|e| e.target != "end_b"));
    }

    #[test]
    fn a_failing_sub_edit_aborts_the_whole_batch() {
        let flow = base_flow();
        let edits = vec![
            FlowEdit::SetEntry { entry: "q_intensidade".into() },
            FlowEdit::DeleteNode { id: "does_not_exist".into() },
        ];
        assert!(apply_batch(&flow, &edits).is_err());
        assert_eq!(flow.entry, "q_intensidade");
    }

    #[test]
    fn invalid_resulting_graph_aborts_without_partial_mutation() {
        let flow = base_flow();
        let edits = vec![FlowEdit::SetEntry { entry: "nonexistent".into() }];
        assert!(apply_batch(&flow, &edits).is_err());
    }
}
