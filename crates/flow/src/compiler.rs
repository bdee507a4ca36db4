//! The compiler (C3, spec §4.2): validates the authored IR and produces
//! an immutable, indexed `CompiledFlow`. Compilation is the only place
//! guard names and graph shape are checked — the engine trusts a
//! `CompiledFlow` completely.

use crate::guards;
use crate::ir::{Flow, GuardRef, Node};
use flowline_domain::Error;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledEdge {
    pub target: String,
    pub guard: Option<GuardRef>,
    pub priority: i64,
    pub condition_description: Option<String>,
}

/// Validated, indexed, immutable form of a [`Flow`]. Process-wide
/// shareable once built.
#[derive(Debug, Clone)]
pub struct CompiledFlow {
    pub id: String,
    pub entry: String,
    pub version: u32,
    pub nodes: HashMap<String, Node>,
    pub edges_from: HashMap<String, Vec<CompiledEdge>>,
    pub validation_warnings: Vec<String>,
}

impl CompiledFlow {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn edges_from(&self, id: &str) -> &[CompiledEdge] {
        self.edges_from.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}

pub fn compile(flow: &Flow) -> Result<CompiledFlow, Error> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    let mut nodes: HashMap<String, Node> = HashMap::new();
    for node in &flow.nodes {
        if nodes.insert(node.id().to_string(), node.clone()).is_some() {
            errors.push(format!("duplicate node id '{}'", node.id()));
        }
    }

    if !nodes.contains_key(&flow.entry) {
        errors.push(format!("entry node '{}' does not exist", flow.entry));
    }

    for edge in &flow.edges {
        if !nodes.contains_key(&edge.source) {
            errors.push(format!("edge source '{}' does not exist", edge.source));
        }
        if !nodes.contains_key(&edge.target) {
            errors.push(format!("edge target '{}' does not exist", edge.target));
        }
        if let Some(guard) = &edge.guard {
            if !guards::is_registered(&guard.function) {
                errors.push(format!("unregistered guard '{}'", guard.function));
            }
        }
    }

    if !errors.is_empty() {
        return Err(Error::Compile(errors.join("; ")));
    }

    // Group edges by source, preserving authored order for stable
    // priority-then-insertion-order sort.
    let mut edges_from: HashMap<String, Vec<CompiledEdge>> = HashMap::new();
    for edge in &flow.edges {
        edges_from
            .entry(edge.source.clone())
            .or_default()
            .push(CompiledEdge {
                target: edge.target.clone(),
                guard: edge.guard.clone(),
                priority: edge.priority,
                condition_description: edge.condition_description.clone(),
            });
    }
    for edges in edges_from.values_mut() {
        edges.sort_by_key(|e| e.priority);
    }

    let reachable = reachable_from(&flow.entry, &edges_from);
    for id in nodes.keys() {
        if !reachable.contains(id) {
            warnings.push(format!("node '{id}' is unreachable from entry"));
        }
    }

    for cycle in find_cycles(&nodes, &edges_from) {
        let involves_question = cycle.iter().any(|id| {
            nodes.get(id).map(Node::is_question).unwrap_or(false)
        });
        let description = cycle.join(" -> ");
        if involves_question {
            warnings.push(format!("cycle through a question node: {description}"));
        } else {
            errors.push(format!("cycle among non-question nodes would diverge at runtime: {description}"));
        }
    }

    if !errors.is_empty() {
        return Err(Error::Compile(errors.join("; ")));
    }

    if !reachable.iter().any(|id| nodes.get(id).map(Node::is_terminal).unwrap_or(false)) {
        warnings.push("no terminal node is reachable from entry".to_string());
    }

    Ok(CompiledFlow {
        id: flow.id.clone(),
        entry: flow.entry.clone(),
        version: flow.version,
        nodes,
        edges_from,
        validation_warnings: warnings,
    })
}

fn reachable_from(entry: &str, edges_from: &HashMap<String, Vec<CompiledEdge>>) -> HashSet<String> {
    let mut seen = HashSet::new();
    let mut stack = vec![entry.to_string()];
    while let Some(id) = stack.pop() {
        if !seen.insert(id.clone()) {
            continue;
        }
        for edge in edges_from.get(&id).into_iter().flatten() {
            if !seen.contains(&edge.target) {
                stack.push(edge.target.clone());
            }
        }
    }
    seen
}

/// Finds cycles in the guard-less graph via DFS with a recursion-stack
/// marker. Not exhaustive over every cycle in a densely cyclic graph,
/// but sufficient to flag the common authored cases the compiler must
/// classify (§4.2).
fn find_cycles(
    nodes: &HashMap<String, Node>,
    edges_from: &HashMap<String, Vec<CompiledEdge>>,
) -> Vec<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Gray,
        Black,
    }

    let mut color: HashMap<String, Color> = nodes.keys().map(|id| (id.clone(), Color::White)).collect();
    let mut path: Vec<String> = Vec::new();
    let mut cycles: Vec<Vec<String>> = Vec::new();

    fn visit(
        id: &str,
        edges_from: &HashMap<String, Vec<CompiledEdge>>,
        color: &mut HashMap<String, Color>,
        path: &mut Vec<String>,
        cycles: &mut Vec<Vec<String>>,
    ) {
        color.insert(id.to_string(), Color::Gray);
        path.push(id.to_string());

        for edge in edges_from.get(id).into_iter().flatten() {
            match color.get(&edge.target).copied().unwrap_or(Color::White) {
                Color::White => visit(&edge.target, edges_from, color, path, cycles),
                Color::Gray => {
                    if let Some(start) = path.iter().position(|n| n == &edge.target) {
                        let mut cycle = path[start..].to_vec();
                        cycle.push(edge.target.clone());
                        cycles.push(cycle);
                    }
                }
                Color::Black => {}
            }
        }

        path.pop();
        color.insert(id.to_string(), Color::Black);
    }

    for id in nodes.keys() {
        if color.get(id).copied() == Some(Color::White) {
            visit(id, edges_from, &mut color, &mut path, &mut cycles);
        }
    }

    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{DecisionType, Edge};

    fn question(id: &str, key: &str) -> Node {
        Node::Question {
            id: id.into(),
            label: None,
            key: key.into(),
            prompt: format!("prompt for {key}"),
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
        Node::Terminal {
            id: id.into(),
            label: None,
            reason: None,
            success: Some(true),
            meta: HashMap::new(),
        }
    }

    fn linear_flow() -> Flow {
        Flow {
            schema_version: "v1".into(),
            id: "f1".into(),
            entry: "q1".into(),
            nodes: vec![question("q1", "name"), question("q2", "age"), terminal("end")],
            edges: vec![
                Edge { source: "q1".into(), target: "q2".into(), guard: None, priority: 0, condition_description: None },
                Edge { source: "q2".into(), target: "end".into(), guard: None, priority: 0, condition_description: None },
            ],
            policies: None,
            metadata: HashMap::new(),
            version: 1,
        }
    }

    #[test]
    fn compiles_a_linear_flow_without_errors_or_warnings() {
        let compiled = compile(&linear_flow()).unwrap();
        assert_eq!(compiled.entry, "q1");
        assert!(compiled.validation_warnings.is_empty());
        assert_eq!(compiled.edges_from("q1")[0].target, "q2");
    }

    #[test]
    fn rejects_missing_entry() {
        let mut flow = linear_flow();
        flow.entry = "nope".into();
        let err = compile(&flow).unwrap_err();
        assert!(matches!(err, Error::Compile(_)));
    }

    #[test]
    fn rejects_unregistered_guard() {
        let mut flow = linear_flow();
        flow.edges[0].guard = Some(GuardRef { function: "not_a_guard".into(), args: HashMap::new() });
        assert!(compile(&flow).is_err());
    }

    #[test]
    fn warns_on_unreachable_node() {
        let mut flow = linear_flow();
        flow.nodes.push(question("orphan", "unused"));
        let compiled = compile(&flow).unwrap();
        assert!(compiled
            .validation_warnings
            .iter()
            .any(|w| w.contains("orphan")));
    }

    #[test]
    fn cycle_through_question_is_a_warning_not_an_error() {
        let mut flow = linear_flow();
        flow.edges.push(Edge {
            source: "q2".into(),
            target: "q1".into(),
            guard: None,
            priority: 1,
            condition_description: None,
        });
        let compiled = compile(&flow).unwrap();
        assert!(compiled.validation_warnings.iter().any(|w| w.contains("cycle")));
    }

    #[test]
    fn cycle_among_decisions_only_is_an_error() {
        let flow = Flow {
            schema_version: "v1".into(),
            id: "f2".into(),
            entry: "d1".into(),
            nodes: vec![
                Node::Decision { id: "d1".into(), label: None, decision_type: DecisionType::Automatic, decision_prompt: None, meta: HashMap::new() },
                Node::Decision { id: "d2".into(), label: None, decision_type: DecisionType::Automatic, decision_prompt: None, meta: HashMap::new() },
            ],
            edges: vec![
                Edge { source: "d1".into(), target: "d2".into(), guard: None, priority: 0, condition_description: None },
                Edge { source: "d2".into(), target: "d1".into(), guard: None, priority: 0, condition_description: None },
            ],
            policies: None,
            metadata: HashMap::new(),
            version: 1,
        };
        assert!(compile(&flow).is_err());
    }

    #[test]
    fn edges_are_sorted_by_priority_then_authored_order() {
        let mut flow = linear_flow();
        flow.edges.push(Edge {
            source: "q1".into(),
            target: "end".into(),
            guard: None,
            priority: -1,
            condition_description: None,
        });
        let compiled = compile(&flow).unwrap();
        assert_eq!(compiled.edges_from("q1")[0].target, "end");
        assert_eq!(compiled.edges_from("q1")[1].target, "q2");
    }
}
