//! Flow IR, guard library, compiler, and the pure state machine engine
//! (C1–C4). This crate never touches the LLM, the session store, or the
//! network — it is the deterministic core the rest of the workspace
//! orchestrates around.

pub mod compiler;
pub mod context;
pub mod engine;
pub mod guards;
pub mod ir;

pub use compiler::{compile, CompiledEdge, CompiledFlow};
pub use context::{FlowContext, HistoryTurn, NodeState, NodeStatus, Role};
pub use engine::{QuestionState, StateKind, StateSnapshot, TransitionOption};
pub use ir::{DataType, DecisionType, Edge, Flow, GuardRef, Node, Policies};
