//! The tool executor (C7), the truthfulness heuristic for the LLM
//! feedback loop (C11), and the flow-modification executor (C12).

pub mod feedback;
pub mod flow_chat;
pub mod flow_mod;
pub mod tool_executor;

pub use feedback::{deterministic_feedback_message, passes_truthfulness_heuristic};
pub use flow_chat::{build_flow_edit_prompt, propose_edits};
pub use flow_mod::{apply_batch, FlowEdit};
pub use tool_executor::{apply_actions, ApplyOutcome, ExternalActionRequest};
