//! The LLM responder (C6): deterministic prompt assembly plus the
//! bounded schema-validation retry loop described in spec §4.5.

pub mod prompt;
pub mod respond;

pub use prompt::{append_schema_hint, build_feedback_prompt, build_prompt, PromptInput};
pub use respond::{respond, ResponderConfig};
