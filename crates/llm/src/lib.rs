//! LLM provider abstraction (C6's invocation seam): one async trait plus
//! two adapters, an OpenAI-compatible HTTP client and a deterministic
//! in-process stub for tests and credential-less local use.

pub mod openai;
pub mod stub;
pub mod traits;

pub use openai::OpenAiProvider;
pub use stub::StubProvider;
pub use traits::{CompletionRequest, CompletionResponse, LlmProvider, Usage};
