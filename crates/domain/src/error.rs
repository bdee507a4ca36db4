/// Shared error type used across all Flowline crates.
///
/// Variants correspond to the error kinds in the design: `Compile` and
/// `InvalidTransition` are domain errors the turn runner records and
/// continues past; `SchemaViolation` and `ToolExecution` are recoverable
/// within bounded retries; `Store` is fatal for the current turn.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("flow compile error: {0}")]
    Compile(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("LLM schema violation: {0}")]
    SchemaViolation(String),

    #[error("tool execution failed: {0}")]
    ToolExecution(String),

    #[error("external action failed: {0}")]
    ExternalAction(String),

    #[error("session store unavailable: {0}")]
    Store(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
