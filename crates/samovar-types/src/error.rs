use thiserror::Error;

/// Errors from the language-model adapter.
///
/// All of these are transient from the pipeline's point of view: the
/// caller degrades to an apology, never crashes.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("http error: {0}")]
    Http(String),

    #[error("rate limited")]
    RateLimited,

    #[error("generation blocked by provider")]
    Blocked,

    #[error("empty generation output")]
    Empty,

    #[error("malformed generation response: {0}")]
    Malformed(String),
}

/// Errors from the persistence adapter.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(String),

    #[error("corrupt state file: {0}")]
    Corrupt(String),
}

/// Errors surfaced by the chat engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
