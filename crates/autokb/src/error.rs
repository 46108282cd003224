use thiserror::Error;

/// Failures surfaced across the subsystem boundary. Everything else degrades
/// in place (AI extraction skipped, store errors treated as empty results).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("completion service timed out after {0}s")]
    CompletionTimeout(u64),

    #[error("completion service failed: {0}")]
    CompletionFailed(String),

    #[error("no completion service is configured")]
    CompletionUnavailable,

    #[error("document store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("invalid selection: {0}")]
    InvalidSelection(String),
}
