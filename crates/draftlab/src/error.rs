//! Error taxonomy for the editing/sync core.
//!
//! All three kinds are caught at the boundary where user text or a value
//! crosses into the codec/transpiler/transport and folded into the open
//! edit item's error flag. None of them may propagate far enough to crash
//! the authoring context.

use thiserror::Error;

/// Source text does not parse.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct SyntaxError {
    /// Short single-line summary (first parse error).
    pub message: String,
    /// Full human-readable report, one labelled block per parse error.
    pub report: String,
}

/// Text parses but cannot become a value of the declared kind, or its
/// evaluation failed.
#[derive(Debug, Clone, Error)]
pub enum ValueFormatError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error("expected a {expected} value, got {actual}")]
    KindMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("evaluation failed: {0}")]
    Evaluation(String),
}

/// A message payload could not be made portable.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("payload is not portable: {0}")]
    NotPortable(String),
    #[error("payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}
