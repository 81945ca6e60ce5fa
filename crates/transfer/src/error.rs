//! Error types for the transfer engine.

use blockhaul_protocol::ExecutorError;

/// Errors produced by a transfer job.
///
/// A job surfaces exactly one terminal error classifying the root cause;
/// sibling chunks cancelled because of it are not separately reported.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("service error {status} ({code}): {message}")]
    Service { status: u16, code: String, message: String },

    #[error("digest mismatch: expected {expected}, got {actual}")]
    Integrity { expected: String, actual: String },

    #[error("maximum execution time exceeded")]
    Timeout,

    #[error("cancelled")]
    Cancelled,

    #[error("malformed response: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ExecutorError> for TransferError {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::Service { status, code, message } => {
                TransferError::Service { status, code, message }
            }
            ExecutorError::Transport(msg) => TransferError::Protocol(msg),
        }
    }
}

impl TransferError {
    /// Whether this error is a secondary cancellation rather than a root
    /// cause.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, TransferError::Cancelled)
    }
}
