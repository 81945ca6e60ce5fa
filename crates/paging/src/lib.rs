//! Continuation-token paging over listing and query surfaces.
//!
//! Every listing in the system pages the same way: a fetch returns a
//! batch of items plus an opaque server-issued cursor, and an absent
//! cursor ends the sequence. The cursor is never interpreted or built
//! client-side; it is only carried back into the next request, or
//! persisted to resume paging in a later process.

mod lister;
mod objects;
mod tables;
mod token;

pub use lister::{Page, PageFetcher, PageSequence};
pub use objects::ObjectLister;
pub use tables::RowQuery;
pub use token::ContinuationToken;

use blockhaul_protocol::ExecutorError;

/// Errors produced while paging.
#[derive(Debug, thiserror::Error)]
pub enum PagingError {
    #[error("service error {status} ({code}): {message}")]
    Service { status: u16, code: String, message: String },

    #[error("page fetch timed out")]
    Timeout,

    #[error("malformed response: {0}")]
    Protocol(String),
}

impl From<ExecutorError> for PagingError {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::Service { status, code, message } => {
                PagingError::Service { status, code, message }
            }
            ExecutorError::Transport(msg) => PagingError::Protocol(msg),
        }
    }
}
