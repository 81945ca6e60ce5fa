//! Executor collaborator boundary.

use std::future::Future;
use std::pin::Pin;

use crate::request::{StoreRequest, StoreResponse};

/// Terminal error from the executor, after its own retry policy gave up.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecutorError {
    #[error("service error {status} ({code}): {message}")]
    Service { status: u16, code: String, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}

/// Issues one signed request, applying retry/backoff and endpoint failover
/// internally.
///
/// The engine treats implementations as a black box: a call either yields
/// a response or a terminal [`ExecutorError`]. Signing, retry curves, and
/// body encoding are entirely the implementation's concern.
pub trait RequestExecutor: Send + Sync {
    fn execute(
        &self,
        request: StoreRequest,
    ) -> Pin<Box<dyn Future<Output = Result<StoreResponse, ExecutorError>> + Send + '_>>;
}
