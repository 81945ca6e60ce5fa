//! Observed request dispatch.

use blockhaul_protocol::{RequestExecutor, StoreRequest, StoreResponse};
use tracing::warn;

use crate::{TransferError, TransferObserver};

/// Sends one request through the executor, firing the job's observer
/// hooks on both sides.
pub(crate) async fn send(
    executor: &dyn RequestExecutor,
    observer: &TransferObserver,
    request: StoreRequest,
) -> Result<StoreResponse, TransferError> {
    let kind = request.kind();
    observer.notify_request(&request);

    let response = executor.execute(request).await.map_err(TransferError::from)?;
    observer.notify_response(&response);

    if !response.is_success() {
        warn!(kind, status = response.status, "request returned non-success status");
        return Err(TransferError::Service {
            status: response.status,
            code: "unexpected_status".into(),
            message: format!("{kind} returned status {}", response.status),
        });
    }
    Ok(response)
}
