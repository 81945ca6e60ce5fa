//! Bounded admission of in-flight chunk operations.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::TransferError;

/// Counting gate limiting concurrent chunk operations to the job's
/// parallelism factor.
///
/// Acquisition suspends until a slot frees. A queued acquire is abandoned
/// when the job's cancellation token fires, so deadline expiry never
/// leaves waiters parked. Permits release on drop, on every exit path.
#[derive(Clone)]
pub struct ConcurrencyGate {
    permits: Arc<Semaphore>,
}

impl ConcurrencyGate {
    /// Gate admitting at most `parallelism` operations at once.
    pub fn new(parallelism: usize) -> Self {
        Self { permits: Arc::new(Semaphore::new(parallelism.max(1))) }
    }

    /// Waits for a slot, giving up with `Cancelled` if `cancel` fires
    /// first.
    pub async fn acquire(
        &self,
        cancel: &CancellationToken,
    ) -> Result<OwnedSemaphorePermit, TransferError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransferError::Cancelled),
            permit = self.permits.clone().acquire_owned() => {
                permit.map_err(|_| TransferError::Cancelled)
            }
        }
    }
}
