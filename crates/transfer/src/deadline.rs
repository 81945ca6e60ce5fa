//! Job-wide deadline enforcement.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::TransferError;

/// Enforces a wall-clock budget across every request of one job.
///
/// The deadline is absolute from construction. On expiry the guard
/// cancels the job token: queued gate waits abandon, in-flight chunk
/// tasks observe the token cooperatively, and the job surfaces a single
/// `Timeout`. The guard is also the cancellation fan-out for sibling
/// failure, in which case the terminal error stays with the root cause.
pub struct DeadlineGuard {
    cancel: CancellationToken,
    expired: Arc<AtomicBool>,
}

impl DeadlineGuard {
    /// Starts the clock. `None` means no budget.
    pub fn new(maximum_execution_time: Option<Duration>) -> Self {
        let cancel = CancellationToken::new();
        let expired = Arc::new(AtomicBool::new(false));

        if let Some(budget) = maximum_execution_time {
            let cancel = cancel.clone();
            let expired = Arc::clone(&expired);
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(budget) => {
                        // Order matters: mark expired before waking
                        // observers of the token.
                        expired.store(true, Ordering::SeqCst);
                        debug!(budget_ms = budget.as_millis() as u64, "job deadline expired");
                        cancel.cancel();
                    }
                    _ = cancel.cancelled() => {}
                }
            });
        }

        Self { cancel, expired }
    }

    /// Token chunk operations watch for cancellation.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancels outstanding work because a sibling failed. Does not mark
    /// the guard expired.
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    /// Whether the budget ran out (as opposed to a sibling-failure
    /// abort).
    pub fn is_expired(&self) -> bool {
        self.expired.load(Ordering::SeqCst)
    }

    /// The terminal error for an operation abandoned via this guard.
    pub fn terminal_error(&self) -> TransferError {
        if self.is_expired() { TransferError::Timeout } else { TransferError::Cancelled }
    }

    /// Reclassifies a job error: whatever aborted the work, an expired
    /// budget surfaces as `Timeout`.
    pub fn classify(&self, err: TransferError) -> TransferError {
        if self.is_expired() { TransferError::Timeout } else { err }
    }

    /// Races `fut` against the deadline.
    pub async fn run<T>(
        &self,
        fut: impl Future<Output = Result<T, TransferError>>,
    ) -> Result<T, TransferError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(self.terminal_error()),
            result = fut => result.map_err(|e| self.classify_if_cancelled(e)),
        }
    }

    fn classify_if_cancelled(&self, err: TransferError) -> TransferError {
        if err.is_cancellation() { self.terminal_error() } else { err }
    }
}

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        // Stop the timer task when the job ends first.
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn expires_after_budget() {
        let guard = DeadlineGuard::new(Some(Duration::from_millis(50)));
        assert!(!guard.is_expired());

        tokio::time::sleep(Duration::from_millis(60)).await;
        guard.token().cancelled().await;
        assert!(guard.is_expired());
        assert!(matches!(guard.terminal_error(), TransferError::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn abort_is_not_expiry() {
        let guard = DeadlineGuard::new(Some(Duration::from_secs(60)));
        guard.abort();
        guard.token().cancelled().await;
        assert!(!guard.is_expired());
        assert!(matches!(guard.terminal_error(), TransferError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn no_budget_never_fires() {
        let guard = DeadlineGuard::new(None);
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(!guard.token().is_cancelled());
        assert!(!guard.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn run_times_out_slow_work() {
        let guard = DeadlineGuard::new(Some(Duration::from_millis(10)));
        let result: Result<(), _> = guard
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(TransferError::Timeout)));
    }

    #[tokio::test(start_paused = true)]
    async fn run_passes_fast_work_through() {
        let guard = DeadlineGuard::new(Some(Duration::from_secs(10)));
        let result = guard.run(async { Ok::<_, TransferError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
