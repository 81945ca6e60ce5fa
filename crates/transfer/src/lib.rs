//! Chunked parallel transfer engine for a remote blob store.
//!
//! Splits large objects into blocks, uploads or downloads them with
//! bounded concurrency under a job-wide deadline, validates digests, and
//! publishes uploads with a single atomic block-list commit. All network
//! traffic goes through the [`RequestExecutor`] collaborator, which owns
//! signing, retries, and endpoint failover.

mod commit;
mod deadline;
mod digest;
mod dispatch;
mod download;
mod error;
mod gate;
mod observer;
mod plan;
mod source;
mod upload;

pub use blockhaul_protocol::RequestExecutor;
pub use commit::BlockListCommitter;
pub use deadline::DeadlineGuard;
pub use digest::{ContentDigest, transactional_digest, verify_digest};
pub use download::BlobDownloader;
pub use error::TransferError;
pub use gate::ConcurrencyGate;
pub use observer::TransferObserver;
pub use plan::{BlockSpan, BlockState, ChunkResult, Strategy, compute_spans, plan};
pub use source::{RandomAccessSource, SequentialSource, TransferSource};
pub use upload::{BlobUploader, UploadOutcome};

/// Default block size: 4 MiB.
pub const DEFAULT_BLOCK_SIZE: u64 = 4 * 1024 * 1024;

/// Default single-shot threshold: 32 MiB. Sources at or below this move
/// in one request instead of blocks.
pub const DEFAULT_SINGLE_SHOT_THRESHOLD: u64 = 32 * 1024 * 1024;

/// Upper bound on blocks per job.
pub const MAX_BLOCK_COUNT: u64 = 50_000;

/// Per-job configuration.
#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Size of each block of a chunked transfer; the final block carries
    /// the remainder.
    pub block_size: u64,
    /// Source length at or below which the transfer is one request.
    pub single_shot_threshold: u64,
    /// Maximum chunk operations in flight at once.
    pub parallelism_factor: usize,
    /// Wall-clock budget for the whole job, across all its requests.
    pub maximum_execution_time: Option<std::time::Duration>,
    /// Attach a per-chunk digest and verify the server's echo.
    pub use_transactional_digest: bool,
    /// Compute a whole-object digest in upload order and store it as an
    /// object property.
    pub store_content_digest: bool,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            single_shot_threshold: DEFAULT_SINGLE_SHOT_THRESHOLD,
            parallelism_factor: 1,
            maximum_execution_time: None,
            use_transactional_digest: false,
            store_content_digest: false,
        }
    }
}

impl TransferOptions {
    /// Rejects option values no job can run with.
    pub fn validate(&self) -> Result<(), TransferError> {
        if self.block_size == 0 {
            return Err(TransferError::InvalidArgument("block_size must be non-zero".into()));
        }
        if self.parallelism_factor == 0 {
            return Err(TransferError::InvalidArgument(
                "parallelism_factor must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(TransferOptions::default().validate().is_ok());
    }

    #[test]
    fn zero_block_size_rejected() {
        let options = TransferOptions { block_size: 0, ..Default::default() };
        assert!(matches!(options.validate(), Err(TransferError::InvalidArgument(_))));
    }

    #[test]
    fn zero_parallelism_rejected() {
        let options = TransferOptions { parallelism_factor: 0, ..Default::default() };
        assert!(matches!(options.validate(), Err(TransferError::InvalidArgument(_))));
    }
}
