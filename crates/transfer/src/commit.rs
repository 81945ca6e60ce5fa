//! Atomic block-list publish.

use std::collections::BTreeMap;

use blockhaul_protocol::{BlockListEntry, PutBlockListRequest, StoreRequest};
use tracing::info;

use crate::dispatch::send;
use crate::{RequestExecutor, TransferError, TransferObserver};

/// Publishes an object as an ordered list of previously uploaded blocks.
///
/// The single commit request is the only point where content becomes
/// visible: nothing of the object changes until it succeeds, and when it
/// does the content is exactly the referenced blocks concatenated in the
/// given order. Blocks left unreferenced drop out of the content but are
/// not deleted.
pub struct BlockListCommitter<'a> {
    executor: &'a dyn RequestExecutor,
    observer: &'a TransferObserver,
}

impl<'a> BlockListCommitter<'a> {
    pub fn new(executor: &'a dyn RequestExecutor, observer: &'a TransferObserver) -> Self {
        Self { executor, observer }
    }

    /// Issues the commit and returns the object's new ETag.
    ///
    /// An empty `entries` list is valid and publishes a zero-length
    /// object.
    pub async fn commit(
        &self,
        name: &str,
        entries: Vec<BlockListEntry>,
        store_digest: Option<String>,
        metadata: BTreeMap<String, String>,
    ) -> Result<String, TransferError> {
        let block_count = entries.len();
        let request = StoreRequest::PutBlockList(PutBlockListRequest {
            name: name.to_string(),
            entries,
            store_digest,
            metadata,
        });

        let response = send(self.executor, self.observer, request).await?;
        let etag = response
            .etag
            .ok_or_else(|| TransferError::Protocol("commit response carried no etag".into()))?;

        info!(object = %name, blocks = block_count, "block list committed");
        Ok(etag)
    }
}
