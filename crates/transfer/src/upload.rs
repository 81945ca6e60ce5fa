//! Upload jobs: single-shot puts and chunked block uploads.

use std::collections::BTreeMap;
use std::sync::Arc;

use blockhaul_protocol::{
    BlockId, BlockListEntry, BlockListItem, BlockListingFilter, GetBlockListRequest,
    PutBlockRequest, PutObjectRequest, ResponseBody, StoreRequest,
};
use bytes::Bytes;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::commit::BlockListCommitter;
use crate::deadline::DeadlineGuard;
use crate::digest::{ContentDigest, transactional_digest, verify_digest};
use crate::dispatch::send;
use crate::gate::ConcurrencyGate;
use crate::plan::{BlockSpan, BlockState, ChunkResult, Strategy, compute_spans, plan};
use crate::source::{TransferSource, read_full};
use crate::{RequestExecutor, TransferError, TransferObserver, TransferOptions};

/// Result of a completed upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// ETag of the published object.
    pub etag: String,
    /// Whole-object digest stored alongside it, when requested.
    pub content_digest: Option<String>,
}

/// Uploads objects through the executor, chunking large sources into
/// blocks and publishing them with one atomic commit.
pub struct BlobUploader {
    executor: Arc<dyn RequestExecutor>,
    options: TransferOptions,
    observer: TransferObserver,
    metadata: BTreeMap<String, String>,
}

impl BlobUploader {
    pub fn new(executor: Arc<dyn RequestExecutor>) -> Self {
        Self {
            executor,
            options: TransferOptions::default(),
            observer: TransferObserver::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_options(mut self, options: TransferOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_observer(mut self, observer: TransferObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Metadata attached to the object at publish time.
    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Moves a source to the store as one object.
    ///
    /// `explicit_length` bounds the transfer to a prefix of the source.
    /// Asking for more than a random-access source holds fails here,
    /// before any request; a sequential source can only refute the
    /// length while being read, so the same misuse fails mid-transfer.
    pub async fn upload(
        &self,
        name: &str,
        source: TransferSource,
        explicit_length: Option<u64>,
    ) -> Result<UploadOutcome, TransferError> {
        let (known_len, declared_len) = match &source {
            TransferSource::Random(src) => (Some(src.len()), explicit_length),
            TransferSource::Sequential(src) => (None, explicit_length.or(src.len_hint())),
        };
        let strategy = plan(known_len, declared_len, &self.options)?;
        let total_len = declared_len.or(known_len);

        debug!(object = %name, ?strategy, "upload planned");
        match strategy {
            Strategy::SingleShot { length } => self.upload_single_shot(name, source, length).await,
            Strategy::Chunked { block_size, .. } => {
                self.upload_chunked(name, source, block_size, total_len).await
            }
        }
    }

    /// Uploads a UTF-8 string as a whole object.
    pub async fn upload_text(&self, name: &str, text: &str) -> Result<UploadOutcome, TransferError> {
        let source = TransferSource::from_bytes(Bytes::copy_from_slice(text.as_bytes()));
        self.upload(name, source, None).await
    }

    /// Uploads one block outside a planned job. The block stays
    /// uncommitted until referenced by a commit.
    pub async fn put_block(
        &self,
        name: &str,
        id: BlockId,
        body: Bytes,
    ) -> Result<(), TransferError> {
        let digest = if self.options.use_transactional_digest {
            Some(transactional_digest(&body))
        } else {
            None
        };
        let request = StoreRequest::PutBlock(PutBlockRequest {
            name: name.to_string(),
            id: id.clone(),
            body,
            content_digest: digest.clone(),
        });
        let response = send(self.executor.as_ref(), &self.observer, request).await?;
        if let (Some(sent), Some(echo)) = (digest.as_deref(), response.content_digest.as_deref()) {
            verify_digest(sent, echo)?;
        }
        debug!(object = %name, block = %id, "block uploaded");
        Ok(())
    }

    /// Publishes `entries` as the object's content, in exactly that
    /// order. See [`BlockListCommitter`].
    pub async fn commit_block_list(
        &self,
        name: &str,
        entries: Vec<BlockListEntry>,
    ) -> Result<String, TransferError> {
        let committer = BlockListCommitter::new(self.executor.as_ref(), &self.observer);
        committer.commit(name, entries, None, self.metadata.clone()).await
    }

    /// Inspects the object's committed and/or uncommitted blocks.
    pub async fn block_list(
        &self,
        name: &str,
        filter: BlockListingFilter,
    ) -> Result<Vec<BlockListItem>, TransferError> {
        let request =
            StoreRequest::GetBlockList(GetBlockListRequest { name: name.to_string(), filter });
        let response = send(self.executor.as_ref(), &self.observer, request).await?;
        match response.body {
            ResponseBody::BlockList(items) => Ok(items),
            _ => Err(TransferError::Protocol("expected a block list body".into())),
        }
    }

    async fn upload_single_shot(
        &self,
        name: &str,
        source: TransferSource,
        length: u64,
    ) -> Result<UploadOutcome, TransferError> {
        // On a single request the hop digest and the stored object digest
        // are the same value; asking for one while refusing the other is
        // contradictory.
        if self.options.use_transactional_digest && !self.options.store_content_digest {
            return Err(TransferError::InvalidArgument(
                "a single-shot upload with a transactional digest must also store the content digest"
                    .into(),
            ));
        }

        let guard = DeadlineGuard::new(self.options.maximum_execution_time);
        let outcome = guard
            .run(async {
                let payload = match source {
                    TransferSource::Random(src) => src.read_at(0, length as usize).await?,
                    TransferSource::Sequential(mut src) => {
                        read_full(&mut src, length as usize).await?
                    }
                };
                if payload.len() as u64 != length {
                    return Err(TransferError::InvalidArgument(format!(
                        "source ended after {} of {length} requested bytes",
                        payload.len()
                    )));
                }

                let digest = if self.options.use_transactional_digest
                    || self.options.store_content_digest
                {
                    Some(transactional_digest(&payload))
                } else {
                    None
                };
                let content_digest =
                    if self.options.use_transactional_digest { digest.clone() } else { None };
                let store_digest =
                    if self.options.store_content_digest { digest.clone() } else { None };

                let request = StoreRequest::PutObject(PutObjectRequest {
                    name: name.to_string(),
                    body: payload,
                    content_digest: content_digest.clone(),
                    store_digest: store_digest.clone(),
                    metadata: self.metadata.clone(),
                });
                let response = send(self.executor.as_ref(), &self.observer, request).await?;
                if let (Some(sent), Some(echo)) =
                    (content_digest.as_deref(), response.content_digest.as_deref())
                {
                    verify_digest(sent, echo)?;
                }

                let etag = response.etag.ok_or_else(|| {
                    TransferError::Protocol("put response carried no etag".into())
                })?;
                Ok(UploadOutcome { etag, content_digest: store_digest })
            })
            .await?;

        info!(object = %name, bytes = length, "single-shot upload complete");
        Ok(outcome)
    }

    async fn upload_chunked(
        &self,
        name: &str,
        source: TransferSource,
        block_size: u64,
        total_len: Option<u64>,
    ) -> Result<UploadOutcome, TransferError> {
        let guard = DeadlineGuard::new(self.options.maximum_execution_time);
        let token = guard.token();
        let gate = ConcurrencyGate::new(self.options.parallelism_factor);
        let ctx = Arc::new(ChunkContext {
            executor: Arc::clone(&self.executor),
            observer: self.observer.clone(),
            token: token.clone(),
            use_transactional: self.options.use_transactional_digest,
            name: name.to_string(),
        });

        let mut tasks: JoinSet<Result<ChunkResult, TransferError>> = JoinSet::new();
        let mut results: Vec<ChunkResult> = Vec::new();
        let mut job_error: Option<TransferError> = None;
        let mut content_digest = if self.options.store_content_digest {
            Some(ContentDigest::new())
        } else {
            None
        };
        let mut dispatched: u64 = 0;

        match source {
            // Random access without a stored digest: every task reads its
            // own range, fully parallel.
            TransferSource::Random(src) if content_digest.is_none() => {
                let len = total_len.unwrap_or(src.len());
                for span in compute_spans(len, block_size) {
                    dispatched += 1;
                    let ctx = Arc::clone(&ctx);
                    let gate = gate.clone();
                    let src = Arc::clone(&src);
                    tasks.spawn(async move {
                        let _permit = gate.acquire(&ctx.token).await?;
                        let payload = src.read_at(span.offset, span.length as usize).await?;
                        if payload.len() as u64 != span.length {
                            return Err(TransferError::Io(std::io::Error::new(
                                std::io::ErrorKind::UnexpectedEof,
                                "source ended inside a planned block",
                            )));
                        }
                        run_chunk(&ctx, &span, payload).await
                    });
                }
            }

            // Payloads buffered in the dispatch loop: a sequential source
            // allows no random access, and a stored content digest needs
            // the bytes in logical order either way. The gate slot is
            // taken before the read, so at most `parallelism_factor`
            // payloads are buffered at once.
            source => {
                let (rand, mut seq) = match source {
                    TransferSource::Random(src) => (Some(src), None),
                    TransferSource::Sequential(src) => (None, Some(src)),
                };
                let spans = total_len.map(|len| compute_spans(len, block_size));
                let mut index: u32 = 0;

                loop {
                    if job_error.is_some() || token.is_cancelled() {
                        break;
                    }
                    let (offset, want) = match &spans {
                        Some(spans) => match spans.get(index as usize) {
                            Some(span) => (span.offset, span.length as usize),
                            None => break,
                        },
                        None => (u64::from(index) * block_size, block_size as usize),
                    };

                    let permit = match gate.acquire(&token).await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };

                    let read = match (&rand, seq.as_mut()) {
                        (Some(src), _) => src.read_at(offset, want).await,
                        (None, Some(src)) => read_full(src, want).await,
                        (None, None) => unreachable!("source is either random or sequential"),
                    };
                    let payload = match read {
                        Ok(payload) => payload,
                        Err(err) => {
                            guard.abort();
                            job_error = Some(TransferError::Io(err));
                            break;
                        }
                    };

                    let short = payload.len() < want;
                    if spans.is_some() && short {
                        // A declared length the source cannot honor; with
                        // no random access this only shows up here.
                        guard.abort();
                        job_error = Some(TransferError::InvalidArgument(format!(
                            "source ended {} bytes short of the requested length",
                            want - payload.len()
                        )));
                        break;
                    }
                    if spans.is_none() && payload.is_empty() {
                        drop(permit);
                        break;
                    }

                    if let Some(digest) = content_digest.as_mut() {
                        digest.update(&payload);
                    }

                    let span = BlockSpan::new(index, offset, payload.len() as u64);
                    dispatched += 1;
                    index += 1;
                    let ctx = Arc::clone(&ctx);
                    tasks.spawn(async move {
                        let _permit = permit;
                        run_chunk(&ctx, &span, payload).await
                    });

                    // Surface chunk failures without waiting for the
                    // whole fan-out.
                    while let Some(joined) = tasks.try_join_next() {
                        record_chunk(joined, &mut results, &mut job_error, &guard);
                    }

                    if spans.is_none() && short {
                        break;
                    }
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            record_chunk(joined, &mut results, &mut job_error, &guard);
        }

        if guard.is_expired() {
            return Err(TransferError::Timeout);
        }
        if let Some(err) = job_error {
            return Err(err);
        }
        if results.len() as u64 != dispatched {
            return Err(guard.terminal_error());
        }

        // Commit order is block order, independent of completion order.
        results.sort_by_key(|chunk| chunk.index);
        let entries: Vec<BlockListEntry> =
            results.iter().map(|chunk| BlockListEntry::uncommitted(chunk.id.clone())).collect();

        let store_digest = content_digest.map(ContentDigest::finalize);
        let committer = BlockListCommitter::new(self.executor.as_ref(), &self.observer);
        let etag = guard
            .run(committer.commit(name, entries, store_digest.clone(), self.metadata.clone()))
            .await?;

        info!(object = %name, blocks = results.len(), "chunked upload complete");
        Ok(UploadOutcome { etag, content_digest: store_digest })
    }
}

struct ChunkContext {
    executor: Arc<dyn RequestExecutor>,
    observer: TransferObserver,
    token: CancellationToken,
    use_transactional: bool,
    name: String,
}

/// Transfers one block: dispatch, digest check, result.
async fn run_chunk(
    ctx: &ChunkContext,
    span: &BlockSpan,
    payload: Bytes,
) -> Result<ChunkResult, TransferError> {
    let sent_digest =
        if ctx.use_transactional { Some(transactional_digest(&payload)) } else { None };
    let request = StoreRequest::PutBlock(PutBlockRequest {
        name: ctx.name.clone(),
        id: span.id.clone(),
        body: payload,
        content_digest: sent_digest.clone(),
    });

    debug!(block = %span.id, len = span.length, state = ?BlockState::InFlight, "dispatching block");
    let response = tokio::select! {
        biased;
        _ = ctx.token.cancelled() => return Err(TransferError::Cancelled),
        result = send(ctx.executor.as_ref(), &ctx.observer, request) => result?,
    };

    if let (Some(sent), Some(echo)) = (sent_digest.as_deref(), response.content_digest.as_deref())
        && let Err(err) = verify_digest(sent, echo)
    {
        warn!(block = %span.id, state = ?BlockState::Failed, "server digest disagrees");
        return Err(err);
    }

    Ok(ChunkResult {
        id: span.id.clone(),
        index: span.index,
        server_digest: response.content_digest,
        state: BlockState::Succeeded,
    })
}

fn record_chunk(
    joined: Result<Result<ChunkResult, TransferError>, tokio::task::JoinError>,
    results: &mut Vec<ChunkResult>,
    job_error: &mut Option<TransferError>,
    guard: &DeadlineGuard,
) {
    match joined {
        Ok(Ok(chunk)) => results.push(chunk),
        Ok(Err(err)) => {
            // Secondary cancellations are not a root cause.
            if !err.is_cancellation() && job_error.is_none() {
                warn!(error = %err, "block upload failed, aborting job");
                guard.abort();
                *job_error = Some(err);
            }
        }
        Err(join_err) => {
            if job_error.is_none() {
                guard.abort();
                *job_error =
                    Some(TransferError::Protocol(format!("chunk task failed: {join_err}")));
            }
        }
    }
}
