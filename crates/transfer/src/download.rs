//! Download jobs: single and ranged reads, chunked parallel fetches.

use std::sync::Arc;

use blockhaul_protocol::{
    ByteRange, GetObjectRequest, GetPropertiesRequest, ObjectProperties, ResponseBody,
    StoreRequest,
};
use bytes::Bytes;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::deadline::DeadlineGuard;
use crate::digest::{transactional_digest, verify_digest};
use crate::dispatch::send;
use crate::gate::ConcurrencyGate;
use crate::plan::compute_spans;
use crate::{RequestExecutor, TransferError, TransferObserver, TransferOptions};

/// Downloads objects through the executor, fetching large ones as
/// parallel ranged reads.
pub struct BlobDownloader {
    executor: Arc<dyn RequestExecutor>,
    options: TransferOptions,
    observer: TransferObserver,
}

impl BlobDownloader {
    pub fn new(executor: Arc<dyn RequestExecutor>) -> Self {
        Self { executor, options: TransferOptions::default(), observer: TransferObserver::new() }
    }

    pub fn with_options(mut self, options: TransferOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_observer(mut self, observer: TransferObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Fetches the object's stored properties.
    pub async fn properties(&self, name: &str) -> Result<ObjectProperties, TransferError> {
        let request =
            StoreRequest::GetProperties(GetPropertiesRequest { name: name.to_string() });
        let response = send(self.executor.as_ref(), &self.observer, request).await?;
        match response.body {
            ResponseBody::Properties(props) => Ok(props),
            _ => Err(TransferError::Protocol("expected a properties body".into())),
        }
    }

    /// Reads the whole object.
    ///
    /// A stored whole-object digest is validated against the full
    /// content; this is the only read shape that validates it.
    pub async fn download(&self, name: &str) -> Result<Bytes, TransferError> {
        self.options.validate()?;
        let guard = DeadlineGuard::new(self.options.maximum_execution_time);

        let props = guard.run(self.properties(name)).await?;
        let length = props.content_length;

        let data = if length <= self.options.single_shot_threshold {
            let body = guard.run(self.fetch_range(name, None)).await?;
            if body.len() as u64 != length {
                return Err(TransferError::Protocol(format!(
                    "object body is {} bytes, properties said {length}",
                    body.len()
                )));
            }
            body
        } else {
            self.fetch_chunked(name, length, &guard).await?
        };

        if let Some(stored) = props.content_digest.as_deref() {
            let actual = transactional_digest(&data);
            verify_digest(stored, &actual)?;
        }

        info!(object = %name, bytes = length, "download complete");
        Ok(data)
    }

    /// Reads one byte range. Stored whole-object digests are not
    /// validated on partial reads.
    pub async fn download_range(
        &self,
        name: &str,
        range: ByteRange,
    ) -> Result<Bytes, TransferError> {
        let guard = DeadlineGuard::new(self.options.maximum_execution_time);
        guard.run(self.fetch_range(name, Some(range))).await
    }

    /// Reads the whole object as UTF-8 text.
    pub async fn download_text(&self, name: &str) -> Result<String, TransferError> {
        let data = self.download(name).await?;
        String::from_utf8(data.to_vec())
            .map_err(|_| TransferError::Protocol("object is not valid UTF-8".into()))
    }

    /// One GET, full or ranged, with the transactional echo check.
    async fn fetch_range(
        &self,
        name: &str,
        range: Option<ByteRange>,
    ) -> Result<Bytes, TransferError> {
        let request =
            StoreRequest::GetObject(GetObjectRequest { name: name.to_string(), range });
        let response = send(self.executor.as_ref(), &self.observer, request).await?;
        let data = match response.body {
            ResponseBody::Data(data) => data,
            _ => return Err(TransferError::Protocol("expected a data body".into())),
        };
        if self.options.use_transactional_digest
            && let Some(declared) = response.content_digest.as_deref()
        {
            let actual = transactional_digest(&data);
            verify_digest(declared, &actual)?;
        }
        Ok(data)
    }

    /// Parallel ranged reads reassembled in offset order.
    async fn fetch_chunked(
        &self,
        name: &str,
        length: u64,
        guard: &DeadlineGuard,
    ) -> Result<Bytes, TransferError> {
        let token = guard.token();
        let gate = ConcurrencyGate::new(self.options.parallelism_factor);
        let spans = compute_spans(length, self.options.block_size);
        debug!(object = %name, blocks = spans.len(), "chunked download planned");

        let mut tasks: JoinSet<Result<(u64, Bytes), TransferError>> = JoinSet::new();
        for span in spans {
            let executor = Arc::clone(&self.executor);
            let observer = self.observer.clone();
            let token = token.clone();
            let gate = gate.clone();
            let name = name.to_string();
            let use_transactional = self.options.use_transactional_digest;
            tasks.spawn(async move {
                let _permit = gate.acquire(&token).await?;
                let request = StoreRequest::GetObject(GetObjectRequest {
                    name,
                    range: Some(ByteRange { offset: span.offset, length: span.length }),
                });
                let response = tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(TransferError::Cancelled),
                    result = send(executor.as_ref(), &observer, request) => result?,
                };
                let data = match response.body {
                    ResponseBody::Data(data) => data,
                    _ => return Err(TransferError::Protocol("expected a data body".into())),
                };
                if data.len() as u64 != span.length {
                    return Err(TransferError::Protocol(format!(
                        "range [{}, +{}) returned {} bytes",
                        span.offset,
                        span.length,
                        data.len()
                    )));
                }
                if use_transactional
                    && let Some(declared) = response.content_digest.as_deref()
                {
                    let actual = transactional_digest(&data);
                    verify_digest(declared, &actual)?;
                }
                Ok((span.offset, data))
            });
        }

        let mut pieces: Vec<(u64, Bytes)> = Vec::new();
        let mut job_error: Option<TransferError> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(piece)) => pieces.push(piece),
                Ok(Err(err)) => {
                    if !err.is_cancellation() && job_error.is_none() {
                        warn!(error = %err, "ranged read failed, aborting job");
                        guard.abort();
                        job_error = Some(err);
                    }
                }
                Err(join_err) => {
                    if job_error.is_none() {
                        guard.abort();
                        job_error =
                            Some(TransferError::Protocol(format!("chunk task failed: {join_err}")));
                    }
                }
            }
        }

        if guard.is_expired() {
            return Err(TransferError::Timeout);
        }
        if let Some(err) = job_error {
            return Err(err);
        }

        let mut assembled = vec![0u8; length as usize];
        for (offset, data) in pieces {
            let start = offset as usize;
            assembled[start..start + data.len()].copy_from_slice(&data);
        }
        Ok(Bytes::from(assembled))
    }
}
