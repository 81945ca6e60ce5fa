//! In-memory store used by the integration tests.
//!
//! Implements `RequestExecutor` over a hash map of objects, tracking
//! request kinds and the in-flight high-water mark, with switches for
//! slow responses, digest corruption, and per-block failures.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use blockhaul_protocol::{
    BlockDisposition, BlockListItem, BlockListingFilter, BlockMode, ExecutorError,
    ObjectProperties, PutBlockListRequest, RequestExecutor, ResponseBody, StoreRequest,
    StoreResponse,
};
use blockhaul_transfer::transactional_digest;
use bytes::Bytes;

#[derive(Default)]
struct FakeObject {
    /// Blocks uploaded since the last commit, in upload order.
    uncommitted: Vec<(String, Bytes)>,
    /// The committed list defining the current content, in order.
    committed: Vec<(String, Bytes)>,
    /// Every block that was ever part of a commit. Dropping a block from
    /// a later commit excludes it from content without deleting it.
    committed_pool: HashMap<String, Bytes>,
    content: Bytes,
    etag: Option<String>,
    stored_digest: Option<String>,
    metadata: BTreeMap<String, String>,
}

pub struct FakeStore {
    objects: Mutex<HashMap<String, FakeObject>>,
    log: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    etag_counter: AtomicUsize,
    delay: Mutex<Option<Duration>>,
    corrupt_echo: AtomicBool,
    fail_block: Mutex<Option<String>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            log: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            etag_counter: AtomicUsize::new(0),
            delay: Mutex::new(None),
            corrupt_echo: AtomicBool::new(false),
            fail_block: Mutex::new(None),
        }
    }

    /// Every request sleeps this long while counted as in flight.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Echo garbage digests instead of the real ones.
    pub fn set_corrupt_echo(&self, on: bool) {
        self.corrupt_echo.store(on, Ordering::SeqCst);
    }

    /// Fail uploads of the block with this id with a 503.
    pub fn set_fail_block(&self, id: &str) {
        *self.fail_block.lock().unwrap() = Some(id.to_string());
    }

    /// Overwrites an object's stored whole-object digest, as if the
    /// property had been tampered with.
    pub fn set_stored_digest(&self, name: &str, digest: &str) {
        let mut objects = self.objects.lock().unwrap();
        if let Some(object) = objects.get_mut(name) {
            object.stored_digest = Some(digest.to_string());
        }
    }

    pub fn request_log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn total_requests(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.log.lock().unwrap().iter().filter(|k| k.as_str() == kind).count()
    }

    pub fn clear_log(&self) {
        self.log.lock().unwrap().clear();
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Published content of an object, if it was ever committed.
    pub fn content_of(&self, name: &str) -> Option<Bytes> {
        let objects = self.objects.lock().unwrap();
        objects.get(name).filter(|o| o.etag.is_some()).map(|o| o.content.clone())
    }

    fn next_etag(&self) -> String {
        format!("\"etag-{}\"", self.etag_counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn echo(&self, body: &Bytes) -> String {
        if self.corrupt_echo.load(Ordering::SeqCst) {
            "0".repeat(64)
        } else {
            transactional_digest(body)
        }
    }

    fn handle(&self, request: StoreRequest) -> Result<StoreResponse, ExecutorError> {
        match request {
            StoreRequest::PutObject(req) => {
                let echo = req.content_digest.as_ref().map(|_| self.echo(&req.body));
                let etag = self.next_etag();
                let mut objects = self.objects.lock().unwrap();
                let object = objects.entry(req.name).or_default();
                object.content = req.body;
                object.uncommitted.clear();
                object.committed.clear();
                object.stored_digest = req.store_digest;
                object.metadata = req.metadata;
                object.etag = Some(etag.clone());
                Ok(ok(Some(etag), echo, ResponseBody::None))
            }

            StoreRequest::PutBlock(req) => {
                if self.fail_block.lock().unwrap().as_deref() == Some(req.id.as_str()) {
                    return Err(ExecutorError::Service {
                        status: 503,
                        code: "ServerBusy".into(),
                        message: "simulated block failure".into(),
                    });
                }
                let echo = req.content_digest.as_ref().map(|_| self.echo(&req.body));
                let mut objects = self.objects.lock().unwrap();
                let object = objects.entry(req.name).or_default();
                let id = req.id.as_str().to_string();
                object.uncommitted.retain(|(existing, _)| *existing != id);
                object.uncommitted.push((id, req.body));
                Ok(ok(None, echo, ResponseBody::None))
            }

            StoreRequest::PutBlockList(req) => self.commit(req),

            StoreRequest::GetObject(req) => {
                let objects = self.objects.lock().unwrap();
                let object = objects
                    .get(&req.name)
                    .filter(|o| o.etag.is_some())
                    .ok_or_else(|| not_found(&req.name))?;
                let data = match req.range {
                    None => object.content.clone(),
                    Some(range) => {
                        let start = (range.offset as usize).min(object.content.len());
                        let end =
                            (start + range.length as usize).min(object.content.len());
                        object.content.slice(start..end)
                    }
                };
                let declared = self.echo(&data);
                Ok(ok(object.etag.clone(), Some(declared), ResponseBody::Data(data)))
            }

            StoreRequest::GetProperties(req) => {
                let objects = self.objects.lock().unwrap();
                let object = objects
                    .get(&req.name)
                    .filter(|o| o.etag.is_some())
                    .ok_or_else(|| not_found(&req.name))?;
                let props = ObjectProperties {
                    content_length: object.content.len() as u64,
                    etag: object.etag.clone().unwrap_or_default(),
                    content_digest: object.stored_digest.clone(),
                    metadata: object.metadata.clone(),
                    last_modified: None,
                };
                Ok(ok(object.etag.clone(), None, ResponseBody::Properties(props)))
            }

            StoreRequest::GetBlockList(req) => {
                let objects = self.objects.lock().unwrap();
                let object = objects.get(&req.name).ok_or_else(|| not_found(&req.name))?;
                let committed = object.committed.iter().map(|(id, _)| BlockListItem {
                    id: parse_id(id),
                    mode: BlockMode::Committed,
                });
                let uncommitted = object.uncommitted.iter().map(|(id, _)| BlockListItem {
                    id: parse_id(id),
                    mode: BlockMode::Uncommitted,
                });
                let items: Vec<BlockListItem> = match req.filter {
                    BlockListingFilter::Committed => committed.collect(),
                    BlockListingFilter::Uncommitted => uncommitted.collect(),
                    BlockListingFilter::All => committed.chain(uncommitted).collect(),
                };
                Ok(ok(None, None, ResponseBody::BlockList(items)))
            }

            StoreRequest::ListObjects(_) | StoreRequest::QueryRows(_) => {
                Err(ExecutorError::Transport("listing is not part of this fixture".into()))
            }
        }
    }

    fn commit(&self, req: PutBlockListRequest) -> Result<StoreResponse, ExecutorError> {
        let etag = self.next_etag();
        let mut objects = self.objects.lock().unwrap();
        let object = objects.entry(req.name).or_default();

        let mut resolved: Vec<(String, Bytes)> = Vec::with_capacity(req.entries.len());
        for entry in &req.entries {
            let id = entry.id.as_str();
            let from_uncommitted =
                || object.uncommitted.iter().find(|(u, _)| u == id).map(|(_, b)| b.clone());
            let from_committed = || object.committed_pool.get(id).cloned();
            let body = match entry.disposition {
                BlockDisposition::Uncommitted => from_uncommitted(),
                BlockDisposition::Committed => from_committed(),
                BlockDisposition::Latest => from_uncommitted().or_else(from_committed),
            };
            match body {
                Some(body) => resolved.push((id.to_string(), body)),
                None => {
                    return Err(ExecutorError::Service {
                        status: 400,
                        code: "InvalidBlockList".into(),
                        message: format!("block {id} not found for commit"),
                    });
                }
            }
        }

        let mut content = Vec::new();
        for (_, body) in &resolved {
            content.extend_from_slice(body);
        }
        for (id, body) in &resolved {
            object.committed_pool.insert(id.clone(), body.clone());
        }
        object.content = Bytes::from(content);
        object.committed = resolved;
        object.uncommitted.clear();
        object.stored_digest = req.store_digest;
        object.metadata = req.metadata;
        object.etag = Some(etag.clone());
        Ok(ok(Some(etag), None, ResponseBody::None))
    }
}

impl RequestExecutor for FakeStore {
    fn execute(
        &self,
        request: StoreRequest,
    ) -> Pin<Box<dyn Future<Output = Result<StoreResponse, ExecutorError>> + Send + '_>> {
        Box::pin(async move {
            self.log.lock().unwrap().push(request.kind().to_string());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            let _guard = InFlightGuard(&self.in_flight);

            let delay = *self.delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.handle(request)
        })
    }
}

/// Decrements even when a response future is dropped mid-request.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn ok(etag: Option<String>, content_digest: Option<String>, body: ResponseBody) -> StoreResponse {
    StoreResponse { status: 200, etag, content_digest, body }
}

fn not_found(name: &str) -> ExecutorError {
    ExecutorError::Service {
        status: 404,
        code: "ObjectNotFound".into(),
        message: format!("{name} does not exist"),
    }
}

fn parse_id(id: &str) -> blockhaul_protocol::BlockId {
    blockhaul_protocol::BlockId::new(id)
}
