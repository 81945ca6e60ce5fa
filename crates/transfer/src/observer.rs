//! Per-job request/response observers.
//!
//! Injected explicitly into a job, never installed process-wide, so
//! concurrent jobs cannot see each other's traffic.

use std::sync::Arc;

use blockhaul_protocol::{StoreRequest, StoreResponse};

type RequestHook = Arc<dyn Fn(&StoreRequest) + Send + Sync>;
type ResponseHook = Arc<dyn Fn(&StoreResponse) + Send + Sync>;

/// Callbacks invoked around each request a job issues.
#[derive(Clone, Default)]
pub struct TransferObserver {
    on_request: Option<RequestHook>,
    on_response: Option<ResponseHook>,
}

impl TransferObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with each outgoing request, before dispatch.
    pub fn on_request(mut self, hook: impl Fn(&StoreRequest) + Send + Sync + 'static) -> Self {
        self.on_request = Some(Arc::new(hook));
        self
    }

    /// Called with each response the executor returns.
    pub fn on_response(mut self, hook: impl Fn(&StoreResponse) + Send + Sync + 'static) -> Self {
        self.on_response = Some(Arc::new(hook));
        self
    }

    pub(crate) fn notify_request(&self, request: &StoreRequest) {
        if let Some(hook) = &self.on_request {
            hook(request);
        }
    }

    pub(crate) fn notify_response(&self, response: &StoreResponse) {
        if let Some(hook) = &self.on_response {
            hook(response);
        }
    }
}

impl std::fmt::Debug for TransferObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferObserver")
            .field("on_request", &self.on_request.is_some())
            .field("on_response", &self.on_response.is_some())
            .finish()
    }
}
