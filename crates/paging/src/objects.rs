//! Object listing over the executor.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use blockhaul_protocol::{
    ListObjectsRequest, ObjectItem, RequestExecutor, ResponseBody, StoreRequest,
};

use crate::lister::{Page, PageFetcher};
use crate::token::ContinuationToken;
use crate::PagingError;

/// Pages through the objects under a prefix.
pub struct ObjectLister {
    executor: Arc<dyn RequestExecutor>,
    prefix: String,
}

impl ObjectLister {
    pub fn new(executor: Arc<dyn RequestExecutor>, prefix: impl Into<String>) -> Self {
        Self { executor, prefix: prefix.into() }
    }
}

impl PageFetcher for ObjectLister {
    type Item = ObjectItem;

    fn fetch_page(
        &self,
        token: Option<&ContinuationToken>,
        page_size_hint: Option<u32>,
    ) -> Pin<Box<dyn Future<Output = Result<Page<ObjectItem>, PagingError>> + Send + '_>> {
        let request = StoreRequest::ListObjects(ListObjectsRequest {
            prefix: self.prefix.clone(),
            marker: token.and_then(|t| t.marker()).map(str::to_string),
            max_results: page_size_hint,
        });

        Box::pin(async move {
            let response = self.executor.execute(request).await?;
            if !response.is_success() {
                return Err(PagingError::Service {
                    status: response.status,
                    code: "unexpected_status".into(),
                    message: format!("listing returned status {}", response.status),
                });
            }
            match response.body {
                ResponseBody::ObjectList(body) => {
                    let next = ContinuationToken::from_marker(body.next_marker);
                    Ok(Page::new(body.items, next))
                }
                _ => Err(PagingError::Protocol("expected an object list body".into())),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lister::PageSequence;
    use blockhaul_protocol::{ExecutorError, ObjectListBody, ObjectProperties, StoreResponse};
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    fn item(name: &str) -> ObjectItem {
        ObjectItem {
            name: name.into(),
            properties: ObjectProperties {
                content_length: 1,
                etag: "\"e\"".into(),
                content_digest: None,
                metadata: BTreeMap::new(),
                last_modified: None,
            },
        }
    }

    /// Serves fixed items in pages of two, cut by the requested marker.
    struct FixedListing {
        names: Vec<&'static str>,
        requests: Mutex<Vec<(Option<String>, Option<u32>)>>,
    }

    impl RequestExecutor for FixedListing {
        fn execute(
            &self,
            request: StoreRequest,
        ) -> Pin<Box<dyn Future<Output = Result<StoreResponse, ExecutorError>> + Send + '_>>
        {
            Box::pin(async move {
                let StoreRequest::ListObjects(req) = request else {
                    return Err(ExecutorError::Transport("unexpected request kind".into()));
                };
                self.requests.lock().unwrap().push((req.marker.clone(), req.max_results));

                let start = match req.marker.as_deref() {
                    None => 0,
                    Some(marker) => {
                        self.names.iter().position(|n| *n == marker).unwrap_or(self.names.len())
                    }
                };
                let page_len = req.max_results.unwrap_or(2) as usize;
                let end = (start + page_len).min(self.names.len());
                let items = self.names[start..end].iter().map(|n| item(n)).collect();
                let next_marker =
                    (end < self.names.len()).then(|| self.names[end].to_string());

                Ok(StoreResponse {
                    status: 200,
                    etag: None,
                    content_digest: None,
                    body: ResponseBody::ObjectList(ObjectListBody { items, next_marker }),
                })
            })
        }
    }

    #[tokio::test]
    async fn lists_everything_across_pages() {
        let executor = Arc::new(FixedListing {
            names: vec!["a", "b", "c", "d", "e"],
            requests: Mutex::new(Vec::new()),
        });
        let lister = ObjectLister::new(executor.clone(), "");
        let mut sequence = PageSequence::new(lister);

        let mut names = Vec::new();
        while let Some(page) = sequence.next_page().await {
            for item in page.unwrap().into_items() {
                names.push(item.name);
            }
        }
        assert_eq!(names, vec!["a", "b", "c", "d", "e"]);

        // The marker of each request is exactly the cursor the previous
        // response issued.
        let requests = executor.requests.lock().unwrap();
        assert_eq!(requests[0].0, None);
        assert_eq!(requests[1].0.as_deref(), Some("c"));
        assert_eq!(requests[2].0.as_deref(), Some("e"));
    }

    #[tokio::test]
    async fn page_size_hint_reaches_the_request() {
        let executor = Arc::new(FixedListing {
            names: vec!["a", "b", "c"],
            requests: Mutex::new(Vec::new()),
        });
        let lister = ObjectLister::new(executor.clone(), "");
        let mut sequence = PageSequence::new(lister).with_page_size(3);
        sequence.next_page().await.unwrap().unwrap();
        assert_eq!(executor.requests.lock().unwrap()[0].1, Some(3));
    }

    #[tokio::test]
    async fn single_page_terminates_immediately() {
        let executor =
            Arc::new(FixedListing { names: vec!["a"], requests: Mutex::new(Vec::new()) });
        let mut sequence = PageSequence::new(ObjectLister::new(executor, ""));
        let page = sequence.next_page().await.unwrap().unwrap();
        assert_eq!(page.items().len(), 1);
        assert!(page.continuation_token().is_none());
        assert!(sequence.next_page().await.is_none());
    }
}
