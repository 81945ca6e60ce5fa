//! Generic page fetching.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use futures_util::stream::{self, Stream, TryStreamExt};
use tracing::debug;

use crate::{ContinuationToken, PagingError};

/// One fetched page: items plus the cursor for the next page, if any.
#[derive(Debug, Clone)]
pub struct Page<T> {
    items: Vec<T>,
    next: Option<ContinuationToken>,
}

impl<T> Page<T> {
    pub(crate) fn new(items: Vec<T>, next: Option<ContinuationToken>) -> Self {
        Self { items, next }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    /// Cursor to the next page; `None` means this was the last one.
    pub fn continuation_token(&self) -> Option<&ContinuationToken> {
        self.next.as_ref()
    }
}

/// Fetches one page of a listing or query.
///
/// Each call is a single request-response; per-request retry belongs to
/// the executor behind the implementation. `page_size_hint` of `None`
/// lets the server pick its maximum.
pub trait PageFetcher: Send + Sync {
    type Item: Send;

    fn fetch_page(
        &self,
        token: Option<&ContinuationToken>,
        page_size_hint: Option<u32>,
    ) -> Pin<Box<dyn Future<Output = Result<Page<Self::Item>, PagingError>> + Send + '_>>;
}

/// A lazy, finite, resumable sequence of pages.
///
/// Nothing is fetched until [`next_page`](Self::next_page) is called.
/// The current cursor can be persisted via
/// [`resume_token`](Self::resume_token) and fed to
/// [`resume_from`](Self::resume_from) in a later process; the sequence
/// then continues exactly where it left off. A failed fetch leaves the
/// cursor untouched, so the same page can be requested again.
pub struct PageSequence<F: PageFetcher> {
    fetcher: F,
    page_size_hint: Option<u32>,
    per_call_timeout: Option<Duration>,
    cursor: Option<ContinuationToken>,
    finished: bool,
}

impl<F: PageFetcher> PageSequence<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher, page_size_hint: None, per_call_timeout: None, cursor: None, finished: false }
    }

    /// Suggested page size; zero means "server default", same as unset.
    pub fn with_page_size(mut self, hint: u32) -> Self {
        self.page_size_hint = (hint > 0).then_some(hint);
        self
    }

    /// Budget for each individual page fetch.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.per_call_timeout = Some(timeout);
        self
    }

    /// Continues a previously persisted enumeration.
    pub fn resume_from(mut self, token: ContinuationToken) -> Self {
        self.cursor = Some(token);
        self
    }

    /// The cursor the next fetch would use. `None` either before the
    /// first page or after the last one; [`is_finished`](Self::is_finished)
    /// tells the two apart.
    pub fn resume_token(&self) -> Option<&ContinuationToken> {
        self.cursor.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Fetches the next page, or returns `None` once the server stopped
    /// issuing cursors.
    pub async fn next_page(&mut self) -> Option<Result<Page<F::Item>, PagingError>> {
        if self.finished {
            return None;
        }

        let fetch = self.fetcher.fetch_page(self.cursor.as_ref(), self.page_size_hint);
        let result = match self.per_call_timeout {
            Some(budget) => match tokio::time::timeout(budget, fetch).await {
                Ok(result) => result,
                Err(_) => Err(PagingError::Timeout),
            },
            None => fetch.await,
        };

        match result {
            Ok(page) => {
                self.cursor = page.continuation_token().cloned();
                self.finished = self.cursor.is_none();
                debug!(
                    items = page.items().len(),
                    has_next = !self.finished,
                    "page fetched"
                );
                Some(Ok(page))
            }
            // The cursor is untouched: the caller may try this page
            // again.
            Err(err) => Some(Err(err)),
        }
    }

    /// Flattens the remaining pages into a stream of items.
    pub fn into_stream(self) -> impl Stream<Item = Result<F::Item, PagingError>> {
        stream::try_unfold(self, |mut sequence| async move {
            match sequence.next_page().await {
                None => Ok(None),
                Some(Ok(page)) => {
                    let items = stream::iter(page.into_items().into_iter().map(Ok));
                    Ok(Some((items, sequence)))
                }
                Some(Err(err)) => Err(err),
            }
        })
        .try_flatten()
    }
}
