//! Row queries over the executor.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use blockhaul_protocol::{
    QueryRowsRequest, RequestExecutor, ResponseBody, Row, StoreRequest,
};

use crate::lister::{Page, PageFetcher};
use crate::token::ContinuationToken;
use crate::PagingError;

/// Pages through the rows a query matches.
///
/// The filter expression is opaque here; it is carried into each page
/// request unchanged, together with the server's partition/row/table
/// cursor triple.
pub struct RowQuery {
    executor: Arc<dyn RequestExecutor>,
    table: String,
    filter: Option<String>,
}

impl RowQuery {
    pub fn new(executor: Arc<dyn RequestExecutor>, table: impl Into<String>) -> Self {
        Self { executor, table: table.into(), filter: None }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

impl PageFetcher for RowQuery {
    type Item = Row;

    fn fetch_page(
        &self,
        token: Option<&ContinuationToken>,
        page_size_hint: Option<u32>,
    ) -> Pin<Box<dyn Future<Output = Result<Page<Row>, PagingError>> + Send + '_>> {
        let (next_partition_key, next_row_key, next_table_name) = token
            .and_then(|t| t.table_keys())
            .map(|(p, r, t)| {
                (p.map(str::to_string), r.map(str::to_string), t.map(str::to_string))
            })
            .unwrap_or((None, None, None));

        let request = StoreRequest::QueryRows(QueryRowsRequest {
            table: self.table.clone(),
            filter: self.filter.clone(),
            max_results: page_size_hint,
            next_partition_key,
            next_row_key,
            next_table_name,
        });

        Box::pin(async move {
            let response = self.executor.execute(request).await?;
            if !response.is_success() {
                return Err(PagingError::Service {
                    status: response.status,
                    code: "unexpected_status".into(),
                    message: format!("query returned status {}", response.status),
                });
            }
            match response.body {
                ResponseBody::Rows(body) => {
                    let next = ContinuationToken::from_table_keys(
                        body.next_partition_key,
                        body.next_row_key,
                        body.next_table_name,
                    );
                    Ok(Page::new(body.rows, next))
                }
                _ => Err(PagingError::Protocol("expected a rows body".into())),
            }
        })
    }
}
