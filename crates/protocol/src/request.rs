//! Typed requests handed to the executor and the response fields the
//! engine reads back.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::block::{BlockId, BlockListEntry, BlockListItem, BlockListingFilter};
use crate::value::FieldValue;

/// Half-open byte range `[offset, offset + length)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u64,
    pub length: u64,
}

/// Single-shot object write.
#[derive(Debug, Clone)]
pub struct PutObjectRequest {
    pub name: String,
    pub body: Bytes,
    /// Transactional digest of `body`, echoed back by the server.
    pub content_digest: Option<String>,
    /// Whole-object digest stored as an object property.
    pub store_digest: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

/// Upload of one block.
#[derive(Debug, Clone)]
pub struct PutBlockRequest {
    pub name: String,
    pub id: BlockId,
    pub body: Bytes,
    /// Transactional digest of `body`, echoed back by the server.
    pub content_digest: Option<String>,
}

/// Atomic publish of an ordered block list.
#[derive(Debug, Clone)]
pub struct PutBlockListRequest {
    pub name: String,
    pub entries: Vec<BlockListEntry>,
    /// Whole-object digest stored as an object property.
    pub store_digest: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

/// Full or ranged object read.
#[derive(Debug, Clone)]
pub struct GetObjectRequest {
    pub name: String,
    /// `None` reads the whole object.
    pub range: Option<ByteRange>,
}

/// Object property fetch.
#[derive(Debug, Clone)]
pub struct GetPropertiesRequest {
    pub name: String,
}

/// Block-list inspection.
#[derive(Debug, Clone)]
pub struct GetBlockListRequest {
    pub name: String,
    pub filter: BlockListingFilter,
}

/// One page of an object listing.
#[derive(Debug, Clone)]
pub struct ListObjectsRequest {
    pub prefix: String,
    /// Cursor from the previous page response; `None` starts from the top.
    pub marker: Option<String>,
    /// `None` lets the server choose its maximum page size.
    pub max_results: Option<u32>,
}

/// One page of a row query.
#[derive(Debug, Clone)]
pub struct QueryRowsRequest {
    pub table: String,
    /// Opaque filter expression, passed through unmodified.
    pub filter: Option<String>,
    pub max_results: Option<u32>,
    pub next_partition_key: Option<String>,
    pub next_row_key: Option<String>,
    pub next_table_name: Option<String>,
}

/// Every request kind the engine can issue.
#[derive(Debug, Clone)]
pub enum StoreRequest {
    PutObject(PutObjectRequest),
    PutBlock(PutBlockRequest),
    PutBlockList(PutBlockListRequest),
    GetObject(GetObjectRequest),
    GetProperties(GetPropertiesRequest),
    GetBlockList(GetBlockListRequest),
    ListObjects(ListObjectsRequest),
    QueryRows(QueryRowsRequest),
}

impl StoreRequest {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreRequest::PutObject(_) => "put_object",
            StoreRequest::PutBlock(_) => "put_block",
            StoreRequest::PutBlockList(_) => "put_block_list",
            StoreRequest::GetObject(_) => "get_object",
            StoreRequest::GetProperties(_) => "get_properties",
            StoreRequest::GetBlockList(_) => "get_block_list",
            StoreRequest::ListObjects(_) => "list_objects",
            StoreRequest::QueryRows(_) => "query_rows",
        }
    }
}

/// Stored properties of an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectProperties {
    pub content_length: u64,
    pub etag: String,
    /// Whole-object digest stored at publish time, if any.
    pub content_digest: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// One object of a listing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectItem {
    pub name: String,
    pub properties: ObjectProperties,
}

/// Body of a listing response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectListBody {
    pub items: Vec<ObjectItem>,
    /// Cursor for the next page; absent or empty means the listing is done.
    pub next_marker: Option<String>,
}

/// One query row: column name to tagged value, in column order.
pub type Row = BTreeMap<String, FieldValue>;

/// Body of a row-query response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowsBody {
    pub rows: Vec<Row>,
    pub next_partition_key: Option<String>,
    pub next_row_key: Option<String>,
    pub next_table_name: Option<String>,
}

/// Decoded response body variants the engine consumes.
#[derive(Debug, Clone)]
pub enum ResponseBody {
    None,
    Data(Bytes),
    Properties(ObjectProperties),
    BlockList(Vec<BlockListItem>),
    ObjectList(ObjectListBody),
    Rows(RowsBody),
}

/// Response returned by the executor for any [`StoreRequest`].
#[derive(Debug, Clone)]
pub struct StoreResponse {
    pub status: u16,
    pub etag: Option<String>,
    /// Digest the server computed over the payload it received or sent.
    pub content_digest: Option<String>,
    pub body: ResponseBody,
}

impl StoreResponse {
    /// Whether the status code is in the success range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
