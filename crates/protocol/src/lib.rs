//! Boundary types shared between the transfer engine, the paging layer,
//! and the request executor collaborator.
//!
//! Wire encoding lives entirely behind [`RequestExecutor`]; the types here
//! carry only the fields the engine itself reads or writes.

mod block;
mod executor;
mod request;
mod value;

pub use block::{
    BlockDisposition, BlockId, BlockListEntry, BlockListItem, BlockListingFilter, BlockMode,
};
pub use executor::{ExecutorError, RequestExecutor};
pub use request::{
    ByteRange, GetBlockListRequest, GetObjectRequest, GetPropertiesRequest, ListObjectsRequest,
    ObjectItem, ObjectListBody, ObjectProperties, PutBlockListRequest, PutBlockRequest,
    PutObjectRequest, QueryRowsRequest, ResponseBody, Row, RowsBody, StoreRequest, StoreResponse,
};
pub use value::{FieldValue, TypeMismatch};
