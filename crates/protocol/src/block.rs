//! Block identifiers and block-list entries.

use serde::{Deserialize, Serialize};

/// Opaque identifier of one uploadable block.
///
/// Ids derived from a block index are fixed-width hex of the big-endian
/// sequence number, so their lexicographic order matches block order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    /// Wraps a caller-chosen or server-returned id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Builds the id for the block at `index` within a job.
    pub fn from_index(index: u32) -> Self {
        Self(hex::encode(index.to_be_bytes()))
    }

    /// The encoded id string sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a block id in a commit request resolves to an uploaded block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockDisposition {
    /// Resolve against the currently committed block list.
    Committed,
    /// Resolve against blocks uploaded since the last commit.
    Uncommitted,
    /// Prefer an uncommitted block, falling back to a committed one.
    Latest,
}

/// One entry of an ordered commit request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockListEntry {
    pub id: BlockId,
    pub disposition: BlockDisposition,
}

impl BlockListEntry {
    pub fn committed(id: BlockId) -> Self {
        Self { id, disposition: BlockDisposition::Committed }
    }

    pub fn uncommitted(id: BlockId) -> Self {
        Self { id, disposition: BlockDisposition::Uncommitted }
    }

    pub fn latest(id: BlockId) -> Self {
        Self { id, disposition: BlockDisposition::Latest }
    }
}

/// Which blocks a block-list inspection should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockListingFilter {
    Committed,
    Uncommitted,
    All,
}

/// Whether a listed block is part of the published content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockMode {
    Committed,
    Uncommitted,
}

/// One item of a block-list inspection response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockListItem {
    pub id: BlockId,
    pub mode: BlockMode,
}
