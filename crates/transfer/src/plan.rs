//! Transfer strategy selection and block splitting.

use blockhaul_protocol::BlockId;

use crate::{MAX_BLOCK_COUNT, TransferError, TransferOptions};

/// How a job moves its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// One request carries the whole payload.
    SingleShot { length: u64 },
    /// Block uploads followed by one commit. `block_count` is `None` when
    /// the source length is unknown and blocks are produced until end of
    /// stream.
    Chunked { block_size: u64, block_count: Option<u64> },
}

/// One block's place within the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSpan {
    pub index: u32,
    pub id: BlockId,
    pub offset: u64,
    pub length: u64,
}

impl BlockSpan {
    pub fn new(index: u32, offset: u64, length: u64) -> Self {
        Self { index, id: BlockId::from_index(index), offset, length }
    }
}

/// Lifecycle of one block, owned by the single task transferring it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Pending,
    InFlight,
    Succeeded,
    Failed,
}

/// Outcome of one block's transfer.
#[derive(Debug, Clone)]
pub struct ChunkResult {
    pub id: BlockId,
    pub index: u32,
    /// Digest the server echoed for this block, if any.
    pub server_digest: Option<String>,
    pub state: BlockState,
}

/// Chooses the strategy for a job.
///
/// `source_len` is the authoritative length of a random-access source
/// (`None` for a sequential source without a trusted length).
/// `explicit_len` is a caller-requested byte count. An explicit length
/// exceeding a known source length is rejected here, before any request;
/// the same misuse on a sequential source is only detectable while
/// reading and fails mid-transfer instead.
pub fn plan(
    source_len: Option<u64>,
    explicit_len: Option<u64>,
    options: &TransferOptions,
) -> Result<Strategy, TransferError> {
    options.validate()?;

    if let (Some(explicit), Some(available)) = (explicit_len, source_len)
        && explicit > available
    {
        return Err(TransferError::InvalidArgument(format!(
            "requested length {explicit} exceeds source length {available}"
        )));
    }

    let effective = explicit_len.or(source_len);
    match effective {
        Some(length) if length <= options.single_shot_threshold => {
            Ok(Strategy::SingleShot { length })
        }
        Some(length) => {
            let block_count = length.div_ceil(options.block_size);
            if block_count > MAX_BLOCK_COUNT {
                return Err(TransferError::InvalidArgument(format!(
                    "length {length} needs {block_count} blocks, over the {MAX_BLOCK_COUNT} limit"
                )));
            }
            Ok(Strategy::Chunked { block_size: options.block_size, block_count: Some(block_count) })
        }
        // Unknown length: only a sequential source gets here. The
        // threshold cannot be compared, so the job is chunked and blocks
        // are cut until end of stream.
        None => Ok(Strategy::Chunked { block_size: options.block_size, block_count: None }),
    }
}

/// Enumerates the spans of a size-bounded chunked job. The final span
/// carries the remainder.
pub fn compute_spans(total_len: u64, block_size: u64) -> Vec<BlockSpan> {
    let count = total_len.div_ceil(block_size);
    (0..count)
        .map(|i| {
            let offset = i * block_size;
            let length = block_size.min(total_len - offset);
            BlockSpan::new(i as u32, offset, length)
        })
        .collect()
}
