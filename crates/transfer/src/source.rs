//! Source capability model.
//!
//! A transfer reads from either a randomly addressable source (independent
//! reads at arbitrary offsets, safe to issue concurrently) or a sequential
//! one (single-pass, reads must be consumed in order and buffered before
//! dispatch). The planner branches on which capability a source
//! advertises, not on its concrete type.

use std::future::Future;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};

/// A source supporting reads at independent offsets.
pub trait RandomAccessSource: Send + Sync {
    /// Total length in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads up to `length` bytes starting at `offset`. Returns fewer
    /// bytes only when the source ends inside the range.
    fn read_at(
        &self,
        offset: u64,
        length: usize,
    ) -> Pin<Box<dyn Future<Output = io::Result<Bytes>> + Send + '_>>;
}

/// A single-pass source consumed strictly in order.
pub trait SequentialSource: Send {
    /// Advertised length, when the producer knows it.
    fn len_hint(&self) -> Option<u64>;

    /// Reads up to `length` bytes from the current position. An empty
    /// buffer signals end of stream.
    fn read_next(
        &mut self,
        length: usize,
    ) -> Pin<Box<dyn Future<Output = io::Result<Bytes>> + Send + '_>>;
}

/// The source of one transfer job.
pub enum TransferSource {
    Random(Arc<dyn RandomAccessSource>),
    Sequential(Box<dyn SequentialSource>),
}

impl TransferSource {
    /// In-memory source with random access.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        TransferSource::Random(Arc::new(BytesSource { data: data.into() }))
    }

    /// File source with random access. The length is captured at open
    /// time.
    pub async fn from_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let len = tokio::fs::metadata(&path).await?.len();
        Ok(TransferSource::Random(Arc::new(FileSource { path, len })))
    }

    /// Sequential source over any async reader. `len_hint` may announce
    /// the total length without granting random access.
    pub fn from_reader<R>(reader: R, len_hint: Option<u64>) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        TransferSource::Sequential(Box::new(ReaderSource { reader, len_hint }))
    }

    /// Length known without consuming the source. Only a random-access
    /// source's length is authoritative; a sequential hint may be wrong
    /// and is verified while reading.
    pub fn known_len(&self) -> Option<u64> {
        match self {
            TransferSource::Random(source) => Some(source.len()),
            TransferSource::Sequential(source) => source.len_hint(),
        }
    }

    pub fn is_random_access(&self) -> bool {
        matches!(self, TransferSource::Random(_))
    }
}

struct BytesSource {
    data: Bytes,
}

impl RandomAccessSource for BytesSource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(
        &self,
        offset: u64,
        length: usize,
    ) -> Pin<Box<dyn Future<Output = io::Result<Bytes>> + Send + '_>> {
        let start = (offset as usize).min(self.data.len());
        let end = start.saturating_add(length).min(self.data.len());
        let slice = self.data.slice(start..end);
        Box::pin(async move { Ok(slice) })
    }
}

struct FileSource {
    path: PathBuf,
    len: u64,
}

impl RandomAccessSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(
        &self,
        offset: u64,
        length: usize,
    ) -> Pin<Box<dyn Future<Output = io::Result<Bytes>> + Send + '_>> {
        let path = self.path.clone();
        Box::pin(async move {
            let mut file = tokio::fs::File::open(&path).await?;
            file.seek(SeekFrom::Start(offset)).await?;
            let mut buf = BytesMut::with_capacity(length);
            while buf.len() < length {
                let n = file.read_buf(&mut buf).await?;
                if n == 0 {
                    break;
                }
            }
            buf.truncate(length);
            Ok(buf.freeze())
        })
    }
}

struct ReaderSource<R> {
    reader: R,
    len_hint: Option<u64>,
}

impl<R> SequentialSource for ReaderSource<R>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    fn len_hint(&self) -> Option<u64> {
        self.len_hint
    }

    fn read_next(
        &mut self,
        length: usize,
    ) -> Pin<Box<dyn Future<Output = io::Result<Bytes>> + Send + '_>> {
        Box::pin(async move {
            let mut buf = BytesMut::with_capacity(length);
            while buf.len() < length {
                let n = (&mut self.reader).read_buf(&mut buf).await?;
                if n == 0 {
                    break;
                }
            }
            buf.truncate(length);
            Ok(buf.freeze())
        })
    }
}

/// Reads exactly `want` bytes from a sequential source, or fewer at end
/// of stream.
pub(crate) async fn read_full(
    source: &mut Box<dyn SequentialSource>,
    want: usize,
) -> io::Result<Bytes> {
    let mut buf = BytesMut::with_capacity(want);
    while buf.len() < want {
        let chunk = source.read_next(want - buf.len()).await?;
        if chunk.is_empty() {
            break;
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}
