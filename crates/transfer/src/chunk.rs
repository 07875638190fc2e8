//! Bounded-memory chunked file reading.

use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};

use crate::{DEFAULT_CHUNK_SIZE, TransferError};

/// Reads a file in fixed-size chunks without materializing it.
///
/// Holds at most one chunk's worth of bytes in memory per call. Read
/// faults (revoked handle, truncated file, I/O error) surface as
/// [`TransferError::Read`], which the send engine treats as fatal to
/// the current file.
pub struct ChunkReader {
    file: File,
    chunk_size: usize,
    offset: u64,
    file_size: u64,
}

impl ChunkReader {
    /// Opens `path` for chunked reading.
    ///
    /// If `chunk_size` is 0, [`DEFAULT_CHUNK_SIZE`] is used.
    pub async fn open(path: &Path, chunk_size: usize) -> Result<Self, TransferError> {
        let file = File::open(path).await?;
        let file_size = file.metadata().await?.len();
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Ok(Self {
            file,
            chunk_size,
            offset: 0,
            file_size,
        })
    }

    /// Reads at most `len` bytes starting at `offset`.
    ///
    /// The returned buffer is shorter than `len` only when the range
    /// extends past end of file. Subsequent [`next_chunk`] calls
    /// continue from the end of the returned range.
    ///
    /// [`next_chunk`]: Self::next_chunk
    pub async fn read_range(&mut self, offset: u64, len: usize) -> Result<Vec<u8>, TransferError> {
        self.file.seek(SeekFrom::Start(offset)).await?;
        // A range entirely past EOF reads as empty; keep the tracked
        // offset within the file so `remaining` stays meaningful.
        self.offset = offset.min(self.file_size);

        let remaining = self.file_size.saturating_sub(self.offset);
        let read_size = (remaining as usize).min(len);
        let mut buf = vec![0u8; read_size];
        self.file.read_exact(&mut buf).await?;
        self.offset += read_size as u64;
        Ok(buf)
    }

    /// Reads the next chunk. Returns `None` at end of file.
    pub async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, TransferError> {
        if self.offset >= self.file_size {
            return Ok(None);
        }
        let chunk = self.read_range(self.offset, self.chunk_size).await?;
        Ok(Some(chunk))
    }

    /// Current byte offset.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Total file size in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Bytes remaining to read.
    pub fn remaining(&self) -> u64 {
        self.file_size - self.offset
    }
}
