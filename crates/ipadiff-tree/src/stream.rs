//! Chunked streaming for large files

use std::io::{ErrorKind, Read, Result as IoResult};

/// Default chunk size (64KB)
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Reads a stream in fixed-size chunks, tracking the global offset
///
/// Every chunk except the last is exactly `chunk_size` bytes long, so two
/// readers over equal-length streams stay aligned chunk for chunk.
pub struct ChunkedReader<R> {
    inner: R,
    buffer: Vec<u8>,
    offset: u64,
    finished: bool,
}

impl<R: Read> ChunkedReader<R> {
    /// Create a new chunked reader; a zero chunk size falls back to the default
    pub fn new(reader: R, chunk_size: usize) -> Self {
        let chunk_size = if chunk_size == 0 { DEFAULT_CHUNK_SIZE } else { chunk_size };
        Self {
            inner: reader,
            buffer: vec![0; chunk_size],
            offset: 0,
            finished: false,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.buffer.len()
    }

    /// Read the next chunk along with its starting offset
    /// Returns None once the stream is exhausted
    pub fn next_chunk(&mut self) -> IoResult<Option<(u64, &[u8])>> {
        if self.finished {
            return Ok(None);
        }

        let mut total_read = 0;
        while total_read < self.buffer.len() {
            match self.inner.read(&mut self.buffer[total_read..]) {
                Ok(0) => {
                    self.finished = true;
                    break;
                }
                Ok(n) => total_read += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        if total_read == 0 {
            return Ok(None);
        }

        let start = self.offset;
        self.offset += total_read as u64;
        Ok(Some((start, &self.buffer[..total_read])))
    }
}
