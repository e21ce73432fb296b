//! Byte-level comparison
//!
//! Two streams are compared chunk by chunk. Sizes are checked first; only
//! equal-length streams are scanned, and every differing byte is recorded at
//! its offset from the start of the stream.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use ipadiff_core::{ComparisonResult, DiffEntry, DiffRecord, Error, MismatchReason, Result};
use ipadiff_tree::ChunkedReader;
use tracing::trace;

/// Outcome of a byte comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteComparison {
    pub result: ComparisonResult,
    /// Offset of the first differing byte (content mismatches only)
    pub first_difference: Option<u64>,
    /// Every differing byte; empty unless the result is a content mismatch
    pub diffs: DiffRecord,
}

impl ByteComparison {
    fn equal() -> Self {
        Self {
            result: ComparisonResult::Equal,
            first_difference: None,
            diffs: DiffRecord::new(),
        }
    }

    fn size_mismatch() -> Self {
        Self {
            result: ComparisonResult::NotEqual(MismatchReason::Size),
            first_difference: None,
            diffs: DiffRecord::new(),
        }
    }

    pub fn is_equal(&self) -> bool {
        self.result.is_equal()
    }

    /// Short verdict word: `identical`, `size` or `content`
    pub fn verdict(&self) -> &'static str {
        match self.result {
            ComparisonResult::NotEqual(reason) => reason.as_str(),
            _ => "identical",
        }
    }
}

/// Chunked byte comparator
#[derive(Debug, Clone, Copy)]
pub struct ByteComparator {
    chunk_size: usize,
}

impl ByteComparator {
    /// Create a comparator reading `chunk_size` bytes at a time
    pub fn new(chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::invalid_config("chunk size must be greater than zero"));
        }
        Ok(Self { chunk_size })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Compare two files on disk
    ///
    /// A path that is not a readable regular file is `NotFound`, never a
    /// mismatch.
    pub fn compare_files(&self, left: &Path, right: &Path) -> Result<ByteComparison> {
        for path in [left, right] {
            if !path.is_file() {
                return Err(Error::NotFound(path.to_path_buf()));
            }
        }

        let left_len = left.metadata()?.len();
        let right_len = right.metadata()?.len();

        let comparison = self.compare_readers(File::open(left)?, left_len, File::open(right)?, right_len)?;

        trace!(
            left = %left.display(),
            verdict = comparison.verdict(),
            differences = comparison.diffs.len(),
            "Compared bytes"
        );

        Ok(comparison)
    }

    /// Compare two streams of known length
    pub fn compare_readers<L: Read, R: Read>(
        &self,
        left: L,
        left_len: u64,
        right: R,
        right_len: u64,
    ) -> io::Result<ByteComparison> {
        if left_len != right_len {
            return Ok(ByteComparison::size_mismatch());
        }

        let mut left = ChunkedReader::new(left, self.chunk_size);
        let mut right = ChunkedReader::new(right, self.chunk_size);

        let mut first_difference = None;
        let mut diffs = DiffRecord::new();

        loop {
            match (left.next_chunk()?, right.next_chunk()?) {
                (Some((offset, a)), Some((_, b))) => {
                    // Streams grew or shrank while being read
                    if a.len() != b.len() {
                        return Ok(ByteComparison::size_mismatch());
                    }
                    if a == b {
                        continue;
                    }

                    for (i, (l, r)) in a.iter().zip(b).enumerate() {
                        if l != r {
                            let offset = offset + i as u64;
                            first_difference.get_or_insert(offset);
                            diffs.push(DiffEntry { offset, left: *l, right: *r });
                        }
                    }
                }
                (None, None) => break,
                _ => return Ok(ByteComparison::size_mismatch()),
            }
        }

        if diffs.is_empty() {
            Ok(ByteComparison::equal())
        } else {
            Ok(ByteComparison {
                result: ComparisonResult::NotEqual(MismatchReason::Content),
                first_difference,
                diffs,
            })
        }
    }
}
