//! Decompression of zip entry data
//!
//! Supports the methods found in application packages:
//! - Store (no compression)
//! - Deflate (standard ZIP)
//! - Zstd (Zstandard)

use std::io::Read;

use super::{CompressionMethod, ZipError};

/// Upper bound on the DEFLATE expansion ratio, used to size output buffers
const MAX_DEFLATE_RATIO: usize = 1032;

/// Decompress data using the specified compression method
///
/// Output is never read past `expected_size + 1` bytes, so an entry that
/// lies about its size fails instead of exhausting memory.
pub fn decompress(
    data: &[u8],
    method: CompressionMethod,
    expected_size: u64,
) -> Result<Vec<u8>, ZipError> {
    let output = match method {
        CompressionMethod::Store => data.to_vec(),
        CompressionMethod::Deflate => {
            let decoder = flate2::read::DeflateDecoder::new(data);
            read_bounded(decoder, data.len(), expected_size)
                .map_err(|e| ZipError::Decompression(format!("DEFLATE decompression failed: {}", e)))?
        }
        CompressionMethod::Zstd => zstd::stream::read::Decoder::new(data)
            .and_then(|decoder| read_bounded(decoder, data.len(), expected_size))
            .map_err(|e| ZipError::Decompression(format!("ZSTD decompression failed: {}", e)))?,
        CompressionMethod::Unknown(method) => {
            return Err(ZipError::UnsupportedMethod(method));
        }
    };

    if output.len() as u64 != expected_size {
        return Err(ZipError::Decompression(format!(
            "{:?} size mismatch: expected {}, got {}",
            method,
            expected_size,
            output.len()
        )));
    }

    Ok(output)
}

fn read_bounded<R: Read>(decoder: R, input_len: usize, expected_size: u64) -> std::io::Result<Vec<u8>> {
    let capacity = usize::try_from(expected_size)
        .unwrap_or(usize::MAX)
        .min(input_len.saturating_mul(MAX_DEFLATE_RATIO));
    let mut output = Vec::with_capacity(capacity);
    decoder
        .take(expected_size.saturating_add(1))
        .read_to_end(&mut output)?;
    Ok(output)
}

/// Calculate CRC32 checksum
pub fn crc32(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}
