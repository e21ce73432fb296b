//! Zip container reader
//!
//! Application packages are plain zip files. The reader locates the end of
//! central directory record, follows the ZIP64 records when counts or offsets
//! overflow, and reads entry data through each local header.
//!
//! # Format Structure
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! |                         Zip Archive                         |
//! ├─────────────────────────────────────────────────────────────┤
//! │  Local header + data        (per entry, PK\x03\x04)         │
//! │  Central directory entries  (per entry, PK\x01\x02)         │
//! │  ZIP64 end record + locator (optional)                      │
//! │  End of central directory   (PK\x05\x06, then comment)      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod archive;
pub mod compression;
mod entry;

pub use archive::ZipArchive;
pub use entry::ZipEntry;

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use ipadiff_core::Error;
use thiserror::Error;

/// Local file header signature
const LOCAL_HEADER_SIGNATURE: u32 = 0x04034B50;

/// Central directory file header signature
const CD_SIGNATURE: u32 = 0x02014B50;

/// End of central directory signature
const EOCD_SIGNATURE: u32 = 0x06054B50;

/// ZIP64 end of central directory record signature
const ZIP64_EOCD_SIGNATURE: u32 = 0x06064B50;

/// ZIP64 end of central directory locator signature
const ZIP64_EOCD_LOCATOR_SIGNATURE: u32 = 0x07064B50;

/// ZIP64 extended information extra field id
const ZIP64_EXTRA_ID: u16 = 0x0001;

/// Fixed part of the end of central directory record
const EOCD_SIZE: u64 = 22;

/// Largest trailing comment allowed after the EOCD record
const MAX_COMMENT: u64 = 65535;

/// Fixed part of a local file header
const LOCAL_HEADER_SIZE: u64 = 30;

/// Compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Store,
    Deflate,
    Zstd,
    Unknown(u16),
}

impl From<u16> for CompressionMethod {
    fn from(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Store,
            8 => CompressionMethod::Deflate,
            93 => CompressionMethod::Zstd,
            other => CompressionMethod::Unknown(other),
        }
    }
}

/// Errors specific to the zip container
#[derive(Error, Debug)]
pub enum ZipError {
    #[error("Read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid signature: expected {expected:#010x}, found {found:#010x}")]
    InvalidSignature { expected: u32, found: u32 },

    #[error("End of central directory record not found")]
    MissingEndOfCentralDirectory,

    #[error("Unsupported compression method: {0}")]
    UnsupportedMethod(u16),

    #[error("Entry is encrypted: {0}")]
    Encrypted(String),

    #[error("{0}")]
    Decompression(String),

    #[error("CRC mismatch for {name}: expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },

    #[error("Unsafe entry name: {0}")]
    UnsafeName(String),

    #[error("Entry index out of range: {0}")]
    NoSuchEntry(usize),

    #[error("Entry {name} extends past the central directory ({end} > {limit})")]
    EntryOutOfBounds { name: String, end: u64, limit: u64 },

    #[error("Entry {0} is truncated")]
    Truncated(String),
}

impl ZipError {
    /// Attach the archive location, producing the workspace error
    pub fn into_error(self, archive: &Path) -> Error {
        Error::archive_corrupt(archive, self.to_string())
    }
}

/// Zip reader over any seekable source
pub struct ZipReader<R> {
    reader: R,
    archive: ZipArchive,
}

impl<R: Read + Seek> ZipReader<R> {
    /// Parse the central directory of `reader`
    pub fn new(mut reader: R) -> Result<Self, ZipError> {
        // Non-empty archives start with a local header; empty ones are a bare EOCD
        let found = reader.read_u32::<LittleEndian>()?;
        if found != LOCAL_HEADER_SIGNATURE && found != EOCD_SIGNATURE {
            return Err(ZipError::InvalidSignature {
                expected: LOCAL_HEADER_SIGNATURE,
                found,
            });
        }

        let eocd = parse_eocd(&mut reader)?;
        let entries = parse_central_directory(&mut reader, &eocd)?;

        Ok(Self {
            reader,
            archive: ZipArchive::from_entries(entries),
        })
    }

    /// Central directory contents
    pub fn archive(&self) -> &ZipArchive {
        &self.archive
    }

    pub fn len(&self) -> usize {
        self.archive.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.entries.is_empty()
    }

    /// Read, decompress and verify the data of entry `index`
    pub fn read_entry(&mut self, index: usize) -> Result<Vec<u8>, ZipError> {
        let entry = self
            .archive
            .entries
            .get(index)
            .cloned()
            .ok_or(ZipError::NoSuchEntry(index))?;

        if entry.is_encrypted() {
            return Err(ZipError::Encrypted(entry.name));
        }
        if let CompressionMethod::Unknown(method) = entry.compression {
            return Err(ZipError::UnsupportedMethod(method));
        }

        self.reader.seek(SeekFrom::Start(entry.local_header_offset))?;

        let sig = self.reader.read_u32::<LittleEndian>()?;
        if sig != LOCAL_HEADER_SIGNATURE {
            return Err(ZipError::InvalidSignature {
                expected: LOCAL_HEADER_SIGNATURE,
                found: sig,
            });
        }

        // version, flags, method, time, date, crc, sizes: 22 bytes
        self.reader.seek(SeekFrom::Current(22))?;
        let name_len = self.reader.read_u16::<LittleEndian>()? as i64;
        let extra_len = self.reader.read_u16::<LittleEndian>()? as i64;

        // Skip to data
        self.reader.seek(SeekFrom::Current(name_len + extra_len))?;

        let mut compressed = Vec::new();
        (&mut self.reader)
            .take(entry.compressed_size)
            .read_to_end(&mut compressed)?;
        if compressed.len() as u64 != entry.compressed_size {
            return Err(ZipError::Truncated(entry.name));
        }

        let data = compression::decompress(
            &compressed,
            entry.compression,
            entry.uncompressed_size,
        )?;

        let actual = compression::crc32(&data);
        if actual != entry.crc32 {
            return Err(ZipError::CrcMismatch {
                name: entry.name,
                expected: entry.crc32,
                actual,
            });
        }

        Ok(data)
    }
}

/// End of Central Directory record
#[derive(Debug)]
struct EndOfCentralDirectory {
    total_entries: u64,
    cd_offset: u64,
    archive_len: u64,
}

/// Parse the end of central directory record
fn parse_eocd<R: Read + Seek>(reader: &mut R) -> Result<EndOfCentralDirectory, ZipError> {
    // Seek to end and search backwards for EOCD signature
    let file_size = reader.seek(SeekFrom::End(0))?;
    if file_size < EOCD_SIZE {
        return Err(ZipError::MissingEndOfCentralDirectory);
    }

    let search_start = file_size.saturating_sub(MAX_COMMENT + EOCD_SIZE);
    reader.seek(SeekFrom::Start(search_start))?;

    let mut buffer = vec![0u8; (file_size - search_start) as usize];
    reader.read_exact(&mut buffer)?;

    let sig_bytes = EOCD_SIGNATURE.to_le_bytes();
    let eocd_offset = buffer
        .windows(4)
        .rposition(|w| w == sig_bytes)
        .ok_or(ZipError::MissingEndOfCentralDirectory)?;

    let eocd_abs_offset = search_start + eocd_offset as u64;
    reader.seek(SeekFrom::Start(eocd_abs_offset + 4))?;

    let _disk_number = reader.read_u16::<LittleEndian>()?;
    let _cd_disk = reader.read_u16::<LittleEndian>()?;
    let _disk_entries = reader.read_u16::<LittleEndian>()?;
    let total_entries = reader.read_u16::<LittleEndian>()?;
    let _cd_size = reader.read_u32::<LittleEndian>()?;
    let cd_offset = reader.read_u32::<LittleEndian>()?;

    // Check for ZIP64
    let (cd_offset, total_entries) = if cd_offset == u32::MAX || total_entries == u16::MAX {
        parse_zip64_eocd(reader, eocd_abs_offset)?
    } else {
        (cd_offset as u64, total_entries as u64)
    };

    if cd_offset > eocd_abs_offset {
        return Err(ZipError::EntryOutOfBounds {
            name: "central directory".into(),
            end: cd_offset,
            limit: eocd_abs_offset,
        });
    }

    Ok(EndOfCentralDirectory {
        total_entries,
        cd_offset,
        archive_len: file_size,
    })
}

/// Parse ZIP64 end of central directory, returning (cd offset, entry count)
fn parse_zip64_eocd<R: Read + Seek>(
    reader: &mut R,
    eocd_offset: u64,
) -> Result<(u64, u64), ZipError> {
    // The locator sits immediately before the EOCD
    let locator_offset = eocd_offset
        .checked_sub(20)
        .ok_or(ZipError::MissingEndOfCentralDirectory)?;
    reader.seek(SeekFrom::Start(locator_offset))?;

    let sig = reader.read_u32::<LittleEndian>()?;
    if sig != ZIP64_EOCD_LOCATOR_SIGNATURE {
        return Err(ZipError::InvalidSignature {
            expected: ZIP64_EOCD_LOCATOR_SIGNATURE,
            found: sig,
        });
    }

    let _disk = reader.read_u32::<LittleEndian>()?;
    let zip64_eocd_offset = reader.read_u64::<LittleEndian>()?;

    reader.seek(SeekFrom::Start(zip64_eocd_offset))?;

    let sig = reader.read_u32::<LittleEndian>()?;
    if sig != ZIP64_EOCD_SIGNATURE {
        return Err(ZipError::InvalidSignature {
            expected: ZIP64_EOCD_SIGNATURE,
            found: sig,
        });
    }

    // record size, versions, disk numbers, entries on this disk: 28 bytes
    reader.seek(SeekFrom::Current(28))?;
    let total_entries = reader.read_u64::<LittleEndian>()?;
    let _cd_size = reader.read_u64::<LittleEndian>()?;
    let cd_offset = reader.read_u64::<LittleEndian>()?;

    Ok((cd_offset, total_entries))
}

/// Parse central directory entries
fn parse_central_directory<R: Read + Seek>(
    reader: &mut R,
    eocd: &EndOfCentralDirectory,
) -> Result<Vec<ZipEntry>, ZipError> {
    reader.seek(SeekFrom::Start(eocd.cd_offset))?;

    // The count comes from the file; don't trust it for preallocation
    let mut entries = Vec::with_capacity(eocd.total_entries.min(4096) as usize);

    for _ in 0..eocd.total_entries {
        let entry = parse_cd_entry(reader)?;
        check_bounds(&entry, eocd)?;
        entries.push(entry);
    }

    Ok(entries)
}

/// Entry data must sit between the start of the file and the central directory
fn check_bounds(entry: &ZipEntry, eocd: &EndOfCentralDirectory) -> Result<(), ZipError> {
    let limit = eocd.cd_offset.min(eocd.archive_len);
    let end = entry
        .local_header_offset
        .checked_add(LOCAL_HEADER_SIZE)
        .and_then(|n| n.checked_add(entry.compressed_size))
        .unwrap_or(u64::MAX);

    if end > limit {
        return Err(ZipError::EntryOutOfBounds {
            name: entry.name.clone(),
            end,
            limit,
        });
    }
    Ok(())
}

/// Parse a single central directory entry
fn parse_cd_entry<R: Read + Seek>(reader: &mut R) -> Result<ZipEntry, ZipError> {
    let sig = reader.read_u32::<LittleEndian>()?;
    if sig != CD_SIGNATURE {
        return Err(ZipError::InvalidSignature {
            expected: CD_SIGNATURE,
            found: sig,
        });
    }

    let version_made_by = reader.read_u16::<LittleEndian>()?;
    let _version_needed = reader.read_u16::<LittleEndian>()?;
    let flags = reader.read_u16::<LittleEndian>()?;
    let compression = CompressionMethod::from(reader.read_u16::<LittleEndian>()?);
    let _mod_time = reader.read_u16::<LittleEndian>()?;
    let _mod_date = reader.read_u16::<LittleEndian>()?;
    let crc32 = reader.read_u32::<LittleEndian>()?;
    let compressed_size = reader.read_u32::<LittleEndian>()?;
    let uncompressed_size = reader.read_u32::<LittleEndian>()?;
    let name_length = reader.read_u16::<LittleEndian>()? as usize;
    let extra_length = reader.read_u16::<LittleEndian>()? as usize;
    let comment_length = reader.read_u16::<LittleEndian>()? as i64;
    let _disk_start = reader.read_u16::<LittleEndian>()?;
    let _internal_attrs = reader.read_u16::<LittleEndian>()?;
    let external_attrs = reader.read_u32::<LittleEndian>()?;
    let local_header_offset = reader.read_u32::<LittleEndian>()?;

    let mut name_bytes = vec![0u8; name_length];
    reader.read_exact(&mut name_bytes)?;
    let name = String::from_utf8_lossy(&name_bytes).into_owned();

    let mut extra = vec![0u8; extra_length];
    reader.read_exact(&mut extra)?;

    let (compressed_size, uncompressed_size, local_header_offset) =
        parse_zip64_extra(&extra, compressed_size, uncompressed_size, local_header_offset);

    // Skip comment
    reader.seek(SeekFrom::Current(comment_length))?;

    Ok(ZipEntry {
        name,
        compression,
        crc32,
        compressed_size,
        uncompressed_size,
        local_header_offset,
        flags,
        version_made_by,
        external_attrs,
    })
}

/// Widen sizes and offset from the ZIP64 extra field when they overflowed
///
/// Only the fields whose 32-bit value is saturated are present, in the order
/// uncompressed size, compressed size, local header offset.
fn parse_zip64_extra(
    extra: &[u8],
    compressed_size: u32,
    uncompressed_size: u32,
    local_offset: u32,
) -> (u64, u64, u64) {
    let mut compressed = compressed_size as u64;
    let mut uncompressed = uncompressed_size as u64;
    let mut offset = local_offset as u64;

    let mut fields = extra;
    while fields.len() >= 4 {
        let id = u16::from_le_bytes([fields[0], fields[1]]);
        let size = u16::from_le_bytes([fields[2], fields[3]]) as usize;
        let Some(body) = fields.get(4..4 + size) else {
            break;
        };

        if id == ZIP64_EXTRA_ID {
            let mut values = body.chunks_exact(8).map(|chunk| {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(chunk);
                u64::from_le_bytes(bytes)
            });

            if uncompressed_size == u32::MAX {
                uncompressed = values.next().unwrap_or(uncompressed);
            }
            if compressed_size == u32::MAX {
                compressed = values.next().unwrap_or(compressed);
            }
            if local_offset == u32::MAX {
                offset = values.next().unwrap_or(offset);
            }
            break;
        }

        fields = &fields[4 + size..];
    }

    (compressed, uncompressed, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_method_conversion() {
        assert_eq!(CompressionMethod::from(0), CompressionMethod::Store);
        assert_eq!(CompressionMethod::from(8), CompressionMethod::Deflate);
        assert_eq!(CompressionMethod::from(93), CompressionMethod::Zstd);
        assert_eq!(CompressionMethod::from(99), CompressionMethod::Unknown(99));
    }

    #[test]
    fn test_zip64_extra_only_widens_saturated_fields() {
        let mut extra = Vec::new();
        extra.extend_from_slice(&ZIP64_EXTRA_ID.to_le_bytes());
        extra.extend_from_slice(&16u16.to_le_bytes());
        extra.extend_from_slice(&0x1_0000_0000u64.to_le_bytes());
        extra.extend_from_slice(&0x2_0000_0000u64.to_le_bytes());

        let (compressed, uncompressed, offset) =
            parse_zip64_extra(&extra, 10, u32::MAX, u32::MAX);
        assert_eq!(compressed, 10);
        assert_eq!(uncompressed, 0x1_0000_0000);
        assert_eq!(offset, 0x2_0000_0000);
    }

    #[test]
    fn test_zip64_extra_skips_other_fields() {
        let mut extra = Vec::new();
        // Extended timestamp field, ignored
        extra.extend_from_slice(&0x5455u16.to_le_bytes());
        extra.extend_from_slice(&5u16.to_le_bytes());
        extra.extend_from_slice(&[1, 0, 0, 0, 0]);
        extra.extend_from_slice(&ZIP64_EXTRA_ID.to_le_bytes());
        extra.extend_from_slice(&8u16.to_le_bytes());
        extra.extend_from_slice(&42u64.to_le_bytes());

        let (compressed, uncompressed, offset) = parse_zip64_extra(&extra, u32::MAX, 7, 3);
        assert_eq!((compressed, uncompressed, offset), (42, 7, 3));
    }

    #[test]
    fn test_rejects_non_zip() {
        let err = ZipReader::new(std::io::Cursor::new(b"not a zip file at all".to_vec()))
            .err()
            .unwrap();
        assert!(matches!(err, ZipError::InvalidSignature { .. }));
    }
}
