//! Zip central directory entries

use super::CompressionMethod;

/// Host system value for Unix in the "version made by" field
const HOST_UNIX: u16 = 3;

/// File type bits of a Unix mode
const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

/// A single entry of the central directory
#[derive(Debug, Clone)]
pub struct ZipEntry {
    /// Raw entry name as stored in the archive
    pub name: String,
    /// Compression method used
    pub compression: CompressionMethod,
    /// CRC32 checksum of uncompressed data
    pub crc32: u32,
    /// Size of compressed data
    pub compressed_size: u64,
    /// Size of uncompressed data
    pub uncompressed_size: u64,
    /// Offset to local file header
    pub local_header_offset: u64,
    /// General purpose bit flags
    pub flags: u16,
    /// "Version made by" (host system in the high byte)
    pub version_made_by: u16,
    /// External attributes (Unix mode in the high 16 bits)
    pub external_attrs: u32,
}

impl ZipEntry {
    /// Whether the entry names a directory
    pub fn is_directory(&self) -> bool {
        self.name.ends_with('/')
    }

    /// Whether the entry is encrypted (traditional or strong encryption)
    pub fn is_encrypted(&self) -> bool {
        self.flags & 0x01 != 0
    }

    /// Unix permission and type bits, when the archive was made on Unix
    pub fn unix_mode(&self) -> Option<u32> {
        if self.version_made_by >> 8 == HOST_UNIX {
            Some(self.external_attrs >> 16)
        } else {
            None
        }
    }

    /// Whether the entry stores a symbolic link (its data is the target)
    pub fn is_symlink(&self) -> bool {
        self.unix_mode().is_some_and(|mode| mode & S_IFMT == S_IFLNK)
    }

    /// Get the filename without path
    pub fn filename(&self) -> &str {
        let name = self.name.trim_end_matches('/');
        name.rsplit('/').next().unwrap_or(name)
    }
}
