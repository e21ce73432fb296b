//! Minimal zip writer for building packages in tests and benchmarks
//!
//! Entries are written in order with a single central directory at the end.
//! No ZIP64 support; fixtures stay small.

use std::io::{self, Write};
use std::path::Path;

/// Unix (3) host, spec version 3.0
const VERSION_MADE_BY: u16 = 0x031E;
const VERSION_NEEDED: u16 = 20;

/// 1980-01-01 in DOS date format
const DOS_DATE: u16 = 0x0021;

const MODE_DIR: u32 = 0o040755;
const MODE_FILE: u32 = 0o100644;
const MODE_SYMLINK: u32 = 0o120777;

/// MS-DOS directory attribute
const DOS_DIR_ATTR: u32 = 0x10;

/// Builds a zip archive in memory
#[derive(Debug, Default)]
pub struct ZipWriter {
    body: Vec<u8>,
    central: Vec<u8>,
    count: u16,
    /// Local header and central entry offsets of the most recent entry
    last: Option<(usize, usize)>,
}

impl ZipWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory entry (a trailing `/` is added when missing)
    pub fn directory(self, name: &str) -> Self {
        let name = if name.ends_with('/') {
            name.to_string()
        } else {
            format!("{}/", name)
        };
        self.push(&name, 0, 0, &[], &[], (MODE_DIR << 16) | DOS_DIR_ATTR)
    }

    /// Add a stored (uncompressed) file
    pub fn file(self, name: &str, data: &[u8]) -> Self {
        self.push(name, 0, 0, data, data, MODE_FILE << 16)
    }

    /// Add a deflate-compressed file
    pub fn deflated(self, name: &str, data: &[u8]) -> io::Result<Self> {
        let mut encoder =
            flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data)?;
        let compressed = encoder.finish()?;
        Ok(self.push(name, 8, 0, data, &compressed, MODE_FILE << 16))
    }

    /// Add a symbolic link whose data is `target`
    pub fn symlink(self, name: &str, target: &str) -> Self {
        let target = target.as_bytes();
        self.push(name, 0, 0, target, target, MODE_SYMLINK << 16)
    }

    /// Add a stored file flagged as encrypted
    pub fn encrypted(self, name: &str, data: &[u8]) -> Self {
        self.push(name, 0, 0x0001, data, data, MODE_FILE << 16)
    }

    /// Add a stored file whose recorded checksum is wrong
    pub fn corrupted(self, name: &str, data: &[u8]) -> Self {
        let mut writer = self.push(name, 0, 0, data, data, MODE_FILE << 16);
        // CRC sits 14 bytes into the local header and 16 into the central entry
        if let Some((local, central)) = writer.last {
            flip_crc(&mut writer.body, local + 14);
            flip_crc(&mut writer.central, central + 16);
        }
        writer
    }

    /// Finish the archive and return its bytes
    pub fn finish(self) -> Vec<u8> {
        let Self { mut body, central, count, .. } = self;

        let cd_offset = body.len() as u32;
        let cd_size = central.len() as u32;
        body.extend_from_slice(&central);

        body.extend_from_slice(&0x06054B50u32.to_le_bytes());
        body.extend_from_slice(&0u16.to_le_bytes());
        body.extend_from_slice(&0u16.to_le_bytes());
        body.extend_from_slice(&count.to_le_bytes());
        body.extend_from_slice(&count.to_le_bytes());
        body.extend_from_slice(&cd_size.to_le_bytes());
        body.extend_from_slice(&cd_offset.to_le_bytes());
        body.extend_from_slice(&0u16.to_le_bytes());
        body
    }

    /// Finish the archive and write it to `path`
    pub fn write_to(self, path: impl AsRef<Path>) -> io::Result<()> {
        std::fs::write(path, self.finish())
    }

    fn push(
        mut self,
        name: &str,
        method: u16,
        flags: u16,
        data: &[u8],
        stored: &[u8],
        external_attrs: u32,
    ) -> Self {
        let crc = {
            let mut hasher = crc32fast::Hasher::new();
            hasher.update(data);
            hasher.finalize()
        };
        let offset = self.body.len() as u32;
        let central_start = self.central.len();
        let name_bytes = name.as_bytes();

        let body = &mut self.body;
        body.extend_from_slice(&0x04034B50u32.to_le_bytes());
        body.extend_from_slice(&VERSION_NEEDED.to_le_bytes());
        body.extend_from_slice(&flags.to_le_bytes());
        body.extend_from_slice(&method.to_le_bytes());
        body.extend_from_slice(&0u16.to_le_bytes());
        body.extend_from_slice(&DOS_DATE.to_le_bytes());
        body.extend_from_slice(&crc.to_le_bytes());
        body.extend_from_slice(&(stored.len() as u32).to_le_bytes());
        body.extend_from_slice(&(data.len() as u32).to_le_bytes());
        body.extend_from_slice(&(name_bytes.len() as u16).to_le_bytes());
        body.extend_from_slice(&0u16.to_le_bytes());
        body.extend_from_slice(name_bytes);
        body.extend_from_slice(stored);

        let central = &mut self.central;
        central.extend_from_slice(&0x02014B50u32.to_le_bytes());
        central.extend_from_slice(&VERSION_MADE_BY.to_le_bytes());
        central.extend_from_slice(&VERSION_NEEDED.to_le_bytes());
        central.extend_from_slice(&flags.to_le_bytes());
        central.extend_from_slice(&method.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&DOS_DATE.to_le_bytes());
        central.extend_from_slice(&crc.to_le_bytes());
        central.extend_from_slice(&(stored.len() as u32).to_le_bytes());
        central.extend_from_slice(&(data.len() as u32).to_le_bytes());
        central.extend_from_slice(&(name_bytes.len() as u16).to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&external_attrs.to_le_bytes());
        central.extend_from_slice(&offset.to_le_bytes());
        central.extend_from_slice(name_bytes);

        self.count += 1;
        self.last = Some((offset as usize, central_start));
        self
    }
}

fn flip_crc(buffer: &mut [u8], at: usize) {
    if let Some(byte) = buffer.get_mut(at) {
        *byte ^= 0xFF;
    }
}
