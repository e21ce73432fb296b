//! In-process collaborators

use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use goblin::mach::fat::FAT_MAGIC;
use goblin::mach::header::{MH_CIGAM, MH_CIGAM_64, MH_MAGIC, MH_MAGIC_64};
use goblin::mach::load_command::CommandVariant;
use goblin::mach::{Mach, MachO};
use ipadiff_core::{Error, Result};
use plist::{Dictionary, Value};

use super::{BinaryFormat, FormatDetector, PlistNormalizer};

/// Fat headers list at most a handful of architectures; Java class files
/// share the magic but carry a version number here instead
const MAX_FAT_ARCHES: u32 = 30;

/// Mach-O detection with goblin
#[derive(Debug, Clone, Copy, Default)]
pub struct MachODetector;

impl FormatDetector for MachODetector {
    fn name(&self) -> &str {
        "goblin"
    }

    fn detect(&self, path: &Path) -> Result<BinaryFormat> {
        let mut file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;

        let mut header = [0u8; 8];
        match file.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(BinaryFormat::OTHER),
            Err(e) => return Err(e.into()),
        }
        if !has_mach_magic(&header) {
            return Ok(BinaryFormat::OTHER);
        }

        let bytes = fs::read(path)?;
        inspect(&bytes).map_err(|reason| Error::ClassificationAmbiguous {
            path: path.to_path_buf(),
            reason,
        })
    }
}

/// Whether the leading bytes carry a thin or fat Mach-O magic
fn has_mach_magic(bytes: &[u8]) -> bool {
    let Some(header) = bytes.get(..8) else {
        return false;
    };
    let magic = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);

    match magic {
        MH_MAGIC | MH_CIGAM | MH_MAGIC_64 | MH_CIGAM_64 => true,
        FAT_MAGIC => {
            let nfat_arch = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
            (1..=MAX_FAT_ARCHES).contains(&nfat_arch)
        }
        _ => false,
    }
}

fn inspect(bytes: &[u8]) -> std::result::Result<BinaryFormat, String> {
    if !has_mach_magic(bytes) {
        return Ok(BinaryFormat::OTHER);
    }

    match Mach::parse(bytes).map_err(|e| e.to_string())? {
        Mach::Binary(macho) => Ok(BinaryFormat::native(is_encrypted(&macho))),
        Mach::Fat(multi) => {
            let mut encrypted = false;

            for arch in multi.iter_arches() {
                let arch = arch.map_err(|e| e.to_string())?;
                let start = arch.offset as usize;
                let slice = start
                    .checked_add(arch.size as usize)
                    .and_then(|end| bytes.get(start..end))
                    .ok_or_else(|| format!("fat slice at {:#x} is out of bounds", arch.offset))?;

                let macho = MachO::parse(slice, 0).map_err(|e| e.to_string())?;
                encrypted |= is_encrypted(&macho);
            }

            Ok(BinaryFormat::native(encrypted))
        }
    }
}

fn is_encrypted(macho: &MachO<'_>) -> bool {
    macho.load_commands.iter().any(|lc| match &lc.command {
        CommandVariant::EncryptionInfo32(info) => info.cryptid != 0,
        CommandVariant::EncryptionInfo64(info) => info.cryptid != 0,
        _ => false,
    })
}

/// Property list normalization with the plist crate
///
/// Reads XML or binary input and writes XML with dictionary keys sorted, so
/// key order never causes a mismatch.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativePlistNormalizer;

impl PlistNormalizer for NativePlistNormalizer {
    fn name(&self) -> &str {
        "plist"
    }

    fn normalize(&self, path: &Path, keys_to_strip: &[String]) -> Result<String> {
        let failure = |e: plist::Error| Error::tool_failure("plist", format!("{}: {}", path.display(), e));

        let value = Value::from_file(path).map_err(failure)?;

        let value = match value {
            Value::Dictionary(mut dict) => {
                for key in keys_to_strip {
                    dict.remove(key);
                }
                Value::Dictionary(dict)
            }
            other => other,
        };

        let mut out = Vec::new();
        sorted(value).to_writer_xml(&mut out).map_err(failure)?;

        String::from_utf8(out).map_err(|e| Error::tool_failure("plist", e.to_string()))
    }
}

fn sorted(value: Value) -> Value {
    match value {
        Value::Dictionary(dict) => {
            let mut entries: Vec<(String, Value)> = dict.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Dictionary(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, sorted(value)))
                    .collect::<Dictionary>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sorted).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const LC_ENCRYPTION_INFO_64: u32 = 0x2C;

    /// Minimal 64-bit arm64 executable with one encryption info command
    fn thin_macho(cryptid: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        for word in [MH_MAGIC_64, 0x0100_000C, 0, 2, 1, 24, 0, 0] {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        for word in [LC_ENCRYPTION_INFO_64, 24, 0x4000, 0x1000, cryptid, 0] {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    fn write_plist(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let text = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n<plist version=\"1.0\">\n<dict>\n{}</dict>\n</plist>\n",
            body
        );
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_magic() {
        assert!(has_mach_magic(&thin_macho(0)));
        assert!(has_mach_magic(&[0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 2]));
        // Java class file, major version 52
        assert!(!has_mach_magic(&[0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 52]));
        assert!(!has_mach_magic(b"#!/bin/sh\n"));
        assert!(!has_mach_magic(b"\xcf\xfa"));
    }

    #[test]
    fn test_detect_encryption() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain");
        let crypted = dir.path().join("crypted");
        fs::write(&plain, thin_macho(0)).unwrap();
        fs::write(&crypted, thin_macho(1)).unwrap();

        assert_eq!(MachODetector.detect(&plain).unwrap(), BinaryFormat::native(false));
        assert_eq!(MachODetector.detect(&crypted).unwrap(), BinaryFormat::native(true));
    }

    #[test]
    fn test_detect_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().join("notes.txt");
        let empty = dir.path().join("empty");
        fs::write(&text, b"just some text that is long enough").unwrap();
        let stub = dir.path().join("stub");
        fs::write(&empty, b"").unwrap();
        fs::write(&stub, b"\xcf\xfa\xed\xfe").unwrap();

        assert_eq!(MachODetector.detect(&text).unwrap(), BinaryFormat::OTHER);
        assert_eq!(MachODetector.detect(&empty).unwrap(), BinaryFormat::OTHER);
        // Magic alone, shorter than a header
        assert_eq!(MachODetector.detect(&stub).unwrap(), BinaryFormat::OTHER);
    }

    #[test]
    fn test_truncated_macho_is_ambiguous() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("truncated");
        fs::write(&path, &thin_macho(0)[..40]).unwrap();

        let err = MachODetector.detect(&path).unwrap_err();
        assert!(matches!(err, Error::ClassificationAmbiguous { .. }));
        assert!(err.is_per_file());
    }

    #[test]
    fn test_normalize_strips_keys_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_plist(
            dir.path(),
            "a.plist",
            "<key>CFBundleVersion</key><string>41</string>\n<key>CFBundleName</key><string>App</string>\n<key>CFBundleIdentifier</key><string>com.example</string>\n",
        );
        let b = write_plist(
            dir.path(),
            "b.plist",
            "<key>CFBundleIdentifier</key><string>com.example</string>\n<key>CFBundleName</key><string>App</string>\n<key>CFBundleVersion</key><string>42</string>\n",
        );

        let keys = vec!["CFBundleVersion".to_string(), "MinimumOSVersion".to_string()];
        let left = NativePlistNormalizer.normalize(&a, &keys).unwrap();
        let right = NativePlistNormalizer.normalize(&b, &keys).unwrap();

        assert_eq!(left, right);
        assert!(!left.contains("CFBundleVersion"));
        assert!(left.contains("com.example"));
    }

    #[test]
    fn test_normalize_binary_matches_xml() {
        let dir = tempfile::tempdir().unwrap();
        let xml = write_plist(dir.path(), "xml.plist", "<key>Name</key><string>App</string>\n");

        let binary = dir.path().join("binary.plist");
        Value::from_file(&xml).unwrap().to_file_binary(&binary).unwrap();

        assert_eq!(
            NativePlistNormalizer.normalize(&xml, &[]).unwrap(),
            NativePlistNormalizer.normalize(&binary, &[]).unwrap()
        );
    }

    #[test]
    fn test_normalize_invalid_plist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.plist");
        fs::write(&path, b"<plist><dict><key>oops").unwrap();

        let err = NativePlistNormalizer.normalize(&path, &[]).unwrap_err();
        assert!(matches!(err, Error::ToolFailure { .. }));
    }
}
