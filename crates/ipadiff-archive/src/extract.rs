//! Package extraction
//!
//! Unpacks an application package into a private scratch directory and
//! locates the application bundle inside its payload directory.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use ipadiff_core::{Error, Result, ResultExt};
use ipadiff_tree::path::glob_match;
use tempfile::TempDir;
use tracing::{debug, trace};

use crate::zip::{ZipError, ZipReader};

/// Turns a package file into a directory tree on disk
pub trait ArchiveExtractor: Send + Sync {
    /// Extract `archive` into a fresh working directory
    fn extract(&self, archive: &Path) -> Result<ExtractedPackage>;
}

/// An extracted package; the working directory is removed on drop
#[derive(Debug)]
pub struct ExtractedPackage {
    archive: PathBuf,
    workdir: TempDir,
}

impl ExtractedPackage {
    /// Wrap an already populated working directory
    pub fn new(archive: impl Into<PathBuf>, workdir: TempDir) -> Self {
        Self {
            archive: archive.into(),
            workdir,
        }
    }

    /// Package file this tree came from
    pub fn archive(&self) -> &Path {
        &self.archive
    }

    /// Root of the extracted tree
    pub fn root(&self) -> &Path {
        self.workdir.path()
    }

    /// The single application bundle under `payload_dir`
    pub fn locate_bundle(&self, payload_dir: &str, pattern: &str) -> Result<PathBuf> {
        locate_bundle(self.root(), payload_dir, pattern)
    }
}

/// Extracts zip-based packages (`.ipa`)
#[derive(Debug, Clone, Default)]
pub struct ZipExtractor {
    scratch_dir: Option<PathBuf>,
}

impl ZipExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create working directories under `dir` instead of the system temp dir
    pub fn with_scratch_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: Some(dir.into()),
        }
    }

    fn workdir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("ipadiff-");

        let dir = match &self.scratch_dir {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        };

        dir.map_err(Error::from)
            .context("creating extraction directory")
    }
}

impl ArchiveExtractor for ZipExtractor {
    fn extract(&self, archive: &Path) -> Result<ExtractedPackage> {
        if !archive.is_file() {
            return Err(Error::NotFound(archive.to_path_buf()));
        }

        let file = File::open(archive)?;
        let mut reader = ZipReader::new(BufReader::new(file)).map_err(|e| e.into_error(archive))?;

        let workdir = self.workdir()?;
        let root = workdir.path();

        debug!(
            archive = %archive.display(),
            entries = reader.len(),
            workdir = %root.display(),
            "Extracting package"
        );

        for index in 0..reader.len() {
            let entry = reader.archive().entries[index].clone();
            let relative = sanitize_name(&entry.name).map_err(|e| e.into_error(archive))?;

            let Some(relative) = relative else {
                continue;
            };
            let target = root.join(&relative);

            if entry.is_directory() {
                fs::create_dir_all(&target)
                    .map_err(Error::from)
                    .with_context(|| format!("creating {}", target.display()))?;
                continue;
            }

            let data = reader.read_entry(index).map_err(|e| e.into_error(archive))?;

            if entry.is_symlink() {
                trace!(entry = %entry.name, "Writing symlink as regular file");
            }

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .map_err(Error::from)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            fs::write(&target, &data)
                .map_err(Error::from)
                .with_context(|| format!("writing {}", target.display()))?;
        }

        Ok(ExtractedPackage::new(archive, workdir))
    }
}

/// Map an entry name to a relative path that stays inside the working directory
///
/// Returns `None` for names that denote the root itself.
fn sanitize_name(name: &str) -> std::result::Result<Option<PathBuf>, ZipError> {
    if name.starts_with('/') || name.contains('\\') || name.contains('\0') {
        return Err(ZipError::UnsafeName(name.to_string()));
    }

    let mut path = PathBuf::new();
    for component in name.split('/') {
        match component {
            "" | "." => continue,
            ".." => return Err(ZipError::UnsafeName(name.to_string())),
            // Drive prefixes such as `C:` would make the join absolute on Windows
            c if c.contains(':') && cfg!(windows) => {
                return Err(ZipError::UnsafeName(name.to_string()));
            }
            c => path.push(c),
        }
    }

    Ok((!path.as_os_str().is_empty()).then_some(path))
}

/// Find the one directory under `root/payload_dir` whose name matches `pattern`
pub fn locate_bundle(root: &Path, payload_dir: &str, pattern: &str) -> Result<PathBuf> {
    let payload = root.join(payload_dir);

    let not_found = |found: Vec<String>| Error::BundleNotFound {
        root: payload.clone(),
        pattern: pattern.to_string(),
        found,
    };

    if !payload.is_dir() {
        return Err(not_found(Vec::new()));
    }

    let mut found = Vec::new();
    for entry in fs::read_dir(&payload)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_dir() && glob_match(pattern, &name) {
            found.push(name);
        }
    }
    found.sort();

    match found.as_slice() {
        [single] => {
            let bundle = payload.join(single);
            debug!(bundle = %bundle.display(), "Located application bundle");
            Ok(bundle)
        }
        _ => Err(not_found(found)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(
            sanitize_name("Payload/App.app/Info.plist").unwrap(),
            Some(PathBuf::from("Payload/App.app/Info.plist"))
        );
        assert_eq!(sanitize_name("./Payload//App.app/").unwrap(), Some(PathBuf::from("Payload/App.app")));
        assert_eq!(sanitize_name("./").unwrap(), None);
    }

    #[test]
    fn test_sanitize_rejects_escapes() {
        assert!(sanitize_name("/etc/passwd").is_err());
        assert!(sanitize_name("Payload/../../evil").is_err());
        assert!(sanitize_name("Payload\\App.app").is_err());
    }

    #[test]
    fn test_locate_bundle_single() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Payload/Runner.app")).unwrap();
        fs::write(dir.path().join("Payload/notes.app"), b"file, not a bundle").unwrap();

        let bundle = locate_bundle(dir.path(), "Payload", "*.app").unwrap();
        assert_eq!(bundle, dir.path().join("Payload/Runner.app"));
    }

    #[test]
    fn test_locate_bundle_ambiguous() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Payload/A.app")).unwrap();
        fs::create_dir_all(dir.path().join("Payload/B.app")).unwrap();

        match locate_bundle(dir.path(), "Payload", "*.app").unwrap_err() {
            Error::BundleNotFound { found, .. } => assert_eq!(found, vec!["A.app", "B.app"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_locate_bundle_missing_payload() {
        let dir = tempfile::tempdir().unwrap();
        let err = locate_bundle(dir.path(), "Payload", "*.app").unwrap_err();
        assert!(matches!(err, Error::BundleNotFound { ref found, .. } if found.is_empty()));
    }
}
