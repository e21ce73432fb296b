//! Scanning an application bundle into path sets

use std::path::{Component, Path, PathBuf};

use ipadiff_core::{Error, Result};
use tracing::debug;
use walkdir::WalkDir;

use crate::pathset::PathSet;
use crate::reconcile::TreeView;

/// Directory and file listing of one bundle, relative to its root
#[derive(Debug, Clone)]
pub struct PackageTree {
    root: PathBuf,
    /// Every directory below the root
    pub directories: PathSet,
    /// Every non-directory below the root (symlinks included, not followed)
    pub files: PathSet,
}

impl PackageTree {
    /// Walk `root` and record every entry below it
    pub fn scan(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();

        if !root.is_dir() {
            return Err(Error::NotFound(root.to_path_buf()));
        }

        let mut directories = PathSet::new();
        let mut files = PathSet::new();

        for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
            let entry = entry.map_err(std::io::Error::from)?;
            let relative = relative_path(root, entry.path())?;

            if entry.file_type().is_dir() {
                directories.insert(&relative);
            } else {
                files.insert(&relative);
            }
        }

        debug!(
            root = %root.display(),
            directories = directories.len(),
            files = files.len(),
            "Scanned package tree"
        );

        Ok(Self {
            root: root.to_path_buf(),
            directories,
            files,
        })
    }

    /// Absolute location of the bundle root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of a relative path inside this tree
    pub fn resolve(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .filter(|c| !c.is_empty())
            .fold(self.root.clone(), |acc, c| acc.join(c))
    }

    /// Borrowed view for reconciliation under a display label
    pub fn view<'a>(&'a self, label: &'a str) -> TreeView<'a> {
        TreeView::new(label, &self.directories, &self.files)
    }
}

fn relative_path(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| Error::internal(format!("{} is outside {}", path.display(), root.display())))?;

    let parts: Vec<_> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    Ok(parts.join("/"))
}
