//! Tree reconciliation
//!
//! Two packages are only comparable when their directory and file sets are
//! identical. Anything else is a structural mismatch that ends the run before
//! any content is read.

use ipadiff_core::{Error, Result, TreeDiff};
use tracing::debug;

use crate::pathset::PathSet;

/// One side of a reconciliation
#[derive(Debug, Clone, Copy)]
pub struct TreeView<'a> {
    pub label: &'a str,
    pub directories: &'a PathSet,
    pub files: &'a PathSet,
}

impl<'a> TreeView<'a> {
    pub fn new(label: &'a str, directories: &'a PathSet, files: &'a PathSet) -> Self {
        Self { label, directories, files }
    }
}

/// Symmetric difference of both dimensions
pub fn reconcile(left: &TreeView<'_>, right: &TreeView<'_>) -> TreeDiff {
    let diff = TreeDiff {
        left_label: left.label.to_string(),
        right_label: right.label.to_string(),
        dirs_only_in_left: left.directories.difference(right.directories),
        dirs_only_in_right: right.directories.difference(left.directories),
        files_only_in_left: left.files.difference(right.files),
        files_only_in_right: right.files.difference(left.files),
    };

    debug!(
        left = left.label,
        right = right.label,
        one_sided = diff.len(),
        "Reconciled package trees"
    );

    diff
}

/// Turn a non-empty diff into a `StructureMismatch` failure
pub fn ensure_identical(diff: TreeDiff) -> Result<()> {
    if diff.is_empty() {
        Ok(())
    } else {
        Err(Error::structure_mismatch(diff))
    }
}
