//! Common types used across ipadiff
//!
//! This module provides the data model shared by the reconciler, the
//! exclusion pipeline, the comparators and the report.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Content kind of a file, decided by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Structured keyed metadata (`.plist`)
    PropertyList,
    /// Native executable code (Mach-O, thin or fat)
    MachBinary,
    /// Build configuration text (`.xcconfig`)
    ConfigText,
    /// Anything else
    Generic,
}

impl ContentKind {
    pub fn name(&self) -> &'static str {
        match self {
            ContentKind::PropertyList => "property list",
            ContentKind::MachBinary => "Mach-O binary",
            ContentKind::ConfigText => "build configuration",
            ContentKind::Generic => "generic",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Category a path is set aside under instead of being compared
///
/// Categories are listed in the order the exclusion pipeline applies them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionCategory {
    /// Code-signing artifacts; removed outright and never reported
    CodeSigning,
    /// Companion watch application bundle
    WatchBundle,
    /// App extension bundles
    PluginBundle,
    /// Compiled asset catalogs (`.car`)
    CompiledAssetCatalog,
    /// Compiled interface builder resources (`.nib`)
    CompiledInterfaceResource,
}

impl ExclusionCategory {
    /// Categories that show up in the exclusion report
    pub const REPORTED: [ExclusionCategory; 4] = [
        ExclusionCategory::WatchBundle,
        ExclusionCategory::PluginBundle,
        ExclusionCategory::CompiledAssetCatalog,
        ExclusionCategory::CompiledInterfaceResource,
    ];

    /// Whether paths in this category are listed in the report
    pub fn is_reported(&self) -> bool {
        !matches!(self, ExclusionCategory::CodeSigning)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExclusionCategory::CodeSigning => "code signing",
            ExclusionCategory::WatchBundle => "watch bundle",
            ExclusionCategory::PluginBundle => "plugin bundle",
            ExclusionCategory::CompiledAssetCatalog => "compiled asset catalog",
            ExclusionCategory::CompiledInterfaceResource => "compiled interface resource",
        }
    }
}

impl fmt::Display for ExclusionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Why two files were found to differ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchReason {
    /// Total sizes differ; no byte scan was made
    Size,
    /// Same size, different bytes (or different canonical text)
    Content,
}

impl MismatchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MismatchReason::Size => "size",
            MismatchReason::Content => "content",
        }
    }
}

impl fmt::Display for MismatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-file verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "result", content = "reason")]
pub enum ComparisonResult {
    Equal,
    NotEqual(MismatchReason),
    /// Content cannot be inspected (encrypted binaries)
    Unverifiable,
}

impl ComparisonResult {
    pub fn is_equal(&self) -> bool {
        matches!(self, ComparisonResult::Equal)
    }
}

/// One differing byte position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffEntry {
    /// Offset from the start of the stream
    pub offset: u64,
    pub left: u8,
    pub right: u8,
}

impl fmt::Display for DiffEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "offset {:#x}: {:#x} != {:#x}", self.offset, self.left, self.right)
    }
}

/// Ordered list of byte-level differences between two equal-length streams
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiffRecord(Vec<DiffEntry>);

impl DiffRecord {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, entry: DiffEntry) {
        self.0.push(entry);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&DiffEntry> {
        self.0.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DiffEntry> {
        self.0.iter()
    }

    /// Copy of the first `limit` entries, for display
    pub fn truncated(&self, limit: usize) -> DiffRecord {
        DiffRecord(self.0.iter().take(limit).copied().collect())
    }
}

impl<'a> IntoIterator for &'a DiffRecord {
    type Item = &'a DiffEntry;
    type IntoIter = std::slice::Iter<'a, DiffEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<DiffEntry> for DiffRecord {
    fn from_iter<I: IntoIterator<Item = DiffEntry>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Directory and file paths present on only one side of a comparison
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeDiff {
    /// Display name of the left package
    pub left_label: String,
    /// Display name of the right package
    pub right_label: String,
    pub dirs_only_in_left: BTreeSet<String>,
    pub dirs_only_in_right: BTreeSet<String>,
    pub files_only_in_left: BTreeSet<String>,
    pub files_only_in_right: BTreeSet<String>,
}

impl TreeDiff {
    pub fn new(left_label: impl Into<String>, right_label: impl Into<String>) -> Self {
        Self {
            left_label: left_label.into(),
            right_label: right_label.into(),
            ..Default::default()
        }
    }

    /// Both dimensions match exactly
    pub fn is_empty(&self) -> bool {
        self.dirs_match() && self.files_match()
    }

    pub fn dirs_match(&self) -> bool {
        self.dirs_only_in_left.is_empty() && self.dirs_only_in_right.is_empty()
    }

    pub fn files_match(&self) -> bool {
        self.files_only_in_left.is_empty() && self.files_only_in_right.is_empty()
    }

    /// Total number of one-sided paths
    pub fn len(&self) -> usize {
        self.dirs_only_in_left.len()
            + self.dirs_only_in_right.len()
            + self.files_only_in_left.len()
            + self.files_only_in_right.len()
    }

    /// The same diff seen from the other side
    pub fn swapped(self) -> Self {
        Self {
            left_label: self.right_label,
            right_label: self.left_label,
            dirs_only_in_left: self.dirs_only_in_right,
            dirs_only_in_right: self.dirs_only_in_left,
            files_only_in_left: self.files_only_in_right,
            files_only_in_right: self.files_only_in_left,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diff_entry_format() {
        let entry = DiffEntry { offset: 0x1f, left: 0x0a, right: 0xff };
        assert_eq!(entry.to_string(), "offset 0x1f: 0xa != 0xff");
    }

    #[test]
    fn test_diff_record_truncated() {
        let record: DiffRecord = (0..10u64)
            .map(|offset| DiffEntry { offset, left: 0, right: 1 })
            .collect();

        let short = record.truncated(3);
        assert_eq!(short.len(), 3);
        assert_eq!(record.len(), 10);
        assert_eq!(short.first().map(|e| e.offset), Some(0));
    }

    #[test]
    fn test_tree_diff_swapped() {
        let mut diff = TreeDiff::new("a", "b");
        diff.dirs_only_in_left.insert("Watch".into());
        diff.files_only_in_right.insert("extra".into());

        let swapped = diff.clone().swapped();
        assert_eq!(swapped.left_label, "b");
        assert!(swapped.dirs_only_in_right.contains("Watch"));
        assert!(swapped.files_only_in_left.contains("extra"));
        assert_eq!(swapped.len(), diff.len());
        assert!(!swapped.is_empty());
    }

    #[test]
    fn test_only_code_signing_is_unreported() {
        assert!(!ExclusionCategory::CodeSigning.is_reported());
        assert!(ExclusionCategory::REPORTED.iter().all(|c| c.is_reported()));
    }
}
