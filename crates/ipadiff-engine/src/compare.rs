//! Per-kind file comparators
//!
//! Each [`ContentKind`] has one comparator. The engine picks it from a
//! [`ComparatorSet`] after classification.

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use ipadiff_core::{ComparisonResult, ContentKind, DiffRecord, Error, MismatchReason, Result};
use ipadiff_tree::ChunkedReader;
use tracing::trace;

use crate::bytes::{ByteComparator, ByteComparison};
use crate::classify::ContentClassifier;
use crate::options::DiffOptions;
use crate::tools::{BinaryFormat, Collaborators, PlistNormalizer};

/// A file present on both sides
#[derive(Debug, Clone, Copy)]
pub struct FilePair<'a> {
    /// Path relative to the bundle root
    pub relative: &'a str,
    pub left: &'a Path,
    pub right: &'a Path,
    /// Format of the left file, when classification already asked
    pub left_format: Option<BinaryFormat>,
}

/// Verdict for one file pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Equal,
    Unverifiable,
    Mismatch {
        reason: MismatchReason,
        /// Offset of the first differing byte, when it is known
        first_difference: Option<u64>,
        /// Every differing byte, for byte-level comparisons
        diffs: DiffRecord,
    },
}

impl Verdict {
    pub fn is_equal(&self) -> bool {
        matches!(self, Verdict::Equal)
    }

    fn content() -> Self {
        Verdict::Mismatch {
            reason: MismatchReason::Content,
            first_difference: None,
            diffs: DiffRecord::new(),
        }
    }

    fn size() -> Self {
        Verdict::Mismatch {
            reason: MismatchReason::Size,
            first_difference: None,
            diffs: DiffRecord::new(),
        }
    }

    pub fn result(&self) -> ComparisonResult {
        match self {
            Verdict::Equal => ComparisonResult::Equal,
            Verdict::Unverifiable => ComparisonResult::Unverifiable,
            Verdict::Mismatch { reason, .. } => ComparisonResult::NotEqual(*reason),
        }
    }
}

impl From<ByteComparison> for Verdict {
    fn from(comparison: ByteComparison) -> Self {
        match comparison.result {
            ComparisonResult::Equal => Verdict::Equal,
            ComparisonResult::Unverifiable => Verdict::Unverifiable,
            ComparisonResult::NotEqual(reason) => Verdict::Mismatch {
                reason,
                first_difference: comparison.first_difference,
                diffs: comparison.diffs,
            },
        }
    }
}

/// Compares one kind of content
pub trait FileComparator: Send + Sync {
    fn kind(&self) -> ContentKind;

    fn compare(&self, pair: &FilePair<'_>) -> Result<Verdict>;
}

/// Property lists: canonical text with volatile keys stripped
pub struct PlistComparator {
    normalizer: Arc<dyn PlistNormalizer>,
    volatile_keys: Vec<String>,
}

impl PlistComparator {
    pub fn new(normalizer: Arc<dyn PlistNormalizer>, volatile_keys: Vec<String>) -> Self {
        Self { normalizer, volatile_keys }
    }
}

impl FileComparator for PlistComparator {
    fn kind(&self) -> ContentKind {
        ContentKind::PropertyList
    }

    fn compare(&self, pair: &FilePair<'_>) -> Result<Verdict> {
        let left = self.normalizer.normalize(pair.left, &self.volatile_keys)?;
        let right = self.normalizer.normalize(pair.right, &self.volatile_keys)?;

        if left == right {
            Ok(Verdict::Equal)
        } else {
            Ok(Verdict::content())
        }
    }
}

/// Build configuration text, ignoring leading and trailing whitespace
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigTextComparator;

impl FileComparator for ConfigTextComparator {
    fn kind(&self) -> ContentKind {
        ContentKind::ConfigText
    }

    fn compare(&self, pair: &FilePair<'_>) -> Result<Verdict> {
        let left = read_file(pair.left)?;
        let right = read_file(pair.right)?;

        if left.trim_ascii() == right.trim_ascii() {
            Ok(Verdict::Equal)
        } else {
            Ok(Verdict::content())
        }
    }
}

/// Native executables: byte comparison unless either side is encrypted
pub struct MachBinaryComparator {
    classifier: ContentClassifier,
    bytes: ByteComparator,
}

impl MachBinaryComparator {
    pub fn new(classifier: ContentClassifier, bytes: ByteComparator) -> Self {
        Self { classifier, bytes }
    }
}

impl FileComparator for MachBinaryComparator {
    fn kind(&self) -> ContentKind {
        ContentKind::MachBinary
    }

    fn compare(&self, pair: &FilePair<'_>) -> Result<Verdict> {
        let left = match pair.left_format {
            Some(format) => format,
            None => self.classifier.detect(pair.left)?,
        };
        let right = self.classifier.detect(pair.right)?;

        if left.is_encrypted || right.is_encrypted {
            trace!(path = pair.relative, "Encrypted binary, skipping content comparison");
            return Ok(Verdict::Unverifiable);
        }

        Ok(self.bytes.compare_files(pair.left, pair.right)?.into())
    }
}

/// Everything else: whole-file equality, chunk by chunk
#[derive(Debug, Clone, Copy)]
pub struct GenericComparator {
    chunk_size: usize,
}

impl GenericComparator {
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }
}

impl FileComparator for GenericComparator {
    fn kind(&self) -> ContentKind {
        ContentKind::Generic
    }

    fn compare(&self, pair: &FilePair<'_>) -> Result<Verdict> {
        let left = open_file(pair.left)?;
        let right = open_file(pair.right)?;

        if left.metadata()?.len() != right.metadata()?.len() {
            return Ok(Verdict::size());
        }

        let mut left = ChunkedReader::new(left, self.chunk_size);
        let mut right = ChunkedReader::new(right, self.chunk_size);

        loop {
            match (left.next_chunk()?, right.next_chunk()?) {
                (Some((offset, a)), Some((_, b))) => {
                    if a == b {
                        continue;
                    }
                    let first_difference = a
                        .iter()
                        .zip(b)
                        .position(|(l, r)| l != r)
                        .map(|i| offset + i as u64);

                    return Ok(Verdict::Mismatch {
                        reason: MismatchReason::Content,
                        first_difference,
                        diffs: DiffRecord::new(),
                    });
                }
                (None, None) => return Ok(Verdict::Equal),
                // Length changed underneath us
                _ => return Ok(Verdict::size()),
            }
        }
    }
}

fn open_file(path: &Path) -> Result<File> {
    if !path.is_file() {
        return Err(Error::NotFound(path.to_path_buf()));
    }
    Ok(File::open(path)?)
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    if !path.is_file() {
        return Err(Error::NotFound(path.to_path_buf()));
    }
    Ok(fs::read(path)?)
}

/// One comparator per content kind
pub struct ComparatorSet {
    plist: PlistComparator,
    config: ConfigTextComparator,
    mach: MachBinaryComparator,
    generic: GenericComparator,
}

impl ComparatorSet {
    pub fn new(options: &DiffOptions, collaborators: &Collaborators) -> Result<Self> {
        let classifier = ContentClassifier::new(collaborators.detector.clone());

        Ok(Self {
            plist: PlistComparator::new(collaborators.normalizer.clone(), options.volatile_plist_keys.clone()),
            config: ConfigTextComparator,
            mach: MachBinaryComparator::new(classifier, ByteComparator::new(options.chunk_size)?),
            generic: GenericComparator::new(options.chunk_size),
        })
    }

    pub fn get(&self, kind: ContentKind) -> &dyn FileComparator {
        match kind {
            ContentKind::PropertyList => &self.plist,
            ContentKind::ConfigText => &self.config,
            ContentKind::MachBinary => &self.mach,
            ContentKind::Generic => &self.generic,
        }
    }
}
