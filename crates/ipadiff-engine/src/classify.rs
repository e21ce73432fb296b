//! Content classification
//!
//! Decides which comparator handles a file, in priority order:
//! 1. `.plist` extension: property list
//! 2. the format detector reports native code: Mach-O binary
//! 3. `.xcconfig` extension: build configuration text
//! 4. anything else: generic bytes

use std::path::Path;
use std::sync::Arc;

use ipadiff_core::{ContentKind, Error, Result};
use ipadiff_tree::path::has_extension;

use crate::tools::{BinaryFormat, FormatDetector};

/// Kind of a file plus what the detector reported, when it was asked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: ContentKind,
    pub format: Option<BinaryFormat>,
}

#[derive(Clone)]
pub struct ContentClassifier {
    detector: Arc<dyn FormatDetector>,
}

impl ContentClassifier {
    pub fn new(detector: Arc<dyn FormatDetector>) -> Self {
        Self { detector }
    }

    /// Classify `relative`, sniffing the file at `path` when the name alone
    /// does not decide
    pub fn classify(&self, relative: &str, path: &Path) -> Result<Classification> {
        if has_extension(relative, "plist") {
            return Ok(Classification {
                kind: ContentKind::PropertyList,
                format: None,
            });
        }

        let format = self.detect(path)?;

        let kind = if format.is_native_executable {
            ContentKind::MachBinary
        } else if has_extension(relative, "xcconfig") {
            ContentKind::ConfigText
        } else {
            ContentKind::Generic
        };

        Ok(Classification {
            kind,
            format: Some(format),
        })
    }

    /// Run the detector; failures other than timeouts and missing files
    /// mean the kind cannot be decided
    pub fn detect(&self, path: &Path) -> Result<BinaryFormat> {
        self.detector.detect(path).map_err(|e| match e.root_cause() {
            Error::ClassificationAmbiguous { .. } | Error::ToolTimeout { .. } | Error::NotFound(_) => e,
            _ => Error::ClassificationAmbiguous {
                path: path.to_path_buf(),
                reason: format!("{} could not determine the format: {}", self.detector.name(), e),
            },
        })
    }
}
