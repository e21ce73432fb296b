//! External collaborators
//!
//! The engine never inspects binary formats or property lists itself; it
//! asks a `FormatDetector` and a `PlistNormalizer`. Two implementations of
//! each exist: in-process parsers, and the host tools (`file`, `plutil`)
//! run under a timeout.

mod native;
mod system;

pub use native::{MachODetector, NativePlistNormalizer};
pub use system::{run_tool, FileCommandDetector, PlutilNormalizer, ToolOutput};

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ipadiff_core::Result;

use crate::options::{DiffOptions, ToolBackend};

/// What the detector found out about a file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BinaryFormat {
    /// Native executable code (Mach-O, thin or fat)
    pub is_native_executable: bool,
    /// At least one slice carries encrypted text
    pub is_encrypted: bool,
}

impl BinaryFormat {
    pub const OTHER: BinaryFormat = BinaryFormat {
        is_native_executable: false,
        is_encrypted: false,
    };

    pub fn native(is_encrypted: bool) -> Self {
        Self {
            is_native_executable: true,
            is_encrypted,
        }
    }
}

/// Sniffs the binary format of a file
pub trait FormatDetector: Send + Sync {
    fn name(&self) -> &str;

    fn detect(&self, path: &Path) -> Result<BinaryFormat>;
}

/// Produces canonical text for a property list, minus some top-level keys
pub trait PlistNormalizer: Send + Sync {
    fn name(&self) -> &str;

    fn normalize(&self, path: &Path, keys_to_strip: &[String]) -> Result<String>;
}

/// The collaborators one engine run uses
#[derive(Clone)]
pub struct Collaborators {
    pub detector: Arc<dyn FormatDetector>,
    pub normalizer: Arc<dyn PlistNormalizer>,
}

impl Collaborators {
    pub fn new(detector: Arc<dyn FormatDetector>, normalizer: Arc<dyn PlistNormalizer>) -> Self {
        Self { detector, normalizer }
    }

    /// In-process implementations
    pub fn native() -> Self {
        Self::new(Arc::new(MachODetector), Arc::new(NativePlistNormalizer))
    }

    /// Host tools, each invocation bounded by `timeout`
    pub fn system(timeout: Duration) -> Self {
        Self::new(
            Arc::new(FileCommandDetector::new(timeout)),
            Arc::new(PlutilNormalizer::new(timeout)),
        )
    }

    pub fn from_options(options: &DiffOptions) -> Self {
        match options.tools {
            ToolBackend::Native => Self::native(),
            ToolBackend::System => Self::system(options.tool_timeout()),
        }
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("detector", &self.detector.name())
            .field("normalizer", &self.normalizer.name())
            .finish()
    }
}
