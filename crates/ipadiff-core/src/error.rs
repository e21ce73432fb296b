//! Unified error handling for ipadiff
//!
//! Every library crate in the workspace reports failures through this one
//! enum. Variants fall into two groups: failures that end the whole run
//! (missing inputs, unreadable archives, structural mismatches) and failures
//! that are recorded against a single file and surfaced in the report.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::TreeDiff;

/// Unified error type for all ipadiff operations
#[derive(Error, Debug)]
pub enum Error {
    // ==================== I/O Errors ====================

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An input path does not exist or is not a regular file
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    // ==================== Package Errors ====================

    /// The archive container could not be opened or decoded
    #[error("Archive corrupted: {}: {message}", .archive.display())]
    ArchiveCorrupt {
        archive: PathBuf,
        message: String,
    },

    /// The payload did not contain exactly one application bundle
    #[error("Could not find {pattern} directory at {} (found {})", .root.display(), .found.len())]
    BundleNotFound {
        root: PathBuf,
        pattern: String,
        found: Vec<String>,
    },

    /// Directory or file sets differ between the two packages
    #[error("Package structure differs: {} path(s) present on one side only", .0.len())]
    StructureMismatch(Box<TreeDiff>),

    // ==================== Per-file Errors ====================

    /// The binary format detector could not decide what a file is
    #[error("Cannot determine content type of {}: {reason}", .path.display())]
    ClassificationAmbiguous {
        path: PathBuf,
        reason: String,
    },

    /// An external collaborator exceeded its time budget
    #[error("{tool} timed out after {seconds} seconds")]
    ToolTimeout {
        tool: String,
        seconds: u64,
    },

    /// An external collaborator could not be run or reported failure
    #[error("{tool} failed: {message}")]
    ToolFailure {
        tool: String,
        message: String,
    },

    // ==================== Configuration Errors ====================

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        message: String,
    },

    // ==================== General Errors ====================

    /// Internal error (should not happen)
    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },

    /// Custom error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

/// Result type using the unified Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an error with additional context
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Error::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }

    /// Create an archive corruption error
    pub fn archive_corrupt(archive: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::ArchiveCorrupt {
            archive: archive.into(),
            message: message.into(),
        }
    }

    /// Create a tool failure error
    pub fn tool_failure(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ToolFailure {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Error::InvalidConfig {
            message: message.into(),
        }
    }

    /// Wrap a tree diff as a structural mismatch
    pub fn structure_mismatch(diff: TreeDiff) -> Self {
        Error::StructureMismatch(Box::new(diff))
    }

    /// Strip any context wrappers and return the underlying error
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::WithContext { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// The structural mismatch carried by this error, if any
    pub fn as_structure_mismatch(&self) -> Option<&TreeDiff> {
        match self.root_cause() {
            Error::StructureMismatch(diff) => Some(diff),
            _ => None,
        }
    }

    /// Check if this is a "not found" type error
    pub fn is_not_found(&self) -> bool {
        matches!(self.root_cause(), Error::NotFound(_))
    }

    /// Check if this error belongs to a single file rather than the whole run
    ///
    /// Such errors are recorded in the report next to the file that caused
    /// them; the remaining files are still compared.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self.root_cause(),
            Error::ClassificationAmbiguous { .. }
                | Error::ToolTimeout { .. }
                | Error::ToolFailure { .. }
        )
    }

    /// Check if this error must end the run
    pub fn is_fatal(&self) -> bool {
        !self.is_per_file()
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
