//! ipadiff package containers
//!
//! Reads `.ipa` packages (zip containers) and unpacks them into scratch
//! directories for comparison:
//! - `zip`: central directory parsing, ZIP64, Store/Deflate/Zstd entries
//! - `extract`: safe extraction and application bundle lookup
//! - `writer`: small zip writer used to build fixtures (`test-support` feature)
//!
//! # Example
//! ```no_run
//! use std::path::Path;
//! use ipadiff_archive::{ArchiveExtractor, ZipExtractor};
//!
//! let package = ZipExtractor::new().extract(Path::new("App.ipa")).unwrap();
//! let bundle = package.locate_bundle("Payload", "*.app").unwrap();
//! println!("bundle at {}", bundle.display());
//! ```

pub mod extract;
#[cfg(any(test, feature = "test-support"))]
pub mod writer;
pub mod zip;

pub use extract::{locate_bundle, ArchiveExtractor, ExtractedPackage, ZipExtractor};
#[cfg(any(test, feature = "test-support"))]
pub use writer::ZipWriter;
pub use zip::{ZipArchive, ZipEntry, ZipError, ZipReader};
