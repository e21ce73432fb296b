//! ipadiff engine
//!
//! Decides whether two application packages are semantically equivalent:
//! - `exclusion`: the ordered rule table for signing artifacts and
//!   unverifiable categories
//! - `classify`: content kind of each file
//! - `compare`: one comparator per content kind
//! - `bytes`: chunked byte comparison with global offsets
//! - `tools`: format detector and property list normalizer collaborators
//! - `engine`: the orchestrator
//! - `report`: text and JSON rendering
//!
//! # Example
//! ```no_run
//! use std::path::Path;
//! use ipadiff_engine::{DiffEngine, DiffOptions};
//!
//! let engine = DiffEngine::with_defaults(DiffOptions::default()).unwrap();
//! let report = engine.compare_archives(Path::new("a.ipa"), Path::new("b.ipa")).unwrap();
//! print!("{}", report.render_text());
//! ```

pub mod bytes;
pub mod classify;
pub mod compare;
pub mod engine;
pub mod exclusion;
pub mod logging;
pub mod options;
pub mod report;
pub mod tools;

pub use bytes::{ByteComparator, ByteComparison};
pub use classify::{Classification, ContentClassifier};
pub use compare::{ComparatorSet, FileComparator, FilePair, Verdict as FileVerdict};
pub use engine::DiffEngine;
pub use exclusion::{ExclusionRule, ExclusionRules, Partition, PathKind, PathPattern, RuleScope};
pub use logging::{init_with_config, TracingConfig};
pub use options::{DiffOptions, ToolBackend, DEFAULT_VOLATILE_KEYS};
pub use report::{
    render_structure_mismatch, structure_mismatch_json, DiffReport, FileOutcome, OutputFormat, Verdict,
};
pub use tools::{BinaryFormat, Collaborators, FormatDetector, PlistNormalizer};
