//! ipadiff package trees
//!
//! Turns an extracted application bundle into root-relative path sets and
//! reconciles two of them:
//! - path normalisation and glob matching
//! - `PathSet`, the ordered set of relative paths
//! - `PackageTree` scanning of a bundle on disk
//! - directory/file reconciliation into a `TreeDiff`
//! - chunked streaming reads used by the byte comparator
//!
//! # Example
//! ```no_run
//! use ipadiff_tree::{PackageTree, reconcile};
//!
//! let left = PackageTree::scan("/tmp/left/Payload/App.app").unwrap();
//! let right = PackageTree::scan("/tmp/right/Payload/App.app").unwrap();
//!
//! let diff = reconcile::reconcile(&left.view("left"), &right.view("right"));
//! if !diff.is_empty() {
//!     println!("{} paths differ", diff.len());
//! }
//! ```

pub mod path;
pub mod pathset;
pub mod reconcile;
pub mod scan;
pub mod stream;

pub use pathset::PathSet;
pub use reconcile::{reconcile, ensure_identical, TreeView};
pub use scan::PackageTree;
pub use stream::ChunkedReader;
