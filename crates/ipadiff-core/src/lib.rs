//! ipadiff Core Library
//!
//! This crate provides the error taxonomy and the data model shared by the
//! archive reader, the tree reconciler and the diff engine.

pub mod error;
pub mod types;

pub use error::{Error, Result, ResultExt};
pub use types::*;

/// Re-export commonly used items
pub mod prelude {
    pub use crate::error::{Error, Result, ResultExt};
    pub use crate::types::*;
}
