//! Distance Core Library
//!
//! This crate provides the error type and the small value types (vectors,
//! quaternions, transforms) shared by every part of the `.bytes` codec.

pub mod error;
pub mod types;

pub use error::{Error, Result, ResultExt};
pub use types::*;

/// Re-export commonly used items
pub mod prelude {
    pub use crate::error::{Error, Result, ResultExt};
    pub use crate::types::*;
}
