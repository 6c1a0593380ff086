//! Shared foundational types used across the kiln build tool.
//!
//! This crate provides the content fingerprint used for change detection and
//! the canonical (forward-slash) path form shared by configuration, manifests,
//! and the build cache.

#![warn(missing_docs)]

pub mod hash;
pub mod path;

pub use hash::{ContentHash, ParseHashError};
pub use path::{join, normalize, to_canonical};
