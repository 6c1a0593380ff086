//! Incremental build cache.
//!
//! Tracks a content fingerprint per source file in a JSON manifest, works out
//! which files changed since the last successful build, and removes build
//! artifacts whose source has disappeared. Compiled sources and copied
//! resources are tracked as separate [`TrackedTree`]s with separate manifests.

#![warn(missing_docs)]

pub mod cache;
pub mod detect;
pub mod error;
pub mod hasher;
pub mod manifest;
pub mod prune;
pub mod transform;

pub use cache::{IncrementalCache, PendingBuild};
pub use detect::{detect, ChangeReason, ChangeSet, ChangedFile, TrackedTree};
pub use error::CacheError;
pub use hasher::SourceHasher;
pub use manifest::BuildManifest;
pub use prune::{prune, PruneReport};
pub use transform::{ArtifactNaming, Direction, PathTransformer};
