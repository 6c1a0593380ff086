//! Loading and layered resolution of kiln project configuration.
//!
//! This crate reads the profile file (`kiln.toml` or a JSON equivalent),
//! validates the requested profile chain, and merges it with command-line
//! overrides into a single immutable [`Config`].

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::{ConfigError, Origin};
pub use loader::{
    load_profiles, load_profiles_from_str, ConfigFormat, ProfileSet, CONFIG_FILE_DEFAULT,
};
pub use resolve::{resolve, resolve_project, ConfigBuilder, ProfileChain};
pub use types::*;
