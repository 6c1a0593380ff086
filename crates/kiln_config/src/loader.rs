//! Configuration file loading.
//!
//! A configuration file maps profile names to flat option tables. Files ending
//! in `.json` are read as JSON, everything else as TOML:
//!
//! ```toml
//! [default]
//! sources = "./src"
//! entry = "com.example.App"
//!
//! [debug]
//! debug = true
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::types::ProfileOptions;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_DEFAULT: &str = "kiln.toml";

/// Syntax of a configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML tables, one per profile.
    Toml,
    /// A JSON object of objects.
    Json,
}

impl ConfigFormat {
    /// Picks the format from the file extension (`.json` → JSON, otherwise TOML).
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Toml,
        }
    }
}

/// The raw profiles of a configuration file, keyed by profile name.
///
/// Profiles are kept undecoded until requested, so a typo in a profile that is
/// never used does not break unrelated runs.
#[derive(Debug, Clone, Default)]
pub struct ProfileSet {
    profiles: BTreeMap<String, Map<String, Value>>,
}

impl ProfileSet {
    /// Returns `true` if a profile with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    /// Names of all profiles, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// Decodes the named profile, validating its keys.
    pub fn profile(&self, name: &str) -> Result<ProfileOptions, ConfigError> {
        let table = self
            .profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))?;
        ProfileOptions::from_table(name, table)
    }
}

/// Reads and parses a configuration file.
pub fn load_profiles(path: &Path) -> Result<ProfileSet, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    load_profiles_from_str(&content, ConfigFormat::from_path(path))
}

/// Parses configuration content in the given format.
///
/// Useful for testing without filesystem dependencies.
pub fn load_profiles_from_str(
    content: &str,
    format: ConfigFormat,
) -> Result<ProfileSet, ConfigError> {
    let profiles: BTreeMap<String, Map<String, Value>> = match format {
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?
        }
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?
        }
    };
    tracing::debug!(profiles = profiles.len(), ?format, "loaded configuration profiles");
    Ok(ProfileSet { profiles })
}
