//! Configuration types: per-profile options and the resolved [`Config`].

use kiln_common::join;
use serde::de::{self, DeserializeOwned, Deserializer, Visitor};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ConfigError;

/// Default build output directory.
pub const BUILD_DEFAULT: &str = "./build";
/// Default sources directory.
pub const SOURCES_DEFAULT: &str = "./src";
/// Default entry point.
pub const ENTRY_DEFAULT: &str = "Main";
/// Default profile name.
pub const PROFILE_DEFAULT: &str = "default";

/// Name of the metadata directory inside the build root.
pub const META_DIR: &str = ".meta";
/// Manifest file tracking compiled sources.
pub const SOURCE_MANIFEST_FILE: &str = "sources.json";
/// Manifest file tracking copied resources.
pub const RESOURCE_MANIFEST_FILE: &str = "resources.json";
/// Append-only log of compiler and runtime diagnostics.
pub const ERROR_LOG_FILE: &str = "errors.txt";

/// Profile key for the build directory.
pub const BUILD_KEY: &str = "build";
/// Profile key for the sources directory.
pub const SOURCES_KEY: &str = "sources";
/// Profile key for the entry point.
pub const ENTRY_KEY: &str = "entry";
/// Profile key for the silent flag.
pub const SILENT_KEY: &str = "silent";
/// Profile key for the debug flag.
pub const DEBUG_KEY: &str = "debug";
/// Profile key for the clean flag.
pub const CLEAN_KEY: &str = "clean";
/// Profile key for library directories.
pub const LIBS_KEY: &str = "libs";
/// Profile key for library exclusion globs.
pub const EXCLUDE_LIBS_KEY: &str = "excludeLibs";
/// Profile key for module path entries.
pub const MODULE_PATHS_KEY: &str = "modulePaths";
/// Profile key for module names.
pub const MODULES_KEY: &str = "modules";
/// Profile key for the resources directory.
pub const RESOURCES_KEY: &str = "resources";

/// Every key a profile may contain.
pub const KNOWN_KEYS: [&str; 11] = [
    BUILD_KEY,
    SOURCES_KEY,
    ENTRY_KEY,
    SILENT_KEY,
    DEBUG_KEY,
    CLEAN_KEY,
    LIBS_KEY,
    EXCLUDE_LIBS_KEY,
    MODULE_PATHS_KEY,
    MODULES_KEY,
    RESOURCES_KEY,
];

/// One layer of configuration: a profile from the file, or the command line.
///
/// Every field is optional; `None` means "not set by this layer" and never
/// overrides a value from an earlier layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileOptions {
    /// Build output directory.
    pub build: Option<String>,
    /// Sources directory.
    pub sources: Option<String>,
    /// Fully-qualified entry point.
    pub entry: Option<String>,
    /// Suppress console output.
    pub silent: Option<bool>,
    /// Run under the debugger.
    pub debug: Option<bool>,
    /// Delete the build directory before building.
    pub clean: Option<bool>,
    /// Directories searched for dependency archives.
    pub libs: Option<Vec<String>>,
    /// Glob patterns excluding library directories.
    pub exclude_libs: Option<Vec<String>>,
    /// Module path entries.
    pub module_paths: Option<Vec<String>>,
    /// Module names to add.
    pub modules: Option<Vec<String>>,
    /// Resources directory (inside the sources directory).
    pub resources: Option<String>,
}

impl ProfileOptions {
    /// Decodes one profile table from the configuration file.
    ///
    /// Unknown keys are rejected with [`ConfigError::UnknownKey`] and values of
    /// the wrong shape with [`ConfigError::InvalidValue`]. No filesystem access
    /// happens here.
    pub fn from_table(profile: &str, table: &Map<String, Value>) -> Result<Self, ConfigError> {
        let mut opts = Self::default();
        for (key, value) in table {
            match key.as_str() {
                BUILD_KEY => opts.build = Some(decode(profile, key, value)?),
                SOURCES_KEY => opts.sources = Some(decode(profile, key, value)?),
                ENTRY_KEY => opts.entry = Some(decode(profile, key, value)?),
                SILENT_KEY => opts.silent = Some(decode(profile, key, value)?),
                DEBUG_KEY => opts.debug = Some(decode(profile, key, value)?),
                CLEAN_KEY => opts.clean = Some(decode(profile, key, value)?),
                LIBS_KEY => opts.libs = Some(decode::<StringList>(profile, key, value)?.0),
                EXCLUDE_LIBS_KEY => {
                    opts.exclude_libs = Some(decode::<StringList>(profile, key, value)?.0)
                }
                MODULE_PATHS_KEY => {
                    opts.module_paths = Some(decode::<StringList>(profile, key, value)?.0)
                }
                MODULES_KEY => opts.modules = Some(decode::<StringList>(profile, key, value)?.0),
                RESOURCES_KEY => opts.resources = Some(decode(profile, key, value)?),
                _ => {
                    return Err(ConfigError::UnknownKey {
                        profile: profile.to_string(),
                        key: key.clone(),
                    })
                }
            }
        }
        Ok(opts)
    }
}

fn decode<T: DeserializeOwned>(profile: &str, key: &str, value: &Value) -> Result<T, ConfigError> {
    T::deserialize(value).map_err(|e| ConfigError::InvalidValue {
        profile: profile.to_string(),
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// A list option that also accepts a single string.
///
/// Allows both `libs = "./lib"` and `libs = ["./lib", "./vendor"]`.
struct StringList(Vec<String>);

impl<'de> Deserialize<'de> for StringList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StringOrVec;

        impl<'de> Visitor<'de> for StringOrVec {
            type Value = Vec<String>;

            fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                formatter.write_str("a string or a list of strings")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(vec![v.to_string()])
            }

            fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut vec = Vec::new();
                while let Some(val) = seq.next_element::<String>()? {
                    vec.push(val);
                }
                Ok(vec)
            }
        }

        deserializer.deserialize_any(StringOrVec).map(StringList)
    }
}

/// Module configuration. Module paths and module names only exist together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modules {
    /// No modules are configured.
    NoModules,
    /// Both module path entries and module names are configured (both non-empty).
    WithModules {
        /// Module path entries, canonical form.
        paths: Vec<String>,
        /// Module names passed to the toolchain.
        names: Vec<String>,
    },
}

/// Library directories searched for dependency archives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibrarySearch {
    /// Library roots in search order, canonical form.
    pub paths: Vec<String>,
    /// Glob patterns of directories to skip.
    pub exclude: Vec<String>,
}

/// The fully resolved, immutable configuration for one run.
///
/// Constructed only through [`ConfigBuilder`](crate::ConfigBuilder). Paths
/// derived from the build root (`meta_dir`, manifests, error log) are computed
/// on access and cannot be set independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub(crate) build_root: String,
    pub(crate) sources_root: String,
    pub(crate) entry_point: String,
    pub(crate) library: Option<LibrarySearch>,
    pub(crate) modules: Modules,
    pub(crate) resources_root: Option<String>,
    pub(crate) silent: bool,
    pub(crate) debug_mode: bool,
    pub(crate) clean_before_build: bool,
}

impl Config {
    /// Build output directory.
    pub fn build_root(&self) -> &str {
        &self.build_root
    }

    /// Sources directory.
    pub fn sources_root(&self) -> &str {
        &self.sources_root
    }

    /// Fully-qualified name of the runnable entry unit.
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// `<build>/.meta`.
    pub fn meta_dir(&self) -> String {
        join(&self.build_root, META_DIR)
    }

    /// Manifest tracking compiled sources.
    pub fn manifest_path(&self) -> String {
        join(&self.meta_dir(), SOURCE_MANIFEST_FILE)
    }

    /// Manifest tracking copied resources.
    pub fn resource_manifest_path(&self) -> String {
        join(&self.meta_dir(), RESOURCE_MANIFEST_FILE)
    }

    /// Error log receiving toolchain diagnostics.
    pub fn error_log_path(&self) -> String {
        join(&self.meta_dir(), ERROR_LOG_FILE)
    }

    /// Library search settings, if any library directory is configured.
    pub fn library(&self) -> Option<&LibrarySearch> {
        self.library.as_ref()
    }

    /// Module configuration.
    pub fn modules(&self) -> &Modules {
        &self.modules
    }

    /// Resources directory, if configured.
    pub fn resources_root(&self) -> Option<&str> {
        self.resources_root.as_deref()
    }

    /// Whether console output is suppressed.
    pub fn silent(&self) -> bool {
        self.silent
    }

    /// Whether the entry point runs under the debugger.
    pub fn debug_mode(&self) -> bool {
        self.debug_mode
    }

    /// Whether the build directory is deleted before building.
    pub fn clean_before_build(&self) -> bool {
        self.clean_before_build
    }
}
