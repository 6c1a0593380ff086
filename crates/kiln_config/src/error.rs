//! Error types for configuration loading and resolution.

use std::fmt;
use std::path::PathBuf;

/// The layer a configuration value came from.
///
/// Carried by path errors so the user can tell whether to fix the command
/// line or the configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Built-in default value.
    Default,
    /// A named profile in the configuration file.
    Profile(String),
    /// A flag given on the command line.
    CommandLine,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Default => f.write_str("built-in defaults"),
            Origin::Profile(name) => write!(f, "profile '{name}' of the configuration file"),
            Origin::CommandLine => f.write_str("command line"),
        }
    }
}

/// Errors that can occur when loading or resolving a kiln configuration.
///
/// All of these are raised before any build state is touched.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration {path}: {source}")]
    Io {
        /// The configuration file path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A profile was requested explicitly but no configuration file exists.
    #[error("configuration file {0} does not exist")]
    MissingConfigFile(PathBuf),

    /// A profile chain contained an empty segment (e.g. `default..debug`).
    #[error("invalid profile name '{0}'")]
    InvalidProfileName(String),

    /// A requested profile does not exist in the configuration file.
    #[error("no configuration found with name '{0}'")]
    UnknownProfile(String),

    /// A profile contains a key kiln does not recognize.
    #[error("invalid configuration option '{key}' in profile '{profile}'")]
    UnknownKey {
        /// The profile containing the key.
        profile: String,
        /// The unrecognized key.
        key: String,
    },

    /// A recognized key has a value of the wrong type.
    #[error("invalid value for '{key}' in profile '{profile}': {reason}")]
    InvalidValue {
        /// The profile containing the key.
        profile: String,
        /// The offending key.
        key: String,
        /// Description of the type mismatch.
        reason: String,
    },

    /// One of a co-required pair of options was supplied without the other.
    #[error("'{present}' requires '{missing}' to be specified as well")]
    MissingCompanion {
        /// The option that was supplied.
        present: &'static str,
        /// The option that must accompany it.
        missing: &'static str,
    },

    /// A list option was supplied but empty.
    #[error("if '{0}' is specified it cannot be empty")]
    EmptyList(&'static str),

    /// A path that must exist on disk does not.
    #[error("the path '{path}' provided from {origin} does not exist")]
    PathNotFound {
        /// The missing path, in canonical form.
        path: String,
        /// The layer that supplied the path.
        origin: Origin,
    },

    /// The resources directory is not located inside the sources directory.
    #[error(
        "resources directory '{resources}' must be located within the sources directory '{sources}'"
    )]
    ResourcesOutsideSources {
        /// The resources directory.
        resources: String,
        /// The sources directory.
        sources: String,
    },

    /// The resources directory is the sources directory itself.
    #[error("resources directory '{0}' must be a subdirectory of the sources directory")]
    ResourcesAreSources(String),

    /// A library exclusion pattern is not a valid glob.
    #[error("invalid library exclusion pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The rejected pattern.
        pattern: String,
        /// Description of the glob syntax error.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_unknown_profile() {
        let err = ConfigError::UnknownProfile("release".to_string());
        assert_eq!(format!("{err}"), "no configuration found with name 'release'");
    }

    #[test]
    fn display_unknown_key_names_key_and_profile() {
        let err = ConfigError::UnknownKey {
            profile: "default".to_string(),
            key: "optimise".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'optimise'"));
        assert!(msg.contains("'default'"));
    }

    #[test]
    fn display_missing_companion() {
        let err = ConfigError::MissingCompanion {
            present: "modulePaths",
            missing: "modules",
        };
        assert_eq!(
            format!("{err}"),
            "'modulePaths' requires 'modules' to be specified as well"
        );
    }

    #[test]
    fn display_empty_list() {
        let err = ConfigError::EmptyList("modules");
        assert_eq!(format!("{err}"), "if 'modules' is specified it cannot be empty");
    }

    #[test]
    fn display_path_not_found_reports_origin() {
        let err = ConfigError::PathNotFound {
            path: "./lib".to_string(),
            origin: Origin::CommandLine,
        };
        assert_eq!(
            format!("{err}"),
            "the path './lib' provided from command line does not exist"
        );

        let err = ConfigError::PathNotFound {
            path: "./res".to_string(),
            origin: Origin::Profile("debug".to_string()),
        };
        assert!(err.to_string().contains("profile 'debug'"));
    }

    #[test]
    fn display_parse_error() {
        let err = ConfigError::ParseError("expected '=' at line 3".to_string());
        assert_eq!(
            format!("{err}"),
            "failed to parse configuration: expected '=' at line 3"
        );
    }

    #[test]
    fn display_io_error() {
        let err = ConfigError::Io {
            path: PathBuf::from("kiln.toml"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let display = format!("{err}");
        assert!(display.starts_with("failed to read configuration kiln.toml:"));
    }
}
