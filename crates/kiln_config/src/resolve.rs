//! Layered configuration resolution.
//!
//! Layers are applied in a fixed order: built-in defaults, then each profile of
//! the requested chain from left to right, then command-line overrides. A layer
//! only overrides the keys it explicitly sets.

use std::path::{Component, Path, PathBuf};

use kiln_common::{join, normalize};

use crate::error::{ConfigError, Origin};
use crate::loader::{load_profiles, ProfileSet};
use crate::types::{
    Config, LibrarySearch, Modules, ProfileOptions, BUILD_DEFAULT, ENTRY_DEFAULT, EXCLUDE_LIBS_KEY,
    MODULES_KEY, MODULE_PATHS_KEY, PROFILE_DEFAULT, SOURCES_DEFAULT,
};

/// An ordered chain of profile names, written `base.overlay.overlay` on the
/// command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileChain {
    names: Vec<String>,
}

impl ProfileChain {
    /// Splits a dotted chain into profile names.
    pub fn parse(chain: &str) -> Result<Self, ConfigError> {
        let names: Vec<String> = chain.split('.').map(str::to_string).collect();
        if names.iter().any(|n| n.trim().is_empty()) {
            return Err(ConfigError::InvalidProfileName(chain.to_string()));
        }
        Ok(Self { names })
    }

    /// Profile names in application order.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl Default for ProfileChain {
    fn default() -> Self {
        Self {
            names: vec![PROFILE_DEFAULT.to_string()],
        }
    }
}

/// Accumulates configuration layers and validates them into a [`Config`].
///
/// Path-valued options are normalized as they are absorbed. Options whose
/// paths must already exist (library directories, module path entries, the
/// resources directory) are checked at absorption so the error names the layer
/// that supplied them.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    build_root: String,
    sources_root: String,
    sources_origin: Origin,
    entry_point: String,
    libs: Option<Vec<String>>,
    exclude_libs: Option<Vec<String>>,
    module_paths: Option<Vec<String>>,
    modules: Option<Vec<String>>,
    resources_root: Option<String>,
    silent: bool,
    debug_mode: bool,
    clean_before_build: bool,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    /// Starts from the built-in defaults.
    pub fn new() -> Self {
        Self {
            build_root: normalize(BUILD_DEFAULT),
            sources_root: normalize(SOURCES_DEFAULT),
            sources_origin: Origin::Default,
            entry_point: ENTRY_DEFAULT.to_string(),
            libs: None,
            exclude_libs: None,
            module_paths: None,
            modules: None,
            resources_root: None,
            silent: false,
            debug_mode: false,
            clean_before_build: false,
        }
    }

    /// Layers `opts` over the current state.
    pub fn apply(
        &mut self,
        opts: &ProfileOptions,
        origin: Origin,
    ) -> Result<&mut Self, ConfigError> {
        if let Some(build) = &opts.build {
            self.build_root = normalize(build);
        }
        if let Some(sources) = &opts.sources {
            self.sources_root = normalize(sources);
            self.sources_origin = origin.clone();
        }
        if let Some(entry) = &opts.entry {
            self.entry_point = entry.clone();
        }
        if let Some(silent) = opts.silent {
            self.silent = silent;
        }
        if let Some(debug) = opts.debug {
            self.debug_mode = debug;
        }
        if let Some(clean) = opts.clean {
            self.clean_before_build = clean;
        }
        if let Some(libs) = &opts.libs {
            self.libs = Some(existing_paths(libs, &origin)?);
        }
        if let Some(patterns) = &opts.exclude_libs {
            let patterns: Vec<String> = patterns.iter().map(|p| normalize(p)).collect();
            for pattern in &patterns {
                globset::Glob::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: e.kind().to_string(),
                })?;
            }
            self.exclude_libs = Some(patterns);
        }
        if let Some(paths) = &opts.module_paths {
            if paths.is_empty() {
                return Err(ConfigError::EmptyList(MODULE_PATHS_KEY));
            }
            self.module_paths = Some(existing_paths(paths, &origin)?);
        }
        if let Some(modules) = &opts.modules {
            if modules.is_empty() {
                return Err(ConfigError::EmptyList(MODULES_KEY));
            }
            self.modules = Some(modules.clone());
        }
        if let Some(resources) = &opts.resources {
            let resources = normalize(resources);
            require_exists(&resources, &origin)?;
            self.resources_root = Some(resources);
        }
        tracing::debug!(%origin, "applied configuration layer");
        Ok(self)
    }

    /// Validates the accumulated layers and produces the immutable [`Config`].
    pub fn build(self) -> Result<Config, ConfigError> {
        require_exists(&self.sources_root, &self.sources_origin)?;

        let resources_root = match self.resources_root {
            Some(resources) => {
                let rebased = rebase_within(&resources, &self.sources_root).ok_or_else(|| {
                    ConfigError::ResourcesOutsideSources {
                        resources: resources.clone(),
                        sources: self.sources_root.clone(),
                    }
                })?;
                // The resource image would be the whole build tree.
                if rebased == self.sources_root {
                    return Err(ConfigError::ResourcesAreSources(resources));
                }
                Some(rebased)
            }
            None => None,
        };

        let modules = match (self.module_paths, self.modules) {
            (None, None) => Modules::NoModules,
            (Some(paths), Some(names)) => Modules::WithModules { paths, names },
            (Some(_), None) => {
                return Err(ConfigError::MissingCompanion {
                    present: MODULE_PATHS_KEY,
                    missing: MODULES_KEY,
                })
            }
            (None, Some(_)) => {
                return Err(ConfigError::MissingCompanion {
                    present: MODULES_KEY,
                    missing: MODULE_PATHS_KEY,
                })
            }
        };

        let library = match self.libs {
            Some(paths) if !paths.is_empty() => Some(LibrarySearch {
                paths,
                exclude: self.exclude_libs.unwrap_or_default(),
            }),
            _ => {
                if self.exclude_libs.is_some_and(|p| !p.is_empty()) {
                    tracing::warn!(
                        "'{EXCLUDE_LIBS_KEY}' has no effect without library directories"
                    );
                }
                None
            }
        };

        Ok(Config {
            build_root: self.build_root,
            sources_root: self.sources_root,
            entry_point: self.entry_point,
            library,
            modules,
            resources_root,
            silent: self.silent,
            debug_mode: self.debug_mode,
            clean_before_build: self.clean_before_build,
        })
    }
}

fn require_exists(path: &str, origin: &Origin) -> Result<(), ConfigError> {
    if Path::new(path).exists() {
        Ok(())
    } else {
        Err(ConfigError::PathNotFound {
            path: path.to_string(),
            origin: origin.clone(),
        })
    }
}

fn existing_paths(paths: &[String], origin: &Origin) -> Result<Vec<String>, ConfigError> {
    paths
        .iter()
        .map(|p| {
            let p = normalize(p);
            require_exists(&p, origin)?;
            Ok(p)
        })
        .collect()
}

/// Re-expresses `child` relative to `parent`'s spelling, so both share the same
/// textual prefix (`src/res` under `./src` becomes `./src/res`). Returns `None`
/// if `child` is not inside `parent`.
fn rebase_within(child: &str, parent: &str) -> Option<String> {
    fn meaningful(path: &str) -> Vec<Component<'_>> {
        Path::new(path)
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect()
    }
    let child_parts = meaningful(child);
    let parent_parts = meaningful(parent);
    if child_parts.len() < parent_parts.len()
        || child_parts[..parent_parts.len()] != parent_parts[..]
    {
        return None;
    }
    let rest: PathBuf = child_parts[parent_parts.len()..].iter().collect();
    if rest.as_os_str().is_empty() {
        Some(parent.to_string())
    } else {
        Some(join(parent, &rest.to_string_lossy()))
    }
}

/// Resolves the configuration from already-loaded profiles.
///
/// Every profile of the chain is decoded and key-checked before any layer is
/// applied, so unknown profiles and unknown keys are reported before the
/// filesystem is consulted.
pub fn resolve(
    profiles: Option<&ProfileSet>,
    chain: &ProfileChain,
    cli: &ProfileOptions,
) -> Result<Config, ConfigError> {
    let layers = match profiles {
        Some(set) => chain
            .names()
            .iter()
            .map(|name| set.profile(name).map(|opts| (name.clone(), opts)))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    let mut builder = ConfigBuilder::new();
    for (name, opts) in &layers {
        builder.apply(opts, Origin::Profile(name.clone()))?;
    }
    builder.apply(cli, Origin::CommandLine)?;
    builder.build()
}

/// Loads `config_path` (if present) and resolves `profile` plus CLI overrides.
///
/// A missing configuration file is fine when no profile was requested
/// explicitly: the run then uses defaults and command-line values only.
pub fn resolve_project(
    config_path: &Path,
    profile: Option<&str>,
    cli: &ProfileOptions,
) -> Result<Config, ConfigError> {
    let chain = match profile {
        Some(p) => ProfileChain::parse(p)?,
        None => ProfileChain::default(),
    };

    if config_path.is_file() {
        let set = load_profiles(config_path)?;
        tracing::info!(
            path = %config_path.display(),
            chain = ?chain.names(),
            "using configuration file"
        );
        resolve(Some(&set), &chain, cli)
    } else if profile.is_some() {
        Err(ConfigError::MissingConfigFile(config_path.to_path_buf()))
    } else {
        tracing::info!("no configuration file; using defaults");
        resolve(None, &chain, cli)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{load_profiles_from_str, ConfigFormat};

    fn dir_str(path: &Path) -> String {
        kiln_common::to_canonical(path)
    }

    #[test]
    fn chain_parse() {
        let chain = ProfileChain::parse("default.debug.ci").unwrap();
        assert_eq!(chain.names(), ["default", "debug", "ci"]);
        assert!(matches!(
            ProfileChain::parse("default..ci").unwrap_err(),
            ConfigError::InvalidProfileName(_)
        ));
        assert!(ProfileChain::parse("").is_err());
        assert_eq!(ProfileChain::default().names(), ["default"]);
    }

    #[test]
    fn defaults_when_nothing_applied() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir(&src).unwrap();

        let mut builder = ConfigBuilder::new();
        builder
            .apply(
                &ProfileOptions {
                    sources: Some(dir_str(&src)),
                    ..Default::default()
                },
                Origin::CommandLine,
            )
            .unwrap();
        let config = builder.build().unwrap();
        assert_eq!(config.build_root(), "./build");
        assert_eq!(config.entry_point(), "Main");
        assert_eq!(config.modules(), &Modules::NoModules);
        assert!(config.library().is_none());
        assert!(!config.silent() && !config.debug_mode() && !config.clean_before_build());
    }

    #[test]
    fn missing_sources_reports_origin() {
        let mut builder = ConfigBuilder::new();
        builder
            .apply(
                &ProfileOptions {
                    sources: Some("/definitely/not/here".to_string()),
                    ..Default::default()
                },
                Origin::Profile("default".to_string()),
            )
            .unwrap();
        match builder.build().unwrap_err() {
            ConfigError::PathNotFound { path, origin } => {
                assert_eq!(path, "/definitely/not/here");
                assert_eq!(origin, Origin::Profile("default".to_string()));
            }
            other => panic!("expected PathNotFound, got {other:?}"),
        }
    }

    #[test]
    fn missing_library_fails_at_absorption() {
        let mut builder = ConfigBuilder::new();
        let err = builder
            .apply(
                &ProfileOptions {
                    libs: Some(vec!["/no/such/lib".to_string()]),
                    ..Default::default()
                },
                Origin::CommandLine,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::PathNotFound { origin: Origin::CommandLine, .. }
        ));
    }

    #[test]
    fn empty_module_lists_rejected() {
        let mut builder = ConfigBuilder::new();
        let err = builder
            .apply(
                &ProfileOptions {
                    modules: Some(vec![]),
                    ..Default::default()
                },
                Origin::CommandLine,
            )
            .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyList("modules")));

        let err = builder
            .apply(
                &ProfileOptions {
                    module_paths: Some(vec![]),
                    ..Default::default()
                },
                Origin::CommandLine,
            )
            .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyList("modulePaths")));
    }

    #[test]
    fn modules_without_paths_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut builder = ConfigBuilder::new();
        builder
            .apply(
                &ProfileOptions {
                    sources: Some(dir_str(dir.path())),
                    modules: Some(vec!["javafx.controls".to_string()]),
                    ..Default::default()
                },
                Origin::CommandLine,
            )
            .unwrap();
        assert!(matches!(
            builder.build().unwrap_err(),
            ConfigError::MissingCompanion { present: "modules", missing: "modulePaths" }
        ));
    }

    #[test]
    fn resources_rebased_onto_sources_spelling() {
        assert_eq!(rebase_within("src/res", "./src").as_deref(), Some("./src/res"));
        assert_eq!(rebase_within("./src/res/img", "./src").as_deref(), Some("./src/res/img"));
        assert_eq!(rebase_within("./src", "./src").as_deref(), Some("./src"));
        assert_eq!(rebase_within("./assets", "./src"), None);
        assert_eq!(rebase_within("./srcs/res", "./src"), None);
    }

    #[test]
    fn resources_outside_sources_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let assets = dir.path().join("assets");
        std::fs::create_dir(&src).unwrap();
        std::fs::create_dir(&assets).unwrap();

        let mut builder = ConfigBuilder::new();
        builder
            .apply(
                &ProfileOptions {
                    sources: Some(dir_str(&src)),
                    resources: Some(dir_str(&assets)),
                    ..Default::default()
                },
                Origin::CommandLine,
            )
            .unwrap();
        assert!(matches!(
            builder.build().unwrap_err(),
            ConfigError::ResourcesOutsideSources { .. }
        ));
    }

    #[test]
    fn resources_equal_to_sources_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir(&src).unwrap();

        for resources in [dir_str(&src), format!("{}/", dir_str(&src))] {
            let mut builder = ConfigBuilder::new();
            builder
                .apply(
                    &ProfileOptions {
                        sources: Some(dir_str(&src)),
                        resources: Some(resources),
                        ..Default::default()
                    },
                    Origin::CommandLine,
                )
                .unwrap();
            assert!(matches!(
                builder.build().unwrap_err(),
                ConfigError::ResourcesAreSources(_)
            ));
        }
    }

    #[test]
    fn invalid_exclude_pattern_rejected() {
        let mut builder = ConfigBuilder::new();
        let err = builder
            .apply(
                &ProfileOptions {
                    exclude_libs: Some(vec!["lib/[old".to_string()]),
                    ..Default::default()
                },
                Origin::Profile("default".to_string()),
            )
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }

    #[test]
    fn unknown_key_reported_before_paths_checked() {
        let toml = r#"
[default]
sources = "/no/such/sources"

[debug]
bogus = 1
"#;
        let set = load_profiles_from_str(toml, ConfigFormat::Toml).unwrap();
        let chain = ProfileChain::parse("default.debug").unwrap();
        let err = resolve(Some(&set), &chain, &ProfileOptions::default()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey { ref key, .. } if key == "bogus"));
    }

    #[test]
    fn explicit_profile_without_file_errors() {
        let err = resolve_project(
            Path::new("/nonexistent/kiln.toml"),
            Some("debug"),
            &ProfileOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingConfigFile(_)));
    }
}
