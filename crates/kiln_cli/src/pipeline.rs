//! The build pipeline shared by `kiln run` and `kiln build`.
//!
//! Phases run in a fixed order so that a crash at any point leaves the
//! manifests consistent with the build tree:
//!
//! 1. Resolve the configuration (defaults, profile chain, command line)
//! 2. Probe the toolchain
//! 3. Optionally delete the build directory
//! 4. Detect and prune sources, then resources
//! 5. Compile dirty sources; on failure abandon both manifests and stop
//! 6. Commit the source manifest, copy resources, commit the resource manifest
//! 7. Launch the entry point (`run` only)

use std::path::{Path, PathBuf};

use kiln_cache::{IncrementalCache, PathTransformer, PendingBuild, TrackedTree};
use kiln_config::{Config, ConfigError};

use crate::driver::{self, ProcessOutcome, Toolchain};
use crate::error_log::ErrorLog;
use crate::reporter::Reporter;
use crate::{Cli, Command};

/// Resolves the configuration file, the requested profile chain and the
/// command-line overrides.
pub fn resolve(cli: &Cli) -> Result<Config, ConfigError> {
    kiln_config::resolve_project(&cli.config, cli.profile.as_deref(), &cli.overrides())
}

/// Runs the requested command and returns the process exit code.
pub fn run(cli: &Cli, config: &Config) -> Result<i32, Box<dyn std::error::Error>> {
    let command = cli.command();
    let reporter = Reporter::new(config.silent());
    match cli.profile.as_deref() {
        Some(profile) => reporter.info(format!("Using configuration '{profile}'.")),
        None => reporter.info("Using default build configuration."),
    }

    if command == Command::Clean {
        clean_build_root(config, &reporter)?;
        return Ok(0);
    }

    let execute = command == Command::Run;
    driver::probe(&driver::required_tools(execute, config.debug_mode()), &reporter)?;

    reporter.info("Preparing to build...");
    if config.clean_before_build() {
        clean_build_root(config, &reporter)?;
    }

    let plan = plan_build(config, &reporter)?;
    let toolchain = Toolchain::new(config)?;
    if config.library().is_some() {
        reporter.info(format!("CLASSPATH - {}", toolchain.classpath()));
    }
    let mut log = ErrorLog::new(config.error_log_path());

    if !compile(&toolchain, plan, &reporter, &mut log)? {
        return Ok(1);
    }
    if !execute {
        reporter.info("Build finished.");
        return Ok(0);
    }

    if config.debug_mode() {
        reporter.info("DEBUG");
    }
    reporter.info(format!("Running from - {}", config.entry_point()));
    reporter.blank();
    let outcome = toolchain.execute()?;
    if !outcome.stderr.trim().is_empty() {
        log.append(&outcome.stderr)?;
        reporter.error(format!(
            "Occurred during execution, check {} for info.",
            display_path(log.path())
        ));
    }
    Ok(if outcome.failed() { 1 } else { 0 })
}

/// Incremental state for one run: sources always, resources when configured.
pub struct BuildPlan {
    sources: PendingBuild,
    resources: Option<(IncrementalCache, PendingBuild)>,
}

impl BuildPlan {
    /// Abandons both pending manifests so every dirty file stays dirty.
    fn abandon(self) -> Result<(), kiln_cache::CacheError> {
        self.sources.abandon()?;
        if let Some((_, resources)) = self.resources {
            resources.abandon()?;
        }
        Ok(())
    }
}

/// The source cache. Its pruning pass leaves the metadata directory and the
/// build-side resources image alone.
pub fn source_cache(config: &Config) -> IncrementalCache {
    let mut tree = TrackedTree::sources(config.sources_root(), config.build_root())
        .skip_when_pruning(&config.meta_dir());
    if let Some(image) = resource_tree(config).and_then(|t| t.artifact_root()) {
        tree = tree.skip_when_pruning(&image);
    }
    IncrementalCache::new(tree, config.manifest_path())
}

/// The resource cache, if a resources directory is configured.
pub fn resource_cache(config: &Config) -> Option<IncrementalCache> {
    resource_tree(config).map(|tree| IncrementalCache::new(tree, config.resource_manifest_path()))
}

/// Resources share the build-side image with whatever javac emits for sources
/// living in the resources directory, so those artifacts are kept too.
fn resource_tree(config: &Config) -> Option<TrackedTree> {
    config.resources_root().map(|res| {
        TrackedTree::resources(res, config.sources_root(), config.build_root())
            .with_compiled_sources(PathTransformer::for_sources(
                config.sources_root(),
                config.build_root(),
            ))
            .skip_when_pruning(&config.meta_dir())
    })
}

/// Detects and prunes sources, then resources.
pub fn plan_build(
    config: &Config,
    reporter: &Reporter,
) -> Result<BuildPlan, kiln_cache::CacheError> {
    reporter.info("Collecting source files...");
    let sources = source_cache(config).plan()?;
    for path in sources.changes().paths() {
        reporter.info(format!("Found updated source file: {path}"));
    }

    let resources = match resource_cache(config) {
        Some(cache) => {
            reporter.info("Collecting resources...");
            let pending = cache.plan()?;
            for path in pending.changes().paths() {
                reporter.info(format!("Found updated resource: {path}"));
            }
            Some((cache, pending))
        }
        None => None,
    };
    Ok(BuildPlan { sources, resources })
}

/// Compiles, then commits manifests and copies resources.
///
/// Returns `false` if compilation failed; both manifests are then abandoned.
fn compile(
    toolchain: &Toolchain<'_>,
    plan: BuildPlan,
    reporter: &Reporter,
    log: &mut ErrorLog,
) -> Result<bool, Box<dyn std::error::Error>> {
    let dirty: Vec<String> = plan.sources.changes().paths().map(str::to_string).collect();
    if !dirty.is_empty() {
        reporter.info(format!("Compiling {} file(s)...", dirty.len()));
        let outcome = match toolchain.compile(dirty.iter().map(String::as_str)) {
            Ok(outcome) => outcome,
            Err(e) => {
                plan.abandon()?;
                return Err(e.into());
            }
        };
        if outcome.failed() {
            record_compile_failure(&outcome, plan, reporter, log)?;
            return Ok(false);
        }
    }
    finish(plan)?;
    Ok(true)
}

/// Logs the compiler's diagnostics and abandons both manifests.
fn record_compile_failure(
    outcome: &ProcessOutcome,
    plan: BuildPlan,
    reporter: &Reporter,
    log: &mut ErrorLog,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = if outcome.stderr.trim().is_empty() {
        "compiler exited with a non-zero status"
    } else {
        outcome.stderr.as_str()
    };
    log.append(text)?;
    reporter.error(format!(
        "Occurred during compilation, check {} for info.",
        display_path(log.path())
    ));
    plan.abandon()?;
    Ok(())
}

/// Commits the source manifest, copies updated resources, then commits the
/// resource manifest.
fn finish(plan: BuildPlan) -> Result<(), Box<dyn std::error::Error>> {
    plan.sources.commit()?;
    if let Some((cache, pending)) = plan.resources {
        let transformer = cache.tree().transformer();
        let copied = driver::copy_resources(transformer, pending.changes().paths())?;
        tracing::debug!(copied, "copied resources");
        pending.commit()?;
    }
    Ok(())
}

/// Deletes the build directory if it exists.
pub fn clean_build_root(config: &Config, reporter: &Reporter) -> std::io::Result<()> {
    let root = Path::new(config.build_root());
    if root.exists() {
        std::fs::remove_dir_all(root)?;
        reporter.info(format!("Removed {}", config.build_root()));
    }
    Ok(())
}

fn display_path(path: &Path) -> String {
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .display()
        .to_string()
}
