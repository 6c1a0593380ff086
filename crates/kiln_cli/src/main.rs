//! Kiln CLI: an incremental build runner for Java projects.
//!
//! `kiln run` (the default) recompiles only the sources that changed since the
//! last successful build, copies updated resources, and launches the entry
//! point. `kiln build` stops after compiling and `kiln clean` deletes the build
//! directory.

#![warn(missing_docs)]

mod driver;
mod error_log;
mod pipeline;
mod reporter;

use std::fmt;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use kiln_config::{ProfileOptions, CONFIG_FILE_DEFAULT};
use tracing_subscriber::EnvFilter;

/// Kiln: fast incremental builds for simple Java projects.
#[derive(Parser, Debug)]
#[command(name = "kiln", version, about = "Incremental Java build runner")]
pub struct Cli {
    /// Profile chain to use from the configuration file, e.g. `default.debug`.
    #[arg(short = 'n', long, global = true)]
    pub profile: Option<String>,

    /// Path to the configuration file.
    #[arg(short, long, global = true, default_value = CONFIG_FILE_DEFAULT)]
    pub config: PathBuf,

    /// Directory to compile into [default: ./build].
    #[arg(short, long, global = true)]
    pub build: Option<String>,

    /// Directory containing the source tree [default: ./src].
    #[arg(short, long, global = true)]
    pub sources: Option<String>,

    /// Fully qualified name of the entry point [default: Main].
    #[arg(short, long, global = true)]
    pub entry: Option<String>,

    /// Directory searched for `*.jar` libraries (repeatable).
    #[arg(short, long, global = true)]
    pub libs: Vec<String>,

    /// Resources directory; must be inside the sources directory.
    #[arg(short, long, global = true)]
    pub resources: Option<String>,

    /// Run under the debugger.
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Disable console output, including error messages.
    #[arg(long, global = true)]
    pub silent: bool,

    /// Delete the build directory before building.
    #[arg(long, global = true)]
    pub clean: bool,

    /// Enable verbose (debug-level) diagnostics on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The subcommand to run; defaults to `run`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Build, then launch the entry point.
    Run,
    /// Build without launching.
    Build,
    /// Delete the build directory.
    Clean,
}

impl Cli {
    /// The command to run, defaulting to [`Command::Run`].
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Run)
    }

    /// Command-line values as the last configuration layer.
    ///
    /// Flags only override the configuration file when they are given, so an
    /// absent `--debug` does not switch off `debug = true` in a profile.
    pub fn overrides(&self) -> ProfileOptions {
        ProfileOptions {
            build: self.build.clone(),
            sources: self.sources.clone(),
            entry: self.entry.clone(),
            silent: self.silent.then_some(true),
            debug: self.debug.then_some(true),
            clean: self.clean.then_some(true),
            libs: (!self.libs.is_empty()).then(|| self.libs.clone()),
            resources: self.resources.clone(),
            ..Default::default()
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

/// The line printed for a fatal error, or nothing when output is silenced.
fn error_line(silent: bool, error: &dyn fmt::Display) -> Option<String> {
    (!silent).then(|| format!("error: {error}"))
}

fn fail(silent: bool, error: &dyn fmt::Display) -> ! {
    if let Some(line) = error_line(silent, error) {
        eprintln!("{line}");
    }
    process::exit(1)
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Until a profile has been resolved only the flag can silence errors.
    let config = match pipeline::resolve(&cli) {
        Ok(config) => config,
        Err(e) => fail(cli.silent, &e),
    };
    match pipeline::run(&cli, &config) {
        Ok(code) => process::exit(code),
        Err(e) => fail(config.silent(), &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_defaults() {
        let cli = Cli::parse_from(["kiln"]);
        assert_eq!(cli.command(), Command::Run);
        assert_eq!(cli.config, PathBuf::from("kiln.toml"));
        assert!(cli.profile.is_none());
        assert!(cli.libs.is_empty());
        assert!(!cli.debug && !cli.silent && !cli.clean && !cli.verbose);
    }

    #[test]
    fn parse_subcommands() {
        assert_eq!(Cli::parse_from(["kiln", "run"]).command(), Command::Run);
        assert_eq!(Cli::parse_from(["kiln", "build"]).command(), Command::Build);
        assert_eq!(Cli::parse_from(["kiln", "clean"]).command(), Command::Clean);
    }

    #[test]
    fn parse_short_options() {
        let cli = Cli::parse_from([
            "kiln",
            "-n",
            "default.debug",
            "-c",
            "cfg/kiln.json",
            "-b",
            "out",
            "-s",
            "app/src",
            "-e",
            "com.example.App",
            "-r",
            "app/src/res",
            "-d",
        ]);
        assert_eq!(cli.profile.as_deref(), Some("default.debug"));
        assert_eq!(cli.config, PathBuf::from("cfg/kiln.json"));
        assert_eq!(cli.build.as_deref(), Some("out"));
        assert_eq!(cli.sources.as_deref(), Some("app/src"));
        assert_eq!(cli.entry.as_deref(), Some("com.example.App"));
        assert_eq!(cli.resources.as_deref(), Some("app/src/res"));
        assert!(cli.debug);
    }

    #[test]
    fn parse_repeated_libs() {
        let cli = Cli::parse_from(["kiln", "-l", "lib", "--libs", "vendor", "build"]);
        assert_eq!(cli.libs, vec!["lib", "vendor"]);
        assert_eq!(cli.command(), Command::Build);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["kiln", "build", "--silent", "--clean", "-v"]);
        assert!(cli.silent);
        assert!(cli.clean);
        assert!(cli.verbose);
    }

    #[test]
    fn profile_silence_applies_to_errors() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir(&src).unwrap();
        let config_path = dir.path().join("kiln.toml");
        std::fs::write(
            &config_path,
            format!(
                "[default]\nsilent = true\nsources = '{}'\n",
                kiln_common::to_canonical(&src)
            ),
        )
        .unwrap();

        let config_arg = kiln_common::to_canonical(&config_path);
        let cli = Cli::parse_from(["kiln", "-c", config_arg.as_str()]);
        assert!(!cli.silent);
        let config = pipeline::resolve(&cli).unwrap();
        assert!(config.silent());
        assert_eq!(error_line(config.silent(), &"failed to find program 'javac'"), None);
        assert_eq!(
            error_line(cli.silent, &"failed to find program 'javac'").as_deref(),
            Some("error: failed to find program 'javac'")
        );
    }

    #[test]
    fn overrides_only_set_given_values() {
        let opts = Cli::parse_from(["kiln"]).overrides();
        assert_eq!(opts, ProfileOptions::default());

        let opts = Cli::parse_from(["kiln", "-e", "App", "-d", "-l", "lib"]).overrides();
        assert_eq!(opts.entry.as_deref(), Some("App"));
        assert_eq!(opts.debug, Some(true));
        assert_eq!(opts.silent, None);
        assert_eq!(opts.libs, Some(vec!["lib".to_string()]));
        assert!(opts.modules.is_none() && opts.module_paths.is_none());
    }
}
