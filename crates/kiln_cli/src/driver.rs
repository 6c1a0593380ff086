//! Build Driver: turns a resolved configuration and a change set into
//! toolchain invocations.
//!
//! The driver owns everything that talks to external programs: probing the
//! toolchain, assembling the classpath and module arguments, compiling the
//! dirty sources, copying resources, and launching the entry point.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use globset::{Glob, GlobSet, GlobSetBuilder};
use kiln_cache::PathTransformer;
use kiln_common::to_canonical;
use kiln_config::{Config, LibrarySearch, Modules};
use walkdir::WalkDir;

use crate::reporter::Reporter;

/// Separator between classpath and module path entries.
pub const PATH_LIST_SEPARATOR: &str = if cfg!(windows) { ";" } else { ":" };

/// Extension of dependency archives picked up from library directories.
const ARCHIVE_EXTENSION: &str = "jar";

/// Errors raised while driving the external toolchain.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// A required program is not installed or not on `PATH`.
    #[error("failed to find program '{0}'")]
    ToolNotFound(String),

    /// A program exists but could not be started.
    #[error("failed to start '{program}': {source}")]
    Spawn {
        /// The program that failed to start.
        program: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A file operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A library directory could not be walked.
    #[error("failed to search library directory {path}: {source}")]
    Walk {
        /// The library root.
        path: PathBuf,
        /// The underlying traversal error.
        source: walkdir::Error,
    },

    /// An exclusion pattern could not be compiled.
    #[error("invalid library exclusion pattern: {0}")]
    Pattern(#[from] globset::Error),
}

/// A toolchain program and the flag that prints its version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tool {
    /// Executable name.
    pub program: &'static str,
    /// Argument that makes it print a version banner.
    pub version_flag: &'static str,
}

const JAVA: Tool = Tool {
    program: "java",
    version_flag: "--version",
};
const JAVAC: Tool = Tool {
    program: "javac",
    version_flag: "-version",
};
const JDB: Tool = Tool {
    program: "jdb",
    version_flag: "-version",
};

/// Programs a run needs: the compiler always, the launcher (or debugger)
/// only when the program is executed.
pub fn required_tools(execute: bool, debug: bool) -> Vec<Tool> {
    let mut tools = Vec::new();
    if execute {
        tools.push(JAVA);
    }
    tools.push(JAVAC);
    if execute && debug {
        tools.push(JDB);
    }
    tools
}

/// Invokes each tool's version command and reports the first line of output.
///
/// Fails on the first program that cannot be spawned.
pub fn probe(tools: &[Tool], reporter: &Reporter) -> Result<(), DriverError> {
    for tool in tools {
        let output = Command::new(tool.program)
            .arg(tool.version_flag)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| spawn_error(tool.program, e))?;
        // Older toolchains print the banner on stderr.
        let banner = [&output.stdout, &output.stderr]
            .into_iter()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .find_map(|text| text.lines().next().map(str::to_string).filter(|l| !l.is_empty()))
            .unwrap_or_default();
        tracing::debug!(program = tool.program, %banner, "probed tool");
        reporter.plain(banner);
    }
    Ok(())
}

fn spawn_error(program: &str, source: std::io::Error) -> DriverError {
    if source.kind() == std::io::ErrorKind::NotFound {
        DriverError::ToolNotFound(program.to_string())
    } else {
        DriverError::Spawn {
            program: program.to_string(),
            source,
        }
    }
}

/// Builds the classpath: the build root, then `<dir>/*` for every library
/// directory that directly holds an archive and is not excluded.
pub fn classpath(config: &Config) -> Result<String, DriverError> {
    let mut entries = vec![config.build_root().to_string()];
    if let Some(search) = config.library() {
        entries.extend(library_dirs(search)?.into_iter().map(|dir| format!("{dir}/*")));
    }
    Ok(entries.join(PATH_LIST_SEPARATOR))
}

fn library_dirs(search: &LibrarySearch) -> Result<Vec<String>, DriverError> {
    let excluded = exclusion_set(&search.exclude)?;
    let mut dirs = Vec::new();
    for root in &search.paths {
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|source| DriverError::Walk {
                path: PathBuf::from(root),
                source,
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let dir = to_canonical(entry.path());
            if excluded.is_match(&dir) {
                tracing::debug!(%dir, "library directory excluded");
                continue;
            }
            if holds_archive(entry.path())? {
                dirs.push(dir);
            }
        }
    }
    Ok(dirs)
}

fn exclusion_set(patterns: &[String]) -> Result<GlobSet, DriverError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

fn holds_archive(dir: &Path) -> Result<bool, DriverError> {
    let entries = std::fs::read_dir(dir).map_err(|source| DriverError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    Ok(entries.filter_map(Result::ok).any(|e| {
        e.path().extension().and_then(|x| x.to_str()) == Some(ARCHIVE_EXTENSION)
            && e.file_type().is_ok_and(|t| t.is_file())
    }))
}

/// `--module-path <paths> --add-modules <names>`, or nothing without modules.
pub fn module_args(modules: &Modules) -> Vec<String> {
    match modules {
        Modules::NoModules => Vec::new(),
        Modules::WithModules { paths, names } => vec![
            "--module-path".to_string(),
            paths.join(PATH_LIST_SEPARATOR),
            "--add-modules".to_string(),
            names.join(","),
        ],
    }
}

/// Result of running a toolchain program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Whether the process exited with status zero.
    pub success: bool,
    /// Everything the process wrote to stderr.
    pub stderr: String,
}

impl ProcessOutcome {
    /// A non-zero exit or any diagnostic output counts as failure.
    pub fn failed(&self) -> bool {
        !self.success || !self.stderr.trim().is_empty()
    }
}

/// Toolchain invocations for one resolved configuration.
#[derive(Debug)]
pub struct Toolchain<'a> {
    config: &'a Config,
    classpath: String,
    module_args: Vec<String>,
}

impl<'a> Toolchain<'a> {
    /// Assembles the classpath and module arguments for `config`.
    pub fn new(config: &'a Config) -> Result<Self, DriverError> {
        let classpath = classpath(config)?;
        let module_args = module_args(config.modules());
        tracing::debug!(%classpath, modules = ?module_args, "assembled toolchain arguments");
        Ok(Self {
            config,
            classpath,
            module_args,
        })
    }

    /// The assembled classpath.
    pub fn classpath(&self) -> &str {
        &self.classpath
    }

    /// Arguments to `javac` for compiling `files` into the build root.
    pub fn compile_args<'f>(&self, files: impl IntoIterator<Item = &'f str>) -> Vec<String> {
        let mut args = vec![
            "-classpath".to_string(),
            self.classpath.clone(),
            "-d".to_string(),
            self.config.build_root().to_string(),
        ];
        args.extend(self.module_args.iter().cloned());
        args.extend(files.into_iter().map(str::to_string));
        args
    }

    /// The launcher program and its arguments.
    pub fn run_command(&self) -> (&'static str, Vec<String>) {
        let program = if self.config.debug_mode() {
            JDB.program
        } else {
            JAVA.program
        };
        let mut args = vec!["-classpath".to_string(), self.classpath.clone()];
        args.extend(self.module_args.iter().cloned());
        args.push(self.config.entry_point().to_string());
        (program, args)
    }

    /// Compiles `files`.
    pub fn compile<'f>(
        &self,
        files: impl IntoIterator<Item = &'f str>,
    ) -> Result<ProcessOutcome, DriverError> {
        run_captured(JAVAC.program, &self.compile_args(files))
    }

    /// Launches the entry point with inherited stdin/stdout.
    pub fn execute(&self) -> Result<ProcessOutcome, DriverError> {
        let (program, args) = self.run_command();
        run_captured(program, &args)
    }
}

/// Runs `program`, inheriting stdin and stdout and capturing stderr, which is
/// echoed once the process exits.
fn run_captured(program: &str, args: &[String]) -> Result<ProcessOutcome, DriverError> {
    tracing::info!(program, ?args, "running toolchain program");
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| spawn_error(program, e))?;
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if !stderr.is_empty() {
        eprint!("{stderr}");
    }
    Ok(ProcessOutcome {
        success: output.status.success(),
        stderr,
    })
}

/// Copies each resource to its image under the build root, creating parent
/// directories as needed. Returns the number of files copied.
pub fn copy_resources<'f>(
    transformer: &PathTransformer,
    resources: impl IntoIterator<Item = &'f str>,
) -> Result<usize, DriverError> {
    let mut copied = 0;
    for source in resources {
        let Some(target) = transformer.to_build(source) else {
            tracing::warn!(%source, "resource outside the sources root, not copied");
            continue;
        };
        let target = Path::new(&target);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
        std::fs::copy(source, target).map_err(|e| io_error(target, e))?;
        copied += 1;
    }
    Ok(copied)
}

fn io_error(path: &Path, source: std::io::Error) -> DriverError {
    DriverError::Io {
        path: path.to_path_buf(),
        source,
    }
}
