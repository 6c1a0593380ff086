//! User-facing status lines.
//!
//! A [`Reporter`] is created once per run from the resolved `silent` setting
//! and handed to every phase by reference. Structured diagnostics go through
//! `tracing`; the reporter only prints what a user watching the build wants to
//! see.

use std::fmt::Display;
use std::io::Write;

/// Severity tag printed in front of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Progress information.
    Info,
    /// A failure the user must act on.
    Error,
    /// Untagged output such as toolchain version banners.
    Plain,
}

/// Prints `LEVEL [HH:MM:SS]: message` lines unless silenced.
#[derive(Debug, Clone, Copy)]
pub struct Reporter {
    silent: bool,
}

impl Reporter {
    /// Creates a reporter; a silent reporter prints nothing at all.
    pub fn new(silent: bool) -> Self {
        Self { silent }
    }

    /// Reports progress.
    pub fn info(&self, message: impl Display) {
        self.emit(Level::Info, message);
    }

    /// Reports a failure.
    pub fn error(&self, message: impl Display) {
        self.emit(Level::Error, message);
    }

    /// Prints a message without a level tag.
    pub fn plain(&self, message: impl Display) {
        self.emit(Level::Plain, message);
    }

    /// Prints an empty separator line.
    pub fn blank(&self) {
        if !self.silent {
            println!();
        }
    }

    fn emit(&self, level: Level, message: impl Display) {
        if self.silent {
            return;
        }
        let line = format_line(level, &timestamp(), &message.to_string());
        // Errors go to stderr so they survive stdout redirection.
        let _ = match level {
            Level::Error => writeln!(std::io::stderr(), "{line}"),
            Level::Info | Level::Plain => writeln!(std::io::stdout(), "{line}"),
        };
    }
}

/// Local wall-clock time as `HH:MM:SS`.
pub fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

fn format_line(level: Level, time: &str, message: &str) -> String {
    match level {
        Level::Info => format!("INFO [{time}]: {message}"),
        Level::Error => format!("ERROR [{time}]: {message}"),
        Level::Plain => message.to_string(),
    }
}
