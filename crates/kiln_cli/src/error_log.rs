//! Append-only log of toolchain diagnostics.
//!
//! Each run that produces diagnostics writes one opening delimiter and
//! timestamp, then every captured block followed by a closing delimiter:
//!
//! ```text
//! ===========================================
//! 14:03:27
//! App.java:3: error: ';' expected
//! ===========================================
//! ```

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::reporter::timestamp;

/// Delimiter line framing each failure episode.
pub const DELIMITER: &str = "===========================================";

/// Error log for one run.
#[derive(Debug)]
pub struct ErrorLog {
    path: PathBuf,
    opened: bool,
}

impl ErrorLog {
    /// Creates a handle; nothing is written until [`append`](Self::append).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            opened: false,
        }
    }

    /// Location of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends a diagnostic block, opening the episode on first use.
    pub fn append(&mut self, text: &str) -> std::io::Result<()> {
        let stamp = timestamp();
        self.append_at(&stamp, text)
    }

    fn append_at(&mut self, stamp: &str, text: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut block = String::new();
        if !self.opened {
            block.push_str(DELIMITER);
            block.push('\n');
            block.push_str(stamp);
            block.push('\n');
        }
        block.push_str(text);
        if !text.ends_with('\n') {
            block.push('\n');
        }
        block.push_str(DELIMITER);
        block.push('\n');

        file.write_all(block.as_bytes())?;
        self.opened = true;
        tracing::debug!(path = %self.path.display(), bytes = text.len(), "appended to error log");
        Ok(())
    }
}
