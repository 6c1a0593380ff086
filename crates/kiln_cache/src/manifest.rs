//! Build manifest: the on-disk record of what was compiled last time.
//!
//! A manifest is a JSON object mapping canonical source paths to hex content
//! fingerprints. One manifest exists per tracked file class (compiled sources,
//! resources). It is a snapshot of the files observed in the last run, never a
//! history.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use kiln_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Persisted mapping from canonical source path to content fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildManifest {
    entries: BTreeMap<String, ContentHash>,
}

impl BuildManifest {
    /// Creates an empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the manifest at `path`.
    ///
    /// A missing manifest (or metadata directory) is created empty first; an
    /// empty file is a valid empty manifest.
    pub fn load(path: &Path) -> Result<Self, CacheError> {
        if !path.exists() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(CacheError::io(parent))?;
            }
            std::fs::write(path, "{}").map_err(CacheError::io(path))?;
            tracing::debug!(path = %path.display(), "initialized empty manifest");
        }

        let content = std::fs::read_to_string(path).map_err(CacheError::io(path))?;
        if content.trim().is_empty() {
            return Ok(Self::new());
        }
        serde_json::from_str(&content).map_err(|e| CacheError::ManifestParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Replaces the manifest at `path` with this mapping.
    ///
    /// The content is written to `<path>.tmp`, flushed, and renamed over the
    /// old file, so a reader never observes a half-written manifest.
    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(CacheError::io(parent))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;

        let temp_path = temp_path_for(path);
        let mut file = File::create(&temp_path).map_err(CacheError::io(&temp_path))?;
        file.write_all(json.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(CacheError::io(&temp_path))?;
        drop(file);
        std::fs::rename(&temp_path, path).map_err(CacheError::io(path))?;

        tracing::debug!(path = %path.display(), entries = self.entries.len(), "saved manifest");
        Ok(())
    }

    /// Returns the stored fingerprint for `path`.
    pub fn get(&self, path: &str) -> Option<&ContentHash> {
        self.entries.get(path)
    }

    /// Returns `true` if `path` is tracked.
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Records the fingerprint for `path`, returning the previous one.
    pub fn insert(&mut self, path: String, hash: ContentHash) -> Option<ContentHash> {
        self.entries.insert(path, hash)
    }

    /// Stops tracking `path`.
    pub fn remove(&mut self, path: &str) -> Option<ContentHash> {
        self.entries.remove(path)
    }

    /// Drops every entry whose path is not in `seen`, returning the dropped
    /// paths in sorted order.
    pub fn retain_seen(&mut self, seen: &HashSet<String>) -> Vec<String> {
        let dropped: Vec<String> = self
            .entries
            .keys()
            .filter(|k| !seen.contains(*k))
            .cloned()
            .collect();
        for path in &dropped {
            self.entries.remove(path);
        }
        dropped
    }

    /// Number of tracked files.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no file is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(path, fingerprint)` pairs in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ContentHash)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
