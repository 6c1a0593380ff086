//! Change detection over a tracked source tree.
//!
//! Walks the tree, fingerprints every tracked file, and compares the result
//! against the previous manifest. A file is unchanged only when its fingerprint
//! matches the manifest **and** its build artifact still exists, so deleting an
//! output by hand always forces a rebuild.

use std::collections::HashSet;
use std::path::Path;

use kiln_common::to_canonical;
use walkdir::WalkDir;

use crate::error::CacheError;
use crate::hasher::SourceHasher;
use crate::manifest::BuildManifest;
use crate::transform::PathTransformer;

/// One class of tracked files: where to scan, how to map to the build tree,
/// and which build-side directories belong to someone else.
#[derive(Debug, Clone)]
pub struct TrackedTree {
    name: String,
    scan_root: String,
    transformer: PathTransformer,
    compiled: Option<PathTransformer>,
    prune_skip: Vec<String>,
}

impl TrackedTree {
    /// Compiled sources under `sources_root`, built into `build_root`.
    pub fn sources(sources_root: &str, build_root: &str) -> Self {
        let transformer = PathTransformer::for_sources(sources_root, build_root);
        Self {
            name: "sources".to_string(),
            scan_root: transformer.source_root().to_string(),
            transformer,
            compiled: None,
            prune_skip: Vec::new(),
        }
    }

    /// Resources under `resources_root` (inside `sources_root`), copied into
    /// the matching location under `build_root`.
    pub fn resources(resources_root: &str, sources_root: &str, build_root: &str) -> Self {
        Self {
            name: "resources".to_string(),
            scan_root: kiln_common::normalize(resources_root),
            transformer: PathTransformer::new(sources_root, build_root),
            compiled: None,
            prune_skip: Vec::new(),
        }
    }

    /// Declares that sources inside this tree are also compiled with
    /// `compiler`, so their artifacts in the build-side image are kept as long
    /// as the source they came from is tracked here.
    pub fn with_compiled_sources(mut self, compiler: PathTransformer) -> Self {
        self.compiled = Some(compiler);
        self
    }

    /// Excludes a build-side directory from pruning.
    pub fn skip_when_pruning(mut self, dir: &str) -> Self {
        self.prune_skip.push(kiln_common::normalize(dir));
        self
    }

    /// Human-readable name used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory walked for tracked files.
    pub fn scan_root(&self) -> &str {
        &self.scan_root
    }

    /// Source ↔ build mapping for this class.
    pub fn transformer(&self) -> &PathTransformer {
        &self.transformer
    }

    /// The build-side image of the scan root; this is where pruning walks.
    pub fn artifact_root(&self) -> Option<String> {
        self.transformer.to_build(&self.scan_root)
    }

    pub(crate) fn skips(&self, path: &str) -> bool {
        self.prune_skip.iter().any(|s| s == path)
    }

    /// Source paths that could have produced `artifact`.
    pub(crate) fn origins(&self, artifact: &str) -> Vec<String> {
        let own = self.transformer.enclosing_unit(artifact);
        let mut origins: Vec<String> = self.transformer.to_source(&own).into_iter().collect();
        if let Some(compiler) = self.compiled.as_ref().filter(|c| c.is_artifact(artifact)) {
            let unit = compiler.enclosing_unit(artifact);
            origins.extend(compiler.to_source(&unit));
        }
        origins
    }
}

/// Why a file needs to be rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    /// The file is not in the manifest.
    New,
    /// The stored fingerprint differs from the current content.
    Modified,
    /// The fingerprint matches but the build artifact is gone.
    ArtifactMissing,
}

/// A file that needs to be rebuilt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFile {
    /// Canonical source path.
    pub path: String,
    /// Why it is dirty.
    pub reason: ChangeReason,
}

/// Result of scanning a tracked tree against its manifest.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// Files to rebuild, in walk order.
    pub changed: Vec<ChangedFile>,
    /// Number of files that are up to date.
    pub unchanged: usize,
    /// Manifest entries whose source no longer exists.
    pub deleted: Vec<String>,
}

impl ChangeSet {
    /// Returns `true` if nothing needs rebuilding and nothing was deleted.
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.deleted.is_empty()
    }

    /// Number of files that need rebuilding.
    pub fn dirty_count(&self) -> usize {
        self.changed.len()
    }

    /// Paths of the files that need rebuilding, in walk order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.changed.iter().map(|c| c.path.as_str())
    }
}

/// Scans `tree` against `manifest`.
///
/// Returns the change set and the updated manifest: dirty files carry their
/// new fingerprint and entries for files that no longer exist are dropped.
/// Any file that cannot be read aborts the scan.
pub fn detect(
    tree: &TrackedTree,
    mut manifest: BuildManifest,
) -> Result<(ChangeSet, BuildManifest), CacheError> {
    let mut changes = ChangeSet::default();
    let mut seen = HashSet::new();
    let root = Path::new(tree.scan_root());

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| CacheError::Walk {
            path: root.to_path_buf(),
            source: e,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = to_canonical(entry.path());
        if !tree.transformer.is_source(&path) {
            continue;
        }

        let hash = SourceHasher::hash_file(entry.path())?;
        let artifact_exists = tree
            .transformer
            .to_build(&path)
            .is_some_and(|artifact| Path::new(&artifact).exists());

        let reason = match manifest.get(&path) {
            None => Some(ChangeReason::New),
            Some(previous) if *previous != hash => Some(ChangeReason::Modified),
            Some(_) if !artifact_exists => Some(ChangeReason::ArtifactMissing),
            Some(_) => None,
        };

        match reason {
            Some(reason) => {
                tracing::debug!(tree = tree.name(), %path, ?reason, "found updated file");
                manifest.insert(path.clone(), hash);
                changes.changed.push(ChangedFile {
                    path: path.clone(),
                    reason,
                });
            }
            None => changes.unchanged += 1,
        }
        seen.insert(path);
    }

    changes.deleted = manifest.retain_seen(&seen);
    tracing::info!(
        tree = tree.name(),
        changed = changes.changed.len(),
        unchanged = changes.unchanged,
        deleted = changes.deleted.len(),
        "change detection finished"
    );
    Ok((changes, manifest))
}
