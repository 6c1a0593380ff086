//! Removal of build artifacts whose source is gone.

use std::path::Path;

use kiln_common::to_canonical;
use walkdir::{DirEntry, WalkDir};

use crate::detect::TrackedTree;
use crate::error::CacheError;
use crate::manifest::BuildManifest;

/// What a pruning pass deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Deleted artifact files.
    pub removed_files: Vec<String>,
    /// Deleted empty directories, deepest first.
    pub removed_dirs: Vec<String>,
}

impl PruneReport {
    /// Returns `true` if nothing was deleted.
    pub fn is_empty(&self) -> bool {
        self.removed_files.is_empty() && self.removed_dirs.is_empty()
    }
}

/// Deletes artifacts under the tree's build-side root whose source is not
/// tracked by `manifest`, then removes directories left empty.
///
/// Nested-unit artifacts (`Outer$Inner.class`) live and die with their
/// enclosing unit. The build-side root itself is never removed. Running the
/// pass twice without intervening changes deletes nothing the second time.
pub fn prune(tree: &TrackedTree, manifest: &BuildManifest) -> Result<PruneReport, CacheError> {
    let mut report = PruneReport::default();
    let Some(root) = tree.artifact_root() else {
        return Ok(report);
    };
    if tree.skips(&root) {
        return Ok(report);
    }
    let root = Path::new(&root);
    if !root.is_dir() {
        return Ok(report);
    }

    let transformer = tree.transformer();
    let mut orphans = Vec::new();
    for entry in walk(tree, root, false) {
        let entry = entry.map_err(|e| walk_error(root, e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let artifact = to_canonical(entry.path());
        if !transformer.is_artifact(&artifact) {
            continue;
        }
        let tracked = tree
            .origins(&artifact)
            .iter()
            .any(|source| manifest.contains(source));
        if !tracked {
            orphans.push(entry.into_path());
        }
    }

    for path in orphans {
        std::fs::remove_file(&path).map_err(CacheError::io(&path))?;
        let path = to_canonical(&path);
        tracing::debug!(tree = tree.name(), %path, "removed stale artifact");
        report.removed_files.push(path);
    }

    for entry in walk(tree, root, true) {
        let entry = entry.map_err(|e| walk_error(root, e))?;
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            continue;
        }
        let dir = entry.path();
        let is_empty = std::fs::read_dir(dir)
            .map_err(CacheError::io(dir))?
            .next()
            .is_none();
        if is_empty {
            std::fs::remove_dir(dir).map_err(CacheError::io(dir))?;
            report.removed_dirs.push(to_canonical(dir));
        }
    }

    tracing::info!(
        tree = tree.name(),
        files = report.removed_files.len(),
        dirs = report.removed_dirs.len(),
        "pruned build tree"
    );
    Ok(report)
}

fn walk<'a>(
    tree: &'a TrackedTree,
    root: &Path,
    contents_first: bool,
) -> impl Iterator<Item = walkdir::Result<DirEntry>> + 'a {
    WalkDir::new(root)
        .sort_by_file_name()
        .contents_first(contents_first)
        .into_iter()
        .filter_entry(move |e| e.depth() == 0 || !tree.skips(&to_canonical(e.path())))
}

fn walk_error(root: &Path, source: walkdir::Error) -> CacheError {
    CacheError::Walk {
        path: root.to_path_buf(),
        source,
    }
}
