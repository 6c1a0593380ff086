//! High-level cache orchestrator.
//!
//! [`IncrementalCache`] ties together the manifest, change detection, and
//! pruning for one tracked file class. A run is split in two: [`plan`] scans
//! and prunes, returning a [`PendingBuild`]; the caller then either
//! [`commit`]s it once the build step succeeded or [`abandon`]s it so the
//! dirty files are picked up again next time.
//!
//! [`plan`]: IncrementalCache::plan
//! [`commit`]: PendingBuild::commit
//! [`abandon`]: PendingBuild::abandon

use std::path::{Path, PathBuf};

use crate::detect::{detect, ChangeSet, TrackedTree};
use crate::error::CacheError;
use crate::manifest::BuildManifest;
use crate::prune::{prune, PruneReport};

/// Incremental state for one tracked tree and its manifest file.
pub struct IncrementalCache {
    tree: TrackedTree,
    manifest_path: PathBuf,
}

impl IncrementalCache {
    /// Creates a cache for `tree`, persisted at `manifest_path`.
    pub fn new(tree: TrackedTree, manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            tree,
            manifest_path: manifest_path.into(),
        }
    }

    /// The tracked tree.
    pub fn tree(&self) -> &TrackedTree {
        &self.tree
    }

    /// Where the manifest lives.
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Loads the manifest, detects changes, and prunes stale artifacts.
    ///
    /// A manifest that cannot be parsed is treated as empty, so every file is
    /// rebuilt rather than the run failing. Nothing is written to the manifest
    /// file until the returned build is committed or abandoned.
    pub fn plan(&self) -> Result<PendingBuild, CacheError> {
        let previous = match BuildManifest::load(&self.manifest_path) {
            Ok(manifest) => manifest,
            Err(CacheError::ManifestParse { path, reason }) => {
                tracing::warn!(
                    path = %path.display(),
                    %reason,
                    "manifest is corrupt, rebuilding everything"
                );
                BuildManifest::new()
            }
            Err(e) => return Err(e),
        };

        let (changes, manifest) = detect(&self.tree, previous)?;
        let pruned = prune(&self.tree, &manifest)?;

        Ok(PendingBuild {
            changes,
            manifest,
            pruned,
            manifest_path: self.manifest_path.clone(),
        })
    }
}

/// The outcome of [`IncrementalCache::plan`], waiting for the build step.
#[derive(Debug)]
#[must_use = "a pending build must be committed or abandoned"]
pub struct PendingBuild {
    changes: ChangeSet,
    manifest: BuildManifest,
    pruned: PruneReport,
    manifest_path: PathBuf,
}

impl PendingBuild {
    /// Files that need rebuilding, plus deleted entries.
    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    /// What pruning removed.
    pub fn pruned(&self) -> &PruneReport {
        &self.pruned
    }

    /// The manifest that [`commit`](Self::commit) will persist.
    pub fn manifest(&self) -> &BuildManifest {
        &self.manifest
    }

    /// Persists the updated manifest after a successful build.
    pub fn commit(self) -> Result<BuildManifest, CacheError> {
        self.manifest.save(&self.manifest_path)?;
        tracing::debug!(
            path = %self.manifest_path.display(),
            entries = self.manifest.len(),
            "committed manifest"
        );
        Ok(self.manifest)
    }

    /// Persists the manifest without the files that were about to be rebuilt,
    /// so they stay dirty for the next run. Deleted entries stay deleted.
    pub fn abandon(mut self) -> Result<(), CacheError> {
        for path in self.changes.paths() {
            self.manifest.remove(path);
        }
        self.manifest.save(&self.manifest_path)?;
        tracing::debug!(
            path = %self.manifest_path.display(),
            dirty = self.changes.dirty_count(),
            "abandoned build, dirty files kept"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::to_canonical;

    struct Project {
        dir: tempfile::TempDir,
        src: String,
        build: String,
    }

    impl Project {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let src = dir.path().join("src");
            let build = dir.path().join("build");
            std::fs::create_dir_all(&src).unwrap();
            std::fs::create_dir_all(&build).unwrap();
            Self {
                src: to_canonical(&src),
                build: to_canonical(&build),
                dir,
            }
        }

        fn cache(&self) -> IncrementalCache {
            IncrementalCache::new(
                TrackedTree::sources(&self.src, &self.build),
                self.dir.path().join("build/.meta/sources.json"),
            )
        }

        fn write(&self, rel: &str, content: &str) {
            let p = Path::new(&self.src).join(rel);
            std::fs::create_dir_all(p.parent().unwrap()).unwrap();
            std::fs::write(p, content).unwrap();
        }

        fn compile(&self, rel: &str) {
            let p = Path::new(&self.build).join(rel);
            std::fs::create_dir_all(p.parent().unwrap()).unwrap();
            std::fs::write(p, "bytecode").unwrap();
        }
    }

    #[test]
    fn plan_does_not_touch_manifest_contents() {
        let p = Project::new();
        p.write("A.java", "class A {}");
        let cache = p.cache();

        let pending = cache.plan().unwrap();
        assert_eq!(pending.changes().dirty_count(), 1);
        assert_eq!(std::fs::read_to_string(cache.manifest_path()).unwrap(), "{}");
        pending.abandon().unwrap();
    }

    #[test]
    fn commit_makes_next_plan_clean() {
        let p = Project::new();
        p.write("A.java", "class A {}");
        let cache = p.cache();

        let pending = cache.plan().unwrap();
        p.compile("A.class");
        let saved = pending.commit().unwrap();
        assert_eq!(saved.len(), 1);

        let again = cache.plan().unwrap();
        assert!(again.changes().is_empty());
        assert_eq!(again.changes().unchanged, 1);
        again.commit().unwrap();
    }

    #[test]
    fn abandon_keeps_files_dirty() {
        let p = Project::new();
        p.write("A.java", "class A {}");
        p.write("B.java", "class B {}");
        let cache = p.cache();
        p.compile("A.class");
        p.compile("B.class");
        cache.plan().unwrap().commit().unwrap();

        p.write("B.java", "class B { broken");
        let failed = cache.plan().unwrap();
        assert_eq!(failed.changes().paths().collect::<Vec<_>>(), vec![format!("{}/B.java", p.src)]);
        failed.abandon().unwrap();

        let retry = cache.plan().unwrap();
        assert_eq!(retry.changes().dirty_count(), 1);
        assert_eq!(retry.changes().unchanged, 1);
        retry.abandon().unwrap();
    }

    #[test]
    fn corrupt_manifest_rebuilds_everything() {
        let p = Project::new();
        p.write("A.java", "class A {}");
        p.compile("A.class");
        let cache = p.cache();
        std::fs::create_dir_all(cache.manifest_path().parent().unwrap()).unwrap();
        std::fs::write(cache.manifest_path(), "{ not json").unwrap();

        let pending = cache.plan().unwrap();
        assert_eq!(pending.changes().dirty_count(), 1);
        pending.commit().unwrap();
        assert_eq!(BuildManifest::load(cache.manifest_path()).unwrap().len(), 1);
    }

    #[test]
    fn plan_prunes_orphans_of_deleted_sources() {
        let p = Project::new();
        p.write("A.java", "class A {}");
        p.write("pkg/B.java", "class B {}");
        let cache = p.cache();
        p.compile("A.class");
        p.compile("pkg/B.class");
        p.compile("pkg/B$1.class");
        cache.plan().unwrap().commit().unwrap();

        std::fs::remove_file(Path::new(&p.src).join("pkg/B.java")).unwrap();
        let pending = cache.plan().unwrap();
        assert_eq!(pending.changes().deleted, vec![format!("{}/pkg/B.java", p.src)]);
        assert_eq!(pending.pruned().removed_files.len(), 2);
        assert_eq!(pending.pruned().removed_dirs, vec![format!("{}/pkg", p.build)]);
        assert!(!pending.manifest().contains(&format!("{}/pkg/B.java", p.src)));
        pending.commit().unwrap();
    }
}
