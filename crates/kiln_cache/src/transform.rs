//! Mapping paths between the source tree and the build tree.
//!
//! A source file `./src/com/App.java` compiles to `./build/com/App.class`; a
//! resource `./src/res/logo.png` is copied to `./build/res/logo.png`. The
//! transform works on path components, so only the leading root is swapped and
//! a directory that happens to share the root's name deeper in the path is left
//! alone.

use std::path::{Component, Path, PathBuf};

use kiln_common::{normalize, to_canonical};

/// Extension of compiled source files.
pub const SOURCE_EXTENSION: &str = "java";

/// Extension of compiled artifacts.
pub const ARTIFACT_EXTENSION: &str = "class";

/// Separates an enclosing unit from a nested unit in artifact names
/// (`Outer$Inner.class`).
pub const INNER_UNIT_DELIMITER: char = '$';

/// Which way a path is transformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Source path → artifact path.
    SourceToBuild,
    /// Artifact path → source path.
    BuildToSource,
}

/// How source and artifact file names relate for a compiled file class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNaming {
    /// Extension of tracked source files, without the dot.
    pub source_extension: String,
    /// Extension of generated artifacts, without the dot.
    pub artifact_extension: String,
    /// Delimiter introducing a nested-unit discriminator in artifact names.
    pub inner_unit_delimiter: Option<char>,
}

impl Default for ArtifactNaming {
    fn default() -> Self {
        Self {
            source_extension: SOURCE_EXTENSION.to_string(),
            artifact_extension: ARTIFACT_EXTENSION.to_string(),
            inner_unit_delimiter: Some(INNER_UNIT_DELIMITER),
        }
    }
}

/// Pure mapping between a source root and a build root.
///
/// With [`ArtifactNaming`] the file extension is swapped as well; without it
/// (resources) only the root changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTransformer {
    source_root: String,
    build_root: String,
    naming: Option<ArtifactNaming>,
}

impl PathTransformer {
    /// A transformer that swaps roots only.
    pub fn new(source_root: &str, build_root: &str) -> Self {
        Self {
            source_root: normalize(source_root),
            build_root: normalize(build_root),
            naming: None,
        }
    }

    /// A transformer for compiled sources (`.java` ↔ `.class`).
    pub fn for_sources(source_root: &str, build_root: &str) -> Self {
        Self::new(source_root, build_root).with_naming(ArtifactNaming::default())
    }

    /// Adds extension swapping to this transformer.
    pub fn with_naming(mut self, naming: ArtifactNaming) -> Self {
        self.naming = Some(naming);
        self
    }

    /// The source-side root.
    pub fn source_root(&self) -> &str {
        &self.source_root
    }

    /// The build-side root.
    pub fn build_root(&self) -> &str {
        &self.build_root
    }

    /// Transforms `path` in the given direction.
    ///
    /// Returns `None` if `path` does not live under the expected root.
    pub fn transform(&self, path: &str, direction: Direction) -> Option<String> {
        let (from_root, to_root) = match direction {
            Direction::SourceToBuild => (&self.source_root, &self.build_root),
            Direction::BuildToSource => (&self.build_root, &self.source_root),
        };
        let rest = strip_root(Path::new(path), Path::new(from_root))?;
        let mut target = Path::new(to_root).join(rest);

        if let Some(naming) = &self.naming {
            let (from_ext, to_ext) = match direction {
                Direction::SourceToBuild => (&naming.source_extension, &naming.artifact_extension),
                Direction::BuildToSource => (&naming.artifact_extension, &naming.source_extension),
            };
            if has_extension(&target, from_ext) {
                target.set_extension(to_ext);
            }
        }
        Some(to_canonical(&target))
    }

    /// Source path → artifact path.
    pub fn to_build(&self, source: &str) -> Option<String> {
        self.transform(source, Direction::SourceToBuild)
    }

    /// Artifact path → source path.
    pub fn to_source(&self, artifact: &str) -> Option<String> {
        self.transform(artifact, Direction::BuildToSource)
    }

    /// Returns `true` if `path` is a file this transformer tracks on the
    /// source side.
    pub fn is_source(&self, path: &str) -> bool {
        match &self.naming {
            Some(naming) => has_extension(Path::new(path), &naming.source_extension),
            None => true,
        }
    }

    /// Returns `true` if `path` is a file this transformer generates on the
    /// build side.
    pub fn is_artifact(&self, path: &str) -> bool {
        match &self.naming {
            Some(naming) => has_extension(Path::new(path), &naming.artifact_extension),
            None => true,
        }
    }

    /// Maps a nested-unit artifact back to its enclosing unit's artifact.
    ///
    /// `Outer$Inner.class` and `Outer$1$2.class` both become `Outer.class`:
    /// everything from the first delimiter up to the extension is dropped.
    /// Other paths are returned unchanged.
    pub fn enclosing_unit(&self, artifact: &str) -> String {
        let Some(naming) = &self.naming else {
            return artifact.to_string();
        };
        let Some(delimiter) = naming.inner_unit_delimiter else {
            return artifact.to_string();
        };
        let path = Path::new(artifact);
        if !has_extension(path, &naming.artifact_extension) {
            return artifact.to_string();
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            return artifact.to_string();
        };
        match stem.split_once(delimiter) {
            Some((outer, _)) if !outer.is_empty() => to_canonical(
                &path.with_file_name(format!("{outer}.{}", naming.artifact_extension)),
            ),
            _ => artifact.to_string(),
        }
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ext)
}

/// Returns the components of `path` after `root`, ignoring `.` components on
/// both sides.
fn strip_root(path: &Path, root: &Path) -> Option<PathBuf> {
    let mut rest = path.components().filter(|c| !matches!(c, Component::CurDir));
    for expected in root.components().filter(|c| !matches!(c, Component::CurDir)) {
        if rest.next()? != expected {
            return None;
        }
    }
    Some(rest.collect())
}
