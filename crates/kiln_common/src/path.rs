//! Canonical path form shared by configuration, manifests, and the cache.
//!
//! Every path that kiln stores or compares uses forward slashes and carries no
//! trailing separator, so that `./src\a\B.java` and `./src/a/B.java` are the
//! same manifest key on every platform.

use std::path::Path;

/// Normalizes separators to `/` and drops any trailing separator.
///
/// The filesystem root (`/`) and drive roots (`C:/`) are preserved.
pub fn normalize(path: &str) -> String {
    let converted = path.replace('\\', "/");
    let trimmed = converted.trim_end_matches('/');
    if trimmed.is_empty() {
        return if converted.is_empty() {
            String::new()
        } else {
            "/".to_string()
        };
    }
    if trimmed.ends_with(':') {
        return format!("{trimmed}/");
    }
    trimmed.to_string()
}

/// Converts a filesystem path to its canonical string form.
pub fn to_canonical(path: &Path) -> String {
    normalize(&path.to_string_lossy())
}

/// Joins `child` onto `base` and returns the canonical result.
pub fn join(base: &str, child: &str) -> String {
    to_canonical(&Path::new(base).join(child))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backslashes_become_forward_slashes() {
        assert_eq!(normalize(r".\src\com\App.java"), "./src/com/App.java");
    }

    #[test]
    fn trailing_separator_removed() {
        assert_eq!(normalize("./build/"), "./build");
        assert_eq!(normalize(r"build\\"), "build");
    }

    #[test]
    fn roots_preserved() {
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize(r"C:\"), "C:/");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn already_canonical_is_unchanged() {
        assert_eq!(normalize("./src/a/B.java"), "./src/a/B.java");
    }

    #[test]
    fn join_uses_canonical_separator() {
        assert_eq!(join("./build", ".meta"), "./build/.meta");
        assert_eq!(join("./build/", "errors.txt"), "./build/errors.txt");
    }

    #[test]
    fn to_canonical_from_path() {
        let p = Path::new("./src").join("pkg").join("Main.java");
        assert_eq!(to_canonical(&p), "./src/pkg/Main.java");
    }
}
