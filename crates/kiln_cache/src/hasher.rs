//! Streaming content fingerprints for tracked files.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use kiln_common::ContentHash;
use xxhash_rust::xxh3::Xxh3;

use crate::error::CacheError;

/// Read buffer size used while hashing.
const CHUNK_SIZE: usize = 64 * 1024;

/// Utility for computing content fingerprints of files.
pub struct SourceHasher;

impl SourceHasher {
    /// Computes the XXH3-128 fingerprint of a file.
    ///
    /// The file is streamed in fixed-size chunks and never loaded whole.
    pub fn hash_file(path: &Path) -> Result<ContentHash, CacheError> {
        let file = File::open(path).map_err(CacheError::io(path))?;
        Self::hash_reader(file).map_err(CacheError::io(path))
    }

    /// Computes the fingerprint of everything `reader` yields.
    pub fn hash_reader<R: Read>(mut reader: R) -> std::io::Result<ContentHash> {
        let mut hasher = Xxh3::new();
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => hasher.update(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(ContentHash::from_digest(hasher.digest128()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_file_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("App.java");
        std::fs::write(&path, "class App {}").unwrap();

        let h1 = SourceHasher::hash_file(&path).unwrap();
        let h2 = SourceHasher::hash_file(&path).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn hash_file_different_content() {
        let dir = tempfile::tempdir().unwrap();
        let path_a = dir.path().join("A.java");
        let path_b = dir.path().join("B.java");
        std::fs::write(&path_a, "class A {}").unwrap();
        std::fs::write(&path_b, "class B {}").unwrap();

        let h1 = SourceHasher::hash_file(&path_a).unwrap();
        let h2 = SourceHasher::hash_file(&path_b).unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn chunked_read_matches_one_shot() {
        let data: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        let streamed = SourceHasher::hash_reader(&data[..]).unwrap();
        assert_eq!(streamed, ContentHash::from_bytes(&data));
    }

    #[test]
    fn empty_input_hashes() {
        let h = SourceHasher::hash_reader(std::io::empty()).unwrap();
        assert_eq!(h, ContentHash::from_bytes(b""));
    }

    #[test]
    fn hash_file_nonexistent_errors() {
        let err = SourceHasher::hash_file(Path::new("/nonexistent/File.java")).unwrap_err();
        assert!(matches!(err, CacheError::Io { .. }));
    }
}
