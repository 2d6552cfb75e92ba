//! File content cache.
//!
//! All source reads go through one process-wide cache keyed by path. The
//! cache is the single point of mutation for "did this file change": a
//! watched-file-change event invalidates exactly one entry, and the next
//! read re-fetches through the [`FileReader`] seam. Tests swap in
//! [`MemReader`] instead of touching the filesystem.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Source of raw file bytes.
pub trait FileReader: Send + Sync {
    /// Reads the full contents of `path`.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Reads from the real filesystem.
#[derive(Debug, Default)]
pub struct FsReader;

impl FileReader for FsReader {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

/// In-memory reader for tests and virtual source trees.
///
/// Cloning shares the underlying file table, so a test can keep a handle
/// and mutate files while an orchestrator owns another clone.
#[derive(Debug, Clone, Default)]
pub struct MemReader {
    files: Arc<RwLock<HashMap<PathBuf, Vec<u8>>>>,
}

impl MemReader {
    /// Creates an empty reader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a file.
    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        self.files
            .write()
            .expect("file table poisoned")
            .insert(path.into(), contents.into());
    }

    /// Removes a file, returning true if it existed.
    pub fn remove(&self, path: &Path) -> bool {
        self.files
            .write()
            .expect("file table poisoned")
            .remove(path)
            .is_some()
    }
}

impl FileReader for MemReader {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files
            .read()
            .expect("file table poisoned")
            .get(path)
            .cloned()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("{}", path.display()))
            })
    }
}

/// Memoized file contents keyed by path.
pub struct ContentCache {
    reader: Box<dyn FileReader>,
    entries: HashMap<PathBuf, Arc<Vec<u8>>>,
}

impl ContentCache {
    /// Creates a cache over the given reader.
    pub fn new(reader: Box<dyn FileReader>) -> Self {
        Self {
            reader,
            entries: HashMap::new(),
        }
    }

    /// Returns the contents of `path`, reading at most once until the
    /// entry is invalidated.
    pub fn read(&mut self, path: &Path) -> io::Result<Arc<Vec<u8>>> {
        if let Some(entry) = self.entries.get(path) {
            return Ok(Arc::clone(entry));
        }
        let contents = Arc::new(self.reader.read(path)?);
        self.entries.insert(path.to_path_buf(), Arc::clone(&contents));
        Ok(contents)
    }

    /// Drops the cached entry for `path`. Returns true if an entry existed,
    /// i.e. the file was part of the current graph.
    pub fn invalidate(&mut self, path: &Path) -> bool {
        self.entries.remove(path).is_some()
    }

    /// Drops every cached entry (full rebuild).
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_is_memoized_until_invalidated() {
        let reader = MemReader::new();
        reader.insert("/src/a.txt", "one");
        let handle = reader.clone();

        let mut cache = ContentCache::new(Box::new(reader));
        assert_eq!(*cache.read(Path::new("/src/a.txt")).unwrap(), b"one");

        // Mutating behind the cache is invisible until invalidation.
        handle.insert("/src/a.txt", "two");
        assert_eq!(*cache.read(Path::new("/src/a.txt")).unwrap(), b"one");

        assert!(cache.invalidate(Path::new("/src/a.txt")));
        assert_eq!(*cache.read(Path::new("/src/a.txt")).unwrap(), b"two");
    }

    #[test]
    fn invalidate_reports_unknown_paths() {
        let mut cache = ContentCache::new(Box::new(MemReader::new()));
        assert!(!cache.invalidate(Path::new("/src/missing.txt")));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let mut cache = ContentCache::new(Box::new(MemReader::new()));
        let err = cache.read(Path::new("/src/nope.js")).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
