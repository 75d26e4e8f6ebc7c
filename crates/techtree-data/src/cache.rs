//! File-content cache keyed by path, size and modification time.
//!
//! Repeated loads of a large playset re-read only the files that changed.
//! The cache is a plain owned object; nothing in the core sees it.

use crate::loader::{DataLoadError, decode_script};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

#[derive(Debug, Clone)]
struct CacheEntry {
    len: u64,
    modified: Option<SystemTime>,
    text: Arc<str>,
}

#[derive(Debug, Default)]
pub struct FileCache {
    entries: HashMap<PathBuf, CacheEntry>,
    hits: u64,
    misses: u64,
}

impl FileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoded script text for `path`, from cache when size and mtime match.
    pub fn read(&mut self, path: &Path) -> Result<Arc<str>, DataLoadError> {
        let meta = std::fs::metadata(path)?;
        let len = meta.len();
        let modified = meta.modified().ok();

        if let Some(entry) = self.entries.get(path)
            && entry.len == len
            && entry.modified == modified
            && modified.is_some()
        {
            self.hits += 1;
            return Ok(Arc::clone(&entry.text));
        }

        let bytes = std::fs::read(path)?;
        let text: Arc<str> = Arc::from(decode_script(&bytes, path));
        self.misses += 1;
        self.entries.insert(
            path.to_path_buf(),
            CacheEntry {
                len,
                modified,
                text: Arc::clone(&text),
            },
        );
        Ok(text)
    }

    pub fn invalidate(&mut self, path: &Path) -> bool {
        self.entries.remove(path).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
