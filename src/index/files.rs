//! File records.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::io::FastHash;
use crate::readers::DocumentKind;

/// A file the workspace knows about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedFile {
    /// Workspace-relative path.
    pub path: PathBuf,
    /// Hash of the raw bytes.
    pub fast_hash: FastHash,
    pub kind: DocumentKind,
}

impl TrackedFile {
    pub fn new(path: impl Into<PathBuf>, fast_hash: FastHash, kind: DocumentKind) -> Self {
        Self {
            path: path.into(),
            fast_hash,
            kind,
        }
    }
}

/// Tracked files keyed by path, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileIndex {
    files: IndexMap<PathBuf, TrackedFile>,
}

impl FileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Position of a record in insertion order.
    pub fn index_of(&self, path: &Path) -> Option<usize> {
        self.files.get_index_of(path)
    }

    pub fn get(&self, path: &Path) -> Option<&TrackedFile> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    /// Inserts a new record. A record for the same path is kept and the call
    /// returns false.
    pub fn add(&mut self, file: TrackedFile) -> bool {
        if self.files.contains_key(&file.path) {
            tracing::debug!("{} is already tracked", file.path.display());
            return false;
        }
        self.files.insert(file.path.clone(), file);
        true
    }

    /// Replaces an existing record. Returns false if the path is not tracked.
    pub fn update(&mut self, file: TrackedFile) -> bool {
        match self.files.get_mut(&file.path) {
            Some(existing) => {
                *existing = file;
                true
            }
            None => false,
        }
    }

    /// Adds or replaces a record.
    pub fn upsert(&mut self, file: TrackedFile) {
        self.files.insert(file.path.clone(), file);
    }

    pub fn remove(&mut self, path: &Path) -> Option<TrackedFile> {
        self.files.shift_remove(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedFile> {
        self.files.values()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
