//! Change records, change sets and the staging history.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{EntwineError, Result};
use crate::index::{load_bincode, save_bincode};
use crate::io::{apply_diff, atomic_write, fast_hash_str};

/// Directory under the marker directory holding one file per change set.
pub const CHANGES_DIR: &str = "changes";
/// History location inside the marker directory.
pub const STAGING_FILE: &str = "staging.bin";

/// One planned file operation. Paths are workspace-relative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeRecord {
    CreateFile { path: PathBuf, content: String },
    DeleteFile { path: PathBuf },
    /// Unified diff against the file as it was when staged.
    UpdateFile { path: PathBuf, diff: String },
}

impl ChangeRecord {
    pub fn path(&self) -> &Path {
        match self {
            ChangeRecord::CreateFile { path, .. }
            | ChangeRecord::DeleteFile { path }
            | ChangeRecord::UpdateFile { path, .. } => path,
        }
    }

    /// Short human description, e.g. `update docs/intro.md`.
    pub fn describe(&self) -> String {
        let verb = match self {
            ChangeRecord::CreateFile { .. } => "create",
            ChangeRecord::DeleteFile { .. } => "delete",
            ChangeRecord::UpdateFile { .. } => "update",
        };
        format!("{} {}", verb, self.path().display())
    }

    /// Performs the operation below `root`.
    pub fn apply(&self, root: &Path) -> Result<()> {
        let full = root.join(self.path());
        match self {
            ChangeRecord::CreateFile { content, .. } => {
                atomic_write(&full, content.as_bytes())?;
            }
            ChangeRecord::DeleteFile { .. } => match fs::remove_file(&full) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!("{} was already gone", full.display());
                }
                Err(e) => return Err(e.into()),
            },
            ChangeRecord::UpdateFile { path, diff } => {
                let original = fs::read_to_string(&full)
                    .map_err(|e| EntwineError::unreadable(&full, e))?;
                let patched = apply_diff(path, &original, diff)?;
                atomic_write(&full, patched.as_bytes())?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// An ordered batch of records, produced by staging and consumed once by apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub id: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub records: Vec<ChangeRecord>,
    /// Files whose records are (re)built once the records are applied.
    pub files_to_index: Vec<PathBuf>,
    /// Files whose records are dropped once the records are applied.
    pub files_to_unindex: Vec<PathBuf>,
}

impl ChangeSet {
    pub fn new(
        description: impl Into<String>,
        records: Vec<ChangeRecord>,
        files_to_index: Vec<PathBuf>,
        files_to_unindex: Vec<PathBuf>,
    ) -> Self {
        let description = description.into();
        let timestamp = Utc::now();
        let id = fast_hash_str(&format!("{}{}", timestamp.to_rfc3339(), description)).to_hex();
        Self {
            id,
            description,
            timestamp,
            records,
            files_to_index,
            files_to_unindex,
        }
    }

    pub fn summary(&self) -> ChangeSetSummary {
        ChangeSetSummary {
            id: self.id.clone(),
            description: self.description.clone(),
            timestamp: self.timestamp,
        }
    }

    /// Whether applying would change nothing at all.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.files_to_index.is_empty() && self.files_to_unindex.is_empty()
    }

    fn file_name(marker_dir: &Path, id: &str) -> PathBuf {
        marker_dir.join(CHANGES_DIR).join(format!("{}.bin", id))
    }

    /// Writes the change set under the marker directory.
    pub fn save(&self, marker_dir: &Path) -> Result<()> {
        save_bincode(&Self::file_name(marker_dir, &self.id), self)
    }

    /// Reads a change set by id.
    pub fn load(marker_dir: &Path, id: &str) -> Result<Self> {
        let path = Self::file_name(marker_dir, id);
        if !path.exists() {
            return Err(EntwineError::IndexCorruption {
                path,
                message: format!("change set {} is listed but missing", id),
            });
        }
        let bytes = fs::read(&path)?;
        bincode::deserialize(&bytes).map_err(|e| EntwineError::IndexCorruption {
            path,
            message: e.to_string(),
        })
    }
}

/// What `log` shows about a change set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSetSummary {
    pub id: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

/// A change set in the history, and how far it got.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub summary: ChangeSetSummary,
    pub applied: bool,
    /// Number of records already applied.
    pub progress: usize,
}

/// Every change set ever staged, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingHistory {
    entries: Vec<HistoryEntry>,
}

impl StagingHistory {
    pub fn load(marker_dir: &Path) -> Result<Self> {
        load_bincode(&marker_dir.join(STAGING_FILE))
    }

    pub fn save(&self, marker_dir: &Path) -> Result<()> {
        save_bincode(&marker_dir.join(STAGING_FILE), self)
    }

    pub fn push(&mut self, summary: ChangeSetSummary) {
        self.entries.push(HistoryEntry {
            summary,
            applied: false,
            progress: 0,
        });
    }

    /// The newest change set not yet applied.
    pub fn latest_pending(&self) -> Option<&HistoryEntry> {
        self.entries.iter().rev().find(|e| !e.applied)
    }

    pub fn entry_mut(&mut self, id: &str) -> Option<&mut HistoryEntry> {
        self.entries.iter_mut().find(|e| e.summary.id == id)
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Summaries in staging order.
    pub fn summaries(&self) -> Vec<ChangeSetSummary> {
        self.entries.iter().map(|e| e.summary.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::unified_diff;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_records_apply_in_place() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("keep.txt"), "a\nb\nc\n").unwrap();
        fs::write(dir.path().join("old.txt"), "x").unwrap();

        let records = vec![
            ChangeRecord::CreateFile {
                path: PathBuf::from("sub/new.txt"),
                content: "hello\n".to_string(),
            },
            ChangeRecord::UpdateFile {
                path: PathBuf::from("keep.txt"),
                diff: unified_diff("a\nb\nc\n", "a\nB\nc\n").unwrap(),
            },
            ChangeRecord::DeleteFile {
                path: PathBuf::from("old.txt"),
            },
        ];
        for record in &records {
            record.apply(dir.path()).unwrap();
        }

        assert_eq!(fs::read_to_string(dir.path().join("sub/new.txt")).unwrap(), "hello\n");
        assert_eq!(fs::read_to_string(dir.path().join("keep.txt")).unwrap(), "a\nB\nc\n");
        assert!(!dir.path().join("old.txt").exists());
        assert_eq!(records[1].describe(), "update keep.txt");
    }

    #[test]
    fn test_update_of_missing_file_fails() {
        let dir = tempdir().unwrap();
        let record = ChangeRecord::UpdateFile {
            path: PathBuf::from("nope.txt"),
            diff: unified_diff("a\n", "b\n").unwrap(),
        };
        assert!(record.apply(dir.path()).is_err());
    }

    #[test]
    fn test_change_set_round_trip() {
        let dir = tempdir().unwrap();
        let change_set = ChangeSet::new(
            "first",
            vec![ChangeRecord::DeleteFile {
                path: PathBuf::from("a"),
            }],
            vec![PathBuf::from("b")],
            Vec::new(),
        );
        assert_eq!(change_set.id.len(), 16);

        change_set.save(dir.path()).unwrap();
        assert_eq!(ChangeSet::load(dir.path(), &change_set.id).unwrap(), change_set);
        assert!(ChangeSet::load(dir.path(), "0000000000000000").is_err());
    }

    #[test]
    fn test_history_tracks_pending() {
        let dir = tempdir().unwrap();
        let mut history = StagingHistory::default();
        let first = ChangeSet::new("first", Vec::new(), Vec::new(), Vec::new());
        let second = ChangeSet::new("second", Vec::new(), Vec::new(), Vec::new());
        history.push(first.summary());
        history.push(second.summary());

        assert_eq!(history.latest_pending().unwrap().summary.description, "second");
        history.entry_mut(&second.id).unwrap().applied = true;
        assert_eq!(history.latest_pending().unwrap().summary.description, "first");

        history.save(dir.path()).unwrap();
        let loaded = StagingHistory::load(dir.path()).unwrap();
        assert_eq!(loaded, history);
        assert_eq!(loaded.summaries().len(), 2);
    }
}
