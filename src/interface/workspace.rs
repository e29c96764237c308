//! The workspace context every operation runs against.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{read_config_or_default, write_config_file, Config};
use crate::errors::{EntwineError, Result};
use crate::index::{ContentIndex, BLOCKS_FILE, FILES_FILE};
use crate::model::{resolve_block, tangle_target, ReferenceName, Resolution};
use crate::readers::scan::scan_file;
use crate::readers::{scan, DocumentKind};
use crate::staging::{
    apply_records, commit_index, modified_definitions, plan_changes, refresh_files, retangle,
    ChangeSet, ChangeSetSummary, ConflictResolver, StagingHistory, CHANGES_DIR, STAGING_FILE,
};
use crate::status::{blocks_as_deleted, classify_blocks, classify_files, BlockDiff, FileDiff};

/// Name of the marker directory at the workspace root.
pub const MARKER_DIR: &str = ".entwine";
/// Configuration file inside the marker directory.
pub const CONFIG_FILE: &str = "config.toml";

/// What a successful [`Workspace::apply_latest`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyResult {
    /// Id of the applied change set.
    pub change_set: String,
    /// Records applied by this call, described.
    pub applied: Vec<String>,
    /// Generated files written while re-tangling.
    pub tangled: Vec<PathBuf>,
}

/// A workspace: its root, configuration, index and staging history.
#[derive(Debug)]
pub struct Workspace {
    /// Directory holding the marker directory.
    pub root: PathBuf,
    pub marker_dir: PathBuf,
    pub config: Config,
    pub index: ContentIndex,
    pub history: StagingHistory,
}

impl Workspace {
    /// Creates a workspace in `dir` and indexes what is already there.
    pub fn init(dir: &Path) -> Result<Self> {
        let marker_dir = dir.join(MARKER_DIR);
        if marker_dir.exists() {
            return Err(EntwineError::WorkspaceExists(dir.to_path_buf()));
        }

        tracing::info!("Creating workspace in {}", dir.display());
        fs::create_dir_all(marker_dir.join(CHANGES_DIR))?;
        let config = Config::default();
        write_config_file(&marker_dir.join(CONFIG_FILE), &config)?;
        for name in [FILES_FILE, BLOCKS_FILE, STAGING_FILE] {
            fs::write(marker_dir.join(name), b"")?;
        }

        let mut workspace = Self {
            root: dir.to_path_buf(),
            marker_dir,
            config,
            index: ContentIndex::new(),
            history: StagingHistory::default(),
        };
        workspace.scan_workspace()?;
        workspace.persist_indices()?;
        Ok(workspace)
    }

    /// Opens the workspace containing `start`, looking upward.
    pub fn find(start: &Path) -> Result<Self> {
        start
            .ancestors()
            .find(|dir| dir.join(MARKER_DIR).is_dir())
            .ok_or_else(|| EntwineError::WorkspaceNotFound {
                start: start.to_path_buf(),
            })
            .and_then(Self::open)
    }

    /// Opens the workspace rooted at `root`.
    pub fn open(root: &Path) -> Result<Self> {
        let marker_dir = root.join(MARKER_DIR);
        if !marker_dir.is_dir() {
            return Err(EntwineError::WorkspaceNotFound {
                start: root.to_path_buf(),
            });
        }

        let config = read_config_or_default(&marker_dir.join(CONFIG_FILE))?;
        let index = ContentIndex::load(&marker_dir)?;
        let history = StagingHistory::load(&marker_dir)?;
        tracing::debug!(
            "Opened {} with {} file(s) and {} block(s)",
            root.display(),
            index.files.len(),
            index.blocks.len()
        );

        Ok(Self {
            root: root.to_path_buf(),
            marker_dir,
            config,
            index,
            history,
        })
    }

    /// Scans every file in the workspace and merges the results into the index.
    pub fn scan_workspace(&mut self) -> Result<()> {
        let results = scan(&self.root, Path::new(""), &self.config)?;
        tracing::info!("Indexing {} file(s)", results.len());
        self.index.merge_scan(results);
        Ok(())
    }

    /// File statuses under `path`: discovered files first, then deleted ones.
    pub fn status(&self, path: &Path) -> Result<Vec<FileDiff>> {
        let scope = self.relative(path);
        let results = scan(&self.root, &scope, &self.config)?;
        let discovered: Vec<_> = results
            .iter()
            .map(|r| (r.path.clone(), r.hash, r.kind()))
            .collect();
        Ok(classify_files(&self.index.files, &discovered, &scope))
    }

    /// Block statuses of one file.
    pub fn block_status(&self, file: &Path) -> Result<Vec<BlockDiff>> {
        let path = self.relative(file);
        if !self.root.join(&path).is_file() {
            let kind = self
                .index
                .files
                .get(&path)
                .map(|f| f.kind)
                .unwrap_or_else(|| DocumentKind::detect(&path, b""));
            return Ok(blocks_as_deleted(&self.index.blocks, &path, kind));
        }

        let result = scan_file(&self.root, &path)?;
        Ok(classify_blocks(&self.index.blocks, &path, &result.parsed))
    }

    /// Plans a change set from the current workspace and records it as pending.
    pub fn stage<R: ConflictResolver + ?Sized>(
        &mut self,
        description: &str,
        resolver: &mut R,
    ) -> Result<ChangeSet> {
        let results = scan(&self.root, Path::new(""), &self.config)?;
        let change_set = plan_changes(description, &self.config, &self.index, &results, resolver)?;

        change_set.save(&self.marker_dir)?;
        self.history.push(change_set.summary());
        self.history.save(&self.marker_dir)?;
        Ok(change_set)
    }

    /// Applies the newest pending change set, resuming where an earlier
    /// attempt stopped.
    pub fn apply_latest(&mut self) -> Result<ApplyResult> {
        let entry = self
            .history
            .latest_pending()
            .cloned()
            .ok_or(EntwineError::NoPendingChangeSet)?;
        let id = entry.summary.id.clone();
        let change_set = ChangeSet::load(&self.marker_dir, &id)?;

        if entry.progress > 0 {
            tracing::info!("Resuming {} at record {}", id, entry.progress + 1);
        }
        let history = &mut self.history;
        let marker_dir = &self.marker_dir;
        apply_records(&self.root, &change_set, entry.progress, |done| {
            if let Some(entry) = history.entry_mut(&id) {
                entry.progress = done;
            }
            history.save(marker_dir)
        })?;

        let before = self.index.blocks.clone();
        commit_index(&mut self.index, &self.root, &self.config, &change_set)?;
        self.index.save(&self.marker_dir)?;

        let modified = modified_definitions(&before, &self.index);
        let tangled = retangle(&self.index, &self.root, &self.config, &modified)?;
        refresh_files(&mut self.index, &self.root, &self.config, &tangled)?;
        self.index.save(&self.marker_dir)?;

        if let Some(entry) = self.history.entry_mut(&id) {
            entry.applied = true;
        }
        self.history.save(&self.marker_dir)?;
        tracing::info!("Applied {}", id);

        Ok(ApplyResult {
            change_set: id,
            applied: change_set.records[entry.progress..]
                .iter()
                .map(|r| r.describe())
                .collect(),
            tangled,
        })
    }

    /// The change set the next [`Workspace::apply_latest`] would apply.
    pub fn pending_change_set(&self) -> Result<Option<ChangeSet>> {
        self.history
            .latest_pending()
            .map(|entry| ChangeSet::load(&self.marker_dir, &entry.summary.id))
            .transpose()
    }

    /// Every staged change set, oldest first.
    pub fn log(&self) -> Vec<ChangeSetSummary> {
        self.history.summaries()
    }

    /// Writes the index and the staging history.
    pub fn persist_indices(&self) -> Result<()> {
        self.index.save(&self.marker_dir)?;
        self.history.save(&self.marker_dir)
    }

    /// Resolves one block against the index.
    pub fn resolve_target(&self, name: &ReferenceName) -> Result<Resolution> {
        if !self.index.blocks.contains(name) {
            return Err(EntwineError::BlockNotFound(name.clone()));
        }
        Ok(resolve_block(name, &self.index.blocks))
    }

    /// The generated text a block's target would hold.
    pub fn render_target(&self, name: &ReferenceName) -> Result<String> {
        let block = self
            .index
            .blocks
            .get(name)
            .ok_or_else(|| EntwineError::BlockNotFound(name.clone()))?;
        Ok(tangle_target(&self.config, &self.index.blocks, block)?.text)
    }

    /// `path` relative to the root; the empty path is the whole workspace.
    fn relative(&self, path: &Path) -> PathBuf {
        let path = path.strip_prefix(&self.root).unwrap_or(path);
        if path == Path::new(".") {
            PathBuf::new()
        } else {
            path.to_path_buf()
        }
    }
}
