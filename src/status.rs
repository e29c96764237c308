//! Classification of files and blocks against the index.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::index::{BlockIndex, FileIndex};
use crate::io::FastHash;
use crate::model::{NamedBlock, ReferenceName};
use crate::readers::{DocumentKind, EntanglementKind, ParsedFile};

/// How something on disk compares to its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum Status {
    Unchanged,
    Modified,
    Created,
    Deleted,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Unchanged => "unchanged",
            Status::Modified => "modified",
            Status::Created => "created",
            Status::Deleted => "deleted",
        };
        f.write_str(label)
    }
}

/// Status of one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub path: PathBuf,
    pub status: Status,
    /// Kind of the file on disk, or of the record when deleted.
    pub kind: DocumentKind,
}

/// Status of one named block within a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDiff {
    pub name: ReferenceName,
    pub defining_file: PathBuf,
    pub status: Status,
    /// The block as parsed now, or as indexed when deleted.
    pub block: NamedBlock,
}

/// Classifies a file that exists on disk.
pub fn classify_file(index: &FileIndex, path: &Path, hash: FastHash) -> Status {
    match index.get(path) {
        None => Status::Created,
        Some(record) if record.fast_hash == hash => Status::Unchanged,
        Some(_) => Status::Modified,
    }
}

/// Classifies every discovered file, then reports tracked files within
/// `scope` that were not discovered as deleted.
pub fn classify_files(
    index: &FileIndex,
    discovered: &[(PathBuf, FastHash, DocumentKind)],
    scope: &Path,
) -> Vec<FileDiff> {
    let mut diffs: Vec<FileDiff> = discovered
        .iter()
        .map(|(path, hash, kind)| FileDiff {
            path: path.clone(),
            status: classify_file(index, path, *hash),
            kind: *kind,
        })
        .collect();

    for record in index.iter() {
        if !in_scope(&record.path, scope) {
            continue;
        }
        if discovered.iter().all(|(path, _, _)| path != &record.path) {
            diffs.push(FileDiff {
                path: record.path.clone(),
                status: Status::Deleted,
                kind: record.kind,
            });
        }
    }

    diffs
}

/// Whether `path` is `scope` or lies below it. An empty scope is the whole workspace.
pub fn in_scope(path: &Path, scope: &Path) -> bool {
    scope.as_os_str().is_empty() || scope == Path::new(".") || path.starts_with(scope)
}

/// Classifies the blocks of a parsed file against the block index.
pub fn classify_blocks(index: &BlockIndex, path: &Path, parsed: &ParsedFile) -> Vec<BlockDiff> {
    let current: Vec<NamedBlock> = parsed
        .blocks()
        .into_iter()
        .filter(|p| p.kind != EntanglementKind::GeneratedDocument)
        .map(|p| p.block)
        .collect();

    let mut diffs: Vec<BlockDiff> = current
        .iter()
        .map(|block| {
            let (status, defining_file) = match index.get(&block.name) {
                None => (Status::Created, block.defining_file.clone()),
                Some(indexed) if indexed.content_hash == block.content_hash => {
                    (Status::Unchanged, indexed.defining_file.clone())
                }
                Some(indexed) => (Status::Modified, indexed.defining_file.clone()),
            };
            tracing::debug!("{}: block '{}' is {}", path.display(), block.name, status);
            BlockDiff {
                name: block.name.clone(),
                defining_file,
                status,
                block: block.clone(),
            }
        })
        .collect();

    let expected = match parsed.kind() {
        DocumentKind::ProseDocument => index.blocks_defined_in(path),
        DocumentKind::GeneratedDocument => index
            .iter()
            .filter(|b| b.target_files().any(|t| t == path))
            .collect(),
        DocumentKind::Opaque => Vec::new(),
    };
    for indexed in expected {
        if current.iter().all(|b| b.name != indexed.name) {
            diffs.push(deleted(indexed));
        }
    }

    diffs
}

/// Reports every indexed block tied to a file that no longer exists.
pub fn blocks_as_deleted(index: &BlockIndex, path: &Path, kind: DocumentKind) -> Vec<BlockDiff> {
    let blocks = match kind {
        DocumentKind::ProseDocument => index.blocks_defined_in(path),
        _ => index
            .iter()
            .filter(|b| b.target_files().any(|t| t == path))
            .collect(),
    };
    blocks.into_iter().map(deleted).collect()
}

fn deleted(block: &NamedBlock) -> BlockDiff {
    BlockDiff {
        name: block.name.clone(),
        defining_file: block.defining_file.clone(),
        status: Status::Deleted,
        block: block.clone(),
    }
}
