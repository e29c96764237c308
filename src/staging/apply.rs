//! Replaying a change set and bringing the index up to date.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::errors::{EntwineError, Result};
use crate::index::{BlockIndex, ContentIndex};
use crate::io::atomic_write;
use crate::model::{tangle_target, ReferenceName};
use crate::readers::{scan_paths, DocumentKind};

use super::record::ChangeSet;

/// Applies records from `start` on, strictly in order. `checkpoint` is called
/// with the number of records done after each success. The first failure
/// stops the run.
pub fn apply_records(
    root: &Path,
    change_set: &ChangeSet,
    start: usize,
    mut checkpoint: impl FnMut(usize) -> Result<()>,
) -> Result<()> {
    for (position, record) in change_set.records.iter().enumerate().skip(start) {
        if let Err(e) = record.apply(root) {
            tracing::error!("Failed to {}: {}", record.describe(), e);
            return Err(EntwineError::PartialApplyFailure {
                change_set: change_set.id.clone(),
                succeeded: change_set.records[..position]
                    .iter()
                    .map(|r| r.describe())
                    .collect(),
                failed: record.describe(),
                message: e.to_string(),
            });
        }
        tracing::info!("{}", record.describe());
        checkpoint(position + 1)?;
    }
    Ok(())
}

/// Drops unindexed files and re-reads indexed ones.
pub fn commit_index(
    index: &mut ContentIndex,
    root: &Path,
    config: &Config,
    change_set: &ChangeSet,
) -> Result<()> {
    for path in &change_set.files_to_unindex {
        tracing::debug!("Unindexing {}", path.display());
        index.unindex_file(path);
    }
    refresh_files(index, root, config, &change_set.files_to_index)
}

/// Re-reads `paths` and merges them into the index, prose first.
pub fn refresh_files(
    index: &mut ContentIndex,
    root: &Path,
    config: &Config,
    paths: &[PathBuf],
) -> Result<()> {
    let existing: Vec<PathBuf> = paths
        .iter()
        .filter(|p| root.join(p).is_file())
        .cloned()
        .collect();
    let results = scan_paths(root, &existing, config.workers)?;
    index.merge_scan(results);
    Ok(())
}

/// Prose definitions in `after` that `before` lacks or held differently.
pub fn modified_definitions(before: &BlockIndex, after: &ContentIndex) -> Vec<ReferenceName> {
    after
        .blocks
        .iter()
        .filter(|block| {
            after
                .files
                .get(&block.defining_file)
                .is_some_and(|f| f.kind == DocumentKind::ProseDocument)
        })
        .filter(|block| match before.get(&block.name) {
            Some(old) => {
                old.content_hash != block.content_hash
                    || old.explicit_target_file != block.explicit_target_file
            }
            None => true,
        })
        .map(|block| block.name.clone())
        .collect()
}

/// Renders every target that `names` reach and writes those that differ.
/// Returns the files written.
pub fn retangle(
    index: &ContentIndex,
    root: &Path,
    config: &Config,
    names: &[ReferenceName],
) -> Result<Vec<PathBuf>> {
    let mut targets: Vec<PathBuf> = Vec::new();
    for name in names {
        for target in index.blocks.related_target_files(name) {
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
    }

    let mut written = Vec::new();
    for target in targets {
        let Some(block) = index.blocks.block_by_target(&target) else {
            continue;
        };
        let tangled = tangle_target(config, &index.blocks, block)?;
        let full = root.join(&target);
        let current = fs::read_to_string(&full).ok();
        if current.as_deref() == Some(tangled.text.as_str()) {
            continue;
        }
        atomic_write(&full, tangled.text.as_bytes())?;
        tracing::info!("Tangled {}", target.display());
        written.push(target);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staging::record::ChangeRecord;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_partial_failure_reports_prefix() {
        let dir = tempdir().unwrap();
        let change_set = ChangeSet::new(
            "mixed",
            vec![
                ChangeRecord::CreateFile {
                    path: PathBuf::from("a.txt"),
                    content: "a\n".to_string(),
                },
                ChangeRecord::UpdateFile {
                    path: PathBuf::from("missing.txt"),
                    diff: crate::io::unified_diff("x\n", "y\n").unwrap(),
                },
                ChangeRecord::CreateFile {
                    path: PathBuf::from("c.txt"),
                    content: "c\n".to_string(),
                },
            ],
            Vec::new(),
            Vec::new(),
        );

        let mut progress = Vec::new();
        let err = apply_records(dir.path(), &change_set, 0, |done| {
            progress.push(done);
            Ok(())
        })
        .unwrap_err();

        match err {
            EntwineError::PartialApplyFailure { succeeded, failed, .. } => {
                assert_eq!(succeeded, vec!["create a.txt".to_string()]);
                assert_eq!(failed, "update missing.txt");
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(progress, vec![1]);
        assert!(dir.path().join("a.txt").exists());
        assert!(!dir.path().join("c.txt").exists());
    }

    #[test]
    fn test_resume_skips_done_records() {
        let dir = tempdir().unwrap();
        let change_set = ChangeSet::new(
            "resume",
            vec![
                ChangeRecord::CreateFile {
                    path: PathBuf::from("a.txt"),
                    content: "a\n".to_string(),
                },
                ChangeRecord::CreateFile {
                    path: PathBuf::from("b.txt"),
                    content: "b\n".to_string(),
                },
            ],
            Vec::new(),
            Vec::new(),
        );

        apply_records(dir.path(), &change_set, 1, |_| Ok(())).unwrap();
        assert!(!dir.path().join("a.txt").exists());
        assert!(dir.path().join("b.txt").exists());
    }

    #[test]
    fn test_retangle_writes_only_differences() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(
            root.join("doc.md"),
            "```python file=out.py\nprint(\"hi\")\n```\n",
        )
        .unwrap();

        let mut index = ContentIndex::new();
        let config = Config::default();
        refresh_files(&mut index, root, &config, &[PathBuf::from("doc.md")]).unwrap();

        let names = modified_definitions(&BlockIndex::new(), &index);
        assert_eq!(names, vec![ReferenceName::new("out.py")]);

        let written = retangle(&index, root, &config, &names).unwrap();
        assert_eq!(written, vec![PathBuf::from("out.py")]);

        let again = retangle(&index, root, &config, &names).unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn test_modified_definitions_skips_unchanged_blocks() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let config = Config::default();
        fs::write(
            root.join("doc.md"),
            "```python #keep\nsame()\n```\n\n```python #edit\nbefore()\n```\n",
        )
        .unwrap();

        let mut index = ContentIndex::new();
        refresh_files(&mut index, root, &config, &[PathBuf::from("doc.md")]).unwrap();
        let before = index.blocks.clone();

        fs::write(
            root.join("doc.md"),
            "```python #keep\nsame()\n```\n\n```python #edit\nafter()\n```\n\n```python #new\nx\n```\n",
        )
        .unwrap();
        refresh_files(&mut index, root, &config, &[PathBuf::from("doc.md")]).unwrap();

        assert_eq!(
            modified_definitions(&before, &index),
            vec![ReferenceName::new("edit"), ReferenceName::new("new")]
        );
    }
}
