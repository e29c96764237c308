//! The content index: what the workspace last agreed the files and blocks were.

mod blocks;
mod files;

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::{EntwineError, Result};
use crate::io::atomic_write;
use crate::model::{NamedBlock, ReferenceName};
use crate::readers::{DocumentKind, EntanglementKind, ParsedEntanglementBlock, ScanResult};

pub use blocks::{BlockIndex, IntegrityViolation};
pub use files::{FileIndex, TrackedFile};

/// File index location inside the marker directory.
pub const FILES_FILE: &str = "files.bin";
/// Block index location inside the marker directory.
pub const BLOCKS_FILE: &str = "blocks.bin";

/// File and block records. Only the apply step and scans mutate it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentIndex {
    pub files: FileIndex,
    pub blocks: BlockIndex,
}

impl ContentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads both stores from the marker directory.
    ///
    /// Missing or empty files load as empty stores. A store that fails to
    /// decode, or whose back-links disagree with its references, is corrupt.
    pub fn load(marker_dir: &Path) -> Result<Self> {
        let files: FileIndex = load_bincode(&marker_dir.join(FILES_FILE))?;
        let blocks_path = marker_dir.join(BLOCKS_FILE);
        let blocks: BlockIndex = load_bincode(&blocks_path)?;

        if let Some(violation) = blocks.verify_references().first() {
            return Err(EntwineError::IndexCorruption {
                path: blocks_path,
                message: violation.to_string(),
            });
        }

        Ok(Self { files, blocks })
    }

    /// Writes both stores to the marker directory.
    pub fn save(&self, marker_dir: &Path) -> Result<()> {
        save_bincode(&marker_dir.join(FILES_FILE), &self.files)?;
        save_bincode(&marker_dir.join(BLOCKS_FILE), &self.blocks)?;
        tracing::debug!(
            "Saved {} file(s) and {} block(s)",
            self.files.len(),
            self.blocks.len()
        );
        Ok(())
    }

    /// Records a file and the blocks parsed from it.
    ///
    /// Prose definitions replace earlier records of the same name from the
    /// same document; a name already defined by another prose document keeps
    /// its first definition. Generated blocks only fill in an indirect target
    /// on blocks that have no target yet, or are indexed as-is when unknown.
    pub fn merge_file(&mut self, file: TrackedFile, parsed: &[ParsedEntanglementBlock]) {
        let path = file.path.clone();
        self.files.upsert(file);

        for entry in parsed {
            match entry.kind {
                EntanglementKind::Prose => self.merge_prose(entry.block.clone()),
                EntanglementKind::Generated => self.merge_generated(&path, entry.block.clone()),
                EntanglementKind::GeneratedDocument => {}
            }
        }
    }

    fn merge_prose(&mut self, mut block: NamedBlock) {
        let Some(existing) = self.blocks.get(&block.name) else {
            self.blocks.add(block);
            return;
        };

        if existing.defining_file != block.defining_file && self.is_prose(&existing.defining_file) {
            tracing::warn!(
                "'{}' is defined in both {} and {}; keeping the first",
                block.name,
                existing.defining_file.display(),
                block.defining_file.display()
            );
            return;
        }

        if block.explicit_target_file.is_none() {
            block.indirect_target_file = existing.indirect_target_file.clone();
        }
        self.blocks.update(block);
    }

    fn merge_generated(&mut self, path: &Path, block: NamedBlock) {
        match self.blocks.get(&block.name) {
            Some(existing) => {
                if existing.explicit_target_file.is_none() && existing.indirect_target_file.is_none() {
                    self.blocks
                        .set_indirect_target(&block.name, Some(path.to_path_buf()));
                }
            }
            None => {
                self.blocks.add(block);
            }
        }
    }

    fn is_prose(&self, path: &Path) -> bool {
        self.files
            .get(path)
            .is_some_and(|f| f.kind == DocumentKind::ProseDocument)
    }

    /// Drops what a file no longer contains before it is merged again.
    pub fn forget_stale(&mut self, path: &Path, kind: DocumentKind, current: &[ParsedEntanglementBlock]) {
        let present = |name: &ReferenceName| current.iter().any(|p| &p.block.name == name);

        match kind {
            DocumentKind::ProseDocument => {
                let stale: Vec<ReferenceName> = self
                    .blocks
                    .blocks_defined_in(path)
                    .into_iter()
                    .filter(|b| !present(&b.name))
                    .map(|b| b.name.clone())
                    .collect();
                for name in stale {
                    tracing::debug!("Forgetting '{}' from {}", name, path.display());
                    self.blocks.remove(&name);
                }
            }
            DocumentKind::GeneratedDocument => self.clear_indirect(path, present),
            DocumentKind::Opaque => {}
        }
    }

    /// Removes a file record, the blocks it defines and pointers into it.
    pub fn unindex_file(&mut self, path: &Path) -> Option<TrackedFile> {
        let removed = self.files.remove(path);
        let defined: Vec<ReferenceName> = self
            .blocks
            .blocks_defined_in(path)
            .into_iter()
            .map(|b| b.name.clone())
            .collect();
        for name in defined {
            self.blocks.remove(&name);
        }
        self.clear_indirect(path, |_| false);
        removed
    }

    fn clear_indirect(&mut self, path: &Path, keep: impl Fn(&ReferenceName) -> bool) {
        let embedded: Vec<ReferenceName> = self
            .blocks
            .iter()
            .filter(|b| b.indirect_target_file.as_deref() == Some(path) && !keep(&b.name))
            .map(|b| b.name.clone())
            .collect();
        for name in embedded {
            self.blocks.set_indirect_target(&name, None);
        }
    }

    /// Every tracked file path.
    pub fn tracked_paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }

    /// Merges scan results on the calling thread: prose documents first,
    /// then generated files, each group by path.
    pub fn merge_scan(&mut self, mut results: Vec<ScanResult>) {
        results.sort_by(|a, b| {
            merge_rank(a.kind())
                .cmp(&merge_rank(b.kind()))
                .then_with(|| a.path.cmp(&b.path))
        });

        for result in results {
            let kind = result.kind();
            let blocks = result.parsed.blocks();
            self.forget_stale(&result.path, kind, &blocks);
            self.merge_file(TrackedFile::new(result.path, result.hash, kind), &blocks);
        }
    }
}

fn merge_rank(kind: DocumentKind) -> u8 {
    match kind {
        DocumentKind::ProseDocument => 0,
        DocumentKind::GeneratedDocument => 1,
        DocumentKind::Opaque => 2,
    }
}

/// Reads a bincode store. Missing and zero-length files decode as the default.
pub(crate) fn load_bincode<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let bytes = fs::read(path)?;
    if bytes.is_empty() {
        return Ok(T::default());
    }
    bincode::deserialize(&bytes).map_err(|e| EntwineError::IndexCorruption {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Writes a bincode store atomically.
pub(crate) fn save_bincode<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = bincode::serialize(value).map_err(|e| EntwineError::Other(e.to_string()))?;
    atomic_write(path, &bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::fast_hash;
    use crate::readers::parse_file;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn merge(index: &mut ContentIndex, path: &str, content: &str) {
        let parsed = parse_file(Path::new(path), content.as_bytes());
        let blocks = parsed.blocks();
        index.forget_stale(Path::new(path), parsed.kind(), &blocks);
        index.merge_file(
            TrackedFile::new(path, fast_hash(content.as_bytes()), parsed.kind()),
            &blocks,
        );
    }

    #[test]
    fn test_empty_files_load_as_empty() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(FILES_FILE), b"").unwrap();
        fs::write(dir.path().join(BLOCKS_FILE), b"").unwrap();

        assert_eq!(ContentIndex::load(dir.path()).unwrap(), ContentIndex::new());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let mut index = ContentIndex::new();
        merge(&mut index, "doc.md", "```python #a\n<<b>>\n```\n\n```python #b\nx\n```\n");

        index.save(dir.path()).unwrap();
        let loaded = ContentIndex::load(dir.path()).unwrap();

        assert_eq!(loaded, index);
        assert_eq!(
            loaded.blocks.get(&ReferenceName::new("b")).unwrap().incoming_references,
            vec![ReferenceName::new("a")]
        );
    }

    #[test]
    fn test_garbage_is_corruption() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(BLOCKS_FILE), b"\x01\x00\x00\x00\x00\x00\x00\x00\xff").unwrap();

        let err = ContentIndex::load(dir.path()).unwrap_err();
        assert!(matches!(err, EntwineError::IndexCorruption { .. }));
    }

    #[test]
    fn test_prose_refresh_forgets_removed_blocks() {
        let mut index = ContentIndex::new();
        merge(&mut index, "doc.md", "```python #a\none\n```\n\n```python #b\ntwo\n```\n");
        merge(&mut index, "doc.md", "```python #a\nuno\n```\n");

        assert_eq!(index.blocks.len(), 1);
        assert_eq!(index.blocks.get(&ReferenceName::new("a")).unwrap().content, "uno");
    }

    #[test]
    fn test_first_prose_definition_wins_across_files() {
        let mut index = ContentIndex::new();
        merge(&mut index, "a.md", "```python #x\nfrom a\n```\n");
        merge(&mut index, "b.md", "```python #x\nfrom b\n```\n");

        let block = index.blocks.get(&ReferenceName::new("x")).unwrap();
        assert_eq!(block.defining_file, PathBuf::from("a.md"));
    }

    #[test]
    fn test_merge_scan_puts_prose_first() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.py"), "print(1)\n").unwrap();
        fs::write(root.join("b.md"), "```python #greet\nprint(1)\n```\n").unwrap();
        let results = crate::readers::scan_paths(
            root,
            &[PathBuf::from("a.py"), PathBuf::from("b.md")],
            2,
        )
        .unwrap();

        let mut index = ContentIndex::new();
        index.merge_scan(results);

        assert_eq!(
            index.tracked_paths(),
            vec![PathBuf::from("b.md"), PathBuf::from("a.py")]
        );
        assert!(index.blocks.contains(&ReferenceName::new("greet")));
    }

    #[test]
    fn test_generated_fills_indirect_target_only() {
        let mut index = ContentIndex::new();
        merge(
            &mut index,
            "doc.md",
            "```python file=out.py\n<<helper>>\n```\n\n```python #helper\npass\n```\n",
        );
        let generated = format!(
            "# Entanglement: This file is entangled with {{doc.md}}.\n\
             # Entanglement: This block is entangled with {{out.py}}@{{doc.md}}.\n\
             # Entanglement: This block is entangled with {{helper}}@{{doc.md}}.\n\
             pass\n\
             # End of block entanglement.\n\
             # End of block entanglement.\n\
             # End of file entanglement. Created by Entwine (Version {} ).\n",
            crate::config::markers::TOOL_VERSION
        );
        merge(&mut index, "out.py", &generated);

        let helper = index.blocks.get(&ReferenceName::new("helper")).unwrap();
        assert_eq!(helper.indirect_target_file, Some(PathBuf::from("out.py")));
        let out = index.blocks.get(&ReferenceName::new("out.py")).unwrap();
        assert_eq!(out.indirect_target_file, None);
        assert_eq!(index.blocks.len(), 2);

        index.unindex_file(Path::new("out.py"));
        assert_eq!(
            index.blocks.get(&ReferenceName::new("helper")).unwrap().indirect_target_file,
            None
        );
        assert_eq!(index.files.len(), 1);
    }
}
