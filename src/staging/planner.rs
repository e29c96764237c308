//! Staging: turning what changed on disk into a change set.
//!
//! Planning reads the scan and the index and never touches the workspace.
//! It keeps an overlay of the freshest definitions (the index with every
//! changed prose document re-applied) and the desired content of every path
//! it decides to touch; records are derived from those at the end.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::config::Config;
use crate::errors::Result;
use crate::index::{BlockIndex, ContentIndex};
use crate::io::unified_diff;
use crate::model::{
    comment_for_target, remove_blocks, render, tangle_target, NamedBlock, ReferenceName,
};
use crate::readers::{
    parse_generated, parse_prose, replace_block_body, DocumentKind, ParsedFile, ScanResult,
};
use crate::status::{blocks_as_deleted, classify_blocks, classify_files, FileDiff, Status};

use super::conflict::{settle, Conflict, ConflictResolver};
use super::record::{ChangeRecord, ChangeSet};

/// Plans a change set from a full workspace scan.
pub fn plan_changes<R: ConflictResolver + ?Sized>(
    description: &str,
    config: &Config,
    index: &ContentIndex,
    scan: &[ScanResult],
    resolver: &mut R,
) -> Result<ChangeSet> {
    let planner = Planner {
        config,
        index,
        scanned: scan.iter().map(|r| (r.path.clone(), r)).collect(),
        scan,
        resolver,
        overlay: index.blocks.clone(),
        planned: IndexMap::new(),
        affected: Vec::new(),
        files_to_index: Vec::new(),
        files_to_unindex: Vec::new(),
    };
    planner.run(description)
}

struct Planner<'a, R: ConflictResolver + ?Sized> {
    config: &'a Config,
    index: &'a ContentIndex,
    scan: &'a [ScanResult],
    scanned: HashMap<PathBuf, &'a ScanResult>,
    resolver: &'a mut R,
    /// Freshest definitions.
    overlay: BlockIndex,
    /// Desired content per path; `None` deletes.
    planned: IndexMap<PathBuf, Option<String>>,
    /// Generated files to render again from the overlay.
    affected: Vec<PathBuf>,
    files_to_index: Vec<PathBuf>,
    files_to_unindex: Vec<PathBuf>,
}

impl<R: ConflictResolver + ?Sized> Planner<'_, R> {
    fn run(mut self, description: &str) -> Result<ChangeSet> {
        let discovered: Vec<_> = self
            .scan
            .iter()
            .map(|r| (r.path.clone(), r.hash, r.kind()))
            .collect();
        let file_diffs = classify_files(&self.index.files, &discovered, Path::new(""));

        self.build_overlay(&file_diffs);
        self.plan_files(&file_diffs);

        let (changed, deleted) = self.collect_block_changes(&file_diffs);

        for block in &deleted {
            self.cascade_deletion(block)?;
        }
        if !deleted.is_empty() {
            self.check_consistency(&deleted)?;
        }

        for name in &changed {
            self.sync_block(name)?;
        }

        self.render_affected()?;
        Ok(self.into_change_set(description))
    }

    /// Replaces the definitions of every changed or vanished prose document
    /// with what it holds now.
    fn build_overlay(&mut self, file_diffs: &[FileDiff]) {
        let dirty: Vec<&FileDiff> = file_diffs
            .iter()
            .filter(|d| d.kind == DocumentKind::ProseDocument && d.status != Status::Unchanged)
            .collect();

        for diff in &dirty {
            let stale: Vec<ReferenceName> = self
                .overlay
                .blocks_defined_in(&diff.path)
                .into_iter()
                .map(|b| b.name.clone())
                .collect();
            for name in stale {
                self.overlay.remove(&name);
            }
        }

        for diff in &dirty {
            let Some(result) = self.scanned.get(&diff.path).copied() else {
                continue;
            };
            let ParsedFile::Prose(doc) = &result.parsed else {
                continue;
            };
            for prose_block in &doc.blocks {
                let mut block = prose_block.block.clone();
                if let Some(existing) = self.overlay.get(&block.name) {
                    if existing.defining_file != block.defining_file
                        && self.is_live_prose(&existing.defining_file)
                    {
                        tracing::warn!(
                            "'{}' is already defined in {}; ignoring the definition in {}",
                            block.name,
                            existing.defining_file.display(),
                            block.defining_file.display()
                        );
                        continue;
                    }
                }
                if block.explicit_target_file.is_none() {
                    block.indirect_target_file = self
                        .index
                        .blocks
                        .get(&block.name)
                        .and_then(|b| b.indirect_target_file.clone());
                }
                self.overlay.upsert(block);
            }
        }
    }

    fn is_live_prose(&self, path: &Path) -> bool {
        self.scanned
            .get(path)
            .is_some_and(|r| r.kind() == DocumentKind::ProseDocument)
    }

    fn plan_files(&mut self, file_diffs: &[FileDiff]) {
        for diff in file_diffs {
            match diff.status {
                Status::Unchanged => {}
                Status::Created | Status::Modified => push_unique(&mut self.files_to_index, &diff.path),
                Status::Deleted => {
                    if self.overlay.block_by_target(&diff.path).is_some() {
                        tracing::info!(
                            "{} was deleted but is still declared as a target; re-creating it",
                            diff.path.display()
                        );
                        push_unique(&mut self.affected, &diff.path);
                        push_unique(&mut self.files_to_index, &diff.path);
                    } else {
                        push_unique(&mut self.files_to_unindex, &diff.path);
                    }
                }
            }
        }
    }

    /// Names whose content changed on either side, and prose blocks that
    /// are gone for good.
    fn collect_block_changes(&self, file_diffs: &[FileDiff]) -> (Vec<ReferenceName>, Vec<NamedBlock>) {
        let mut changed: Vec<ReferenceName> = Vec::new();
        let mut deleted: Vec<NamedBlock> = Vec::new();

        for diff in file_diffs {
            let block_diffs = match (diff.status, self.scanned.get(&diff.path)) {
                (Status::Unchanged, _) => continue,
                (Status::Deleted, _) => blocks_as_deleted(&self.index.blocks, &diff.path, diff.kind),
                (_, Some(result)) => classify_blocks(&self.index.blocks, &diff.path, &result.parsed),
                (_, None) => continue,
            };

            for block_diff in block_diffs {
                match (diff.kind, block_diff.status) {
                    (_, Status::Unchanged) => {}
                    (DocumentKind::ProseDocument, Status::Deleted) => {
                        if !self.overlay.contains(&block_diff.name) {
                            deleted.push(block_diff.block);
                        }
                    }
                    (DocumentKind::ProseDocument, _) => push_unique(&mut changed, &block_diff.name),
                    (DocumentKind::GeneratedDocument, Status::Modified) => {
                        if self.overlay.contains(&block_diff.name) {
                            push_unique(&mut changed, &block_diff.name);
                        }
                    }
                    (DocumentKind::GeneratedDocument, Status::Deleted) => {
                        tracing::debug!(
                            "{} no longer embeds '{}'",
                            diff.path.display(),
                            block_diff.name
                        );
                    }
                    _ => {}
                }
            }
        }

        (changed, deleted)
    }

    fn cascade_deletion(&mut self, block: &NamedBlock) -> Result<()> {
        tracing::info!(
            "'{}' was removed from {}",
            block.name,
            block.defining_file.display()
        );

        if let Some(target) = &block.explicit_target_file {
            if self.overlay.block_by_target(target).is_none() {
                self.plan_delete(target);
            }
        }

        for related in self.index.blocks.related_target_files(&block.name) {
            if block.explicit_target_file.as_ref() == Some(&related) {
                continue;
            }
            self.plan_removal(&related, &block.name)?;
        }
        Ok(())
    }

    /// Every generated file still mentioning a deleted block gets a record,
    /// and every live reference to one is reported.
    fn check_consistency(&mut self, deleted: &[NamedBlock]) -> Result<()> {
        let generated: Vec<PathBuf> = self
            .scan
            .iter()
            .filter(|r| matches!(r.parsed, ParsedFile::Generated(_)))
            .map(|r| r.path.clone())
            .collect();

        for path in &generated {
            for block in deleted {
                if self.plan_removal(path, &block.name)? {
                    tracing::warn!(
                        "{} still embedded '{}' after the deletion cascade",
                        path.display(),
                        block.name
                    );
                }
            }
        }

        for block in self.overlay.iter() {
            for gone in deleted {
                if block.outgoing_references.contains(&gone.name) {
                    tracing::warn!(
                        "'{}' in {} references deleted block '{}'",
                        block.name,
                        block.defining_file.display(),
                        gone.name
                    );
                }
            }
        }
        Ok(())
    }

    fn plan_delete(&mut self, path: &Path) {
        self.planned.insert(path.to_path_buf(), None);
        self.files_to_index.retain(|p| p != path);
        push_unique(&mut self.files_to_unindex, &path.to_path_buf());
    }

    /// Plans `path` without any block named `name`. Returns whether that
    /// changed the planned content.
    fn plan_removal(&mut self, path: &Path, name: &ReferenceName) -> Result<bool> {
        let Some(text) = self.current_text(path) else {
            return Ok(false);
        };
        let Ok(mut generated) = parse_generated(path, &text) else {
            return Ok(false);
        };
        if remove_blocks(&mut generated.document.children, name) == 0 {
            return Ok(false);
        }

        let language = self
            .overlay
            .block_by_target(path)
            .or_else(|| self.index.blocks.block_by_target(path))
            .and_then(|b| b.language.clone());
        let comment = comment_for_target(self.config, language.as_deref(), path)?;
        self.planned
            .insert(path.to_path_buf(), Some(render(&generated.document, comment)));
        Ok(true)
    }

    /// Reconciles one block with every generated copy of it, then marks the
    /// files it appears in for rendering.
    fn sync_block(&mut self, name: &ReferenceName) -> Result<()> {
        let Some(block) = self.overlay.get(name).cloned() else {
            return Ok(());
        };
        let indexed = self.index.blocks.get(name).map(|b| b.content.clone());
        let mut content = block.content.clone();

        for target in self.containing_files(name) {
            let Some(other) = self.detangled(&target, name) else {
                continue;
            };
            if other == content || indexed.as_ref() == Some(&other) {
                continue;
            }
            content = settle(
                &mut *self.resolver,
                &Conflict {
                    name,
                    target_file: &target,
                    base: &content,
                    other: &other,
                },
            )?;
        }

        if content.trim_end() != block.content {
            self.write_back(&block, &content);
        }

        for target in self.overlay.related_target_files(name) {
            push_unique(&mut self.affected, &target);
        }
        Ok(())
    }

    /// Generated files on disk that may embed `name`.
    fn containing_files(&self, name: &ReferenceName) -> Vec<PathBuf> {
        let mut files = self.overlay.related_target_files(name);
        for path in self.index.blocks.related_target_files(name) {
            push_unique(&mut files, &path);
        }
        files.retain(|p| self.scanned.contains_key(p));
        files
    }

    fn detangled(&self, path: &Path, name: &ReferenceName) -> Option<String> {
        match &self.scanned.get(path)?.parsed {
            ParsedFile::Generated(doc) => doc
                .blocks
                .iter()
                .find(|b| &b.name == name)
                .map(|b| b.content.clone()),
            _ => None,
        }
    }

    /// Splices new content into the defining prose document.
    fn write_back(&mut self, block: &NamedBlock, content: &str) {
        let path = &block.defining_file;
        let Some(text) = self.current_text(path) else {
            tracing::warn!("Cannot update '{}': {} is not readable", block.name, path.display());
            return;
        };
        let doc = parse_prose(path, &text);
        let Some(prose_block) = doc.get(&block.name) else {
            tracing::warn!("Cannot find '{}' in {}", block.name, path.display());
            return;
        };

        let updated = replace_block_body(
            &text,
            prose_block.content_lines.clone(),
            &prose_block.indent,
            content,
        );
        self.planned.insert(path.clone(), Some(updated));
        push_unique(&mut self.files_to_index, path);

        let mut fresh = block.clone();
        fresh.set_content(content);
        self.overlay.update(fresh);
    }

    fn render_affected(&mut self) -> Result<()> {
        for target in std::mem::take(&mut self.affected) {
            if matches!(self.planned.get(&target), Some(None)) {
                continue;
            }
            let Some(block) = self.overlay.block_by_target(&target).cloned() else {
                continue;
            };
            let tangled = tangle_target(self.config, &self.overlay, &block)?;
            self.planned.insert(target, Some(tangled.text));
        }
        Ok(())
    }

    /// Planned content if any, otherwise what is on disk.
    fn current_text(&self, path: &Path) -> Option<String> {
        match self.planned.get(path) {
            Some(planned) => planned.clone(),
            None => self.disk_text(path).map(str::to_string),
        }
    }

    fn disk_text(&self, path: &Path) -> Option<&str> {
        self.scanned.get(path).and_then(|r| r.text.as_deref())
    }

    fn into_change_set(mut self, description: &str) -> ChangeSet {
        let mut records = Vec::new();

        for (path, desired) in &self.planned {
            let on_disk = self.scanned.contains_key(path);
            let record = match (desired, self.disk_text(path)) {
                (None, _) if on_disk => Some(ChangeRecord::DeleteFile { path: path.clone() }),
                (None, _) => None,
                (Some(content), _) if !on_disk => Some(ChangeRecord::CreateFile {
                    path: path.clone(),
                    content: content.clone(),
                }),
                (Some(content), Some(old)) => unified_diff(old, content)
                    .map(|diff| ChangeRecord::UpdateFile { path: path.clone(), diff }),
                (Some(_), None) => {
                    tracing::warn!("Not overwriting unreadable file {}", path.display());
                    None
                }
            };
            if let Some(record) = record {
                if desired.is_some() {
                    push_unique(&mut self.files_to_index, path);
                }
                records.push(record);
            }
        }

        let unindex = self.files_to_unindex.clone();
        self.files_to_index.retain(|p| !unindex.contains(p));

        let change_set = ChangeSet::new(
            description,
            records,
            self.files_to_index,
            self.files_to_unindex,
        );
        tracing::info!(
            "Staged {} ({}): {} record(s)",
            change_set.id,
            change_set.description,
            change_set.records.len()
        );
        change_set
    }
}

fn push_unique<T: PartialEq + Clone>(list: &mut Vec<T>, item: &T) {
    if !list.contains(item) {
        list.push(item.clone());
    }
}
