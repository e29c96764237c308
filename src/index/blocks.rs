//! Named block records and their reference graph.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{BlockLookup, NamedBlock, ReferenceName};

/// A break in the back-link invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityViolation {
    #[error("'{referrer}' references '{target}' but is missing from its incoming references")]
    MissingBackLink {
        target: ReferenceName,
        referrer: ReferenceName,
    },

    #[error("'{target}' lists '{referrer}' as incoming, but '{referrer}' does not reference it")]
    StaleBackLink {
        target: ReferenceName,
        referrer: ReferenceName,
    },
}

/// Named blocks keyed by name, in insertion order.
///
/// `incoming_references` of every block is kept equal to the set of indexed
/// blocks whose outgoing references name it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockIndex {
    blocks: IndexMap<ReferenceName, NamedBlock>,
}

impl BlockIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index_of(&self, name: &ReferenceName) -> Option<usize> {
        self.blocks.get_index_of(name)
    }

    pub fn get(&self, name: &ReferenceName) -> Option<&NamedBlock> {
        self.blocks.get(name)
    }

    pub fn contains(&self, name: &ReferenceName) -> bool {
        self.blocks.contains_key(name)
    }

    /// Inserts a new block. A block of the same name is kept and the call
    /// returns false.
    pub fn add(&mut self, block: NamedBlock) -> bool {
        if self.blocks.contains_key(&block.name) {
            tracing::warn!(
                "Block '{}' is already indexed from {}",
                block.name,
                self.blocks[&block.name].defining_file.display()
            );
            return false;
        }
        let name = block.name.clone();
        self.blocks.insert(name.clone(), block);
        self.link(&name);
        true
    }

    /// Replaces an existing block. Returns false if the name is not indexed.
    pub fn update(&mut self, block: NamedBlock) -> bool {
        if !self.blocks.contains_key(&block.name) {
            return false;
        }
        let name = block.name.clone();
        self.unlink(&name);
        self.blocks.insert(name.clone(), block);
        self.link(&name);
        true
    }

    /// Adds or replaces a block.
    pub fn upsert(&mut self, block: NamedBlock) {
        if !self.update(block.clone()) {
            self.add(block);
        }
    }

    pub fn remove(&mut self, name: &ReferenceName) -> Option<NamedBlock> {
        self.unlink(name);
        self.blocks.shift_remove(name)
    }

    /// Points a block at the generated file that embeds it.
    pub fn set_indirect_target(&mut self, name: &ReferenceName, target: Option<PathBuf>) {
        if let Some(block) = self.blocks.get_mut(name) {
            block.indirect_target_file = target;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedBlock> {
        self.blocks.values()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Blocks defined in, targeting, or embedded in `path`.
    pub fn blocks_for_file(&self, path: &Path) -> Vec<&NamedBlock> {
        self.blocks.values().filter(|b| b.belongs_to(path)).collect()
    }

    /// Blocks whose definition lives in `path`.
    pub fn blocks_defined_in(&self, path: &Path) -> Vec<&NamedBlock> {
        self.blocks
            .values()
            .filter(|b| b.defining_file == path)
            .collect()
    }

    /// The block that materializes as `path`.
    pub fn block_by_target(&self, path: &Path) -> Option<&NamedBlock> {
        self.blocks
            .values()
            .find(|b| b.explicit_target_file.as_deref() == Some(path))
    }

    /// Generated files that contain `name`: its own targets, then the
    /// targets of every block that references it, transitively.
    pub fn related_target_files(&self, name: &ReferenceName) -> Vec<PathBuf> {
        let mut targets: Vec<PathBuf> = Vec::new();
        let mut visited: HashSet<&ReferenceName> = HashSet::new();
        let mut queue: VecDeque<&ReferenceName> = VecDeque::from([name]);

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            let Some(block) = self.blocks.get(current) else {
                continue;
            };
            for target in block.target_files() {
                if !targets.iter().any(|t| t == target) {
                    targets.push(target.to_path_buf());
                }
            }
            queue.extend(block.incoming_references.iter());
        }

        targets
    }

    /// Every place where back-links disagree with outgoing references.
    pub fn verify_references(&self) -> Vec<IntegrityViolation> {
        let mut violations = Vec::new();

        for referrer in self.blocks.values() {
            for target in &referrer.outgoing_references {
                if let Some(block) = self.blocks.get(target) {
                    if !block.incoming_references.contains(&referrer.name) {
                        violations.push(IntegrityViolation::MissingBackLink {
                            target: target.clone(),
                            referrer: referrer.name.clone(),
                        });
                    }
                }
            }
        }

        for block in self.blocks.values() {
            for referrer in &block.incoming_references {
                let references = self
                    .blocks
                    .get(referrer)
                    .is_some_and(|r| r.outgoing_references.contains(&block.name));
                if !references {
                    violations.push(IntegrityViolation::StaleBackLink {
                        target: block.name.clone(),
                        referrer: referrer.clone(),
                    });
                }
            }
        }

        violations
    }

    /// Adds `name` to the back-links of its targets and collects its own.
    fn link(&mut self, name: &ReferenceName) {
        let Some(block) = self.blocks.get(name) else {
            return;
        };
        let outgoing = block.outgoing_references.clone();
        for target in &outgoing {
            if let Some(target_block) = self.blocks.get_mut(target) {
                if !target_block.incoming_references.contains(name) {
                    target_block.incoming_references.push(name.clone());
                }
            }
        }

        let referrers: Vec<ReferenceName> = self
            .blocks
            .values()
            .filter(|b| b.outgoing_references.contains(name))
            .map(|b| b.name.clone())
            .collect();
        if let Some(block) = self.blocks.get_mut(name) {
            block.incoming_references = referrers;
        }
    }

    /// Drops `name` from the back-links of its targets.
    fn unlink(&mut self, name: &ReferenceName) {
        let Some(block) = self.blocks.get(name) else {
            return;
        };
        let outgoing = block.outgoing_references.clone();
        for target in &outgoing {
            if let Some(target_block) = self.blocks.get_mut(target) {
                target_block.incoming_references.retain(|r| r != name);
            }
        }
    }
}

impl BlockLookup for BlockIndex {
    fn lookup(&self, name: &ReferenceName) -> Option<&NamedBlock> {
        self.get(name)
    }
}
