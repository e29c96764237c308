//! Named blocks: the unit of entanglement.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::attributes::Attributes;
use super::reference_name::ReferenceName;
use super::tree::outgoing_references;
use crate::io::{fast_hash_str, FastHash};

/// A block that can be referenced by name and materialized into files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedBlock {
    /// Unique key within the index.
    pub name: ReferenceName,
    /// Prose document that declares the block.
    pub defining_file: PathBuf,
    /// File the block materializes as, if it has its own.
    pub explicit_target_file: Option<PathBuf>,
    /// Generated file that contains the block only through a reference.
    pub indirect_target_file: Option<PathBuf>,
    /// Language tag.
    pub language: Option<String>,
    /// Block body, right-trimmed, with whitespace-only lines emptied.
    pub content: String,
    /// Hash of `content`.
    pub content_hash: FastHash,
    /// Attributes from the fence.
    pub attributes: Attributes,
    /// Names referenced by `content`, in order.
    pub outgoing_references: Vec<ReferenceName>,
    /// Blocks whose content references this one. Maintained by the index.
    #[serde(default)]
    pub incoming_references: Vec<ReferenceName>,
}

impl NamedBlock {
    /// Builds a block from its body. Hash and outgoing references are derived.
    pub fn new(
        name: impl Into<ReferenceName>,
        defining_file: impl Into<PathBuf>,
        content: &str,
    ) -> Self {
        let content = normalize_content(content);
        Self {
            name: name.into(),
            defining_file: defining_file.into(),
            explicit_target_file: None,
            indirect_target_file: None,
            language: None,
            content_hash: fast_hash_str(&content),
            outgoing_references: outgoing_references(&content),
            content,
            attributes: Attributes::default(),
            incoming_references: Vec::new(),
        }
    }

    /// Sets the language.
    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    /// Sets the explicit target file.
    pub fn with_target(mut self, target: Option<PathBuf>) -> Self {
        self.explicit_target_file = target;
        self
    }

    /// Sets the indirect target file.
    pub fn with_indirect_target(mut self, target: Option<PathBuf>) -> Self {
        self.indirect_target_file = target;
        self
    }

    /// Sets the fence attributes.
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Replaces the body, refreshing hash and outgoing references.
    pub fn set_content(&mut self, content: &str) {
        self.content = normalize_content(content);
        self.content_hash = fast_hash_str(&self.content);
        self.outgoing_references = outgoing_references(&self.content);
    }

    /// Whether the block is defined in, materializes as, or is embedded in `path`.
    pub fn belongs_to(&self, path: &Path) -> bool {
        self.defining_file == path
            || self.explicit_target_file.as_deref() == Some(path)
            || self.indirect_target_file.as_deref() == Some(path)
    }

    /// Every generated file this block appears in.
    pub fn target_files(&self) -> impl Iterator<Item = &Path> {
        self.explicit_target_file
            .as_deref()
            .into_iter()
            .chain(self.indirect_target_file.as_deref())
    }
}

/// Right-trims a body and empties whitespace-only lines, the way generated
/// files print them.
fn normalize_content(content: &str) -> String {
    let lines: Vec<&str> = content
        .lines()
        .map(|line| if line.trim().is_empty() { "" } else { line })
        .collect();
    lines.join("\n").trim_end().to_string()
}
