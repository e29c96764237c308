//! Prose-form parsing: named blocks out of markdown documents.

use std::ops::Range;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::model::{parse_references, Attributes, DocumentTree, NamedBlock, ReferenceName};
use crate::text_location::TextLocation;

use super::delimiters::{extract_all_tokens, DelimitedToken, ExtractResult};

/// A named block as found in a prose document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProseBlock {
    pub block: NamedBlock,
    /// The block body as unresolved references and raw lines.
    pub tree: Vec<DocumentTree>,
    /// 0-based line range of the body inside the document.
    pub content_lines: Range<usize>,
    /// Indentation of the fence.
    pub indent: String,
    pub location: TextLocation,
}

/// Named blocks of one prose document, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProseDocument {
    pub path: PathBuf,
    pub blocks: Vec<ProseBlock>,
}

impl ProseDocument {
    /// Looks up a block by name.
    pub fn get(&self, name: &ReferenceName) -> Option<&ProseBlock> {
        self.blocks.iter().find(|b| &b.block.name == name)
    }

    /// Unresolved tree of every block, keyed by name.
    pub fn trees(&self) -> IndexMap<ReferenceName, Vec<DocumentTree>> {
        self.blocks
            .iter()
            .map(|b| (b.block.name.clone(), b.tree.clone()))
            .collect()
    }
}

/// Parses a prose document.
///
/// A fenced region becomes a named block when it has an id or a `file`
/// attribute, is not flagged `ignore`, and has content. The first definition
/// of a name wins.
pub fn parse_prose(path: &Path, input: &str) -> ProseDocument {
    let mut doc = ProseDocument {
        path: path.to_path_buf(),
        blocks: Vec::new(),
    };

    for result in extract_all_tokens(input) {
        match result {
            ExtractResult::Token(token) => {
                let Some(block) = process_code_block(path, token) else {
                    continue;
                };
                if doc.get(&block.block.name).is_some() {
                    tracing::warn!(
                        "{}:{}: duplicate definition of '{}' ignored",
                        path.display(),
                        block.location.line,
                        block.block.name
                    );
                    continue;
                }
                doc.blocks.push(block);
            }
            ExtractResult::Unclosed { location, .. } => {
                tracing::warn!(
                    "{}:{}: unclosed code fence",
                    path.display(),
                    location.line
                );
            }
            ExtractResult::NotDelimited(_) => {}
        }
    }

    tracing::debug!("Parsed {} block(s) from {}", doc.blocks.len(), path.display());
    doc
}

fn process_code_block(path: &Path, token: DelimitedToken) -> Option<ProseBlock> {
    let attributes = Attributes::parse(&token.info);
    if attributes.is_ignored() {
        return None;
    }

    let name = match (attributes.file(), attributes.id.as_deref()) {
        (Some(file), _) => ReferenceName::new(file),
        (None, Some(id)) => ReferenceName::new(id),
        (None, None) => return None,
    };

    if token.content.trim().is_empty() {
        tracing::debug!("Skipping empty block '{}' in {}", name, path.display());
        return None;
    }

    let block = NamedBlock::new(name, path, &token.content)
        .with_language(attributes.language.clone())
        .with_target(attributes.file().map(PathBuf::from))
        .with_attributes(attributes);

    Some(ProseBlock {
        tree: parse_references(&block.content),
        block,
        content_lines: token.content_lines,
        indent: token.indent,
        location: token.location.with_filename(path.to_path_buf()),
    })
}

/// Replaces the body of a fenced block, re-applying the fence indentation.
/// The rest of the document is kept byte for byte.
pub fn replace_block_body(input: &str, content_lines: Range<usize>, indent: &str, body: &str) -> String {
    let lines: Vec<&str> = input.lines().collect();
    let start = content_lines.start.min(lines.len());
    let end = content_lines.end.clamp(start, lines.len());

    let mut out: Vec<String> = lines[..start].iter().map(|l| l.to_string()).collect();
    for line in body.trim_end().lines() {
        if line.is_empty() {
            out.push(String::new());
        } else {
            out.push(format!("{}{}", indent, line));
        }
    }
    out.extend(lines[end..].iter().map(|l| l.to_string()));

    let mut text = out.join("\n");
    if input.ends_with('\n') {
        text.push('\n');
    }
    text
}
