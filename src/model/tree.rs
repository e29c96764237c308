//! The document tree shared by the parsers, the resolver and the renderer.
//!
//! Children are owned lists. A reference to another block is only ever a
//! name; the resolver looks names up through the index, so a reference
//! cycle is a cycle of lookups and never a cycle of ownership.

use std::path::PathBuf;

use crate::config::REF_PATTERN;

use super::reference_name::ReferenceName;

/// Consecutive literal lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSegment {
    pub lines: Vec<String>,
}

/// A name at an indentation, relative to the enclosing block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub name: ReferenceName,
    pub indent: String,
}

impl Reference {
    pub fn new(name: impl Into<ReferenceName>, indent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            indent: indent.into(),
        }
    }
}

/// Marks where expanding a reference would re-enter a block already being expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleMarker {
    pub name: ReferenceName,
    pub source_file: PathBuf,
    pub indent: String,
}

/// An expanded block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBlock {
    pub name: ReferenceName,
    /// Prose document the block was defined in.
    pub source_file: PathBuf,
    /// Indentation relative to the enclosing block.
    pub indent: String,
    pub children: Vec<DocumentTree>,
}

/// Root of a tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    /// Prose document this tree was tangled from, when known.
    pub source_file: Option<PathBuf>,
    pub children: Vec<DocumentTree>,
}

impl Document {
    pub fn new(source_file: Option<PathBuf>, children: Vec<DocumentTree>) -> Self {
        Self {
            source_file,
            children,
        }
    }

    /// Depth-first, pre-order list of every resolved block.
    pub fn blocks(&self) -> Vec<&ResolvedBlock> {
        let mut out = Vec::new();
        collect_blocks(&self.children, &mut out);
        out
    }

    /// Nesting of block names, ignoring literal text and error notes.
    pub fn shape(&self) -> Vec<Shape> {
        shape_of(&self.children)
    }
}

/// A node of a document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentTree {
    RawSegment(RawSegment),
    /// Produced only by the prose parser.
    UnresolvedReference(Reference),
    ResolvedBlock(ResolvedBlock),
    Document(Document),
    Cycle(CycleMarker),
    /// A reference to a name the index does not know.
    Missing(Reference),
}

/// Block nesting, used to compare trees structurally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    pub name: ReferenceName,
    pub children: Vec<Shape>,
}

impl Shape {
    pub fn new(name: impl Into<ReferenceName>, children: Vec<Shape>) -> Self {
        Self {
            name: name.into(),
            children,
        }
    }
}

/// Appends a literal line, extending a trailing raw segment if there is one.
pub fn push_line(children: &mut Vec<DocumentTree>, line: impl Into<String>) {
    if let Some(DocumentTree::RawSegment(segment)) = children.last_mut() {
        segment.lines.push(line.into());
    } else {
        children.push(DocumentTree::RawSegment(RawSegment {
            lines: vec![line.into()],
        }));
    }
}

/// Splits block content into raw segments and unresolved references.
pub fn parse_references(content: &str) -> Vec<DocumentTree> {
    let mut children = Vec::new();
    for line in content.lines() {
        match REF_PATTERN.captures(line) {
            Some(caps) => children.push(DocumentTree::UnresolvedReference(Reference::new(
                &caps["refname"],
                &caps["indent"],
            ))),
            None => push_line(&mut children, line),
        }
    }
    children
}

/// Names referenced by block content, first occurrence first.
pub fn outgoing_references(content: &str) -> Vec<ReferenceName> {
    let mut names: Vec<ReferenceName> = Vec::new();
    for line in content.lines() {
        if let Some(caps) = REF_PATTERN.captures(line) {
            let name = ReferenceName::new(&caps["refname"]);
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

/// Rebuilds block content from a tree: literal lines, and `<<name>>` for each
/// nested block or reference. For a block read back from a generated file
/// this reproduces the prose body it was rendered from.
pub fn flat_content(children: &[DocumentTree]) -> String {
    let mut lines: Vec<String> = Vec::new();
    flatten_into(children, &mut lines);
    let mut text = lines.join("\n");
    text.truncate(text.trim_end().len());
    text
}

fn flatten_into(children: &[DocumentTree], lines: &mut Vec<String>) {
    for child in children {
        match child {
            DocumentTree::RawSegment(segment) => lines.extend(segment.lines.iter().cloned()),
            DocumentTree::UnresolvedReference(r) | DocumentTree::Missing(r) => {
                lines.push(format!("{}<<{}>>", r.indent, r.name))
            }
            DocumentTree::Cycle(c) => lines.push(format!("{}<<{}>>", c.indent, c.name)),
            DocumentTree::ResolvedBlock(block) => {
                lines.push(format!("{}<<{}>>", block.indent, block.name))
            }
            DocumentTree::Document(doc) => flatten_into(&doc.children, lines),
        }
    }
}

fn collect_blocks<'a>(children: &'a [DocumentTree], out: &mut Vec<&'a ResolvedBlock>) {
    for child in children {
        match child {
            DocumentTree::ResolvedBlock(block) => {
                out.push(block);
                collect_blocks(&block.children, out);
            }
            DocumentTree::Document(doc) => collect_blocks(&doc.children, out),
            _ => {}
        }
    }
}

fn shape_of(children: &[DocumentTree]) -> Vec<Shape> {
    let mut shapes = Vec::new();
    for child in children {
        match child {
            DocumentTree::ResolvedBlock(block) => {
                shapes.push(Shape::new(block.name.clone(), shape_of(&block.children)))
            }
            DocumentTree::Cycle(c) => shapes.push(Shape::new(c.name.clone(), Vec::new())),
            DocumentTree::Document(doc) => shapes.extend(shape_of(&doc.children)),
            _ => {}
        }
    }
    shapes
}

/// Removes every block named `name`, at any depth. Returns how many were removed.
pub fn remove_blocks(children: &mut Vec<DocumentTree>, name: &ReferenceName) -> usize {
    let before = children.len();
    children.retain(|child| {
        !matches!(child, DocumentTree::ResolvedBlock(block) if &block.name == name)
    });
    let mut removed = before - children.len();
    for child in children.iter_mut() {
        match child {
            DocumentTree::ResolvedBlock(block) => removed += remove_blocks(&mut block.children, name),
            DocumentTree::Document(doc) => removed += remove_blocks(&mut doc.children, name),
            _ => {}
        }
    }
    removed
}

/// Whether any unresolved reference remains anywhere below `children`.
pub fn has_unresolved(children: &[DocumentTree]) -> bool {
    children.iter().any(|child| match child {
        DocumentTree::UnresolvedReference(_) => true,
        DocumentTree::ResolvedBlock(block) => has_unresolved(&block.children),
        DocumentTree::Document(doc) => has_unresolved(&doc.children),
        _ => false,
    })
}
