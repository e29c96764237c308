//! Reference resolution and rendering of generated files.

use std::collections::HashSet;

use indexmap::IndexMap;
use thiserror::Error;

use crate::config::markers;
use crate::config::Comment;

use super::named_block::NamedBlock;
use super::reference_name::{slash_path, ReferenceName};
use super::tree::{
    parse_references, CycleMarker, Document, DocumentTree, Reference, ResolvedBlock,
};

/// Read access to block definitions by name.
pub trait BlockLookup {
    fn lookup(&self, name: &ReferenceName) -> Option<&NamedBlock>;
}

impl BlockLookup for IndexMap<ReferenceName, NamedBlock> {
    fn lookup(&self, name: &ReferenceName) -> Option<&NamedBlock> {
        self.get(name)
    }
}

/// A problem met during resolution. Recorded, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Diagnostic {
    #[error("Block not found: {0}")]
    BlockNotFound(ReferenceName),

    #[error("Cycle detected at {0}")]
    CycleDetected(ReferenceName),
}

/// A resolved tree plus whatever went wrong on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub document: Document,
    pub diagnostics: Vec<Diagnostic>,
}

impl Resolution {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Names currently being expanded along one path from the root.
#[derive(Debug, Clone, Default)]
pub struct CycleDetector {
    stack: Vec<ReferenceName>,
    seen: HashSet<ReferenceName>,
}

impl CycleDetector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters `name`. Returns false, leaving the state untouched, if it is
    /// already on the path.
    pub fn enter(&mut self, name: &ReferenceName) -> bool {
        if !self.seen.insert(name.clone()) {
            return false;
        }
        self.stack.push(name.clone());
        true
    }

    /// Leaves the most recently entered name.
    pub fn exit(&mut self) {
        if let Some(name) = self.stack.pop() {
            self.seen.remove(&name);
        }
    }

    /// Current path from the root.
    pub fn path(&self) -> &[ReferenceName] {
        &self.stack
    }
}

/// Expands unresolved references below `children`, depth first, in order.
///
/// `detector` holds the names being expanded on the current path; each
/// top-level resolution must start from its own detector.
pub fn resolve_children(
    children: &[DocumentTree],
    lookup: &impl BlockLookup,
    detector: &mut CycleDetector,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<DocumentTree> {
    children
        .iter()
        .map(|child| match child {
            DocumentTree::UnresolvedReference(reference) => {
                resolve_reference(reference, lookup, detector, diagnostics)
            }
            DocumentTree::ResolvedBlock(block) => DocumentTree::ResolvedBlock(ResolvedBlock {
                children: resolve_children(&block.children, lookup, detector, diagnostics),
                ..block.clone()
            }),
            DocumentTree::Document(doc) => DocumentTree::Document(Document {
                source_file: doc.source_file.clone(),
                children: resolve_children(&doc.children, lookup, detector, diagnostics),
            }),
            other => other.clone(),
        })
        .collect()
}

fn resolve_reference(
    reference: &Reference,
    lookup: &impl BlockLookup,
    detector: &mut CycleDetector,
    diagnostics: &mut Vec<Diagnostic>,
) -> DocumentTree {
    let Some(block) = lookup.lookup(&reference.name) else {
        tracing::warn!("Reference to unknown block '{}'", reference.name);
        diagnostics.push(Diagnostic::BlockNotFound(reference.name.clone()));
        return DocumentTree::Missing(reference.clone());
    };

    if !detector.enter(&reference.name) {
        tracing::warn!(
            "Cycle detected: {:?} -> {}",
            detector.path(),
            reference.name
        );
        diagnostics.push(Diagnostic::CycleDetected(reference.name.clone()));
        return DocumentTree::Cycle(CycleMarker {
            name: reference.name.clone(),
            source_file: block.defining_file.clone(),
            indent: reference.indent.clone(),
        });
    }

    let children = resolve_children(
        &parse_references(&block.content),
        lookup,
        detector,
        diagnostics,
    );
    detector.exit();

    DocumentTree::ResolvedBlock(ResolvedBlock {
        name: reference.name.clone(),
        source_file: block.defining_file.clone(),
        indent: reference.indent.clone(),
        children,
    })
}

/// Resolves the block `name` into a document whose single child is that block.
pub fn resolve_block(name: &ReferenceName, lookup: &impl BlockLookup) -> Resolution {
    let mut diagnostics = Vec::new();
    let mut detector = CycleDetector::new();
    let source_file = lookup.lookup(name).map(|b| b.defining_file.clone());
    let root = resolve_reference(
        &Reference::new(name.clone(), ""),
        lookup,
        &mut detector,
        &mut diagnostics,
    );
    Resolution {
        document: Document::new(source_file, vec![root]),
        diagnostics,
    }
}

/// Renders a resolved document as a generated file, wrapped in the
/// whole-file marker pair. The result ends with a newline.
pub fn render(document: &Document, comment: &Comment) -> String {
    let source = document
        .source_file
        .as_deref()
        .map(slash_path)
        .unwrap_or_default();

    let mut lines = vec![markers::file_header(comment, &source)];
    render_children(&document.children, "", comment, &mut lines);
    lines.push(markers::file_footer(comment));

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

fn render_children(children: &[DocumentTree], base: &str, comment: &Comment, out: &mut Vec<String>) {
    for child in children {
        match child {
            DocumentTree::RawSegment(segment) => {
                for line in &segment.lines {
                    if line.is_empty() {
                        out.push(String::new());
                    } else {
                        out.push(format!("{}{}", base, line));
                    }
                }
            }
            DocumentTree::ResolvedBlock(block) => {
                let indent = format!("{}{}", base, block.indent);
                out.push(markers::block_header(
                    comment,
                    &indent,
                    block.name.as_str(),
                    &slash_path(&block.source_file),
                ));
                render_children(&block.children, &indent, comment, out);
                out.push(markers::block_footer(comment, &indent));
            }
            DocumentTree::Cycle(cycle) => {
                let indent = format!("{}{}", base, cycle.indent);
                out.push(markers::block_header(
                    comment,
                    &indent,
                    cycle.name.as_str(),
                    &slash_path(&cycle.source_file),
                ));
                out.push(markers::cycle_note(comment, &indent, cycle.name.as_str()));
                out.push(markers::block_footer(comment, &indent));
            }
            DocumentTree::Missing(reference) | DocumentTree::UnresolvedReference(reference) => {
                let indent = format!("{}{}", base, reference.indent);
                out.push(markers::missing_note(comment, &indent, reference.name.as_str()));
            }
            DocumentTree::Document(doc) => render_children(&doc.children, base, comment, out),
        }
    }
}
