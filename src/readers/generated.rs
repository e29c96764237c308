//! Generated-form parsing: rebuilding the block tree of a tangled file from
//! its marker comments.

use std::path::{Path, PathBuf};

use crate::config::markers::{
    BLOCK_FOOTER, BLOCK_HEADER, CYCLE_NOTE, FILE_FOOTER, FILE_HEADER, MISSING_NOTE,
};
use crate::errors::{EntwineError, Result};
use crate::model::{
    flat_content, push_line, CycleMarker, Document, DocumentTree, NamedBlock, Reference,
    ReferenceName, ResolvedBlock,
};
use crate::text_location::TextLocation;

/// A tangled file read back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedDocument {
    pub path: PathBuf,
    /// Tree rebuilt from the markers.
    pub document: Document,
    /// The whole file as one block, targeting the file itself.
    pub whole: NamedBlock,
    /// Every nested block, first occurrence of a name only.
    pub blocks: Vec<NamedBlock>,
    /// Tool version from the footer.
    pub version: String,
}

/// A block being read, with the absolute indentation of its header.
struct Frame {
    name: ReferenceName,
    source_file: PathBuf,
    abs_indent: String,
    rel_indent: String,
    children: Vec<DocumentTree>,
    line: usize,
}

/// Whether `input` opens with a file header and closes with a file footer.
pub fn is_generated(input: &str) -> bool {
    let first = input.lines().next();
    let last = input.lines().rev().find(|l| !l.trim().is_empty());
    matches!((first, last), (Some(f), Some(l)) if FILE_HEADER.is_match(f) && FILE_FOOTER.is_match(l))
}

/// Parses a generated file.
///
/// Unbalanced block markers are tolerated: a stray footer is kept as text and
/// blocks still open at the end are closed there.
pub fn parse_generated(path: &Path, input: &str) -> Result<GeneratedDocument> {
    let lines: Vec<&str> = input.lines().collect();

    let header = lines
        .first()
        .and_then(|l| FILE_HEADER.captures(l))
        .ok_or_else(|| parse_error(path, 1, "missing file header"))?;
    let source_file = PathBuf::from(&header["source"]);

    let footer_index = lines
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .unwrap_or(0);
    let version = match FILE_FOOTER.captures(lines[footer_index]) {
        Some(caps) if footer_index > 0 => caps["version"].to_string(),
        _ => return Err(parse_error(path, footer_index + 1, "missing file footer")),
    };

    let mut stack = vec![Frame {
        name: ReferenceName::from_path(path),
        source_file: source_file.clone(),
        abs_indent: String::new(),
        rel_indent: String::new(),
        children: Vec::new(),
        line: 1,
    }];

    for (offset, line) in lines[1..footer_index].iter().enumerate() {
        let line_number = offset + 2;

        if let Some(caps) = BLOCK_HEADER.captures(line) {
            let parent_indent = stack.last().map(|f| f.abs_indent.as_str()).unwrap_or("");
            let abs_indent = caps["indent"].to_string();
            let rel_indent = relative(&abs_indent, parent_indent).to_string();
            stack.push(Frame {
                name: ReferenceName::new(&caps["name"]),
                source_file: PathBuf::from(&caps["source"]),
                abs_indent,
                rel_indent,
                children: Vec::new(),
                line: line_number,
            });
            continue;
        }

        if BLOCK_FOOTER.is_match(line) {
            if stack.len() > 1 {
                close_frame(&mut stack);
            } else {
                tracing::warn!(
                    "{}:{}: block footer without header",
                    path.display(),
                    line_number
                );
                push_raw(&mut stack, line);
            }
            continue;
        }

        push_raw(&mut stack, line);
    }

    while stack.len() > 1 {
        if let Some(frame) = stack.last() {
            tracing::warn!(
                "{}:{}: block '{}' is never closed",
                path.display(),
                frame.line,
                frame.name
            );
        }
        close_frame(&mut stack);
    }

    let root = stack.pop().map(|f| f.children).unwrap_or_default();
    let document = Document::new(Some(source_file.clone()), root);

    let mut blocks: Vec<NamedBlock> = Vec::new();
    for resolved in document.blocks() {
        if blocks.iter().any(|b| b.name == resolved.name) {
            continue;
        }
        blocks.push(
            NamedBlock::new(
                resolved.name.clone(),
                resolved.source_file.clone(),
                &flat_content(&resolved.children),
            )
            .with_indirect_target(Some(path.to_path_buf())),
        );
    }

    let whole = NamedBlock::new(ReferenceName::from_path(path), source_file, input)
        .with_target(Some(path.to_path_buf()));

    tracing::debug!(
        "Read {} block(s) back from {}",
        blocks.len(),
        path.display()
    );

    Ok(GeneratedDocument {
        path: path.to_path_buf(),
        document,
        whole,
        blocks,
        version,
    })
}

fn parse_error(path: &Path, line: usize, message: &str) -> EntwineError {
    EntwineError::Parse {
        location: TextLocation::file_line(path.to_path_buf(), line),
        message: message.to_string(),
    }
}

fn relative<'a>(indent: &'a str, parent: &str) -> &'a str {
    indent.strip_prefix(parent).unwrap_or(indent)
}

/// Adds a text line to the innermost open block, relative to its indentation.
fn push_raw(stack: &mut [Frame], line: &str) {
    let Some(frame) = stack.last_mut() else {
        return;
    };

    if let Some(caps) = MISSING_NOTE.captures(line) {
        let indent = relative(caps.name("indent").map_or("", |m| m.as_str()), &frame.abs_indent);
        frame.children.push(DocumentTree::Missing(Reference::new(
            &caps["name"],
            indent,
        )));
        return;
    }

    if line.trim().is_empty() {
        push_line(&mut frame.children, "");
    } else {
        push_line(&mut frame.children, relative(line, &frame.abs_indent));
    }
}

/// Pops the innermost block and attaches it to its parent.
fn close_frame(stack: &mut Vec<Frame>) {
    let Some(frame) = stack.pop() else {
        return;
    };
    let Some(parent) = stack.last_mut() else {
        return;
    };

    let node = if is_cycle_note(&frame) {
        DocumentTree::Cycle(CycleMarker {
            name: frame.name,
            source_file: frame.source_file,
            indent: frame.rel_indent,
        })
    } else {
        DocumentTree::ResolvedBlock(ResolvedBlock {
            name: frame.name,
            source_file: frame.source_file,
            indent: frame.rel_indent,
            children: frame.children,
        })
    };
    parent.children.push(node);
}

/// A block holding nothing but a cycle note for its own name.
fn is_cycle_note(frame: &Frame) -> bool {
    match frame.children.as_slice() {
        [DocumentTree::RawSegment(segment)] if segment.lines.len() == 1 => CYCLE_NOTE
            .captures(&segment.lines[0])
            .is_some_and(|caps| &caps["name"] == frame.name.as_str()),
        _ => false,
    }
}
