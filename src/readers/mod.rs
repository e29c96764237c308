//! Readers for the kinds of file a workspace tracks.

pub mod delimiters;
pub mod generated;
pub mod prose;
pub mod scan;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::NamedBlock;

pub use generated::{is_generated, parse_generated, GeneratedDocument};
pub use prose::{parse_prose, replace_block_body, ProseBlock, ProseDocument};
pub use scan::{scan, scan_paths, IgnoreSet, ScanResult};

/// Extensions that are never read as text.
const BINARY_EXTENSIONS: &[&str] = &[
    "pdf", "bin", "jpg", "jpeg", "png", "gif", "exe", "zip", "tar", "dll", "so", "dylib", "a",
    "o", "obj", "lib",
];

/// What a tracked file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    /// Markdown holding block definitions.
    ProseDocument,
    /// Any other text file; tangled output when it carries file markers.
    GeneratedDocument,
    /// Passed through untouched.
    Opaque,
}

impl DocumentKind {
    /// Chooses a kind by extension, then by content.
    pub fn detect(path: &Path, bytes: &[u8]) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("md") | Some("markdown") => DocumentKind::ProseDocument,
            Some(ext) if BINARY_EXTENSIONS.contains(&ext) => DocumentKind::Opaque,
            _ if std::str::from_utf8(bytes).is_err() => DocumentKind::Opaque,
            _ => DocumentKind::GeneratedDocument,
        }
    }
}

/// Where a parsed block came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntanglementKind {
    Prose,
    Generated,
    /// The synthetic block spanning a whole generated file.
    GeneratedDocument,
}

/// One block discovered while parsing a file, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEntanglementBlock {
    pub index: usize,
    pub block: NamedBlock,
    pub kind: EntanglementKind,
}

/// A file parsed according to its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedFile {
    Prose(ProseDocument),
    Generated(GeneratedDocument),
    /// A text file without file markers.
    Plain,
    Opaque,
}

impl ParsedFile {
    pub fn kind(&self) -> DocumentKind {
        match self {
            ParsedFile::Prose(_) => DocumentKind::ProseDocument,
            ParsedFile::Generated(_) | ParsedFile::Plain => DocumentKind::GeneratedDocument,
            ParsedFile::Opaque => DocumentKind::Opaque,
        }
    }

    /// Blocks in file order. A generated file lists its whole-file block first.
    pub fn blocks(&self) -> Vec<ParsedEntanglementBlock> {
        let tagged: Vec<(NamedBlock, EntanglementKind)> = match self {
            ParsedFile::Prose(doc) => doc
                .blocks
                .iter()
                .map(|b| (b.block.clone(), EntanglementKind::Prose))
                .collect(),
            ParsedFile::Generated(doc) => std::iter::once((
                doc.whole.clone(),
                EntanglementKind::GeneratedDocument,
            ))
            .chain(
                doc.blocks
                    .iter()
                    .map(|b| (b.clone(), EntanglementKind::Generated)),
            )
            .collect(),
            ParsedFile::Plain | ParsedFile::Opaque => Vec::new(),
        };

        tagged
            .into_iter()
            .enumerate()
            .map(|(index, (block, kind))| ParsedEntanglementBlock { index, block, kind })
            .collect()
    }
}

/// Parses a file's content according to its detected kind. Never fails: a
/// generated file whose markers cannot be read is treated as plain text.
pub fn parse_file(path: &Path, bytes: &[u8]) -> ParsedFile {
    let kind = DocumentKind::detect(path, bytes);
    let Ok(text) = std::str::from_utf8(bytes) else {
        return ParsedFile::Opaque;
    };

    match kind {
        DocumentKind::ProseDocument => ParsedFile::Prose(parse_prose(path, text)),
        DocumentKind::Opaque => ParsedFile::Opaque,
        DocumentKind::GeneratedDocument if !is_generated(text) => ParsedFile::Plain,
        DocumentKind::GeneratedDocument => match parse_generated(path, text) {
            Ok(doc) => ParsedFile::Generated(doc),
            Err(e) => {
                tracing::warn!("Treating {} as plain text: {}", path.display(), e);
                ParsedFile::Plain
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::markers::TOOL_VERSION;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_detect() {
        assert_eq!(DocumentKind::detect(Path::new("a.md"), b"x"), DocumentKind::ProseDocument);
        assert_eq!(
            DocumentKind::detect(Path::new("notes.MARKDOWN"), b"x"),
            DocumentKind::ProseDocument
        );
        assert_eq!(DocumentKind::detect(Path::new("logo.png"), b"x"), DocumentKind::Opaque);
        assert_eq!(
            DocumentKind::detect(Path::new("data.txt"), &[0xff, 0xfe, 0x00]),
            DocumentKind::Opaque
        );
        assert_eq!(
            DocumentKind::detect(Path::new("out.py"), b"print(1)"),
            DocumentKind::GeneratedDocument
        );
    }

    #[test]
    fn test_parse_file_dispatch() {
        let prose = parse_file(Path::new("doc.md"), b"```python #a\nx\n```\n");
        assert_eq!(prose.kind(), DocumentKind::ProseDocument);
        let blocks = prose.blocks();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, EntanglementKind::Prose);

        let plain = parse_file(Path::new("notes.txt"), b"hello\n");
        assert_eq!(plain, ParsedFile::Plain);
        assert!(plain.blocks().is_empty());
    }

    #[test]
    fn test_generated_blocks_start_with_whole_file() {
        let text = format!(
            "# Entanglement: This file is entangled with {{doc.md}}.\n\
             # Entanglement: This block is entangled with {{out.py}}@{{doc.md}}.\n\
             print(\"hi\")\n\
             # End of block entanglement.\n\
             # End of file entanglement. Created by Entwine (Version {} ).\n",
            TOOL_VERSION
        );
        let parsed = parse_file(Path::new("out.py"), text.as_bytes());
        let blocks = parsed.blocks();

        let kinds: Vec<EntanglementKind> = blocks.iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            vec![EntanglementKind::GeneratedDocument, EntanglementKind::Generated]
        );
        assert_eq!(blocks[1].index, 1);
        assert_eq!(blocks[1].block.content, "print(\"hi\")");
    }
}
