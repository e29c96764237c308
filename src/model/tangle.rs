//! Producing the text of a generated file from block definitions.

use std::path::Path;

use crate::config::{Comment, Config};
use crate::errors::{EntwineError, Result};

use super::named_block::NamedBlock;
use super::resolve::{render, resolve_block, BlockLookup, Diagnostic};

/// Text of a generated file, plus what went wrong resolving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tangled {
    pub text: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// Comment syntax for a generated file: the block's language, else the
/// file extension.
pub fn comment_for_target<'c>(
    config: &'c Config,
    language: Option<&str>,
    target: &Path,
) -> Result<&'c Comment> {
    if let Some(found) = language.and_then(|l| config.find_language(l)) {
        return Ok(&found.comment);
    }
    let extension = target.extension().and_then(|e| e.to_str());
    match extension.and_then(|e| config.find_language(e)) {
        Some(found) => Ok(&found.comment),
        None => Err(EntwineError::UnknownLanguageComment {
            language: language
                .or(extension)
                .unwrap_or_default()
                .to_string(),
        }),
    }
}

/// Renders the file a block materializes as.
pub fn tangle_target(config: &Config, lookup: &impl BlockLookup, block: &NamedBlock) -> Result<Tangled> {
    let target = block
        .explicit_target_file
        .as_deref()
        .unwrap_or(block.defining_file.as_path());
    let comment = comment_for_target(config, block.language.as_deref(), target)?;

    let resolution = resolve_block(&block.name, lookup);
    for diagnostic in &resolution.diagnostics {
        tracing::warn!("{}: {}", target.display(), diagnostic);
    }

    Ok(Tangled {
        text: render(&resolution.document, comment),
        diagnostics: resolution.diagnostics,
    })
}
