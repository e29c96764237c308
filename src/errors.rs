//! Error types for the entwine engine.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::ReferenceName;
use crate::text_location::TextLocation;

/// Main error type for entwine operations.
#[derive(Error, Debug)]
pub enum EntwineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Glob pattern error: {0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("Worker pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("No workspace found in {start} or any parent directory")]
    WorkspaceNotFound { start: PathBuf },

    #[error("Workspace already exists at {0}")]
    WorkspaceExists(PathBuf),

    #[error("Cannot read {path}: {source}")]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("Block not found: {0}")]
    BlockNotFound(ReferenceName),

    #[error("No comment syntax known for language '{language}'")]
    UnknownLanguageComment { language: String },

    #[error("Index corrupted at {path}: {message}")]
    IndexCorruption { path: PathBuf, message: String },

    #[error(
        "Change set {change_set} stopped at '{failed}' after {} applied record(s): {message}",
        .succeeded.len()
    )]
    PartialApplyFailure {
        change_set: String,
        succeeded: Vec<String>,
        failed: String,
        message: String,
    },

    #[error("No pending change set to apply")]
    NoPendingChangeSet,

    #[error("Cannot patch {path}: {message}")]
    Patch { path: PathBuf, message: String },

    #[error("Parse error at {location}: {message}")]
    Parse {
        location: TextLocation,
        message: String,
    },

    #[error("{0}")]
    Other(String),
}

impl EntwineError {
    /// Wraps an I/O error raised while reading `path`.
    pub fn unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            EntwineError::PermissionDenied(path)
        } else {
            EntwineError::FileUnreadable { path, source }
        }
    }

    /// Whether a scan may skip the file that produced this error and continue.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            EntwineError::FileUnreadable { .. } | EntwineError::PermissionDenied(_)
        )
    }
}

/// Result type alias for entwine operations.
pub type Result<T> = std::result::Result<T, EntwineError>;
