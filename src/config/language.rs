//! Language comment syntax.

use serde::{Deserialize, Serialize};

/// Comment syntax used when writing markers into generated files.
///
/// In TOML a line comment is a bare string (`comment = "#"`), a block
/// comment a table (`comment = { open = "/*", close = "*/" }`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Comment {
    Line(String),
    Block { open: String, close: String },
}

impl Comment {
    pub fn line(prefix: impl Into<String>) -> Self {
        Comment::Line(prefix.into())
    }

    pub fn block(open: impl Into<String>, close: impl Into<String>) -> Self {
        Comment::Block {
            open: open.into(),
            close: close.into(),
        }
    }

    /// Turns `text` into a one-line comment.
    pub fn wrap(&self, text: &str) -> String {
        match self {
            Comment::Line(prefix) => format!("{} {}", prefix, text),
            Comment::Block { open, close } => format!("{} {} {}", open, text, close),
        }
    }
}

/// A language entry: its name, the aliases that select it, its comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub name: String,

    /// Fence tags and file extensions besides `name`.
    #[serde(default)]
    pub identifiers: Vec<String>,

    pub comment: Comment,
}

impl Language {
    pub fn new(name: impl Into<String>, comment: Comment) -> Self {
        Self {
            name: name.into(),
            identifiers: Vec::new(),
            comment,
        }
    }

    pub fn with_identifiers(mut self, identifiers: &[&str]) -> Self {
        self.identifiers = identifiers.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Case-insensitive match against the name and every alias.
    pub fn matches(&self, identifier: &str) -> bool {
        std::iter::once(&self.name)
            .chain(&self.identifiers)
            .any(|known| known.eq_ignore_ascii_case(identifier))
    }
}
