//! Block names.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Names a block in the index.
///
/// A block with a target file is named by that file's workspace-relative
/// path (`src/app.py`); any other block is named by its `#id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceName(String);

impl ReferenceName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Names a block after a workspace-relative path, using `/` separators.
    pub fn from_path(path: &Path) -> Self {
        Self(slash_path(path))
    }
}

/// Renders a relative path with `/` separators on every platform.
pub fn slash_path(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.join("/")
}

impl fmt::Display for ReferenceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ReferenceName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ReferenceName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::borrow::Borrow<str> for ReferenceName {
    fn borrow(&self) -> &str {
        &self.0
    }
}
