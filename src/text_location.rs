//! Source positions for parse diagnostics.

use std::fmt;
use std::path::PathBuf;

/// A 1-based line in a workspace file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextLocation {
    /// Workspace-relative path, once known.
    pub filename: Option<PathBuf>,
    pub line: usize,
}

impl TextLocation {
    /// A line in a file not yet named.
    pub fn line_only(line: usize) -> Self {
        Self {
            filename: None,
            line,
        }
    }

    pub fn file_line(filename: PathBuf, line: usize) -> Self {
        Self {
            filename: Some(filename),
            line,
        }
    }

    /// Attaches the file a token was read from.
    pub fn with_filename(mut self, filename: PathBuf) -> Self {
        self.filename = Some(filename);
        self
    }
}

impl Default for TextLocation {
    fn default() -> Self {
        Self::line_only(1)
    }
}

impl fmt::Display for TextLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.filename {
            Some(path) => write!(f, "{}:{}", path.display(), self.line),
            None => write!(f, "line {}", self.line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let loc = TextLocation::file_line(PathBuf::from("docs/intro.md"), 10);
        assert_eq!(loc.to_string(), "docs/intro.md:10");
        assert_eq!(TextLocation::line_only(3).to_string(), "line 3");
    }

    #[test]
    fn test_with_filename() {
        let loc = TextLocation::line_only(42).with_filename(PathBuf::from("a.md"));
        assert_eq!(loc.filename.as_deref(), Some(std::path::Path::new("a.md")));
        assert_eq!(loc.line, 42);
    }
}
