//! Workspace configuration.

use serde::{Deserialize, Serialize};

use super::language::{Comment, Language};
use super::templates;
use crate::errors::{EntwineError, Result};

/// Patterns that are never scanned, whatever the configuration says.
pub const BUILTIN_IGNORES: &[&str] = &[".entwine/**", "**/.obsidian/**", ".git/**", "target/**"];

/// Configuration read from `.entwine/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Extra workspace-relative glob patterns to leave out of scans.
    #[serde(default)]
    pub ignore: Vec<String>,

    /// Worker pool width for scanning.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Language comment mappings, checked before the built-in table.
    #[serde(default)]
    pub languages: Vec<Language>,
}

fn default_workers() -> usize {
    4
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ignore: Vec::new(),
            workers: default_workers(),
            languages: Vec::new(),
        }
    }
}

impl Config {
    /// Looks up a language by name or identifier, custom entries first.
    pub fn find_language(&self, identifier: &str) -> Option<&Language> {
        self.languages
            .iter()
            .find(|l| l.matches(identifier))
            .or_else(|| templates::find_language(identifier))
    }

    /// Comment syntax for a language, failing when none is known.
    pub fn comment_for(&self, language: &str) -> Result<&Comment> {
        self.find_language(language)
            .map(|l| &l.comment)
            .ok_or_else(|| EntwineError::UnknownLanguageComment {
                language: language.to_string(),
            })
    }

    /// All ignore patterns: the built-in ones followed by the configured ones.
    pub fn ignore_patterns(&self) -> impl Iterator<Item = &str> {
        BUILTIN_IGNORES
            .iter()
            .copied()
            .chain(self.ignore.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.workers, 4);
        assert!(config.ignore.is_empty());
        assert_eq!(config.ignore_patterns().count(), BUILTIN_IGNORES.len());
    }

    #[test]
    fn test_custom_language_wins() {
        let config = Config {
            languages: vec![Language::new("python", Comment::line(";;"))],
            ..Config::default()
        };
        assert_eq!(config.comment_for("python").unwrap(), &Comment::line(";;"));
        assert_eq!(config.comment_for("rs").unwrap(), &Comment::line("//"));
    }

    #[test]
    fn test_unknown_language() {
        let err = Config::default().comment_for("klingon").unwrap_err();
        assert!(matches!(err, EntwineError::UnknownLanguageComment { ref language } if language == "klingon"));
    }
}
