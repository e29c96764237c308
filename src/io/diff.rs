//! Unified diffs between file versions.

use std::path::Path;

use diffy::{apply, DiffOptions, Patch};

use crate::errors::{EntwineError, Result};

const CONTEXT_LINES: usize = 3;

/// Builds a unified diff from `old` to `new`. Returns `None` when they are equal.
pub fn unified_diff(old: &str, new: &str) -> Option<String> {
    if old == new {
        return None;
    }
    let mut options = DiffOptions::new();
    options.set_context_len(CONTEXT_LINES);
    let patch = options.create_patch(old, new);
    if patch.hunks().is_empty() {
        return None;
    }
    Some(patch.to_string())
}

/// Applies a diff produced by [`unified_diff`] to `original`.
pub fn apply_diff(path: &Path, original: &str, diff: &str) -> Result<String> {
    let patch = Patch::from_str(diff).map_err(|e| EntwineError::Patch {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    apply(original, &patch).map_err(|e| EntwineError::Patch {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_equal_content_has_no_diff() {
        assert!(unified_diff("a\nb\n", "a\nb\n").is_none());
    }

    #[test]
    fn test_diff_applies_to_original() {
        let old = "one\ntwo\nthree\n";
        let new = "one\n2\nthree\nfour\n";
        let diff = unified_diff(old, new).unwrap();
        assert!(diff.contains("-two"));
        assert!(diff.contains("+2"));

        let patched = apply_diff(Path::new("f.txt"), old, &diff).unwrap();
        assert_eq!(patched, new);
    }

    #[test]
    fn test_diff_without_trailing_newline() {
        let old = "print(1)";
        let new = "print(2)";
        let diff = unified_diff(old, new).unwrap();
        assert_eq!(apply_diff(Path::new("f.py"), old, &diff).unwrap(), new);
    }

    #[test]
    fn test_apply_to_wrong_base_fails() {
        let diff = unified_diff("a\nb\nc\n", "a\nx\nc\n").unwrap();
        let err = apply_diff(Path::new("f.txt"), "q\nr\ns\n", &diff).unwrap_err();
        assert!(matches!(err, EntwineError::Patch { .. }));
    }
}
