//! Reference and marker grammar.
//!
//! Prose blocks point at other blocks with noweb reference lines
//! (`<<name>>` alone on a line). Generated files carry comment markers that
//! record where each expanded block came from, so the tree can be rebuilt
//! from the generated file alone.

use once_cell::sync::Lazy;
use regex::Regex;

use super::language::Comment;

/// Tool name written into whole-file footers.
pub const TOOL_NAME: &str = "Entwine";

/// Version written into whole-file footers.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A noweb reference line: optional indentation, `<<name>>`, trailing blanks.
pub static REF_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<indent>[\t\x0C\r ]*)<<(?P<refname>[\w:/.-]+)>>[\t\x0C\r ]*$").unwrap()
});

/// Whole-file header, embedding the originating prose path.
pub static FILE_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^.*Entanglement: This file is entangled with \{(?P<source>[^}]*)\}\.").unwrap()
});

/// Whole-file footer, embedding the tool version.
pub static FILE_FOOTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^.*End of file entanglement\. Created by \w+ \(Version (?P<version>\d+\.\d+\.\d+) \)\.",
    )
    .unwrap()
});

/// Per-block header, embedding the block name and its prose origin.
pub static BLOCK_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<indent>\s*).*Entanglement: This block is entangled with \{(?P<name>[^}]*)\}@\{(?P<source>[^}]*)\}\.",
    )
    .unwrap()
});

/// Per-block footer.
pub static BLOCK_FOOTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<indent>\s*).*End of block entanglement\.").unwrap());

/// Note left inside a block whose expansion would loop.
pub static CYCLE_NOTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<indent>\s*).*Cycle detected: (?P<name>[\w:/.-]+)").unwrap()
});

/// Note left where a referenced block does not exist.
pub static MISSING_NOTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<indent>\s*).*Error: Unresolved entangled block \{(?P<name>[^}]*)\}\.").unwrap()
});

/// Formats the whole-file header.
pub fn file_header(comment: &Comment, source: &str) -> String {
    comment.wrap(&format!(
        "Entanglement: This file is entangled with {{{}}}.",
        source
    ))
}

/// Formats the whole-file footer.
pub fn file_footer(comment: &Comment) -> String {
    comment.wrap(&format!(
        "End of file entanglement. Created by {} (Version {} ).",
        TOOL_NAME, TOOL_VERSION
    ))
}

/// Formats a block header at the given indentation.
pub fn block_header(comment: &Comment, indent: &str, name: &str, source: &str) -> String {
    format!(
        "{}{}",
        indent,
        comment.wrap(&format!(
            "Entanglement: This block is entangled with {{{}}}@{{{}}}.",
            name, source
        ))
    )
}

/// Formats a block footer at the given indentation.
pub fn block_footer(comment: &Comment, indent: &str) -> String {
    format!("{}{}", indent, comment.wrap("End of block entanglement."))
}

/// Inline note written inside a block whose expansion would loop.
pub fn cycle_note(comment: &Comment, indent: &str, name: &str) -> String {
    format!("{}{}", indent, comment.wrap(&format!("Cycle detected: {}", name)))
}

/// Inline note written where a referenced block does not exist.
pub fn missing_note(comment: &Comment, indent: &str, name: &str) -> String {
    format!(
        "{}{}",
        indent,
        comment.wrap(&format!("Error: Unresolved entangled block {{{}}}.", name))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ref_pattern() {
        let caps = REF_PATTERN.captures("    <<some_ref>>  ").unwrap();
        assert_eq!(&caps["indent"], "    ");
        assert_eq!(&caps["refname"], "some_ref");

        let caps = REF_PATTERN.captures("<<src/app.py>>").unwrap();
        assert_eq!(&caps["refname"], "src/app.py");

        assert!(REF_PATTERN.captures("x = <<not_alone>>").is_none());
        assert!(REF_PATTERN.captures("<<>>").is_none());
        assert!(REF_PATTERN.captures("<<a b>>").is_none());
    }

    #[test]
    fn test_file_markers_round_trip() {
        let comment = Comment::line("#");
        let header = file_header(&comment, "docs/intro.md");
        assert_eq!(header, "# Entanglement: This file is entangled with {docs/intro.md}.");
        assert_eq!(&FILE_HEADER.captures(&header).unwrap()["source"], "docs/intro.md");

        let footer = file_footer(&comment);
        assert_eq!(&FILE_FOOTER.captures(&footer).unwrap()["version"], TOOL_VERSION);
    }

    #[test]
    fn test_block_markers_round_trip() {
        let comment = Comment::block("/*", "*/");
        let header = block_header(&comment, "    ", "greet", "intro.md");
        assert_eq!(
            header,
            "    /* Entanglement: This block is entangled with {greet}@{intro.md}. */"
        );
        let caps = BLOCK_HEADER.captures(&header).unwrap();
        assert_eq!(&caps["indent"], "    ");
        assert_eq!(&caps["name"], "greet");
        assert_eq!(&caps["source"], "intro.md");

        let footer = block_footer(&comment, "  ");
        assert_eq!(&BLOCK_FOOTER.captures(&footer).unwrap()["indent"], "  ");
        assert!(!FILE_FOOTER.is_match(&footer));
        assert!(!BLOCK_HEADER.is_match(&file_header(&comment, "x.md")));
    }

    #[test]
    fn test_notes_round_trip() {
        let comment = Comment::line("--");
        let cycle = cycle_note(&comment, "  ", "a");
        let caps = CYCLE_NOTE.captures(&cycle).unwrap();
        assert_eq!(&caps["indent"], "  ");
        assert_eq!(&caps["name"], "a");

        let missing = missing_note(&comment, "", "lib/b");
        let caps = MISSING_NOTE.captures(&missing).unwrap();
        assert_eq!(&caps["indent"], "");
        assert_eq!(&caps["name"], "lib/b");
    }
}
