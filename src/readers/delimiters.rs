//! Fenced region extraction.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::text_location::TextLocation;

/// Pattern for matching code fence openings.
static FENCE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<indent>\s*)(?P<fence>`{3,}|~{3,})(?P<info>.*)$").unwrap());

/// A fenced region extracted from input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimitedToken {
    /// The info string from the opening delimiter.
    pub info: String,
    /// The content between delimiters, with the fence indentation removed.
    pub content: String,
    /// Location of the opening delimiter.
    pub location: TextLocation,
    /// Indentation of the code fence.
    pub indent: String,
    /// 0-based line range of the content, excluding both fences.
    pub content_lines: Range<usize>,
}

/// Result of attempting to extract a fenced region.
#[derive(Debug)]
pub enum ExtractResult {
    Token(DelimitedToken),
    /// No opening delimiter found, returns the line.
    NotDelimited(String),
    /// Unclosed delimiter (reached end of input).
    Unclosed {
        info: String,
        content: String,
        location: TextLocation,
    },
}

/// Extracts fenced regions from lines, tracking line numbers.
pub struct DelimitedTokenGetter {
    /// Index of the next line (0-based).
    line_index: usize,
}

impl DelimitedTokenGetter {
    pub fn new() -> Self {
        Self { line_index: 0 }
    }

    /// Extracts the next token from the line iterator.
    pub fn extract<'a, I>(&mut self, lines: &mut I) -> Option<ExtractResult>
    where
        I: Iterator<Item = &'a str>,
    {
        let line = lines.next()?;
        let start = self.line_index;
        self.line_index += 1;

        let Some(caps) = FENCE_OPEN.captures(line) else {
            return Some(ExtractResult::NotDelimited(line.to_string()));
        };

        let indent = caps["indent"].to_string();
        let fence = &caps["fence"];
        let info = caps["info"].trim().to_string();
        let Some(fence_char) = fence.chars().next() else {
            return Some(ExtractResult::NotDelimited(line.to_string()));
        };
        let fence_len = fence.len();
        let location = TextLocation::line_only(start + 1);

        let mut content_lines = Vec::new();
        loop {
            let Some(content_line) = lines.next() else {
                return Some(ExtractResult::Unclosed {
                    info,
                    content: content_lines.join("\n"),
                    location,
                });
            };
            self.line_index += 1;

            if is_closing_fence(content_line, fence_char, fence_len) {
                return Some(ExtractResult::Token(DelimitedToken {
                    info,
                    content: content_lines.join("\n"),
                    location,
                    indent,
                    content_lines: start + 1..self.line_index - 1,
                }));
            }

            let stripped = content_line
                .strip_prefix(indent.as_str())
                .unwrap_or(content_line);
            content_lines.push(stripped.to_string());
        }
    }
}

impl Default for DelimitedTokenGetter {
    fn default() -> Self {
        Self::new()
    }
}

/// A closing fence uses the opening character, at least as many times, and nothing else.
fn is_closing_fence(line: &str, fence_char: char, min_len: usize) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= min_len && trimmed.chars().all(|c| c == fence_char)
}

/// Extracts every token from a string.
pub fn extract_all_tokens(input: &str) -> Vec<ExtractResult> {
    let mut getter = DelimitedTokenGetter::new();
    let mut lines = input.lines().peekable();
    let mut results = Vec::new();

    while lines.peek().is_some() {
        if let Some(result) = getter.extract(&mut lines) {
            results.push(result);
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_token(input: &str) -> DelimitedToken {
        extract_all_tokens(input)
            .into_iter()
            .find_map(|r| match r {
                ExtractResult::Token(token) => Some(token),
                _ => None,
            })
            .expect("no token")
    }

    #[test]
    fn test_simple_code_block() {
        let token = first_token("```python\nprint('hello')\n```");
        assert_eq!(token.info, "python");
        assert_eq!(token.content, "print('hello')");
        assert_eq!(token.location.line, 1);
        assert_eq!(token.content_lines, 1..2);
    }

    #[test]
    fn test_tilde_fence() {
        let token = first_token("~~~rust\nfn main() {}\n~~~");
        assert_eq!(token.info, "rust");
        assert_eq!(token.content, "fn main() {}");
    }

    #[test]
    fn test_longer_fence() {
        let token = first_token("````python\n```\nnot closed\n````");
        assert_eq!(token.content, "```\nnot closed");
    }

    #[test]
    fn test_mismatched_character_does_not_close() {
        let token = first_token("```\na\n~~~\nb\n```");
        assert_eq!(token.content, "a\n~~~\nb");
    }

    #[test]
    fn test_unclosed_fence() {
        let results = extract_all_tokens("```python\ncode\nmore code");
        if let ExtractResult::Unclosed { info, content, .. } = &results[0] {
            assert_eq!(info, "python");
            assert_eq!(content, "code\nmore code");
        } else {
            panic!("Expected Unclosed");
        }
    }

    #[test]
    fn test_indented_fence() {
        let token = first_token("    ```python\n    code\n    ```");
        assert_eq!(token.indent, "    ");
        assert_eq!(token.content, "code");
    }

    #[test]
    fn test_spans_across_blocks() {
        let input = "text\n```python\ncode1\n```\nmore text\n```rust\ncode2\ncode3\n```";
        let results = extract_all_tokens(input);

        assert_eq!(results.len(), 4);
        let spans: Vec<Range<usize>> = results
            .iter()
            .filter_map(|r| match r {
                ExtractResult::Token(token) => Some(token.content_lines.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(spans, vec![2..3, 6..8]);
    }

    #[test]
    fn test_empty_code_block() {
        let token = first_token("```python\n```");
        assert_eq!(token.content, "");
        assert_eq!(token.content_lines, 1..1);
    }
}
