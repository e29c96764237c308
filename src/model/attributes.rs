//! Fenced block attribute parsing.
//!
//! Parses info strings like `python #greet file=out.py noweb` into an
//! [`Attributes`] value. The first bare word is the language; `#word` sets
//! the id; `key=value` pairs keep their order; any other word is a flag.
//! A Pandoc-style `{.python #greet}` form is accepted as well.

use indexmap::IndexMap;
use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, tag, take_till1, take_while1},
    character::complete::{char, multispace0, multispace1, none_of},
    combinator::{map, value},
    multi::separated_list0,
    sequence::{delimited, preceded},
    IResult, Parser,
};
use serde::{Deserialize, Serialize};

/// One token of an info string.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Class(String),
    Id(String),
    KeyValue(String, String),
    Bare(String),
}

fn is_key_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == ':' || c == '.'
}

fn parse_word(input: &str) -> IResult<&str, &str> {
    take_till1(|c: char| c.is_whitespace()).parse(input)
}

fn parse_id(input: &str) -> IResult<&str, Token> {
    map(preceded(char('#'), parse_word), |s: &str| Token::Id(s.to_string())).parse(input)
}

fn parse_class(input: &str) -> IResult<&str, Token> {
    map(preceded(char('.'), parse_word), |s: &str| Token::Class(s.to_string())).parse(input)
}

fn parse_quoted(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        escaped_transform(
            none_of("\\\""),
            '\\',
            alt((
                value("\\", tag("\\")),
                value("\"", tag("\"")),
                value("\n", tag("n")),
                value("\t", tag("t")),
            )),
        ),
        char('"'),
    )
    .parse(input)
}

fn parse_key_value(input: &str) -> IResult<&str, Token> {
    map(
        (
            take_while1(is_key_char),
            char('='),
            alt((parse_quoted, map(parse_word, str::to_string))),
        ),
        |(key, _, val): (&str, char, String)| Token::KeyValue(key.to_string(), val),
    )
    .parse(input)
}

fn parse_bare(input: &str) -> IResult<&str, Token> {
    map(parse_word, |s: &str| Token::Bare(s.to_string())).parse(input)
}

fn parse_tokens(input: &str) -> IResult<&str, Vec<Token>> {
    delimited(
        multispace0,
        separated_list0(
            multispace1,
            alt((parse_id, parse_class, parse_key_value, parse_bare)),
        ),
        multispace0,
    )
    .parse(input)
}

/// Attributes of a fenced block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    /// Language tag.
    pub language: Option<String>,
    /// Value of the `#id` token.
    pub id: Option<String>,
    /// `key=value` pairs in order of appearance.
    pub values: IndexMap<String, String>,
    /// Bare flags such as `noweb` or `ignore`.
    pub flags: Vec<String>,
}

impl Attributes {
    /// Parses an info string. Never fails: unrecognized text becomes flags.
    pub fn parse(info: &str) -> Self {
        let trimmed = info.trim();
        let inner = trimmed
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .unwrap_or(trimmed);

        let tokens = match parse_tokens(inner) {
            Ok((_, tokens)) => tokens,
            Err(e) => {
                tracing::debug!("Unparseable info string '{}': {}", info, e);
                Vec::new()
            }
        };

        let mut attrs = Attributes::default();
        for (position, token) in tokens.into_iter().enumerate() {
            match token {
                Token::Id(id) => {
                    if attrs.id.is_none() {
                        attrs.id = Some(id);
                    }
                }
                Token::Class(class) => {
                    if attrs.language.is_none() {
                        attrs.language = Some(class);
                    }
                }
                Token::KeyValue(key, val) => {
                    attrs.values.insert(key, val);
                }
                Token::Bare(word) if position == 0 => attrs.language = Some(word),
                Token::Bare(word) => attrs.flags.push(word),
            }
        }
        attrs
    }

    /// Explicit target path (`file=`).
    pub fn file(&self) -> Option<&str> {
        self.values.get("file").map(String::as_str)
    }

    /// Checks for a bare flag.
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }

    /// Blocks flagged `ignore` or `ignore-markdown` are invisible to the engine.
    pub fn is_ignored(&self) -> bool {
        self.has_flag("ignore") || self.has_flag("ignore-markdown")
    }

    /// Marks a block that expands noweb references.
    pub fn is_noweb(&self) -> bool {
        self.has_flag("noweb")
    }
}
