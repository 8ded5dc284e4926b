//! OSC address pattern compiler
//!
//! Address patterns follow OSC 1.0 with the OSC 1.1 path-traversal wildcard:
//! ```text
//! /synth/{osc1,osc2}/freq     alternation of literal strings
//! /mixer/ch[1-8]/gain         character class, [!...] negates
//! /lfo/*/rate                 one or more characters within a segment
//! /pad/?                      exactly one character
//! //volume                    empty segment: zero or more whole segments
//! ```
//!
//! Addresses are printable ASCII (0x20 to 0x7e). Control characters and
//! any non-ASCII UTF-8 are syntax errors, escaped or not.
//!
//! A backslash escapes the following character in every context. Every
//! character position of a segment must be covered by exactly one
//! production; anything else is a syntax error.
//!
//! Classification ([`is_osc_address_pattern`]) and compilation
//! ([`Pattern::compile`]) share [`parse_address`], so they cannot disagree
//! about what is a pattern.

use std::fmt;
use std::hash::{Hash, Hasher};

use tracing::debug;

use crate::{Error, Result};

/// One production of an address segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Literal run with escapes resolved
    Literal(String),
    /// `{a,b,c}`
    Array(Vec<String>),
    /// `[...]` or `[!...]`
    Chars { negated: bool, ranges: Vec<(char, char)> },
    /// `*`
    Wildcard,
    /// `?`
    Maybe,
}

impl Token {
    pub fn is_pattern(&self) -> bool {
        !matches!(self, Token::Literal(_))
    }
}

/// One `/`-separated segment of an address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Empty segment (`//`), matches zero or more whole segments
    Traverse,
    Parts(Vec<Token>),
}

impl Segment {
    pub fn is_pattern(&self) -> bool {
        match self {
            Segment::Traverse => true,
            Segment::Parts(tokens) => tokens.iter().any(Token::is_pattern),
        }
    }
}

/// Split an address into segments and scan each one.
///
/// Fails with [`Error::PathSyntax`] at the first byte outside printable
/// ASCII, so multibyte UTF-8 addresses are rejected.
pub fn parse_address(path: &str) -> Result<Vec<Segment>> {
    if path.is_empty() {
        return Err(Error::syntax(path, 0, "empty address"));
    }
    if !path.starts_with('/') {
        return Err(Error::syntax(path, 0, "address must start with '/'"));
    }

    let mut segments = Vec::new();
    let mut offset = 1;
    for raw in path[1..].split('/') {
        let segment = if raw.is_empty() {
            Segment::Traverse
        } else {
            Segment::Parts(SegmentScanner::new(path, offset, raw).scan()?)
        };
        segments.push(segment);
        offset += raw.len() + 1;
    }
    Ok(segments)
}

/// Whether `path` contains at least one pattern production.
///
/// Malformed segments are syntax errors here too.
pub fn is_osc_address_pattern(path: &str) -> Result<bool> {
    Ok(parse_address(path)?.iter().any(Segment::is_pattern))
}

struct SegmentScanner<'a> {
    path: &'a str,
    offset: usize,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> SegmentScanner<'a> {
    fn new(path: &'a str, offset: usize, segment: &'a str) -> Self {
        Self {
            path,
            offset,
            bytes: segment.as_bytes(),
            pos: 0,
        }
    }

    fn error(&self, at: usize, reason: impl Into<String>) -> Error {
        Error::syntax(self.path, self.offset + at, reason)
    }

    fn scan(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        while self.pos < self.bytes.len() {
            let token = match self.bytes[self.pos] {
                b'{' => self.array()?,
                b'[' => self.chars()?,
                b'*' => {
                    self.pos += 1;
                    Token::Wildcard
                }
                b'?' => {
                    self.pos += 1;
                    Token::Maybe
                }
                b'}' => return Err(self.error(self.pos, "unmatched '}'")),
                b']' => return Err(self.error(self.pos, "unmatched ']'")),
                _ => self.literal()?,
            };
            tokens.push(token);
        }
        Ok(tokens)
    }

    /// Read one character, resolving a backslash escape.
    /// Returns the character and whether it was escaped.
    fn next_char(&mut self) -> Result<(char, bool)> {
        let at = self.pos;
        let mut escaped = false;
        if self.bytes[self.pos] == b'\\' {
            if self.pos + 1 >= self.bytes.len() {
                return Err(self.error(at, "dangling escape"));
            }
            self.pos += 1;
            escaped = true;
        }
        let c = self.bytes[self.pos];
        if !(0x20..=0x7e).contains(&c) {
            return Err(self.error(self.pos, "not a printable ASCII character"));
        }
        self.pos += 1;
        Ok((c as char, escaped))
    }

    fn literal(&mut self) -> Result<Token> {
        let mut out = String::new();
        while self.pos < self.bytes.len() {
            if matches!(self.bytes[self.pos], b'{' | b'}' | b'[' | b']' | b'*' | b'?') {
                break;
            }
            let (c, _) = self.next_char()?;
            out.push(c);
        }
        Ok(Token::Literal(out))
    }

    fn array(&mut self) -> Result<Token> {
        let open = self.pos;
        self.pos += 1;
        let mut items = Vec::new();
        let mut current = String::new();
        loop {
            if self.pos >= self.bytes.len() {
                return Err(self.error(open, "unterminated '{'"));
            }
            match self.bytes[self.pos] {
                b',' => {
                    items.push(std::mem::take(&mut current));
                    self.pos += 1;
                }
                b'}' => {
                    items.push(current);
                    self.pos += 1;
                    return Ok(Token::Array(items));
                }
                b'{' => return Err(self.error(self.pos, "nested '{'")),
                _ => {
                    let (c, _) = self.next_char()?;
                    current.push(c);
                }
            }
        }
    }

    fn chars(&mut self) -> Result<Token> {
        let open = self.pos;
        self.pos += 1;
        let mut negated = false;
        if self.bytes.get(self.pos) == Some(&b'!') {
            negated = true;
            self.pos += 1;
        }

        let mut members: Vec<(char, bool)> = Vec::new();
        loop {
            if self.pos >= self.bytes.len() {
                return Err(self.error(open, "unterminated '['"));
            }
            match self.bytes[self.pos] {
                b']' => {
                    self.pos += 1;
                    break;
                }
                b'[' => return Err(self.error(self.pos, "nested '['")),
                _ => members.push(self.next_char()?),
            }
        }
        if members.is_empty() {
            return Err(self.error(open, "empty character class"));
        }

        let mut ranges = Vec::new();
        let mut i = 0;
        while i < members.len() {
            let (lo, _) = members[i];
            let dash = matches!(members.get(i + 1), Some(('-', false)));
            if dash && i + 2 < members.len() {
                let (hi, _) = members[i + 2];
                if lo > hi {
                    return Err(self.error(open, format!("reversed range '{}-{}'", lo, hi)));
                }
                ranges.push((lo, hi));
                i += 3;
            } else {
                ranges.push((lo, lo));
                i += 1;
            }
        }

        Ok(Token::Chars { negated, ranges })
    }
}

/// A compiled OSC address pattern
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: regex_lite::Regex,
}

impl Pattern {
    /// Compile an address pattern string
    pub fn compile(source: &str) -> Result<Self> {
        let segments = parse_address(source)?;
        Self::from_segments(source, &segments)
    }

    pub(crate) fn from_segments(source: &str, segments: &[Segment]) -> Result<Self> {
        let mut re = String::from("^");
        for segment in segments {
            match segment {
                Segment::Traverse => re.push_str("(?:/[^/]*)*"),
                Segment::Parts(tokens) => {
                    re.push('/');
                    for token in tokens {
                        push_token(&mut re, token);
                    }
                }
            }
        }
        re.push('$');

        debug!("compile_osc_address_pattern({:?}) => {}", source, re);

        let regex = regex_lite::Regex::new(&re)
            .map_err(|e| Error::syntax(source, 0, e.to_string()))?;

        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    /// Check if a literal address matches this pattern
    pub fn matches(&self, address: &str) -> bool {
        self.regex.is_match(address)
    }

    /// The pattern as written
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

impl Hash for Pattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
    }
}

impl PartialOrd for Pattern {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pattern {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.source.cmp(&other.source)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn push_token(re: &mut String, token: &Token) {
    match token {
        Token::Literal(s) => s.chars().for_each(|c| push_char(re, c)),
        Token::Array(items) => {
            let (empty, items): (Vec<&String>, Vec<&String>) =
                items.iter().partition(|item| item.is_empty());
            if items.is_empty() {
                return;
            }
            re.push_str("(?:");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    re.push('|');
                }
                item.chars().for_each(|c| push_char(re, c));
            }
            re.push(')');
            if !empty.is_empty() {
                re.push('?');
            }
        }
        Token::Chars { negated, ranges } => {
            re.push('[');
            if *negated {
                re.push_str("^/");
            }
            for &(lo, hi) in ranges {
                push_hex(re, lo);
                if lo != hi {
                    re.push('-');
                    push_hex(re, hi);
                }
            }
            re.push(']');
        }
        Token::Wildcard => re.push_str("[^/]+"),
        Token::Maybe => re.push_str("[^/]"),
    }
}

fn push_char(re: &mut String, c: char) {
    if c.is_ascii_alphanumeric() {
        re.push(c);
    } else {
        push_hex(re, c);
    }
}

fn push_hex(re: &mut String, c: char) {
    re.push_str(&format!("\\x{{{:02X}}}", c as u32));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, address: &str) -> bool {
        Pattern::compile(pattern).unwrap().matches(address)
    }

    #[test]
    fn test_scan_tokens() {
        let segments = parse_address("/x{1,10}y[!a-c]*?").unwrap();
        assert_eq!(
            segments,
            vec![Segment::Parts(vec![
                Token::Literal("x".to_string()),
                Token::Array(vec!["1".to_string(), "10".to_string()]),
                Token::Literal("y".to_string()),
                Token::Chars {
                    negated: true,
                    ranges: vec![('a', 'c')]
                },
                Token::Wildcard,
                Token::Maybe,
            ])]
        );
    }

    #[test]
    fn test_traverse_segment() {
        let segments = parse_address("//z").unwrap();
        assert_eq!(segments[0], Segment::Traverse);
        assert!(matches("//z", "/z"));
        assert!(matches("//z", "/a/b/z"));
        assert!(!matches("//z", "/a/b/zz"));
    }

    #[test]
    fn test_literal_classification() {
        assert!(!is_osc_address_pattern("/foo/bar").unwrap());
        assert!(!is_osc_address_pattern(r"/foo\{1\}").unwrap());
        assert!(is_osc_address_pattern("/foo/*").unwrap());
        assert!(is_osc_address_pattern("/foo//bar").unwrap());
    }

    #[test]
    fn test_escaped_literal_matches_metachar() {
        assert!(matches(r"/u\{1,2\}", "/u{1,2}"));
        assert!(!matches(r"/u\{1,2\}", "/u1"));
    }

    #[test]
    fn test_syntax_errors() {
        for bad in ["", "foo", "/x{1,2", "/x[12", "/x]", "/x}", "/x[]", "/x\\", "/x{a{b}}", "/x[b-a]"] {
            let err = parse_address(bad).unwrap_err();
            assert!(matches!(err, Error::PathSyntax { .. }), "{:?} gave {:?}", bad, err);
        }
    }

    #[test]
    fn test_error_position() {
        match parse_address("/ok/x}y").unwrap_err() {
            Error::PathSyntax { position, .. } => assert_eq!(position, 5),
            other => panic!("unexpected error {:?}", other),
        }
    }
}
