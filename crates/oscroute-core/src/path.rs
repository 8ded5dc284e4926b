//! OSC addresses
//!
//! A [`Path`] is either a literal address, a compiled address pattern, the
//! any-path sentinel, or the union of several paths (built by
//! [`Path::union`] for multi-route subscriptions).
//!
//! Containment is one-directional: a pattern contains the literals it
//! matches, a literal contains only itself, and the any-path sentinel
//! contains every path but is contained only by itself.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::pattern::{self, Pattern, Segment};
use crate::{Error, Result};

/// The path that matches every address
pub const ANY_PATH: Path = Path::Any;

/// An OSC address or address pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Path {
    /// Matches every address
    Any,
    /// Plain address with no pattern productions
    Literal(Arc<str>),
    /// Compiled address pattern
    Pattern(Arc<Pattern>),
    /// Union of two or more paths
    Union(Arc<BTreeSet<Path>>),
}

impl Path {
    /// The any-path sentinel
    pub const ANY: Path = Path::Any;

    /// Parse an address string, compiling it if it is a pattern.
    /// Only printable ASCII is accepted.
    pub fn parse(s: &str) -> Result<Self> {
        let segments = pattern::parse_address(s)?;
        if segments.iter().any(Segment::is_pattern) {
            Ok(Path::Pattern(Arc::new(Pattern::from_segments(s, &segments)?)))
        } else {
            Ok(Path::Literal(Arc::from(s)))
        }
    }

    /// Parse an optional address; `None` is the any-path sentinel
    pub fn parse_optional(s: Option<&str>) -> Result<Self> {
        match s {
            Some(s) => Self::parse(s),
            None => Ok(Path::Any),
        }
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self, Path::Pattern(_) | Path::Union(_))
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Path::Any)
    }

    /// The literal address, if this is one
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Path::Literal(s) => Some(&**s),
            _ => None,
        }
    }

    /// Check if a literal address matches this path
    pub fn matches(&self, address: &str) -> bool {
        match self {
            Path::Any => true,
            Path::Literal(s) => &**s == address,
            Path::Pattern(p) => p.matches(address),
            Path::Union(members) => members.iter().any(|m| m.matches(address)),
        }
    }

    /// Check if `other` is contained in this path
    pub fn contains(&self, other: &Path) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (Path::Any, _) => true,
            (_, Path::Any) => false,
            (_, Path::Literal(s)) => self.matches(s),
            (_, Path::Union(members)) => members.iter().all(|m| self.contains(m)),
            (Path::Union(members), Path::Pattern(_)) => members.contains(other),
            (_, Path::Pattern(_)) => false,
        }
    }

    /// The path matching every address either path matches
    pub fn union(&self, other: &Path) -> Path {
        if self.is_any() || other.is_any() {
            return Path::Any;
        }

        let mut members = BTreeSet::new();
        for path in [self, other] {
            match path {
                Path::Union(inner) => members.extend(inner.iter().cloned()),
                _ => {
                    members.insert(path.clone());
                }
            }
        }

        // Literals already covered by a pattern member add nothing
        let patterns: Vec<Path> = members.iter().filter(|m| m.is_pattern()).cloned().collect();
        members.retain(|m| match m {
            Path::Literal(s) => !patterns.iter().any(|p| p.matches(s)),
            _ => true,
        });

        if members.len() == 1 {
            if let Some(only) = members.pop_first() {
                return only;
            }
        }
        Path::Union(Arc::new(members))
    }

    /// The address strings a message sent to this path is addressed to.
    ///
    /// Empty for the any-path sentinel, which cannot be sent to.
    pub fn addresses(&self) -> Vec<String> {
        match self {
            Path::Any => Vec::new(),
            Path::Literal(s) => vec![s.to_string()],
            Path::Pattern(p) => vec![p.as_str().to_string()],
            Path::Union(members) => members.iter().flat_map(Path::addresses).collect(),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Path::Any => f.write_str("//*"),
            Path::Literal(s) => f.write_str(s),
            Path::Pattern(p) => write!(f, "{}", p),
            Path::Union(members) => {
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{}", m)?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for Path {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Path::parse(s)
    }
}

impl TryFrom<&str> for Path {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Path::parse(s)
    }
}

impl TryFrom<String> for Path {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Path::parse(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_and_pattern() {
        let foo = Path::parse("/foo").unwrap();
        assert!(!foo.is_pattern());
        assert_eq!(foo.as_literal(), Some("/foo"));

        let pattern = Path::parse("//foo").unwrap();
        assert!(pattern.is_pattern());
        assert_eq!(pattern.to_string(), "//foo");
    }

    #[test]
    fn test_union_drops_covered_literals() {
        let pattern = Path::parse("/{foo,bar}").unwrap();
        let foo = Path::parse("/foo").unwrap();
        assert_eq!(pattern.union(&foo), pattern);
    }

    #[test]
    fn test_union_with_any() {
        let foo = Path::parse("/foo").unwrap();
        assert_eq!(foo.union(&ANY_PATH), ANY_PATH);
    }
}
