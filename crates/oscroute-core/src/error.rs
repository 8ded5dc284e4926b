//! Error types for oscroute

use thiserror::Error;

/// Result type alias for oscroute core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types
///
/// Every error is raised synchronously where a value is constructed or
/// validated: pattern compilation, typespec parsing, argument conversion.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed OSC address or address pattern
    #[error("invalid address pattern at position {position} of {path:?}: {reason}")]
    PathSyntax {
        path: String,
        position: usize,
        reason: String,
    },

    /// Value of the wrong category for a wire type
    #[error("type error: {0}")]
    Type(String),

    /// Right category, magnitude out of range for the wire type
    #[error("overflow error: {0}")]
    Overflow(String),

    /// Right category and range, semantically invalid for the wire type
    #[error("value error: {0}")]
    Value(String),

    /// Typespec descriptor that maps to no wire type
    #[error("invalid typespec: {0}")]
    InvalidTypeSpec(String),
}

/// Coarse error taxonomy shared by every oscroute error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Syntax,
    Type,
    Overflow,
    Value,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::PathSyntax { .. } => ErrorKind::Syntax,
            Error::Type(_) | Error::InvalidTypeSpec(_) => ErrorKind::Type,
            Error::Overflow(_) => ErrorKind::Overflow,
            Error::Value(_) => ErrorKind::Value,
        }
    }

    pub(crate) fn syntax(path: &str, position: usize, reason: impl Into<String>) -> Self {
        Error::PathSyntax {
            path: path.to_string(),
            position,
            reason: reason.into(),
        }
    }
}
