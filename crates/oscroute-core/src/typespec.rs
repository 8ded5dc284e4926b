//! Typespecs: the argument signature of a route
//!
//! A [`TypeSpec`] is an ordered sequence of wire [`Tag`]s, or one of the
//! sentinels [`ANY_ARGS`] and [`NO_ARGS`]. Typespecs are built from a
//! [`Descriptor`], a closed set of the shapes callers use to name argument
//! types, or inferred from concrete values with [`TypeSpec::guess`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rosc::OscType;

use crate::{Error, Result, Tag, Value};

/// Accepts any argument list
pub const ANY_ARGS: TypeSpec = TypeSpec::AnyArgs;

/// Accepts only the empty argument list
pub const NO_ARGS: TypeSpec = TypeSpec::NoArgs;

/// Argument signature of a route or message
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeSpec {
    #[default]
    AnyArgs,
    NoArgs,
    /// Never empty; an empty sequence is `NoArgs`
    Tags(Arc<[Tag]>),
}

/// A generic type marker that maps to one wire type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    Int,
    Float,
    Str,
    Bytes,
    TimeTag,
    Midi,
    NoneType,
}

impl Marker {
    pub const fn tag(self) -> Tag {
        match self {
            Marker::Int => Tag::Int64,
            Marker::Float => Tag::Float64,
            Marker::Str => Tag::String,
            Marker::Bytes => Tag::Blob,
            Marker::TimeTag => Tag::TimeTag,
            Marker::Midi => Tag::Midi,
            Marker::NoneType => Tag::Nil,
        }
    }
}

/// Every shape a typespec can be described with
///
/// At the top level `None` means any arguments; inside a list it names the
/// nil type. An empty code string or empty list means no arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Descriptor {
    None,
    /// Type-tag characters, e.g. `"ihs"`
    Codes(String),
    /// A type-tag character by its numeric value
    Ordinal(u32),
    Tag(Tag),
    Marker(Marker),
    /// `true` or `false` literal
    Bool(bool),
    /// Only positive infinity is meaningful
    Float(f64),
    List(Vec<Descriptor>),
    Spec(TypeSpec),
}

impl From<&str> for Descriptor {
    fn from(s: &str) -> Self {
        Descriptor::Codes(s.to_string())
    }
}

impl From<String> for Descriptor {
    fn from(s: String) -> Self {
        Descriptor::Codes(s)
    }
}

impl From<u32> for Descriptor {
    fn from(ordinal: u32) -> Self {
        Descriptor::Ordinal(ordinal)
    }
}

impl From<Tag> for Descriptor {
    fn from(tag: Tag) -> Self {
        Descriptor::Tag(tag)
    }
}

impl From<Marker> for Descriptor {
    fn from(marker: Marker) -> Self {
        Descriptor::Marker(marker)
    }
}

impl From<bool> for Descriptor {
    fn from(b: bool) -> Self {
        Descriptor::Bool(b)
    }
}

impl From<f64> for Descriptor {
    fn from(f: f64) -> Self {
        Descriptor::Float(f)
    }
}

impl From<TypeSpec> for Descriptor {
    fn from(spec: TypeSpec) -> Self {
        Descriptor::Spec(spec)
    }
}

impl<T: Into<Descriptor>> From<Vec<T>> for Descriptor {
    fn from(items: Vec<T>) -> Self {
        Descriptor::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Descriptor>> From<Option<T>> for Descriptor {
    fn from(d: Option<T>) -> Self {
        match d {
            Some(d) => d.into(),
            None => Descriptor::None,
        }
    }
}

impl TypeSpec {
    /// Build from a tag sequence; an empty sequence is `NO_ARGS`
    pub fn new(tags: impl IntoIterator<Item = Tag>) -> Self {
        let tags: Vec<Tag> = tags.into_iter().collect();
        if tags.is_empty() {
            TypeSpec::NoArgs
        } else {
            TypeSpec::Tags(tags.into())
        }
    }

    /// Parse a type-tag string
    pub fn parse(codes: &str) -> Result<Self> {
        let tags = codes
            .chars()
            .map(Tag::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(tags))
    }

    pub fn from_descriptor(descriptor: impl Into<Descriptor>) -> Result<Self> {
        match descriptor.into() {
            Descriptor::None => Ok(TypeSpec::AnyArgs),
            Descriptor::Spec(spec) => Ok(spec),
            other => {
                let mut tags = Vec::new();
                push_tags(&other, &mut tags)?;
                Ok(Self::new(tags))
            }
        }
    }

    /// Infer a typespec from concrete values
    pub fn guess(values: &[Value]) -> Result<Self> {
        values
            .iter()
            .map(guess_tag)
            .collect::<Result<Vec<_>>>()
            .map(Self::new)
    }

    /// The typespec of a decoded wire argument list
    pub fn of_wire(args: &[OscType]) -> Result<Self> {
        args.iter()
            .map(Tag::of_wire)
            .collect::<Result<Vec<_>>>()
            .map(Self::new)
    }

    pub fn is_any_args(&self) -> bool {
        matches!(self, TypeSpec::AnyArgs)
    }

    pub fn is_no_args(&self) -> bool {
        matches!(self, TypeSpec::NoArgs)
    }

    /// The concrete tags; empty for both sentinels
    pub fn tags(&self) -> &[Tag] {
        match self {
            TypeSpec::Tags(tags) => tags,
            _ => &[],
        }
    }

    /// Number of arguments described; zero for both sentinels
    pub fn len(&self) -> usize {
        self.tags().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The type-tag string; `None` for `ANY_ARGS`
    pub fn codes(&self) -> Option<String> {
        match self {
            TypeSpec::AnyArgs => None,
            _ => Some(self.tags().iter().map(|t| t.code()).collect()),
        }
    }

    /// Concatenate two typespecs.
    ///
    /// Sentinels only concatenate with themselves.
    pub fn concat(&self, other: &TypeSpec) -> Result<TypeSpec> {
        match (self, other) {
            (TypeSpec::AnyArgs, TypeSpec::AnyArgs) => Ok(TypeSpec::AnyArgs),
            (TypeSpec::NoArgs, TypeSpec::NoArgs) => Ok(TypeSpec::NoArgs),
            (TypeSpec::Tags(a), TypeSpec::Tags(b)) => {
                Ok(TypeSpec::new(a.iter().chain(b.iter()).copied()))
            }
            _ => Err(Error::Value(format!(
                "cannot concatenate {} with {}",
                self, other
            ))),
        }
    }

    /// Whether `other` is described by this typespec
    pub fn contains(&self, other: &TypeSpec) -> bool {
        self.is_any_args() || self == other
    }

    /// Whether a decoded wire argument list satisfies this typespec
    pub fn accepts_wire(&self, args: &[OscType]) -> bool {
        match self {
            TypeSpec::AnyArgs => true,
            TypeSpec::NoArgs => args.is_empty(),
            TypeSpec::Tags(tags) => {
                tags.len() == args.len() && tags.iter().zip(args).all(|(t, a)| t.accepts_wire(a))
            }
        }
    }

    /// Validate and convert values to wire arguments
    pub fn pack(&self, values: &[Value]) -> Result<Vec<OscType>> {
        match self {
            TypeSpec::AnyArgs => values
                .iter()
                .map(|v| guess_tag(v)?.pack(v))
                .collect(),
            _ => {
                self.check_arity(values.len())?;
                self.tags().iter().zip(values).map(|(t, v)| t.pack(v)).collect()
            }
        }
    }

    /// Convert wire arguments back to values
    pub fn unpack(&self, args: &[OscType]) -> Result<Vec<Value>> {
        match self {
            TypeSpec::AnyArgs => args
                .iter()
                .map(|a| Tag::of_wire(a)?.unpack(a))
                .collect(),
            _ => {
                self.check_arity(args.len())?;
                self.tags().iter().zip(args).map(|(t, a)| t.unpack(a)).collect()
            }
        }
    }

    /// Canonicalize values through their wire representation
    pub fn convert(&self, values: &[Value]) -> Result<Vec<Value>> {
        self.unpack(&self.pack(values)?)
    }

    fn check_arity(&self, len: usize) -> Result<()> {
        if len != self.len() {
            return Err(Error::Value(format!(
                "argument length does not match typespec: expected {}, got {}",
                self.len(),
                len
            )));
        }
        Ok(())
    }
}

fn push_tags(descriptor: &Descriptor, tags: &mut Vec<Tag>) -> Result<()> {
    match descriptor {
        Descriptor::None => tags.push(Tag::Nil),
        Descriptor::Codes(codes) => {
            for c in codes.chars() {
                tags.push(Tag::try_from(c)?);
            }
        }
        Descriptor::Ordinal(n) => {
            let tag = char::from_u32(*n)
                .and_then(Tag::from_code)
                .ok_or_else(|| Error::InvalidTypeSpec(format!("unknown type ordinal {}", n)))?;
            tags.push(tag);
        }
        Descriptor::Tag(tag) => tags.push(*tag),
        Descriptor::Marker(marker) => tags.push(marker.tag()),
        Descriptor::Bool(true) => tags.push(Tag::True),
        Descriptor::Bool(false) => tags.push(Tag::False),
        Descriptor::Float(f) if *f == f64::INFINITY => tags.push(Tag::Infinitum),
        Descriptor::Float(f) => {
            return Err(Error::InvalidTypeSpec(format!(
                "float {} does not name a type",
                f
            )))
        }
        Descriptor::List(items) => {
            for item in items {
                push_tags(item, tags)?;
            }
        }
        Descriptor::Spec(TypeSpec::Tags(inner)) => tags.extend(inner.iter().copied()),
        Descriptor::Spec(sentinel) => {
            return Err(Error::InvalidTypeSpec(format!(
                "{} cannot be combined with other types",
                sentinel
            )))
        }
    }
    Ok(())
}

fn guess_tag(value: &Value) -> Result<Tag> {
    Ok(match value {
        Value::Bool(true) => Tag::True,
        Value::Bool(false) => Tag::False,
        Value::Int(_) => Tag::Int64,
        Value::Float(f) if *f == f64::INFINITY => Tag::Infinitum,
        Value::Float(_) => Tag::Float64,
        Value::Str(_) => Tag::String,
        Value::Char(_) => Tag::Char,
        Value::Bytes(_) => Tag::Blob,
        Value::Nil => Tag::Nil,
        Value::Midi(_) => Tag::Midi,
        Value::Array(items) if is_midi_shaped(items) => Tag::Midi,
        Value::TimeTag(_) | Value::DateTime(_) => Tag::TimeTag,
        Value::Array(_) | Value::Map(_) => {
            return Err(Error::Type(format!(
                "cannot guess a wire type for {} value",
                value.type_name()
            )))
        }
    })
}

fn is_midi_shaped(items: &[Value]) -> bool {
    items.len() == 4
        && items
            .iter()
            .all(|v| matches!(v, Value::Int(i) if (0..=255).contains(i)))
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSpec::AnyArgs => f.write_str("ANY_ARGS"),
            TypeSpec::NoArgs => f.write_str("NO_ARGS"),
            TypeSpec::Tags(tags) => tags.iter().try_for_each(|t| write!(f, "{}", t)),
        }
    }
}

impl FromStr for TypeSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TypeSpec::parse(s)
    }
}

impl TryFrom<&str> for TypeSpec {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        TypeSpec::parse(s)
    }
}

impl From<Tag> for TypeSpec {
    fn from(tag: Tag) -> Self {
        TypeSpec::new([tag])
    }
}

impl From<Vec<Tag>> for TypeSpec {
    fn from(tags: Vec<Tag>) -> Self {
        TypeSpec::new(tags)
    }
}

impl TryFrom<Descriptor> for TypeSpec {
    type Error = Error;

    fn try_from(d: Descriptor) -> Result<Self> {
        TypeSpec::from_descriptor(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_no_args() {
        assert_eq!(TypeSpec::parse("").unwrap(), NO_ARGS);
        assert_eq!(TypeSpec::from_descriptor(Vec::<Tag>::new()).unwrap(), NO_ARGS);
        assert_eq!(NO_ARGS.codes().as_deref(), Some(""));
        assert_eq!(ANY_ARGS.codes(), None);
    }

    #[test]
    fn test_none_descriptor() {
        assert_eq!(TypeSpec::from_descriptor(Descriptor::None).unwrap(), ANY_ARGS);
        let nil = TypeSpec::from_descriptor(vec![Descriptor::None]).unwrap();
        assert_eq!(nil.tags(), &[Tag::Nil]);
    }

    #[test]
    fn test_sentinel_inside_list() {
        let err = TypeSpec::from_descriptor(vec![Descriptor::Spec(ANY_ARGS)]).unwrap_err();
        assert!(matches!(err, Error::InvalidTypeSpec(_)));
    }
}
