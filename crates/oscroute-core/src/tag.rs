//! OSC wire-type tags and per-argument conversion
//!
//! Each [`Tag`] owns one conversion rule. Packing checks the category of the
//! input first (a `Type` error), then magnitude (`Overflow`), then the tag's
//! own semantic constraint (`Value`). Conversion is per position and
//! stateless, so a typespec is just a sequence of these rules.

use std::fmt;

use rosc::OscType;

use crate::{Error, Midi, Result, TimeTag, Value, FRAC_PER_SEC};

/// An OSC wire type, valued by its canonical type-tag character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Tag {
    Int32 = b'i',
    Int64 = b'h',
    Float32 = b'f',
    Float64 = b'd',
    String = b's',
    Symbol = b'S',
    Char = b'c',
    Blob = b'b',
    TimeTag = b't',
    Midi = b'm',
    True = b'T',
    False = b'F',
    Nil = b'N',
    Infinitum = b'I',
}

impl Tag {
    /// Every wire type, in type-tag order of the OSC 1.0 and 1.1 documents
    pub const ALL: [Tag; 14] = [
        Tag::Int32,
        Tag::Float32,
        Tag::String,
        Tag::Blob,
        Tag::Int64,
        Tag::TimeTag,
        Tag::Float64,
        Tag::Symbol,
        Tag::Char,
        Tag::Midi,
        Tag::True,
        Tag::False,
        Tag::Nil,
        Tag::Infinitum,
    ];

    pub const fn code(self) -> char {
        self as u8 as char
    }

    pub fn from_code(code: char) -> Option<Tag> {
        Tag::ALL.into_iter().find(|t| t.code() == code)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Tag::Int32 => "int32",
            Tag::Int64 => "int64",
            Tag::Float32 => "float32",
            Tag::Float64 => "float64",
            Tag::String => "string",
            Tag::Symbol => "symbol",
            Tag::Char => "char",
            Tag::Blob => "blob",
            Tag::TimeTag => "timetag",
            Tag::Midi => "midi",
            Tag::True => "true",
            Tag::False => "false",
            Tag::Nil => "nil",
            Tag::Infinitum => "infinitum",
        }
    }

    /// The tag of a decoded wire argument
    pub fn of_wire(arg: &OscType) -> Result<Tag> {
        Ok(match arg {
            OscType::Int(_) => Tag::Int32,
            OscType::Long(_) => Tag::Int64,
            OscType::Float(_) => Tag::Float32,
            OscType::Double(_) => Tag::Float64,
            OscType::String(_) => Tag::String,
            OscType::Char(_) => Tag::Char,
            OscType::Blob(_) => Tag::Blob,
            OscType::Time(_) => Tag::TimeTag,
            OscType::Midi(_) => Tag::Midi,
            OscType::Bool(true) => Tag::True,
            OscType::Bool(false) => Tag::False,
            OscType::Nil => Tag::Nil,
            OscType::Inf => Tag::Infinitum,
            other => {
                return Err(Error::Type(format!(
                    "unsupported wire argument {:?}",
                    other
                )))
            }
        })
    }

    /// Whether a decoded wire argument carries this tag.
    ///
    /// Symbols travel as strings, so a symbol tag accepts a string argument.
    pub fn accepts_wire(self, arg: &OscType) -> bool {
        match Tag::of_wire(arg) {
            Ok(tag) => tag == self || (self == Tag::Symbol && tag == Tag::String),
            Err(_) => false,
        }
    }

    /// Validate and convert an application value to its wire form
    pub fn pack(self, value: &Value) -> Result<OscType> {
        match self {
            Tag::Int32 => {
                let i = to_int(self, value)?;
                i32::try_from(i)
                    .map(OscType::Int)
                    .map_err(|_| overflow(self, value))
            }
            Tag::Int64 => {
                let i = to_int(self, value)?;
                i64::try_from(i)
                    .map(OscType::Long)
                    .map_err(|_| overflow(self, value))
            }
            Tag::Float32 => {
                let f = to_float(self, value)?;
                if f.is_nan() {
                    return Ok(OscType::Float(f32::NAN));
                }
                let narrowed = f as f32;
                if narrowed.is_infinite() || (narrowed == 0.0 && f != 0.0) {
                    return Err(overflow(self, value));
                }
                Ok(OscType::Float(narrowed))
            }
            Tag::Float64 => to_float(self, value).map(OscType::Double),
            Tag::String | Tag::Symbol => value
                .to_str_form()
                .map(OscType::String)
                .ok_or_else(|| type_error(self, value)),
            Tag::Char => to_char(self, value).map(OscType::Char),
            Tag::Blob => match value {
                Value::Bytes(b) if b.is_empty() => {
                    Err(Error::Value("blob must not be empty".to_string()))
                }
                Value::Bytes(b) => Ok(OscType::Blob(b.clone())),
                _ => Err(type_error(self, value)),
            },
            Tag::TimeTag => to_timetag(self, value).map(|tt| OscType::Time(tt.into())),
            Tag::Midi => to_midi(self, value).map(|m| OscType::Midi(m.into())),
            Tag::True | Tag::False => {
                let expected = self == Tag::True;
                match value {
                    Value::Bool(_)
                    | Value::Int(_)
                    | Value::Float(_)
                    | Value::Str(_)
                    | Value::Bytes(_)
                    | Value::Char(_) => {
                        if value.is_truthy() == expected {
                            Ok(OscType::Bool(expected))
                        } else {
                            Err(Error::Value(format!(
                                "{} is not a valid {} value",
                                value,
                                self.name()
                            )))
                        }
                    }
                    _ => Err(type_error(self, value)),
                }
            }
            Tag::Nil => match value {
                Value::Nil => Ok(OscType::Nil),
                _ => Err(type_error(self, value)),
            },
            Tag::Infinitum => match value {
                Value::Float(f) if *f == f64::INFINITY => Ok(OscType::Inf),
                Value::Float(_) | Value::Int(_) => Err(Error::Value(format!(
                    "{} is not positive infinity",
                    value
                ))),
                _ => Err(type_error(self, value)),
            },
        }
    }

    /// Convert a decoded wire argument back to an application value
    pub fn unpack(self, arg: &OscType) -> Result<Value> {
        if !self.accepts_wire(arg) {
            return Err(Error::Type(format!(
                "expected a {} argument, got {:?}",
                self.name(),
                arg
            )));
        }
        Ok(match arg {
            OscType::Int(i) => Value::Int(*i as i128),
            OscType::Long(i) => Value::Int(*i as i128),
            OscType::Float(f) => Value::Float(*f as f64),
            OscType::Double(f) => Value::Float(*f),
            OscType::String(s) => Value::Str(s.clone()),
            OscType::Char(c) => Value::Char(*c),
            OscType::Blob(b) => Value::Bytes(b.clone()),
            OscType::Time(t) => Value::TimeTag(TimeTag::new(t.seconds, t.fractional)),
            OscType::Midi(m) => Value::Midi(m.into()),
            OscType::Bool(b) => Value::Bool(*b),
            OscType::Inf => Value::Float(f64::INFINITY),
            _ => Value::Nil,
        })
    }

    /// Canonicalize a value: pack then unpack
    pub fn convert(self, value: &Value) -> Result<Value> {
        self.unpack(&self.pack(value)?)
    }
}

impl TryFrom<char> for Tag {
    type Error = Error;

    fn try_from(code: char) -> Result<Tag> {
        Tag::from_code(code)
            .ok_or_else(|| Error::InvalidTypeSpec(format!("unknown type code {:?}", code)))
    }
}

impl From<Tag> for char {
    fn from(tag: Tag) -> char {
        tag.code()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

fn type_error(tag: Tag, value: &Value) -> Error {
    Error::Type(format!(
        "{} value cannot be packed as {}",
        value.type_name(),
        tag.name()
    ))
}

fn overflow(tag: Tag, value: &Value) -> Error {
    Error::Overflow(format!("{} is out of range for {}", value, tag.name()))
}

fn to_int(tag: Tag, value: &Value) -> Result<i128> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::Bool(b) => Ok(*b as i128),
        Value::Str(s) => s.trim().parse::<i128>().map_err(|e| match e.kind() {
            std::num::IntErrorKind::PosOverflow | std::num::IntErrorKind::NegOverflow => {
                overflow(tag, value)
            }
            _ => Error::Value(format!("invalid integer literal {:?}", s)),
        }),
        _ => Err(type_error(tag, value)),
    }
}

fn to_float(tag: Tag, value: &Value) -> Result<f64> {
    let f = match value {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        Value::Bool(b) => *b as u8 as f64,
        _ => return Err(type_error(tag, value)),
    };
    if f.is_infinite() {
        return Err(Error::Value(format!(
            "{} cannot carry {}, use the infinitum type",
            tag.name(),
            f
        )));
    }
    Ok(f)
}

fn to_char(tag: Tag, value: &Value) -> Result<char> {
    let single = |len: usize| {
        Error::Overflow(format!("char requires exactly one character, got {}", len))
    };
    match value {
        Value::Char(c) => Ok(*c),
        Value::Str(s) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(c),
                _ => Err(single(s.chars().count())),
            }
        }
        Value::Bytes(b) => match b.as_slice() {
            [byte] => Ok(char::from(*byte)),
            _ => Err(single(b.len())),
        },
        Value::Int(i) => u8::try_from(*i)
            .map(char::from)
            .map_err(|_| overflow(tag, value)),
        Value::Bool(b) => Ok(char::from(*b as u8)),
        _ => Err(type_error(tag, value)),
    }
}

fn to_timetag(tag: Tag, value: &Value) -> Result<TimeTag> {
    match value {
        Value::TimeTag(tt) => Ok(*tt),
        Value::DateTime(dt) => TimeTag::try_from_datetime(dt),
        Value::Int(i) => {
            if *i < 0 || *i >= FRAC_PER_SEC as i128 {
                return Err(overflow(tag, value));
            }
            Ok(TimeTag::new(*i as u32, 0))
        }
        Value::Float(f) => TimeTag::from_osc_timestamp(*f),
        _ => Err(type_error(tag, value)),
    }
}

fn to_midi(tag: Tag, value: &Value) -> Result<Midi> {
    match value {
        Value::Midi(m) => Ok(*m),
        Value::Bytes(b) => Midi::from_slice(b),
        Value::Array(items) => {
            if items.len() != 4 {
                return Err(Error::Type(format!(
                    "midi requires exactly 4 elements, got {}",
                    items.len()
                )));
            }
            let mut bytes = [0u8; 4];
            for (slot, item) in bytes.iter_mut().zip(items) {
                *slot = match item {
                    Value::Int(i) => u8::try_from(*i).map_err(|_| overflow(tag, item))?,
                    other => return Err(type_error(tag, other)),
                };
            }
            Ok(Midi::from(bytes))
        }
        _ => Err(type_error(tag, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for tag in Tag::ALL {
            assert_eq!(Tag::from_code(tag.code()), Some(tag));
        }
        assert_eq!(Tag::from_code('x'), None);
        assert_eq!(Tag::Int64 as u8, b'h');
    }

    #[test]
    fn test_symbol_accepts_string_wire() {
        assert!(Tag::Symbol.accepts_wire(&OscType::String("a".into())));
        assert!(!Tag::String.accepts_wire(&OscType::Int(1)));
        assert_eq!(
            Tag::Symbol.unpack(&OscType::String("a".into())),
            Ok(Value::from("a"))
        );
    }

    #[test]
    fn test_float32_underflow() {
        let err = Tag::Float32.pack(&Value::Float(1e-50)).unwrap_err();
        assert!(matches!(err, Error::Overflow(_)));
        assert_eq!(Tag::Float32.pack(&Value::Float(0.0)), Ok(OscType::Float(0.0)));
    }
}
