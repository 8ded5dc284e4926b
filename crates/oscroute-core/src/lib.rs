//! oscroute core
//!
//! Addressing, typing and timing primitives for OSC routing.
//!
//! This crate provides:
//! - Address parsing and pattern compilation ([`Path`], [`Pattern`])
//! - Wire types and argument conversion ([`Tag`], [`TypeSpec`], [`Value`])
//! - OSC timetags ([`TimeTag`])
//! - MIDI packets ([`Midi`])

pub mod error;
pub mod midi;
pub mod path;
pub mod pattern;
pub mod tag;
pub mod timetag;
pub mod typespec;
pub mod value;

pub use error::{Error, ErrorKind, Result};
pub use midi::Midi;
pub use path::{Path, ANY_PATH};
pub use pattern::{is_osc_address_pattern, Pattern};
pub use tag::Tag;
pub use timetag::{
    epoch_utc, unix_timestamp_to_osc_timestamp, TimeTag, FRAC_PER_SEC, JAN_1970, TT_IMMEDIATE,
};
pub use typespec::{Descriptor, Marker, TypeSpec, ANY_ARGS, NO_ARGS};
pub use value::Value;

pub use rosc::{OscMessage, OscPacket, OscType};

pub const INT32_MIN: i32 = i32::MIN;
pub const INT32_MAX: i32 = i32::MAX;
pub const INT64_MIN: i64 = i64::MIN;
pub const INT64_MAX: i64 = i64::MAX;

/// The value carried by the infinitum wire type
pub const INFINITY: f64 = f64::INFINITY;
