//! Four-byte MIDI message

use std::fmt;

use rosc::OscMidiMessage;

use crate::{Error, Result};

/// A MIDI message as carried by the OSC `m` type: port id, status byte and
/// two data bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Midi {
    pub port: u8,
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
}

impl Midi {
    pub fn new(port: u8, status: u8, data1: u8, data2: u8) -> Self {
        Self {
            port,
            status,
            data1,
            data2,
        }
    }

    /// Build from exactly four bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        match bytes {
            [port, status, data1, data2] => Ok(Self::new(*port, *status, *data1, *data2)),
            _ => Err(Error::Type(format!(
                "midi requires exactly 4 bytes, got {}",
                bytes.len()
            ))),
        }
    }

    pub fn to_bytes(self) -> [u8; 4] {
        [self.port, self.status, self.data1, self.data2]
    }
}

impl From<[u8; 4]> for Midi {
    fn from(b: [u8; 4]) -> Self {
        Self::new(b[0], b[1], b[2], b[3])
    }
}

impl From<Midi> for OscMidiMessage {
    fn from(m: Midi) -> Self {
        OscMidiMessage {
            port: m.port,
            status: m.status,
            data1: m.data1,
            data2: m.data2,
        }
    }
}

impl From<&OscMidiMessage> for Midi {
    fn from(m: &OscMidiMessage) -> Self {
        Self::new(m.port, m.status, m.data1, m.data2)
    }
}

impl fmt::Display for Midi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Midi({}, {}, {}, {})",
            self.port, self.status, self.data1, self.data2
        )
    }
}
