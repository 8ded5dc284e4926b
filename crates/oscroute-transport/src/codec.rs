//! OSC packet encoding, delegated to rosc

use rosc::{decoder, encoder, OscPacket};

use crate::error::{Result, TransportError};

pub fn encode(packet: &OscPacket) -> Result<Vec<u8>> {
    encoder::encode(packet).map_err(|e| TransportError::Encode(format!("{:?}", e)))
}

/// Decode one datagram
pub fn decode(buf: &[u8]) -> Result<OscPacket> {
    decoder::decode_udp(buf)
        .map(|(_, packet)| packet)
        .map_err(|e| TransportError::Decode(format!("{:?}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosc::{OscMessage, OscType};

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(decode(b"nope"), Err(TransportError::Decode(_))));
    }

    #[test]
    fn test_encode_decode_message() {
        let packet = OscPacket::Message(OscMessage {
            addr: "/foo".to_string(),
            args: vec![OscType::Int(1), OscType::String("x".to_string())],
        });
        let bytes = encode(&packet).unwrap();
        assert_eq!(decode(&bytes).unwrap(), packet);
    }
}
