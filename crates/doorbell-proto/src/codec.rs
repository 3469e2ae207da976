//! CBOR byte encoding for transports that carry raw bytes.
//!
//! Decoding only checks that the bytes are well-formed CBOR; the validators
//! decide whether the resulting value is a usable event.

use ciborium::Value;

use crate::errors::{ProtocolError, Result};

/// Largest payload accepted off the wire.
///
/// The biggest legitimate payload is an info event with a short display
/// name, so anything near this size is abuse.
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024;

/// Serialize a payload value to CBOR bytes.
pub fn encode_value(value: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| ProtocolError::Encode(e.to_string()))?;

    if buf.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge { size: buf.len(), max: MAX_PAYLOAD_SIZE });
    }
    Ok(buf)
}

/// Parse CBOR bytes into an untyped payload value.
pub fn decode_value(bytes: &[u8]) -> Result<Value> {
    if bytes.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge { size: bytes.len(), max: MAX_PAYLOAD_SIZE });
    }
    ciborium::from_reader(bytes).map_err(|e| ProtocolError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{InfoEvent, Message};

    #[test]
    fn decode_rejects_garbage() {
        // 0xff is a CBOR "break" with no open container
        assert!(matches!(decode_value(&[0xff]), Err(ProtocolError::Decode(_))));
        assert!(matches!(decode_value(&[]), Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn oversized_payloads_are_refused() {
        let bytes = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        assert_eq!(
            decode_value(&bytes),
            Err(ProtocolError::PayloadTooLarge { size: MAX_PAYLOAD_SIZE + 1, max: MAX_PAYLOAD_SIZE })
        );

        let name = "a".repeat(MAX_PAYLOAD_SIZE);
        let value = Message::Info(InfoEvent { name, clock: 1 }).to_value();
        assert!(matches!(encode_value(&value), Err(ProtocolError::PayloadTooLarge { .. })));
    }

    #[test]
    fn encoded_info_decodes_to_same_value() {
        let value = Message::Info(InfoEvent { name: "Cozy Cabin".into(), clock: 9 }).to_value();
        let bytes = encode_value(&value).unwrap();
        assert_eq!(decode_value(&bytes).unwrap(), value);
    }
}
