//! Codec trait and implementations for serializing/deserializing messages.
//!
//! The rest of the server only needs something that implements [`Codec`].
//! [`JsonCodec`] is the only implementation today; browser clients speak
//! JSON natively.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ```rust
/// use tombola_protocol::{ClientRequest, Codec, Envelope, JsonCodec};
///
/// let codec = JsonCodec;
/// let frame = br#"{"payload":{"type":"heartbeat","clientTime":5000}}"#;
///
/// let envelope: Envelope<ClientRequest> = codec.decode(frame).unwrap();
/// assert_eq!(envelope.payload, ClientRequest::Heartbeat { client_time: 5000 });
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{Envelope, PlayerId, ServerEvent};

    #[test]
    fn test_json_codec_encodes_envelope_as_utf8_json() {
        let envelope = Envelope {
            seq: 3,
            timestamp: 1200,
            payload: ServerEvent::Connected {
                player_id: PlayerId(9),
                protocol_version: 1,
            },
        };

        let bytes = JsonCodec.encode(&envelope).unwrap();
        let text = std::str::from_utf8(&bytes).expect("json is utf-8");

        assert!(text.contains(r#""seq":3"#));
        assert!(text.contains(r#""type":"connected""#));
    }

    #[test]
    fn test_json_codec_decode_garbage_returns_decode_error() {
        let result: Result<Envelope<ServerEvent>, _> = JsonCodec.decode(b"not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_json_codec_decode_wrong_shape_returns_decode_error() {
        let result: Result<u32, _> = JsonCodec.decode(br#"{"a":1}"#);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
