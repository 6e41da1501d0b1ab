//! Codec trait and implementations for serializing/deserializing messages.
//!
//! A "codec" (coder/decoder) converts between Rust values and raw bytes.
//! The rest of wsrpc never calls `serde_json` or `rmp_serde` directly: it
//! goes through [`Codec`], or through [`Encoding`] when the choice is made
//! per connection or per frame.
//!
//! Two codecs exist, one per wire encoding:
//!
//! - [`JsonCodec`]: the text encoding, carried in text frames.
//! - [`MsgPackCodec`]: the binary encoding, carried in binary frames.
//!
//! Both carry the identical logical envelope.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use wsrpc_transport::{Frame, FrameKind};

use crate::{Envelope, ProtocolError};

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because codecs live inside long-running
/// connection tasks that Tokio may move between threads.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value can't be represented
    /// in this format.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;

    /// Decodes into the generic value model.
    fn loads(&self, data: &[u8]) -> Result<Value, ProtocolError> {
        self.decode(data)
    }

    /// Encodes from the generic value model.
    fn dumps(&self, value: &Value) -> Result<Vec<u8>, ProtocolError> {
        self.encode(value)
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ```rust
/// use serde_json::json;
/// use wsrpc_protocol::{Codec, JsonCodec};
///
/// let bytes = JsonCodec.dumps(&json!({"answer": 42})).unwrap();
/// assert_eq!(bytes, br#"{"answer":42}"#);
/// assert_eq!(JsonCodec.loads(&bytes).unwrap(), json!({"answer": 42}));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(|e| ProtocolError::Decode(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// MsgPackCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses MessagePack (via `rmp-serde`).
///
/// Structs are written as maps keyed by field name (`to_vec_named`), so a
/// MessagePack envelope has exactly the same keys as its JSON twin.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackCodec;

impl Codec for MsgPackCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        rmp_serde::to_vec_named(value).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        rmp_serde::from_slice(data).map_err(|e| ProtocolError::Decode(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Which of the two wire encodings a connection (or a frame) uses.
///
/// Text frames always carry JSON and binary frames always carry
/// MessagePack, so the encoding of a reply is simply the encoding of the
/// frame it answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    #[default]
    Text,
    Binary,
}

impl Encoding {
    /// The encoding a received frame is carried in.
    pub fn of(frame: &Frame) -> Self {
        match frame.kind() {
            FrameKind::Text => Encoding::Text,
            FrameKind::Binary => Encoding::Binary,
        }
    }

    pub fn frame_kind(self) -> FrameKind {
        match self {
            Encoding::Text => FrameKind::Text,
            Encoding::Binary => FrameKind::Binary,
        }
    }

    pub fn encode<T: Serialize>(self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        match self {
            Encoding::Text => JsonCodec.encode(value),
            Encoding::Binary => MsgPackCodec.encode(value),
        }
    }

    pub fn decode<T: DeserializeOwned>(self, data: &[u8]) -> Result<T, ProtocolError> {
        match self {
            Encoding::Text => JsonCodec.decode(data),
            Encoding::Binary => MsgPackCodec.decode(data),
        }
    }

    pub fn loads(self, data: &[u8]) -> Result<Value, ProtocolError> {
        self.decode(data)
    }

    pub fn dumps(self, value: &Value) -> Result<Vec<u8>, ProtocolError> {
        self.encode(value)
    }

    /// Decodes and classifies an envelope.
    ///
    /// Undecodable bytes give [`ProtocolError::Decode`]; bytes that decode
    /// to something other than an envelope give
    /// [`ProtocolError::InvalidEnvelope`]. Callers map the first to a Parse
    /// error and the second to its carried taxonomy code.
    pub fn decode_envelope(self, data: &[u8]) -> Result<Envelope, ProtocolError> {
        Envelope::from_value(self.loads(data)?)
    }

    /// Encodes a value straight into a frame of the matching kind.
    pub fn encode_frame<T: Serialize>(self, value: &T) -> Result<Frame, ProtocolError> {
        match self {
            Encoding::Text => serde_json::to_string(value)
                .map(Frame::Text)
                .map_err(|e| ProtocolError::Encode(e.to_string())),
            Encoding::Binary => MsgPackCodec.encode(value).map(Frame::Binary),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{Params, Request, RequestId, Response, RpcError};

    fn sample_envelopes() -> Vec<Envelope> {
        let mut params = Params::new();
        params.insert("foo".into(), json!("bar"));
        params.insert("answer".into(), json!(42));
        vec![
            Request::new("TestService.test_method", params, RequestId::Number(1)).into(),
            Request::notification("Log.write", Params::new()).into(),
            Response::success("req-7".into(), json!({"nested": [1, -2, 3.5, null]})).into(),
            Response::failure(Some(RequestId::Number(3)), RpcError::method_not_found("A.b")).into(),
            Response::failure(None, RpcError::parse_error("unexpected eof")).into(),
        ]
    }

    #[test]
    fn test_round_trip_text() {
        for envelope in sample_envelopes() {
            let bytes = Encoding::Text.encode(&envelope).unwrap();
            let decoded = Encoding::Text.decode_envelope(&bytes).unwrap();
            assert_eq!(decoded, envelope);
        }
    }

    #[test]
    fn test_round_trip_binary() {
        for envelope in sample_envelopes() {
            let bytes = Encoding::Binary.encode(&envelope).unwrap();
            let decoded = Encoding::Binary.decode_envelope(&bytes).unwrap();
            assert_eq!(decoded, envelope);
        }
    }

    #[test]
    fn test_binary_carries_same_logical_shape_as_text() {
        let envelope: Envelope =
            Response::success(RequestId::Number(1), json!("test result")).into();
        let from_json = JsonCodec.loads(&Encoding::Text.encode(&envelope).unwrap()).unwrap();
        let from_msgpack = MsgPackCodec
            .loads(&Encoding::Binary.encode(&envelope).unwrap())
            .unwrap();
        assert_eq!(from_json, from_msgpack);
        assert_eq!(
            from_json,
            json!({"jsonrpc": "2.0", "result": "test result", "id": 1})
        );
    }

    #[test]
    fn test_loads_dumps_round_trip_for_both_codecs() {
        let data = json!({"foo": "bar", "answer": 42});
        for codec in [Encoding::Text, Encoding::Binary] {
            let bytes = codec.dumps(&data).unwrap();
            assert_eq!(codec.loads(&bytes).unwrap(), data);
        }
    }

    #[test]
    fn test_decode_garbage_is_decode_error() {
        let text = Encoding::Text.decode_envelope(b"not json at all");
        assert!(matches!(text, Err(ProtocolError::Decode(_))));

        // 0xc1 is the one byte MessagePack never uses.
        let binary = Encoding::Binary.decode_envelope(&[0xc1, 0x00]);
        assert!(matches!(binary, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_wrong_shape_is_invalid_envelope() {
        let result = Encoding::Text.decode_envelope(b"42");
        assert!(matches!(result, Err(ProtocolError::InvalidEnvelope { .. })));
    }

    #[test]
    fn test_encode_frame_matches_encoding() {
        let value = json!({"k": "v"});
        assert!(matches!(
            Encoding::Text.encode_frame(&value).unwrap(),
            Frame::Text(_)
        ));
        assert!(matches!(
            Encoding::Binary.encode_frame(&value).unwrap(),
            Frame::Binary(_)
        ));
    }

    #[test]
    fn test_encoding_of_frame() {
        assert_eq!(Encoding::of(&Frame::Text("{}".into())), Encoding::Text);
        assert_eq!(Encoding::of(&Frame::Binary(vec![0x80])), Encoding::Binary);
        assert_eq!(Encoding::Binary.frame_kind(), FrameKind::Binary);
    }
}
