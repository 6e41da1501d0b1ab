//! Error types for the protocol layer.
//!
//! Each crate in wsrpc defines its own error enum. A `ProtocolError` always
//! means the bytes or the envelope shape were wrong, never the network or a
//! service method.

use crate::{ErrorCode, RequestId};

/// Errors that can occur in the protocol layer.
///
/// The codec-specific sources are boxed into strings at the boundary so
/// callers deal with one type regardless of which encoding produced it.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    #[error("encode failed: {0}")]
    Encode(String),

    /// Deserialization failed (turning bytes into a value).
    ///
    /// Malformed JSON, truncated MessagePack, or a value of the wrong
    /// shape for the requested type.
    #[error("decode failed: {0}")]
    Decode(String),

    /// The payload decoded, but it is not a well-formed envelope.
    ///
    /// `id` is whatever correlation id could still be recovered, so a
    /// server can address its error reply and a client can fail the
    /// right pending call. `code` is the taxonomy class a server should
    /// answer with.
    #[error("invalid envelope: {reason}")]
    InvalidEnvelope {
        id: Option<RequestId>,
        code: ErrorCode,
        reason: String,
    },
}

impl ProtocolError {
    pub(crate) fn invalid(
        id: Option<RequestId>,
        code: ErrorCode,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidEnvelope {
            id,
            code,
            reason: reason.into(),
        }
    }
}
