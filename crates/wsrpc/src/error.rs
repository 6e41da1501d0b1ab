//! Unified error type for wsrpc.

use wsrpc_protocol::ProtocolError;
use wsrpc_service::ServiceError;
use wsrpc_session::SessionError;
use wsrpc_transport::TransportError;

use crate::ClientError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `wsrpc` meta-crate you deal with this single error type
/// instead of importing errors from each sub-crate. `#[from]` on each
/// variant lets `?` convert sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum WsRpcError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid envelope).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A service registration error (duplicate or invalid names).
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// A session-level error (limit reached, unknown connection).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A client-side call failure.
    #[error(transparent)]
    Client(#[from] ClientError),
}
