//! Error types for the session layer.

use wsrpc_transport::ConnectionId;

/// Errors that can occur while opening or closing a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The configured connection limit is reached.
    #[error("too many connections (limit {limit})")]
    TooManyConnections { limit: usize },

    /// A session is already open for this connection.
    #[error("session already open for {0}")]
    AlreadyOpen(ConnectionId),

    /// No live session exists for this connection. It was never opened or
    /// has already been closed.
    #[error("session not found for {0}")]
    NotFound(ConnectionId),
}
