/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The peer did not finish the upgrade in time.
    #[error("handshake with {0} timed out")]
    HandshakeTimeout(std::net::SocketAddr),

    /// Opening an outbound connection failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// The upgrade request could not be built (bad URL or header).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}
