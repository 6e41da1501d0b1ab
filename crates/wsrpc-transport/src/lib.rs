//! Transport abstraction layer for wsrpc.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! message-oriented duplex connections, plus the [`Frame`] model shared by
//! every layer above: each inbound message is either a text frame or a
//! binary frame, a clean close is `Ok(None)`, and a broken connection is an
//! `Err`.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    DEFAULT_HANDSHAKE_TIMEOUT, WebSocketConnection, WebSocketHandshake, WebSocketTransport,
};

use std::fmt;
use std::net::SocketAddr;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// The kind of a data frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Text,
    Binary,
}

/// One data message on a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A UTF-8 text message.
    Text(String),
    /// An opaque binary message.
    Binary(Vec<u8>),
}

impl Frame {
    /// Returns whether this is a text or a binary frame.
    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::Text(_) => FrameKind::Text,
            Frame::Binary(_) => FrameKind::Binary,
        }
    }

    /// Returns the raw payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Frame::Text(text) => text.as_bytes(),
            Frame::Binary(data) => data,
        }
    }

    /// Consumes the frame and returns its payload bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Frame::Text(text) => text.into_bytes(),
            Frame::Binary(data) => data,
        }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What the server learned about a peer during the upgrade handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandshakeInfo {
    /// Remote socket address, when known.
    pub peer_addr: Option<SocketAddr>,
    /// Request path of the upgrade request (e.g. `/ws/json-rpc`).
    pub path: String,
    /// Request headers, names lowercased, in arrival order.
    pub headers: Vec<(String, String)>,
}

impl HandshakeInfo {
    /// Case-insensitive header lookup. Returns the first match.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// What `accept` hands out before the upgrade has run.
    type Handshake: Handshake;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next incoming socket. Does not read from it.
    async fn accept(&mut self) -> Result<Self::Handshake, Self::Error>;

    /// Gracefully shuts down the transport, stopping new connections.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// An accepted socket whose protocol upgrade has not run yet.
///
/// The upgrade reads from the peer, so it belongs in the connection's own
/// task: a peer that never finishes it stalls nobody else.
pub trait Handshake: Send + 'static {
    /// The connection produced by a completed upgrade.
    type Connection: Connection;
    /// The error type for a failed upgrade.
    type Error: std::error::Error + Send + Sync;

    /// Remote socket address.
    fn peer_addr(&self) -> SocketAddr;

    /// Runs the upgrade.
    async fn complete(self) -> Result<Self::Connection, Self::Error>;
}

/// A single connection that exchanges [`Frame`]s.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends a frame to the remote peer.
    async fn send(&self, frame: Frame) -> Result<(), Self::Error>;

    /// Receives the next data frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Frame>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
