//! Per-connection context handed to every service constructor.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use serde_json::Value;
use wsrpc_transport::{ConnectionId, HandshakeInfo};

/// Everything a service instance may know about the connection it serves.
///
/// Built once when a connection opens: the transport contributes the peer
/// address, request path and headers; the server contributes its configured
/// key/value context (shared by every connection).
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionContext {
    connection_id: ConnectionId,
    handshake: HandshakeInfo,
    values: BTreeMap<String, Value>,
}

impl ConnectionContext {
    pub fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            handshake: HandshakeInfo::default(),
            values: BTreeMap::new(),
        }
    }

    pub fn with_handshake(mut self, handshake: HandshakeInfo) -> Self {
        self.handshake = handshake;
        self
    }

    pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    /// Merges `values` in; later keys win.
    pub fn with_values<I>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        self.values.extend(values);
        self
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.handshake.peer_addr
    }

    pub fn path(&self) -> &str {
        &self.handshake.path
    }

    /// Case-insensitive lookup of an upgrade request header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.handshake.header(name)
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.handshake.headers
    }

    /// A server-configured context value.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}
