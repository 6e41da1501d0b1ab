//! Session types: the server's record of one live connection.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use wsrpc_service::DispatchConfig;
use wsrpc_transport::ConnectionId;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Upper bound on simultaneously open sessions. `None` means no limit.
    pub max_connections: Option<usize>,

    /// Handed to every dispatcher the manager builds.
    pub dispatch: DispatchConfig,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A single live connection.
///
/// Created by [`SessionManager::open`](crate::SessionManager::open) and
/// handed back by [`close`](crate::SessionManager::close).
#[derive(Debug, Clone)]
pub struct Session {
    pub connection_id: ConnectionId,
    pub peer_addr: Option<SocketAddr>,
    pub path: String,
    pub opened_at: Instant,
}

impl Session {
    /// How long the connection has been open.
    pub fn age(&self) -> Duration {
        self.opened_at.elapsed()
    }
}
