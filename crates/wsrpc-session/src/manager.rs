//! The session manager: tracks every live connection of a server.
//!
//! It is responsible for:
//! - Registering a connection and building its dispatch context
//! - Enforcing the connection limit
//! - Deregistering the connection when its message loop ends
//!
//! # Concurrency note
//!
//! `SessionManager` is not thread-safe by itself; it is a plain `HashMap`.
//! The server wraps it in one `tokio::sync::Mutex` and only locks it around
//! `open`/`close`, never while a request is being served. Dispatchers are
//! handed out by value, so per-connection state is never behind this lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use wsrpc_service::{ConnectionContext, Dispatcher, ServiceRegistry};
use wsrpc_transport::ConnectionId;

use crate::{Session, SessionConfig, SessionError};

/// Manages the live-connection set.
///
/// ## Lifecycle
///
/// ```text
/// open(ctx) ──→ [live] ──→ close(id)
///     │                        │
///     ▼                        ▼
///  Dispatcher               Session
/// (fresh services)       (the record)
/// ```
pub struct SessionManager {
    /// Live sessions, keyed by connection.
    sessions: HashMap<ConnectionId, Session>,

    /// The service types every connection is served with.
    registry: Arc<ServiceRegistry>,

    config: SessionConfig,
}

impl SessionManager {
    /// Creates an empty manager.
    pub fn new(registry: Arc<ServiceRegistry>, config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            registry,
            config,
        }
    }

    /// Registers a connection and builds its dispatcher over fresh
    /// instances of every registered service.
    ///
    /// # Errors
    /// - [`SessionError::AlreadyOpen`] if the connection is already live
    /// - [`SessionError::TooManyConnections`] if the limit is reached
    pub fn open(&mut self, context: &ConnectionContext) -> Result<Dispatcher, SessionError> {
        let connection_id = context.connection_id();
        if self.sessions.contains_key(&connection_id) {
            return Err(SessionError::AlreadyOpen(connection_id));
        }
        if let Some(limit) = self.config.max_connections {
            if self.sessions.len() >= limit {
                tracing::warn!(%connection_id, limit, "connection limit reached");
                return Err(SessionError::TooManyConnections { limit });
            }
        }

        let services = self.registry.instantiate(context);
        self.sessions.insert(
            connection_id,
            Session {
                connection_id,
                peer_addr: context.peer_addr(),
                path: context.path().to_string(),
                opened_at: Instant::now(),
            },
        );

        tracing::info!(
            %connection_id,
            live = self.sessions.len(),
            "session opened"
        );
        Ok(Dispatcher::new(services, self.config.dispatch))
    }

    /// Deregisters a connection and returns its record.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if the connection is not live.
    pub fn close(&mut self, connection_id: ConnectionId) -> Result<Session, SessionError> {
        let session = self
            .sessions
            .remove(&connection_id)
            .ok_or(SessionError::NotFound(connection_id))?;

        tracing::info!(
            %connection_id,
            age_ms = session.age().as_millis() as u64,
            live = self.sessions.len(),
            "session closed"
        );
        Ok(session)
    }

    /// Looks up a live session.
    pub fn get(&self, connection_id: ConnectionId) -> Option<&Session> {
        self.sessions.get(&connection_id)
    }

    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.sessions.contains_key(&connection_id)
    }

    /// Ids of all live connections, in ascending order.
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.sessions.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Returns the number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if there are no live sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

// =========================================================================
// Tests
// =========================================================================
