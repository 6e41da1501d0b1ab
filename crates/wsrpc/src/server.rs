//! `RpcServer` builder and accept loop.
//!
//! This is the entry point for serving services. It ties the layers
//! together: transport → session → service dispatch.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;
use wsrpc_service::{DispatchConfig, Service, ServiceError, ServiceRegistry};
use wsrpc_session::{SessionConfig, SessionManager};
use wsrpc_transport::{
    ConnectionId, DEFAULT_HANDSHAKE_TIMEOUT, Handshake, Transport, WebSocketTransport,
};

use crate::WsRpcError;
use crate::handler::handle_connection;

/// Shared server state passed to each connection task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The session
/// manager is the only mutable part and sits behind one `Mutex`.
pub(crate) struct ServerState {
    pub(crate) sessions: Mutex<SessionManager>,
    /// Key/value context merged into every connection's context.
    pub(crate) context: BTreeMap<String, Value>,
    pub(crate) idle_timeout: Option<Duration>,
}

/// Builder for configuring and starting a server.
///
/// # Example
///
/// ```rust,ignore
/// let server = RpcServer::builder()
///     .bind("0.0.0.0:8080")
///     .path("/ws/json-rpc")
///     .service::<Printer>()
///     .service::<Camera>()
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct RpcServerBuilder {
    bind_addr: String,
    path: Option<String>,
    registry: ServiceRegistry,
    /// First registration failure, reported by `build`.
    registration_error: Option<ServiceError>,
    context: BTreeMap<String, Value>,
    session_config: SessionConfig,
    idle_timeout: Option<Duration>,
    handshake_timeout: Duration,
}

impl RpcServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            path: None,
            registry: ServiceRegistry::new(),
            registration_error: None,
            context: BTreeMap::new(),
            session_config: SessionConfig::default(),
            idle_timeout: None,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Only accept upgrades on this request path.
    pub fn path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    /// Exposes service `S` on every connection.
    pub fn service<S: Service>(mut self) -> Self {
        if let Err(e) = self.registry.register::<S>() {
            self.registration_error.get_or_insert(e);
        }
        self
    }

    /// Adds a value every service constructor can read from its
    /// [`ConnectionContext`](wsrpc_service::ConnectionContext).
    pub fn context(mut self, key: &str, value: Value) -> Self {
        self.context.insert(key.to_string(), value);
        self
    }

    /// Refuses connections beyond `limit` simultaneous ones.
    pub fn max_connections(mut self, limit: usize) -> Self {
        self.session_config.max_connections = Some(limit);
        self
    }

    /// Closes a connection that sends nothing for `timeout`.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Drops a socket whose WebSocket upgrade takes longer than `timeout`
    /// (default 10 seconds).
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Whether Internal error messages reach the peer (default `true`).
    pub fn expose_internal_errors(mut self, expose: bool) -> Self {
        self.session_config.dispatch = DispatchConfig {
            expose_internal_errors: expose,
        };
        self
    }

    /// Binds the listener.
    ///
    /// # Errors
    /// The first service registration failure, or a bind failure.
    pub async fn build(self) -> Result<RpcServer, WsRpcError> {
        if let Some(e) = self.registration_error {
            return Err(e.into());
        }

        let mut transport = WebSocketTransport::bind(&self.bind_addr)
            .await?
            .with_handshake_timeout(self.handshake_timeout);
        if let Some(path) = self.path {
            transport = transport.with_path(path);
        }

        let services: Vec<&str> = self.registry.names().collect();
        tracing::debug!(?services, "services registered");

        let state = Arc::new(ServerState {
            sessions: Mutex::new(SessionManager::new(
                Arc::new(self.registry),
                self.session_config,
            )),
            context: self.context,
            idle_timeout: self.idle_timeout,
        });

        Ok(RpcServer { transport, state })
    }
}

impl Default for RpcServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct RpcServer {
    transport: WebSocketTransport,
    state: Arc<ServerState>,
}

impl RpcServer {
    /// Creates a new builder.
    pub fn builder() -> RpcServerBuilder {
        RpcServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// A handle for observing the server once `run` has taken it.
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Runs the accept loop until the process is terminated.
    ///
    /// Each accepted socket gets its own task, upgrade included, so neither
    /// a slow handshake nor a slow method on one connection stalls another.
    pub async fn run(self) -> Result<(), WsRpcError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes. Connections that
    /// are already open keep being served by their own tasks.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<(), WsRpcError>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(addr = ?self.local_addr().ok(), "wsrpc server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(handshake) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            let peer = handshake.peer_addr();
                            let conn = match handshake.complete().await {
                                Ok(conn) => conn,
                                Err(e) => {
                                    tracing::debug!(%peer, error = %e, "handshake failed");
                                    return;
                                }
                            };
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(
                                    error = %e,
                                    "connection ended with error"
                                );
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                    }
                },
            }
        }

        self.transport.shutdown().await?;
        tracing::info!("wsrpc server stopped accepting");
        Ok(())
    }
}

/// Read-only view of a server's live connections.
#[derive(Clone)]
pub struct ServerHandle {
    state: Arc<ServerState>,
}

impl ServerHandle {
    /// Number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.state.sessions.lock().await.len()
    }

    /// Ids of all live connections, ascending.
    pub async fn connection_ids(&self) -> Vec<ConnectionId> {
        self.state.sessions.lock().await.connection_ids()
    }
}
