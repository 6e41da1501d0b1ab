//! Per-connection handler: session open, message loop, session close.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Build the connection context → open a session (fresh services)
//!   2. Loop: receive a frame → dispatch → send the reply, in arrival order
//!   3. Peer closes, asks to close, errors or idles out → session closed

use std::sync::Arc;

use wsrpc_service::{ConnectionContext, Outcome};
use wsrpc_transport::{Connection, ConnectionId, WebSocketConnection};

use crate::WsRpcError;
use crate::server::ServerState;

/// Drop guard that closes a connection's session when the handler exits.
///
/// This ensures cleanup happens even if the handler panics. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async lock.
struct SessionGuard {
    connection_id: ConnectionId,
    state: Arc<ServerState>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let connection_id = self.connection_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let mut sessions = state.sessions.lock().await;
            if let Err(e) = sessions.close(connection_id) {
                tracing::debug!(%connection_id, error = %e, "session already gone");
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: WebSocketConnection,
    state: Arc<ServerState>,
) -> Result<(), WsRpcError> {
    let conn_id = conn.id();
    let context = ConnectionContext::new(conn_id)
        .with_handshake(conn.handshake().clone())
        .with_values(state.context.clone());

    // Open the session and arm the guard back to back. The lock is
    // released before any network I/O.
    let opened = state.sessions.lock().await.open(&context);
    let dispatcher = match opened {
        Ok(dispatcher) => dispatcher,
        Err(e) => {
            tracing::warn!(%conn_id, error = %e, "refusing connection");
            let _ = conn.close().await;
            return Err(e.into());
        }
    };
    let _guard = SessionGuard {
        connection_id: conn_id,
        state: Arc::clone(&state),
    };

    loop {
        let received = match state.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, conn.recv()).await,
            None => Ok(conn.recv().await),
        };
        let frame = match received {
            Ok(Ok(Some(frame))) => frame,
            Ok(Ok(None)) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                // No id to answer; just end the loop.
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%conn_id, "connection idle, closing");
                let _ = conn.close().await;
                break;
            }
        };

        tracing::trace!(%conn_id, kind = ?frame.kind(), len = frame.len(), "frame received");
        match dispatcher.handle_frame(frame).await {
            Outcome::Reply(reply) => conn.send(reply).await?,
            Outcome::NoReply => {}
            Outcome::Close => {
                tracing::info!(%conn_id, "close requested by peer");
                let _ = conn.close().await;
                break;
            }
        }
    }

    // _guard drops here → session close fires.
    Ok(())
}
