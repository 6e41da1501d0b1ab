//! The client correlator.
//!
//! An [`RpcClient`] owns one connection. Every call gets the next id from a
//! strictly increasing counter and parks a oneshot sender in the pending
//! map; a background reader task decodes replies and completes the sender
//! whose id matches. Any number of calls may be outstanding at once, and
//! replies may arrive in any order.
//!
//! ```text
//! call() ──► pending[id] = tx ──► send(request)
//!                                     ⋮
//! reader task: recv(reply) ──► pending.remove(reply.id) ──► tx.send(reply)
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use wsrpc_protocol::{
    Encoding, Params, ProtocolError, Request, RequestId, Response, RpcError,
};
use wsrpc_transport::{Connection, TransportError, WebSocketConnection};

/// Errors a call can fail with.
///
/// [`Rpc`](Self::Rpc) is the server's answer; every other variant means no
/// well-formed answer was obtained.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The server replied with an error envelope.
    #[error("rpc error: {0}")]
    Rpc(#[from] RpcError),

    /// The reply could not be read as a success or an error.
    #[error("malformed reply: {0}")]
    MalformedReply(String),

    /// Call parameters must serialize to a map of named arguments.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// The client was closed; no further calls are possible.
    #[error("client is not connected")]
    NotConnected,

    /// The connection went away while the call was waiting for its reply.
    #[error("connection closed before a reply arrived")]
    ConnectionClosed,

    /// The next id would overflow `i64`; ids are never reused.
    #[error("request ids exhausted")]
    IdsExhausted,
}

type ReplySender = oneshot::Sender<Result<Response, ClientError>>;

/// Calls waiting for their reply.
struct Pending {
    calls: HashMap<RequestId, ReplySender>,
    /// Cleared by the reader task once the connection is gone.
    open: bool,
}

/// Hands out `seed, seed + step, seed + 2 * step, ...` and stops before the
/// sequence would overflow.
struct IdGenerator {
    next: AtomicI64,
    step: i64,
}

impl IdGenerator {
    fn new(seed: i64, step: i64) -> Self {
        Self {
            next: AtomicI64::new(seed),
            step: step.max(1),
        }
    }

    fn next(&self) -> Result<RequestId, ClientError> {
        self.next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                n.checked_add(self.step)
            })
            .map(RequestId::Number)
            .map_err(|_| ClientError::IdsExhausted)
    }
}

/// Removes a call from the pending map when its future is dropped before
/// the reply arrived (e.g. by a caller-side timeout).
struct PendingEntry<'a> {
    pending: &'a Arc<Mutex<Pending>>,
    id: Option<RequestId>,
}

impl PendingEntry<'_> {
    /// The reader task already removed the entry.
    fn settled(mut self) {
        self.id = None;
    }
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        match self.pending.try_lock() {
            Ok(mut pending) => {
                pending.calls.remove(&id);
            }
            Err(_) => {
                let pending = Arc::clone(self.pending);
                tokio::spawn(async move {
                    pending.lock().await.calls.remove(&id);
                });
            }
        }
    }
}

/// Builder for [`RpcClient`].
pub struct RpcClientBuilder {
    url: String,
    encoding: Encoding,
    headers: Vec<(String, String)>,
    id_seed: i64,
    id_step: i64,
}

impl RpcClientBuilder {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            encoding: Encoding::Text,
            headers: Vec::new(),
            id_seed: 1,
            id_step: 1,
        }
    }

    /// Text (JSON, the default) or binary (MessagePack) frames.
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Adds a header to the upgrade request.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// First request id (default 1).
    pub fn id_seed(mut self, seed: i64) -> Self {
        self.id_seed = seed;
        self
    }

    /// Id increment (default 1). Values below 1 are raised to 1.
    pub fn id_step(mut self, step: i64) -> Self {
        self.id_step = step;
        self
    }

    /// Opens the connection and starts the reader task.
    pub async fn connect(self) -> Result<RpcClient, ClientError> {
        let conn = Arc::new(WebSocketConnection::connect(&self.url, &self.headers).await?);
        let pending = Arc::new(Mutex::new(Pending {
            calls: HashMap::new(),
            open: true,
        }));
        let reader = tokio::spawn(read_replies(Arc::clone(&conn), Arc::clone(&pending)));

        tracing::debug!(conn_id = %conn.id(), url = %self.url, encoding = ?self.encoding, "client connected");
        Ok(RpcClient {
            conn,
            encoding: self.encoding,
            ids: IdGenerator::new(self.id_seed, self.id_step),
            pending,
            reader,
            closed: AtomicBool::new(false),
        })
    }
}

/// A JSON-RPC client bound to one connection.
pub struct RpcClient {
    conn: Arc<WebSocketConnection>,
    encoding: Encoding,
    ids: IdGenerator,
    pending: Arc<Mutex<Pending>>,
    reader: JoinHandle<()>,
    closed: AtomicBool,
}

impl RpcClient {
    pub fn builder(url: &str) -> RpcClientBuilder {
        RpcClientBuilder::new(url)
    }

    /// Connects with default settings (text encoding, ids from 1).
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        RpcClientBuilder::new(url).connect().await
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Allocates the next id and builds the request envelope.
    ///
    /// # Errors
    /// [`ClientError::IdsExhausted`] once the id sequence would overflow.
    pub fn build_request(
        &self,
        method: &str,
        params: Params,
    ) -> Result<(RequestId, Request), ClientError> {
        let id = self.ids.next()?;
        let request = Request::new(method, params, id.clone());
        Ok((id, request))
    }

    /// Calls `method` and waits for its reply.
    ///
    /// `params` must serialize to a map (or to `null` for no parameters).
    ///
    /// # Errors
    /// [`ClientError::Rpc`] carries the server's error envelope; the other
    /// variants mean no reply was obtained.
    pub async fn call<P: Serialize>(&self, method: &str, params: P) -> Result<Value, ClientError> {
        self.ensure_connected()?;
        let params = to_params(params)?;
        let (id, request) = self.build_request(method, params)?;
        let frame = self.encoding.encode_frame(&request)?;

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            if !pending.open {
                return Err(ClientError::ConnectionClosed);
            }
            pending.calls.insert(id.clone(), tx);
        }
        // From here on, dropping this future forgets the call.
        let entry = PendingEntry {
            pending: &self.pending,
            id: Some(id.clone()),
        };

        tracing::debug!(%id, method, "calling");
        self.conn.send(frame).await?;

        let reply = rx.await;
        entry.settled();
        let response = reply.map_err(|_| ClientError::ConnectionClosed)??;
        Ok(response.into_result()?)
    }

    /// Like [`call`](Self::call), then deserializes the result into `T`.
    pub async fn call_as<T, P>(&self, method: &str, params: P) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        P: Serialize,
    {
        let value = self.call(method, params).await?;
        serde_json::from_value(value).map_err(|e| {
            ClientError::MalformedReply(format!("unexpected result for `{method}`: {e}"))
        })
    }

    /// Sends a notification: no id, no reply.
    pub async fn notify<P: Serialize>(&self, method: &str, params: P) -> Result<(), ClientError> {
        self.ensure_connected()?;
        let request = Request::notification(method, to_params(params)?);
        self.conn.send(self.encoding.encode_frame(&request)?).await?;
        Ok(())
    }

    /// Number of calls waiting for a reply.
    pub async fn pending_calls(&self) -> usize {
        self.pending.lock().await.calls.len()
    }

    /// Closes the connection. Outstanding calls fail with
    /// [`ClientError::ConnectionClosed`]; later calls with
    /// [`ClientError::NotConnected`].
    pub async fn close(&self) -> Result<(), ClientError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::debug!(conn_id = %self.conn.id(), "closing client");
        match self.conn.close().await {
            Ok(()) | Err(TransportError::ConnectionClosed(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn ensure_connected(&self) -> Result<(), ClientError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::NotConnected);
        }
        Ok(())
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

fn to_params<P: Serialize>(params: P) -> Result<Params, ClientError> {
    match serde_json::to_value(params) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Params::new()),
        Ok(other) => Err(ClientError::InvalidParams(format!(
            "expected a map of named arguments, got {other}"
        ))),
        Err(e) => Err(ClientError::InvalidParams(e.to_string())),
    }
}

/// The id of the only outstanding call, if exactly one is outstanding.
async fn lone_call(pending: &Mutex<Pending>) -> Option<RequestId> {
    let pending = pending.lock().await;
    if pending.calls.len() == 1 {
        pending.calls.keys().next().cloned()
    } else {
        None
    }
}

/// Reads replies until the connection ends, then fails whatever is still
/// pending.
async fn read_replies(conn: Arc<WebSocketConnection>, pending: Arc<Mutex<Pending>>) {
    let conn_id = conn.id();
    loop {
        let frame = match conn.recv().await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::debug!(%conn_id, "connection closed");
                break;
            }
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "recv error");
                break;
            }
        };

        // Replies are decoded by their own frame kind.
        let (id, reply) = match Encoding::of(&frame).decode_envelope(frame.as_bytes()) {
            Ok(envelope) => match envelope.into_response() {
                Ok(response) => match response.id().cloned() {
                    Some(id) => (id, Ok(response)),
                    None => match lone_call(&pending).await {
                        // With a single call in flight the reply can only be its own.
                        Some(id) => (id, Ok(response)),
                        None => {
                            tracing::warn!(%conn_id, ?response, "discarding error reply without id");
                            continue;
                        }
                    },
                },
                Err(request) => {
                    tracing::debug!(%conn_id, method = %request.method, "ignoring request from server");
                    continue;
                }
            },
            Err(ProtocolError::InvalidEnvelope {
                id: Some(id),
                reason,
                ..
            }) => (id, Err(ClientError::MalformedReply(reason))),
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "discarding undecodable reply");
                continue;
            }
        };

        let sender = pending.lock().await.calls.remove(&id);
        match sender {
            Some(tx) => {
                // The caller may have given up; that is fine.
                let _ = tx.send(reply);
            }
            None => tracing::warn!(%conn_id, %id, "discarding reply for unknown id"),
        }
    }

    let mut pending = pending.lock().await;
    pending.open = false;
    for (_, tx) in pending.calls.drain() {
        let _ = tx.send(Err(ClientError::ConnectionClosed));
    }
}
