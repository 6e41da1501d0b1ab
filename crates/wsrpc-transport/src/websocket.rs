//! WebSocket transport implementation using `tokio-tungstenite`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::http::header::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::{
    Connection, ConnectionId, Frame, Handshake, HandshakeInfo, Transport, TransportError,
};

/// How long a peer gets to finish the upgrade unless configured otherwise.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn next_connection_id() -> ConnectionId {
    ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
}

fn io_error(kind: std::io::ErrorKind, e: tungstenite::Error) -> std::io::Error {
    std::io::Error::new(kind, e)
}

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
    path: Option<String>,
    handshake_timeout: Duration,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self {
            listener,
            path: None,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        })
    }

    /// Only accept upgrades whose request path equals `path`. Others are
    /// answered with HTTP 404.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Upper bound on the upgrade of one accepted socket.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Returns the local address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for WebSocketTransport {
    type Handshake = WebSocketHandshake;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Handshake, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::trace!(%addr, "accepted socket");

        Ok(WebSocketHandshake {
            stream,
            addr,
            path: self.path.clone(),
            timeout: self.handshake_timeout,
        })
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// An accepted socket waiting for its WebSocket upgrade.
pub struct WebSocketHandshake {
    stream: TcpStream,
    addr: SocketAddr,
    /// Required request path, if the transport has one.
    path: Option<String>,
    timeout: Duration,
}

impl WebSocketHandshake {
    async fn upgrade(self) -> Result<WebSocketConnection, TransportError> {
        let WebSocketHandshake {
            stream, addr, path, ..
        } = self;

        let mut captured: Option<(String, Vec<(String, String)>)> = None;
        let required_path = path.as_deref();
        let callback = |request: &Request, response: Response| {
            let path = request.uri().path().to_string();
            if let Some(required) = required_path {
                if path != required {
                    let mut rejection =
                        ErrorResponse::new(Some(format!("no route for {path}")));
                    *rejection.status_mut() = StatusCode::NOT_FOUND;
                    return Err(rejection);
                }
            }
            let headers = request
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
                })
                .collect();
            captured = Some((path, headers));
            Ok(response)
        };

        let ws = tokio_tungstenite::accept_hdr_async(
            MaybeTlsStream::Plain(stream),
            callback,
        )
        .await
        .map_err(|e| {
            TransportError::AcceptFailed(io_error(
                std::io::ErrorKind::ConnectionRefused,
                e,
            ))
        })?;

        let (path, headers) = captured.unwrap_or_default();
        let info = HandshakeInfo {
            peer_addr: Some(addr),
            path,
            headers,
        };

        let id = next_connection_id();
        tracing::debug!(%id, %addr, path = %info.path, "accepted WebSocket connection");

        Ok(WebSocketConnection::from_stream(id, info, ws))
    }
}

impl Handshake for WebSocketHandshake {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    fn peer_addr(&self) -> SocketAddr {
        self.addr
    }

    async fn complete(self) -> Result<Self::Connection, Self::Error> {
        let addr = self.addr;
        tokio::time::timeout(self.timeout, self.upgrade())
            .await
            .map_err(|_| TransportError::HandshakeTimeout(addr))?
    }
}

/// A single WebSocket connection.
///
/// The read and write halves sit behind separate locks, so one task can
/// block in [`recv`](Connection::recv) while others keep sending.
pub struct WebSocketConnection {
    id: ConnectionId,
    info: HandshakeInfo,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl WebSocketConnection {
    fn from_stream(id: ConnectionId, info: HandshakeInfo, ws: WsStream) -> Self {
        let (sink, stream) = ws.split();
        Self {
            id,
            info,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        }
    }

    /// Opens a client connection to `url`, attaching `headers` to the
    /// upgrade request.
    pub async fn connect(
        url: &str,
        headers: &[(String, String)],
    ) -> Result<Self, TransportError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
            request.headers_mut().insert(name, value);
        }
        let path = request.uri().path().to_string();

        let (ws, _response) =
            tokio_tungstenite::connect_async(request).await.map_err(|e| {
                TransportError::ConnectFailed(io_error(
                    std::io::ErrorKind::ConnectionRefused,
                    e,
                ))
            })?;

        let peer_addr = match ws.get_ref() {
            MaybeTlsStream::Plain(tcp) => tcp.peer_addr().ok(),
            _ => None,
        };
        let info = HandshakeInfo {
            peer_addr,
            path,
            headers: headers.to_vec(),
        };

        let id = next_connection_id();
        tracing::debug!(%id, url, "opened WebSocket connection");
        Ok(Self::from_stream(id, info, ws))
    }

    /// Handshake details recorded when the connection was established.
    pub fn handshake(&self) -> &HandshakeInfo {
        &self.info
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, frame: Frame) -> Result<(), Self::Error> {
        let msg = match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(data) => Message::Binary(data.into()),
        };
        self.sink.lock().await.send(msg).await.map_err(|e| match e {
            tungstenite::Error::ConnectionClosed
            | tungstenite::Error::AlreadyClosed => {
                TransportError::ConnectionClosed(self.id.to_string())
            }
            other => TransportError::SendFailed(io_error(
                std::io::ErrorKind::BrokenPipe,
                other,
            )),
        })
    }

    async fn recv(&self) -> Result<Option<Frame>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(Frame::Text(text.as_str().to_owned())));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(Frame::Binary(data.to_vec())));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/raw frame
                Some(Err(
                    tungstenite::Error::ConnectionClosed
                    | tungstenite::Error::AlreadyClosed,
                )) => return Ok(None),
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(io_error(
                        std::io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await.map_err(|e| match e {
            tungstenite::Error::ConnectionClosed
            | tungstenite::Error::AlreadyClosed => {
                TransportError::ConnectionClosed(self.id.to_string())
            }
            other => TransportError::SendFailed(io_error(
                std::io::ErrorKind::BrokenPipe,
                other,
            )),
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
