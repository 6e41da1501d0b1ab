//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener on a loopback port and talk to it with a
//! plain `tokio-tungstenite` client, so frame kinds, headers and close
//! handling are checked end to end.

#[cfg(feature = "websocket")]
mod websocket {
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;
    use std::time::Duration;

    use wsrpc_transport::{
        Connection, Frame, Handshake, Transport, TransportError, WebSocketConnection,
        WebSocketTransport,
    };

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn bind() -> (WebSocketTransport, String) {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr").to_string();
        (transport, addr)
    }

    async fn accept_one(transport: &mut WebSocketTransport) -> WebSocketConnection {
        transport
            .accept()
            .await
            .expect("should accept")
            .complete()
            .await
            .expect("should upgrade")
    }

    async fn connect_client(url: &str) -> ClientWs {
        let (ws, _) = tokio_tungstenite::connect_async(url)
            .await
            .expect("client should connect");
        ws
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        let (mut transport, addr) = bind().await;

        let server_handle = tokio::spawn(async move {
            accept_one(&mut transport).await
        });

        let mut client_ws = connect_client(&format!("ws://{addr}/")).await;
        let server_conn = server_handle.await.expect("task should complete");
        assert!(server_conn.id().into_inner() > 0);

        // Server sends text, client sees a text message.
        server_conn
            .send(Frame::Text("hello from server".into()))
            .await
            .expect("send should succeed");
        let msg = client_ws.next().await.unwrap().unwrap();
        assert!(msg.is_text());
        assert_eq!(msg.into_data().as_ref(), b"hello from server");

        // Client sends binary, server sees a binary frame.
        client_ws
            .send(Message::Binary(b"hello from client".to_vec().into()))
            .await
            .unwrap();
        let received = server_conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(received, Frame::Binary(b"hello from client".to_vec()));

        // Text keeps its kind too.
        client_ws.send(Message::Text("ping".into())).await.unwrap();
        let received = server_conn.recv().await.unwrap().unwrap();
        assert_eq!(received, Frame::Text("ping".into()));

        server_conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let (mut transport, addr) = bind().await;

        let server_handle = tokio::spawn(async move {
            accept_one(&mut transport).await
        });

        let mut client_ws = connect_client(&format!("ws://{addr}/")).await;
        let server_conn = server_handle.await.unwrap();

        client_ws.send(Message::Close(None)).await.unwrap();

        let result = server_conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_handshake_records_path_and_headers() {
        let (mut transport, addr) = bind().await;

        let server_handle = tokio::spawn(async move {
            accept_one(&mut transport).await
        });

        let client = WebSocketConnection::connect(
            &format!("ws://{addr}/ws/json-rpc"),
            &[("Authorization".into(), "MyAuth foo:bar".into())],
        )
        .await
        .expect("client should connect");
        let server_conn = server_handle.await.unwrap();

        let info = server_conn.handshake();
        assert_eq!(info.path, "/ws/json-rpc");
        assert_eq!(info.header("authorization"), Some("MyAuth foo:bar"));
        assert!(info.peer_addr.is_some());
        assert_eq!(client.handshake().path, "/ws/json-rpc");
    }

    #[tokio::test]
    async fn test_client_connection_round_trip() {
        let (mut transport, addr) = bind().await;

        let server_handle = tokio::spawn(async move {
            let conn = accept_one(&mut transport).await;
            // Echo one frame back with its kind preserved.
            let frame = conn.recv().await.unwrap().unwrap();
            conn.send(frame).await.unwrap();
            conn
        });

        let client = WebSocketConnection::connect(&format!("ws://{addr}/"), &[])
            .await
            .expect("client should connect");
        client.send(Frame::Binary(vec![1, 2, 3])).await.unwrap();
        let echoed = client.recv().await.unwrap().unwrap();
        assert_eq!(echoed, Frame::Binary(vec![1, 2, 3]));

        let _server_conn = server_handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_required_path_rejects_other_paths() {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind")
            .with_path("/ws/json-rpc");
        let addr = transport.local_addr().unwrap().to_string();
        let mut transport = transport;

        let server_handle = tokio::spawn(async move {
            let handshake = transport.accept().await.expect("socket is accepted");
            handshake.complete().await.is_err()
        });

        let request = format!("ws://{addr}/elsewhere")
            .into_client_request()
            .unwrap();
        let result = tokio_tungstenite::connect_async(request).await;
        assert!(result.is_err(), "upgrade to wrong path should fail");
        assert!(server_handle.await.unwrap(), "upgrade should report failure");
    }

    #[tokio::test]
    async fn test_silent_peer_times_out_in_its_own_handshake() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind")
            .with_handshake_timeout(Duration::from_millis(50));
        let addr = transport.local_addr().unwrap();

        // Opens TCP and never sends the upgrade request.
        let _silent = tokio::net::TcpStream::connect(addr).await.unwrap();

        let handshake = transport
            .accept()
            .await
            .expect("accept returns without reading from the peer");
        assert!(handshake.peer_addr().ip().is_loopback());

        let result = handshake.complete().await;
        assert!(matches!(result, Err(TransportError::HandshakeTimeout(_))));
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_header() {
        let result = WebSocketConnection::connect(
            "ws://127.0.0.1:1/",
            &[("bad header".into(), "x".into())],
        )
        .await;
        assert!(matches!(
            result,
            Err(TransportError::InvalidRequest(_))
        ));
    }
}
