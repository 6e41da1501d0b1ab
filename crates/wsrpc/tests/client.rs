//! Integration tests for `RpcClient`: against a real server, and against
//! scripted peers that misbehave on purpose.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use wsrpc::prelude::*;

// =========================================================================
// Mock services
// =========================================================================

struct Printer;

#[derive(Deserialize)]
struct PrintParams {
    text: String,
}

impl Service for Printer {
    const NAME: &'static str = "Printer";

    fn create(_context: &ConnectionContext) -> Self {
        Printer
    }

    fn register(methods: &mut MethodTable<Self>) {
        methods.sync_method("print", |_: &Printer, p: PrintParams| {
            Ok::<_, RpcError>(format!("Text `{}` has been printed", p.text))
        });
    }
}

struct Camera {
    owner: String,
}

#[derive(Deserialize)]
struct PhotoParams {
    #[serde(default)]
    delay_ms: u64,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Photo {
    owner: String,
    delay_ms: u64,
}

impl Service for Camera {
    const NAME: &'static str = "Camera";

    fn create(context: &ConnectionContext) -> Self {
        Camera {
            owner: context.header("authorization").unwrap_or("anonymous").to_string(),
        }
    }

    fn register(methods: &mut MethodTable<Self>) {
        methods.method("take_photo", |camera: Arc<Camera>, p: PhotoParams| async move {
            tokio::time::sleep(Duration::from_millis(p.delay_ms)).await;
            Ok::<_, RpcError>(Photo {
                owner: camera.owner.clone(),
                delay_ms: p.delay_ms,
            })
        });
    }
}

// =========================================================================
// Helpers
// =========================================================================

async fn start_server() -> String {
    let server = RpcServer::builder()
        .bind("127.0.0.1:0")
        .service::<Printer>()
        .service::<Camera>()
        .build()
        .await
        .expect("server should build");
    let addr = server.local_addr().expect("should have local addr");

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    format!("ws://{addr}")
}

/// Accepts one connection and hands it to `script`.
async fn scripted_peer<F, Fut>(script: F) -> String
where
    F: FnOnce(WebSocketStream<TcpStream>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        script(ws).await;
    });
    format!("ws://{addr}")
}

/// Reads the next text request and returns its decoded body.
async fn next_request(ws: &mut WebSocketStream<TcpStream>) -> Value {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return serde_json::from_str(text.as_str()).unwrap(),
            Some(Ok(_)) => continue,
            other => panic!("expected a request, got {other:?}"),
        }
    }
}

async fn reply(ws: &mut WebSocketStream<TcpStream>, body: Value) {
    ws.send(Message::Text(body.to_string().into())).await.unwrap();
}

// =========================================================================
// Against a real server
// =========================================================================

#[tokio::test]
async fn test_call_returns_method_result() {
    let client = RpcClient::connect(&start_server().await).await.unwrap();

    let result = client
        .call("Printer.print", json!({"text": "Letter"}))
        .await
        .unwrap();

    assert_eq!(result, json!("Text `Letter` has been printed"));
}

#[tokio::test]
async fn test_binary_client_gets_same_result() {
    let client = RpcClient::builder(&start_server().await)
        .encoding(Encoding::Binary)
        .connect()
        .await
        .unwrap();

    let result: String = client
        .call_as("Printer.print", json!({"text": "Letter"}))
        .await
        .unwrap();

    assert_eq!(client.encoding(), Encoding::Binary);
    assert_eq!(result, "Text `Letter` has been printed");
}

#[tokio::test]
async fn test_rpc_error_is_typed() {
    let client = RpcClient::connect(&start_server().await).await.unwrap();

    let err = client.call("Camera.bogus", json!({})).await.unwrap_err();

    let fault = match err {
        ClientError::Rpc(fault) => fault,
        other => panic!("expected an rpc error, got {other:?}"),
    };
    assert_eq!(fault.code, ErrorCode::MethodNotFound);
    assert_eq!(fault.message, "Method `Camera.bogus` not found");
}

#[tokio::test]
async fn test_missing_param_is_invalid_params_from_server() {
    let client = RpcClient::connect(&start_server().await).await.unwrap();

    let err = client.call("Printer.print", ()).await.unwrap_err();

    assert!(matches!(err, ClientError::Rpc(ref f) if f.code == ErrorCode::InvalidParams));
}

#[tokio::test]
async fn test_non_map_params_rejected_locally() {
    let client = RpcClient::connect(&start_server().await).await.unwrap();

    let err = client.call("Printer.print", vec!["Letter"]).await.unwrap_err();

    assert!(matches!(err, ClientError::InvalidParams(_)));
    assert_eq!(client.pending_calls().await, 0);
}

#[tokio::test]
async fn test_header_reaches_service_and_typed_result() {
    let client = RpcClient::builder(&start_server().await)
        .header("Authorization", "MyAuth <foo>:<bar>")
        .connect()
        .await
        .unwrap();

    let photo: Photo = client
        .call_as("Camera.take_photo", json!({"delay_ms": 5}))
        .await
        .unwrap();

    assert_eq!(
        photo,
        Photo {
            owner: "MyAuth <foo>:<bar>".into(),
            delay_ms: 5
        }
    );
}

#[tokio::test]
async fn test_concurrent_calls_each_get_their_own_reply() {
    let client = RpcClient::connect(&start_server().await).await.unwrap();

    let (slow, fast) = tokio::join!(
        client.call_as::<Photo, _>("Camera.take_photo", json!({"delay_ms": 100})),
        client.call("Printer.print", json!({"text": "fast"})),
    );

    assert_eq!(slow.unwrap().delay_ms, 100);
    assert_eq!(fast.unwrap(), json!("Text `fast` has been printed"));
    assert_eq!(client.pending_calls().await, 0);
}

#[tokio::test]
async fn test_wrong_result_type_is_malformed_reply() {
    let client = RpcClient::connect(&start_server().await).await.unwrap();

    let err = client
        .call_as::<u64, _>("Printer.print", json!({"text": "x"}))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::MalformedReply(_)));
}

#[tokio::test]
async fn test_call_after_close_is_not_connected() {
    let client = RpcClient::connect(&start_server().await).await.unwrap();
    client.close().await.unwrap();

    let err = client.call("Printer.print", json!({"text": "x"})).await.unwrap_err();

    assert!(matches!(err, ClientError::NotConnected));
    // Closing twice is harmless.
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_notification_does_not_wait() {
    let client = RpcClient::connect(&start_server().await).await.unwrap();

    client
        .notify("Printer.print", json!({"text": "fire and forget"}))
        .await
        .unwrap();

    // The connection stays usable; the notification produced no reply to
    // confuse the next call.
    let result = client.call("Printer.print", json!({"text": "next"})).await;
    assert_eq!(result.unwrap(), json!("Text `next` has been printed"));
}

// =========================================================================
// Correlation details
// =========================================================================

#[tokio::test]
async fn test_ids_follow_seed_and_step() {
    let url = scripted_peer(|_ws| async {}).await;
    let client = RpcClient::builder(&url)
        .id_seed(10)
        .id_step(5)
        .connect()
        .await
        .unwrap();

    let ids: Vec<RequestId> = (0..3)
        .map(|_| client.build_request("A.b", Params::new()).unwrap().0)
        .collect();

    assert_eq!(
        ids,
        vec![
            RequestId::Number(10),
            RequestId::Number(15),
            RequestId::Number(20)
        ]
    );
}

#[tokio::test]
async fn test_default_ids_start_at_one_and_are_sent() {
    let url = scripted_peer(|mut ws| async move {
        for _ in 0..2 {
            let request = next_request(&mut ws).await;
            assert_eq!(request["jsonrpc"], json!("2.0"));
            reply(&mut ws, json!({"jsonrpc": "2.0", "result": request["id"], "id": request["id"]})).await;
        }
    })
    .await;
    let client = RpcClient::connect(&url).await.unwrap();

    assert_eq!(client.call("Echo.id", ()).await.unwrap(), json!(1));
    assert_eq!(client.call("Echo.id", ()).await.unwrap(), json!(2));
}

#[tokio::test]
async fn test_ids_exhausted_instead_of_wrapping() {
    let url = scripted_peer(|mut ws| async move {
        let request = next_request(&mut ws).await;
        reply(&mut ws, json!({"jsonrpc": "2.0", "result": "last", "id": request["id"]})).await;
        let _ = ws.next().await;
    })
    .await;
    let client = RpcClient::builder(&url)
        .id_seed(i64::MAX - 1)
        .connect()
        .await
        .unwrap();

    assert_eq!(client.call("Any.thing", ()).await.unwrap(), json!("last"));
    let err = client.call("Any.thing", ()).await.unwrap_err();

    assert!(matches!(err, ClientError::IdsExhausted), "got {err:?}");
    assert_eq!(client.pending_calls().await, 0);
}

#[tokio::test]
async fn test_unknown_id_reply_is_discarded() {
    let url = scripted_peer(|mut ws| async move {
        let request = next_request(&mut ws).await;
        reply(&mut ws, json!({"jsonrpc": "2.0", "result": "stray", "id": 999})).await;
        reply(&mut ws, json!({"jsonrpc": "2.0", "result": "mine", "id": request["id"]})).await;
        // Keep the connection open until the client is done.
        let _ = ws.next().await;
    })
    .await;
    let client = RpcClient::connect(&url).await.unwrap();

    let result = client.call("Any.thing", ()).await.unwrap();

    assert_eq!(result, json!("mine"));
}

#[tokio::test]
async fn test_null_id_error_fails_the_only_outstanding_call() {
    let url = scripted_peer(|mut ws| async move {
        let _ = next_request(&mut ws).await;
        reply(
            &mut ws,
            json!({"jsonrpc": "2.0", "error": {"code": -32700, "message": "Parse error"}, "id": null}),
        )
        .await;
        let _ = ws.next().await;
    })
    .await;
    let client = RpcClient::connect(&url).await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(2), client.call("Any.thing", ()))
        .await
        .expect("the lone call must receive the null-id error");

    let fault = match result {
        Err(ClientError::Rpc(fault)) => fault,
        other => panic!("expected an rpc error, got {other:?}"),
    };
    assert_eq!(fault.code, ErrorCode::ParseError);
    assert_eq!(client.pending_calls().await, 0);
}

#[tokio::test]
async fn test_null_id_error_is_discarded_with_several_calls_outstanding() {
    let url = scripted_peer(|mut ws| async move {
        let first = next_request(&mut ws).await;
        let second = next_request(&mut ws).await;
        reply(
            &mut ws,
            json!({"jsonrpc": "2.0", "error": {"code": -32700, "message": "Parse error"}, "id": null}),
        )
        .await;
        reply(&mut ws, json!({"jsonrpc": "2.0", "result": "a", "id": first["id"]})).await;
        reply(&mut ws, json!({"jsonrpc": "2.0", "result": "b", "id": second["id"]})).await;
        let _ = ws.next().await;
    })
    .await;
    let client = RpcClient::connect(&url).await.unwrap();

    let (a, b) = tokio::join!(client.call("Any.a", ()), client.call("Any.b", ()));

    assert_eq!(a.unwrap(), json!("a"));
    assert_eq!(b.unwrap(), json!("b"));
}

#[tokio::test]
async fn test_timed_out_calls_leave_no_pending_entries() {
    // A peer that reads everything and never answers.
    let url = scripted_peer(|mut ws| async move {
        while let Some(Ok(_)) = ws.next().await {}
    })
    .await;
    let client = RpcClient::connect(&url).await.unwrap();

    for _ in 0..3 {
        let result =
            tokio::time::timeout(Duration::from_millis(50), client.call("A.b", ())).await;
        assert!(result.is_err(), "the silent peer never replies");
    }

    assert_eq!(client.pending_calls().await, 0);
}

#[tokio::test]
async fn test_reply_without_result_or_error_is_malformed() {
    let url = scripted_peer(|mut ws| async move {
        let request = next_request(&mut ws).await;
        reply(&mut ws, json!({"jsonrpc": "2.0", "id": request["id"]})).await;
        let _ = ws.next().await;
    })
    .await;
    let client = RpcClient::connect(&url).await.unwrap();

    let err = client.call("Any.thing", ()).await.unwrap_err();

    assert!(matches!(err, ClientError::MalformedReply(_)), "got {err:?}");
}

#[tokio::test]
async fn test_error_key_wins_over_missing_result() {
    let url = scripted_peer(|mut ws| async move {
        let request = next_request(&mut ws).await;
        reply(
            &mut ws,
            json!({"jsonrpc": "2.0", "error": {"code": -32000, "message": "busy"}, "id": request["id"]}),
        )
        .await;
        let _ = ws.next().await;
    })
    .await;
    let client = RpcClient::connect(&url).await.unwrap();

    let err = client.call("Any.thing", ()).await.unwrap_err();

    let fault = match err {
        ClientError::Rpc(fault) => fault,
        other => panic!("expected an rpc error, got {other:?}"),
    };
    assert_eq!(fault.code.code(), -32000);
    assert_eq!(fault.message, "busy");
}

#[tokio::test]
async fn test_pending_call_fails_when_connection_drops() {
    let url = scripted_peer(|mut ws| async move {
        let _ = next_request(&mut ws).await;
        let _ = ws.close(None).await;
    })
    .await;
    let client = RpcClient::connect(&url).await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(2), client.call("Any.thing", ()))
        .await
        .expect("a pending call must not hang");

    assert!(matches!(result, Err(ClientError::ConnectionClosed)));
}
