//! # wsrpc
//!
//! Bidirectional JSON-RPC 2.0 over WebSockets.
//!
//! A server exposes named services whose methods are called as
//! `Service.method`; a client correlates each call with its reply by id.
//! Text frames carry JSON and binary frames carry MessagePack, with the
//! identical envelope in both.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wsrpc::prelude::*;
//!
//! struct Printer;
//!
//! #[derive(serde::Deserialize)]
//! struct PrintParams {
//!     text: String,
//! }
//!
//! impl Service for Printer {
//!     const NAME: &'static str = "Printer";
//!
//!     fn create(_context: &ConnectionContext) -> Self {
//!         Printer
//!     }
//!
//!     fn register(methods: &mut MethodTable<Self>) {
//!         methods.sync_method("print", |_: &Printer, p: PrintParams| {
//!             Ok::<_, RpcError>(format!("Text `{}` has been printed", p.text))
//!         });
//!     }
//! }
//!
//! # async fn run() -> Result<(), WsRpcError> {
//! let server = RpcServer::builder()
//!     .bind("127.0.0.1:8080")
//!     .path("/ws/json-rpc")
//!     .service::<Printer>()
//!     .build()
//!     .await?;
//! tokio::spawn(server.run());
//!
//! let client = RpcClient::connect("ws://127.0.0.1:8080/ws/json-rpc").await?;
//! let reply: String = client
//!     .call_as("Printer.print", serde_json::json!({"text": "Letter"}))
//!     .await?;
//! assert_eq!(reply, "Text `Letter` has been printed");
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod handler;
mod server;

pub use client::{ClientError, RpcClient, RpcClientBuilder};
pub use error::WsRpcError;
pub use server::{RpcServer, RpcServerBuilder, ServerHandle};

pub use wsrpc_protocol as protocol;
pub use wsrpc_service as service;
pub use wsrpc_session as session;
pub use wsrpc_transport as transport;

/// The types most applications need.
pub mod prelude {
    pub use crate::{ClientError, RpcClient, RpcServer, WsRpcError};
    pub use wsrpc_protocol::{Encoding, ErrorCode, Params, RequestId, RpcError};
    pub use wsrpc_service::{ConnectionContext, MethodTable, NoParams, Service};
}
