//! Per-connection dispatcher: Decode → Resolve → Invoke → Encode-Reply.
//!
//! Every fault along the way is turned into an error envelope addressed to
//! the request's id (or `null` when no id could be recovered). Nothing a
//! peer sends can end the connection except the explicit close request.

use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use serde_json::Value;
use wsrpc_protocol::{
    Encoding, Envelope, ErrorCode, Params, ProtocolError, Request, Response, RpcError,
};
use wsrpc_transport::Frame;

use crate::ServiceSet;

/// Text payload that asks the server to end the connection.
pub const CLOSE_REQUEST: &str = "close";

/// Knobs for one dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Send the message of Internal errors to the peer. When `false` the
    /// message is replaced by the generic class name.
    pub expose_internal_errors: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            expose_internal_errors: true,
        }
    }
}

/// What the message loop should do after one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Send this frame back (same kind as the inbound one).
    Reply(Frame),
    /// Nothing to send: a notification, or a stray response.
    NoReply,
    /// The peer asked to close the connection.
    Close,
}

/// Serves the requests of one connection against its own service instances.
pub struct Dispatcher {
    services: ServiceSet,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(services: ServiceSet, config: DispatchConfig) -> Self {
        Self { services, config }
    }

    pub fn config(&self) -> DispatchConfig {
        self.config
    }

    /// Handles one inbound frame, replying in the frame's own encoding.
    pub async fn handle_frame(&self, frame: Frame) -> Outcome {
        match &frame {
            Frame::Text(text) if text == CLOSE_REQUEST => return Outcome::Close,
            _ => {}
        }

        let encoding = Encoding::of(&frame);
        let Some(response) = self.respond(encoding, frame.as_bytes()).await else {
            return Outcome::NoReply;
        };
        match encode_reply(response, |r| encoding.encode_frame(r)) {
            Some(reply) => Outcome::Reply(reply),
            None => Outcome::NoReply,
        }
    }

    /// Byte-level entry point: decodes `data` with `encoding` and returns
    /// the encoded reply, if any.
    pub async fn dispatch(&self, encoding: Encoding, data: &[u8]) -> Option<Vec<u8>> {
        let response = self.respond(encoding, data).await?;
        encode_reply(response, |r| encoding.encode(r))
    }

    async fn respond(&self, encoding: Encoding, data: &[u8]) -> Option<Response> {
        let envelope = match encoding.decode_envelope(data) {
            Ok(envelope) => envelope,
            Err(ProtocolError::InvalidEnvelope { id, code, reason }) => {
                tracing::debug!(?encoding, %reason, "invalid envelope");
                let error = RpcError::new(code, format!("{}: {reason}", code.name()));
                return Some(Response::failure(id, error));
            }
            Err(ProtocolError::Decode(reason) | ProtocolError::Encode(reason)) => {
                tracing::debug!(?encoding, %reason, "undecodable payload");
                return Some(Response::failure(None, RpcError::parse_error(reason)));
            }
        };

        match envelope {
            Envelope::Request(request) => self.dispatch_request(request).await,
            Envelope::Success(_) | Envelope::Failure(_) => {
                // Answering a response could ping-pong forever.
                tracing::warn!(id = ?envelope.id(), "dropping response sent to server");
                None
            }
        }
    }

    /// Runs one decoded request. Returns `None` for notifications.
    pub async fn dispatch_request(&self, request: Request) -> Option<Response> {
        let Request {
            method, params, id, ..
        } = request;
        let result = self.call(&method, params).await;

        let Some(id) = id else {
            if let Err(e) = &result {
                tracing::debug!(%method, error = %e, "notification failed");
            }
            return None;
        };
        Some(match result {
            Ok(value) => Response::success(id, value),
            Err(error) => Response::failure(Some(id), error),
        })
    }

    /// Resolves and invokes `method`. A panic in the method body becomes an
    /// Internal error.
    pub async fn call(&self, method: &str, params: Params) -> Result<Value, RpcError> {
        let future = self.services.resolve(method, params).inspect_err(|e| {
            tracing::debug!(%method, error = %e, "unresolved method");
        })?;

        let result = match AssertUnwindSafe(future).catch_unwind().await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(%method, "method panicked");
                Err(RpcError::internal(format!("method `{method}` panicked")))
            }
        };
        result.map_err(|e| self.redact(e))
    }

    fn redact(&self, error: RpcError) -> RpcError {
        if error.code == ErrorCode::InternalError && !self.config.expose_internal_errors {
            tracing::warn!(error = %error, "internal error hidden from peer");
            return RpcError::internal(ErrorCode::InternalError.name());
        }
        error
    }
}

/// Encodes `response`; when that fails, tries once more with an Internal
/// error addressed to the same id.
fn encode_reply<T>(
    response: Response,
    encode: impl Fn(&Response) -> Result<T, ProtocolError>,
) -> Option<T> {
    let error = match encode(&response) {
        Ok(encoded) => return Some(encoded),
        Err(e) => e,
    };
    tracing::error!(error = %error, "reply could not be encoded");

    let fallback = Response::failure(
        response.id().cloned(),
        RpcError::internal(format!("reply could not be encoded: {error}")),
    );
    match encode(&fallback) {
        Ok(encoded) => Some(encoded),
        Err(e) => {
            tracing::error!(error = %e, "dropping reply");
            None
        }
    }
}
