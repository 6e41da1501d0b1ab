//! Core protocol types for the JSON-RPC 2.0 envelope.
//!
//! Every message on a connection is exactly one of three shapes:
//!
//! ```text
//! Request:  { "jsonrpc": "2.0", "method": "Service.method", "params": {...}, "id": 1 }
//! Success:  { "jsonrpc": "2.0", "result": <any>, "id": 1 }
//! Failure:  { "jsonrpc": "2.0", "error": { "code": -32601, "message": "..." }, "id": 1 }
//! ```
//!
//! The shape is decided once, in [`Envelope::from_value`], and from then on
//! it is carried by the Rust type. Nobody downstream re-inspects keys.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::{ErrorCode, ProtocolError, RpcError};

/// The protocol version literal both peers agree on.
pub const JSONRPC_VERSION: &str = "2.0";

/// Named parameters of a call.
pub type Params = Map<String, Value>;

// ---------------------------------------------------------------------------
// Version marker
// ---------------------------------------------------------------------------

/// Zero-sized marker that always serializes as `"2.0"`.
///
/// Keeping it as a field (rather than a free string) makes it impossible to
/// build an envelope with a different version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Version;

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(JSONRPC_VERSION)
    }
}

// ---------------------------------------------------------------------------
// RequestId
// ---------------------------------------------------------------------------

/// Correlation token linking a request to its reply: an integer or a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl RequestId {
    /// Recovers an id from a decoded value. Floats, booleans, maps and
    /// integers outside `i64` are not ids.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(RequestId::Number),
            Value::String(s) => Some(RequestId::String(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

// ---------------------------------------------------------------------------
// Envelope variants
// ---------------------------------------------------------------------------

/// A call. Without an `id` it is a notification and gets no reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    pub jsonrpc: Version,
    pub method: String,
    pub params: Params,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
}

impl Request {
    pub fn new(method: impl Into<String>, params: Params, id: RequestId) -> Self {
        Self {
            jsonrpc: Version,
            method: method.into(),
            params,
            id: Some(id),
        }
    }

    pub fn notification(method: impl Into<String>, params: Params) -> Self {
        Self {
            jsonrpc: Version,
            method: method.into(),
            params,
            id: None,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// A successful reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Success {
    pub jsonrpc: Version,
    pub result: Value,
    pub id: RequestId,
}

/// An error reply. `id` is `null` when the request's id could not be
/// recovered (e.g. the payload did not parse).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub jsonrpc: Version,
    pub error: RpcError,
    pub id: Option<RequestId>,
}

/// Either kind of reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Success(Success),
    Failure(Failure),
}

impl Response {
    pub fn success(id: RequestId, result: Value) -> Self {
        Response::Success(Success {
            jsonrpc: Version,
            result,
            id,
        })
    }

    pub fn failure(id: Option<RequestId>, error: RpcError) -> Self {
        Response::Failure(Failure {
            jsonrpc: Version,
            error,
            id,
        })
    }

    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Response::Success(s) => Some(&s.id),
            Response::Failure(f) => f.id.as_ref(),
        }
    }

    /// The reply as the caller sees it.
    pub fn into_result(self) -> Result<Value, RpcError> {
        match self {
            Response::Success(s) => Ok(s.result),
            Response::Failure(f) => Err(f.error),
        }
    }
}

/// Any well-formed message: exactly one of Request, Success, Failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Envelope {
    Request(Request),
    Success(Success),
    Failure(Failure),
}

impl From<Request> for Envelope {
    fn from(request: Request) -> Self {
        Envelope::Request(request)
    }
}

impl From<Response> for Envelope {
    fn from(response: Response) -> Self {
        match response {
            Response::Success(s) => Envelope::Success(s),
            Response::Failure(f) => Envelope::Failure(f),
        }
    }
}

impl Envelope {
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Envelope::Request(r) => r.id.as_ref(),
            Envelope::Success(s) => Some(&s.id),
            Envelope::Failure(f) => f.id.as_ref(),
        }
    }

    /// Splits a reply off from a request.
    pub fn into_response(self) -> Result<Response, Request> {
        match self {
            Envelope::Request(r) => Err(r),
            Envelope::Success(s) => Ok(Response::Success(s)),
            Envelope::Failure(f) => Ok(Response::Failure(f)),
        }
    }

    /// Classifies a decoded value into an envelope.
    ///
    /// A missing `jsonrpc` member is tolerated; a different version is not.
    /// A `method` member makes it a request. Otherwise a non-null `error`
    /// member makes it a failure, else a `result` member makes it a
    /// success. Carrying both `result` and `error` (or either next to
    /// `method`) is a structural mix and rejected.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidEnvelope`] with whatever `id` could be
    /// recovered.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        use ErrorCode::{InvalidParams, InvalidRequest};

        let Value::Object(mut map) = value else {
            return Err(ProtocolError::invalid(
                None,
                InvalidRequest,
                "envelope must be a map",
            ));
        };

        let id = match map.remove("id") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(RequestId::from_value(&raw).ok_or_else(|| {
                ProtocolError::invalid(
                    None,
                    InvalidRequest,
                    format!("`id` must be an integer or a string, got {raw}"),
                )
            })?),
        };

        match map.remove("jsonrpc") {
            None => {}
            Some(Value::String(v)) if v == JSONRPC_VERSION => {}
            Some(other) => {
                return Err(ProtocolError::invalid(
                    id,
                    InvalidRequest,
                    format!("unsupported protocol version {other}"),
                ));
            }
        }

        let result = map.remove("result");
        let error = map.remove("error").filter(|e| !e.is_null());

        if let Some(method) = map.remove("method") {
            if result.is_some() || error.is_some() {
                return Err(ProtocolError::invalid(
                    id,
                    InvalidRequest,
                    "a request must not carry `result` or `error`",
                ));
            }
            let Value::String(method) = method else {
                return Err(ProtocolError::invalid(
                    id,
                    InvalidRequest,
                    "`method` must be a string",
                ));
            };
            let params = match map.remove("params") {
                None | Some(Value::Null) => Params::new(),
                Some(Value::Object(params)) => params,
                Some(_) => {
                    return Err(ProtocolError::invalid(
                        id,
                        InvalidParams,
                        "`params` must be a map of named arguments",
                    ));
                }
            };
            return Ok(Envelope::Request(Request {
                jsonrpc: Version,
                method,
                params,
                id,
            }));
        }

        match (result, error) {
            (Some(_), Some(_)) => Err(ProtocolError::invalid(
                id,
                InvalidRequest,
                "a response must not carry both `result` and `error`",
            )),
            (_, Some(error)) => {
                let error: RpcError = serde_json::from_value(error).map_err(|e| {
                    ProtocolError::invalid(
                        id.clone(),
                        InvalidRequest,
                        format!("malformed `error` member: {e}"),
                    )
                })?;
                Ok(Envelope::Failure(Failure {
                    jsonrpc: Version,
                    error,
                    id,
                }))
            }
            (Some(result), None) => {
                let id = id.ok_or_else(|| {
                    ProtocolError::invalid(
                        None,
                        InvalidRequest,
                        "a success response must carry an `id`",
                    )
                })?;
                Ok(Envelope::Success(Success {
                    jsonrpc: Version,
                    result,
                    id,
                }))
            }
            (None, None) => Err(ProtocolError::invalid(
                id,
                InvalidRequest,
                "neither `method`, `result` nor `error` present",
            )),
        }
    }

    /// The envelope as a generic value (the shape both encodings carry).
    pub fn to_value(&self) -> Result<Value, ProtocolError> {
        serde_json::to_value(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }
}

impl<'de> Deserialize<'de> for Envelope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Envelope::from_value(value).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
