//! The JSON-RPC 2.0 error taxonomy.
//!
//! Codes are reproduced exactly from the JSON-RPC 2.0 specification
//! (<https://www.jsonrpc.org/specification#error_object>) so any conforming
//! peer understands them:
//!
//! | Code             | Meaning          |
//! |------------------|------------------|
//! | -32700           | Parse error      |
//! | -32600           | Invalid Request  |
//! | -32601           | Method not found |
//! | -32602           | Invalid params   |
//! | -32603           | Internal error   |
//! | -32099..=-32000  | Server error     |

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// Lowest code of the implementation-defined server error range.
pub const SERVER_ERROR_MIN: i32 = -32099;
/// Highest code of the implementation-defined server error range.
pub const SERVER_ERROR_MAX: i32 = -32000;

/// A code inside the reserved server-error range.
///
/// The field is private so an out-of-range value can never be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServerErrorCode(i32);

impl ServerErrorCode {
    /// Returns `None` unless `code` lies in `-32099..=-32000`.
    pub fn new(code: i32) -> Option<Self> {
        (SERVER_ERROR_MIN..=SERVER_ERROR_MAX)
            .contains(&code)
            .then_some(Self(code))
    }

    pub fn get(self) -> i32 {
        self.0
    }
}

/// One of the fixed taxonomy classes.
///
/// On the wire this is just the integer (`#[serde(into, try_from)]`), and
/// decoding any integer outside the taxonomy fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    ServerError(ServerErrorCode),
}

impl ErrorCode {
    /// The integer carried on the wire.
    pub fn code(self) -> i32 {
        match self {
            ErrorCode::ParseError => PARSE_ERROR,
            ErrorCode::InvalidRequest => INVALID_REQUEST,
            ErrorCode::MethodNotFound => METHOD_NOT_FOUND,
            ErrorCode::InvalidParams => INVALID_PARAMS,
            ErrorCode::InternalError => INTERNAL_ERROR,
            ErrorCode::ServerError(code) => code.get(),
        }
    }

    /// The canonical short name of the class.
    pub fn name(self) -> &'static str {
        match self {
            ErrorCode::ParseError => "Parse error",
            ErrorCode::InvalidRequest => "Invalid Request",
            ErrorCode::MethodNotFound => "Method not found",
            ErrorCode::InvalidParams => "Invalid params",
            ErrorCode::InternalError => "Internal error",
            ErrorCode::ServerError(_) => "Server error",
        }
    }
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

impl TryFrom<i32> for ErrorCode {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            PARSE_ERROR => Ok(ErrorCode::ParseError),
            INVALID_REQUEST => Ok(ErrorCode::InvalidRequest),
            METHOD_NOT_FOUND => Ok(ErrorCode::MethodNotFound),
            INVALID_PARAMS => Ok(ErrorCode::InvalidParams),
            INTERNAL_ERROR => Ok(ErrorCode::InternalError),
            other => ServerErrorCode::new(other)
                .map(ErrorCode::ServerError)
                .ok_or_else(|| format!("{other} is not a JSON-RPC error code")),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// The single fault value that crosses the dispatch boundary.
///
/// It is also the wire form of the `error` member of an error envelope:
/// `{"code": -32601, "message": "...", "data": ...}` with `data` omitted
/// when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct RpcError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attaches structured detail to the error.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn parse_error(detail: impl fmt::Display) -> Self {
        Self::new(ErrorCode::ParseError, format!("Parse error: {detail}"))
    }

    pub fn invalid_request(reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::InvalidRequest,
            format!("Invalid Request: {reason}"),
        )
    }

    /// ``Method `Service.method` not found``, quoting `method` verbatim.
    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            ErrorCode::MethodNotFound,
            format!("Method `{method}` not found"),
        )
    }

    pub fn invalid_params(reason: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InvalidParams, format!("Invalid params: {reason}"))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn server_error(code: ServerErrorCode, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServerError(code), message)
    }
}
