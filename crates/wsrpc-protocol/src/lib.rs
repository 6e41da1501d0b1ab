//! Wire protocol for wsrpc.
//!
//! This crate defines the JSON-RPC 2.0 "language" both peers speak:
//!
//! - **Types** ([`Envelope`], [`Request`], [`Response`], [`RequestId`]):
//!   the message structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`], [`MsgPackCodec`],
//!   [`Encoding`]): how those messages become bytes in text or binary
//!   frames.
//! - **Taxonomy** ([`ErrorCode`], [`RpcError`]): the fixed JSON-RPC error
//!   classes and the fault value carrying them.
//! - **Errors** ([`ProtocolError`]): what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! ```text
//! Transport (frames) → Protocol (Envelope) → Service dispatch
//! ```
//!
//! The protocol layer knows nothing about connections or services; it only
//! turns bytes into envelopes and back.

mod codec;
mod error;
mod fault;
mod types;

pub use codec::{Codec, Encoding, JsonCodec, MsgPackCodec};
pub use error::ProtocolError;
pub use fault::{
    ErrorCode, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND,
    PARSE_ERROR, RpcError, SERVER_ERROR_MAX, SERVER_ERROR_MIN, ServerErrorCode,
};
pub use types::{
    Envelope, Failure, JSONRPC_VERSION, Params, Request, RequestId, Response,
    Success, Version,
};
