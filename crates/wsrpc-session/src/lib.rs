//! Connection session management for wsrpc.
//!
//! This crate tracks the live connections of a server and builds the
//! dispatch context each one is served with:
//!
//! 1. **Open**: a connection is registered and gets a [`Dispatcher`] over
//!    fresh service instances ([`SessionManager::open`]).
//! 2. **Close**: the connection is deregistered and its record returned
//!    ([`SessionManager::close`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)       ← one message loop per connection
//!     ↕
//! Session Layer (this crate)  ← live-connection set, dispatch contexts
//!     ↕
//! Service Layer (below)       ← registry, dispatcher
//! ```
//!
//! [`Dispatcher`]: wsrpc_service::Dispatcher

mod error;
mod manager;
mod session;

pub use error::SessionError;
pub use manager::SessionManager;
pub use session::{Session, SessionConfig};
