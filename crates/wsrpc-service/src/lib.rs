//! Services and dispatch for wsrpc.
//!
//! A server exposes a set of named services. Each service type declares a
//! static [`MethodTable`]; a [`ServiceRegistry`] collects those types once,
//! and every connection gets its own [`ServiceSet`] (fresh instances built
//! from a [`ConnectionContext`]) wrapped in a [`Dispatcher`].
//!
//! ```text
//! ServiceRegistry ──instantiate(ctx)──► ServiceSet ──► Dispatcher
//!   (per process)                       (per connection)
//! ```
//!
//! The dispatcher turns `Service.method` strings into calls. Anything not
//! in a method table is unreachable, whatever else the service type
//! implements.

mod context;
mod dispatcher;
mod error;
mod registry;
mod service;

pub use context::ConnectionContext;
pub use dispatcher::{CLOSE_REQUEST, DispatchConfig, Dispatcher, Outcome};
pub use error::ServiceError;
pub use registry::{ServiceRegistry, ServiceSet};
pub use service::{BoxError, MethodFuture, MethodTable, NoParams, Service};

pub use wsrpc_protocol::{ErrorCode, Params, RpcError};
