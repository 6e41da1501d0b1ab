//! The `Service` trait and its static method table.
//!
//! A service is a named group of callables. Only what a service adds to its
//! [`MethodTable`] is reachable over the wire: helpers, constructors and any
//! other inherent method stay private no matter what a peer asks for.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use serde::Deserialize;
//! use wsrpc_service::{ConnectionContext, MethodTable, RpcError, Service};
//!
//! struct Printer;
//!
//! #[derive(Deserialize)]
//! struct PrintParams {
//!     #[serde(default)]
//!     text: String,
//! }
//!
//! impl Printer {
//!     fn print(&self, text: &str) -> String {
//!         format!("Text `{text}` has been printed")
//!     }
//!
//!     // Not in the table, so not callable remotely.
//!     fn firmware_version(&self) -> &'static str {
//!         "3.1.459"
//!     }
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
//!         methods.sync_method("print", |printer: &Printer, p: PrintParams| {
//!             Ok::<_, RpcError>(printer.print(&p.text))
//!         });
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use wsrpc_protocol::{Params, RpcError};

use crate::ConnectionContext;

/// Any error a method body may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The erased, already-bound invocation of one method.
pub type MethodFuture = BoxFuture<'static, Result<Value, RpcError>>;

pub(crate) type Handler<S> = Arc<dyn Fn(Arc<S>, Params) -> MethodFuture + Send + Sync>;

/// A service type that can be exposed for dispatch.
///
/// One instance is created per connection (so it may carry per-connection
/// state such as the caller's identity); the method table is built once per
/// type, at registration.
pub trait Service: Sized + Send + Sync + 'static {
    /// Name used as the `Service` part of `Service.method`. Must be
    /// non-empty and contain no `.`.
    const NAME: &'static str;

    /// Builds the instance serving one connection.
    fn create(context: &ConnectionContext) -> Self;

    /// Declares the RPC-exposed methods.
    fn register(methods: &mut MethodTable<Self>);
}

/// Parameters of a method that takes none. Extra keys are ignored.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct NoParams {}

/// The exposed surface of one service type: method name → typed callable.
pub struct MethodTable<S> {
    methods: HashMap<String, Handler<S>>,
    order: Vec<String>,
    duplicates: Vec<String>,
}

impl<S> Default for MethodTable<S> {
    fn default() -> Self {
        Self {
            methods: HashMap::new(),
            order: Vec::new(),
            duplicates: Vec::new(),
        }
    }
}

impl<S: Service> MethodTable<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exposes an async method.
    ///
    /// `params` is decoded from the request's named parameters into `P`;
    /// a decode failure answers Invalid params. The returned error is sent
    /// unchanged when it is an [`RpcError`], and as Internal error carrying
    /// its message otherwise.
    pub fn method<P, R, E, F, Fut>(&mut self, name: &str, handler: F) -> &mut Self
    where
        P: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        E: Into<BoxError> + Send + 'static,
        F: Fn(Arc<S>, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let erased: Handler<S> = Arc::new(move |service: Arc<S>, params: Params| {
            let handler = Arc::clone(&handler);
            let call = async move {
                let params = decode_params::<P>(params)?;
                let output = handler(service, params).await.map_err(into_rpc_error)?;
                encode_result(&output)
            };
            Box::pin(call) as MethodFuture
        });
        self.insert(name, erased)
    }

    /// Exposes a synchronous method. Same parameter and error rules as
    /// [`method`](Self::method).
    pub fn sync_method<P, R, E, F>(&mut self, name: &str, handler: F) -> &mut Self
    where
        P: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        E: Into<BoxError> + Send + 'static,
        F: Fn(&S, P) -> Result<R, E> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        let erased: Handler<S> = Arc::new(move |service: Arc<S>, params: Params| {
            let handler = Arc::clone(&handler);
            let call = async move {
                let params = decode_params::<P>(params)?;
                let output = handler(&service, params).map_err(into_rpc_error)?;
                encode_result(&output)
            };
            Box::pin(call) as MethodFuture
        });
        self.insert(name, erased)
    }

    fn insert(&mut self, name: &str, handler: Handler<S>) -> &mut Self {
        if self.methods.insert(name.to_string(), handler).is_some() {
            self.duplicates.push(name.to_string());
        } else {
            self.order.push(name.to_string());
        }
        self
    }

    /// Exposed method names, in declaration order.
    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub(crate) fn duplicates(&self) -> &[String] {
        &self.duplicates
    }

    /// Binds `name` to `instance`, or `None` when the name is not exposed.
    pub(crate) fn bind(
        &self,
        instance: &Arc<S>,
        name: &str,
        params: Params,
    ) -> Option<MethodFuture> {
        self.methods
            .get(name)
            .map(|handler| handler(Arc::clone(instance), params))
    }
}

fn decode_params<P: DeserializeOwned>(params: Params) -> Result<P, RpcError> {
    serde_json::from_value(Value::Object(params)).map_err(RpcError::invalid_params)
}

fn encode_result<R: Serialize>(output: &R) -> Result<Value, RpcError> {
    serde_json::to_value(output)
        .map_err(|e| RpcError::internal(format!("result is not serializable: {e}")))
}

/// Keeps taxonomy errors as they are, wraps everything else as Internal.
pub(crate) fn into_rpc_error<E: Into<BoxError>>(error: E) -> RpcError {
    match error.into().downcast::<RpcError>() {
        Ok(rpc) => *rpc,
        Err(other) => RpcError::internal(other.to_string()),
    }
}
