//! Error types for service registration.

/// Errors raised while building a [`ServiceRegistry`](crate::ServiceRegistry).
///
/// Registration happens once, before the first connection, so these are
/// configuration mistakes rather than runtime faults.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Two services were registered under the same name.
    #[error("service `{0}` is already registered")]
    DuplicateService(String),

    /// A service name is empty or contains `.`, so no `Service.method`
    /// string could ever reach it.
    #[error("invalid service name `{0}`")]
    InvalidServiceName(String),

    /// A method name is empty or contains `.`.
    #[error("invalid method name `{method}` on service `{service}`")]
    InvalidMethodName { service: String, method: String },

    /// The same method name was exposed twice on one service.
    #[error("method `{method}` exposed twice on service `{service}`")]
    DuplicateMethod { service: String, method: String },
}
