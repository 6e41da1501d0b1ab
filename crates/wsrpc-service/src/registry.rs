//! Service registry (process-wide) and service set (per connection).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use wsrpc_protocol::{Params, RpcError};

use crate::service::MethodFuture;
use crate::{ConnectionContext, MethodTable, Service, ServiceError};

/// Type-erased factory for one registered service type.
trait ServiceFactory: Send + Sync {
    fn methods(&self) -> &[String];
    fn instantiate(&self, context: &ConnectionContext) -> Box<dyn BoundService>;
}

/// Type-erased service instance bound to its method table.
trait BoundService: Send + Sync {
    fn call(&self, method: &str, params: Params) -> Option<MethodFuture>;
}

struct TypedFactory<S: Service> {
    table: Arc<MethodTable<S>>,
}

impl<S: Service> ServiceFactory for TypedFactory<S> {
    fn methods(&self) -> &[String] {
        self.table.names()
    }

    fn instantiate(&self, context: &ConnectionContext) -> Box<dyn BoundService> {
        Box::new(Bound {
            instance: Arc::new(S::create(context)),
            table: Arc::clone(&self.table),
        })
    }
}

struct Bound<S: Service> {
    instance: Arc<S>,
    table: Arc<MethodTable<S>>,
}

impl<S: Service> BoundService for Bound<S> {
    fn call(&self, method: &str, params: Params) -> Option<MethodFuture> {
        self.table.bind(&self.instance, method, params)
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('.')
}

/// Every service type exposed by a server.
///
/// Built once before serving; cheap to clone (the tables are shared).
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    factories: BTreeMap<String, Arc<dyn ServiceFactory>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `S`, building its method table.
    ///
    /// # Errors
    /// Rejects a name already taken, an empty or dotted service name, and
    /// empty, dotted or duplicated method names.
    pub fn register<S: Service>(&mut self) -> Result<&mut Self, ServiceError> {
        let name = S::NAME;
        if !is_valid_name(name) {
            return Err(ServiceError::InvalidServiceName(name.to_string()));
        }
        if self.factories.contains_key(name) {
            return Err(ServiceError::DuplicateService(name.to_string()));
        }

        let mut table = MethodTable::<S>::new();
        S::register(&mut table);

        if let Some(method) = table.duplicates().first() {
            return Err(ServiceError::DuplicateMethod {
                service: name.to_string(),
                method: method.clone(),
            });
        }
        if let Some(method) = table.names().iter().find(|m| !is_valid_name(m)) {
            return Err(ServiceError::InvalidMethodName {
                service: name.to_string(),
                method: method.clone(),
            });
        }

        tracing::debug!(
            service = name,
            methods = ?table.names(),
            "service registered"
        );
        self.factories.insert(
            name.to_string(),
            Arc::new(TypedFactory {
                table: Arc::new(table),
            }),
        );
        Ok(self)
    }

    /// Registered service names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// The RPC-exposed methods of `service`, in declaration order.
    pub fn exposed_methods(&self, service: &str) -> Option<&[String]> {
        self.factories.get(service).map(|f| f.methods())
    }

    pub fn contains(&self, service: &str) -> bool {
        self.factories.contains_key(service)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Creates a fresh instance of every service for one connection.
    pub fn instantiate(&self, context: &ConnectionContext) -> ServiceSet {
        let services = self
            .factories
            .iter()
            .map(|(name, factory)| (name.clone(), factory.instantiate(context)))
            .collect();
        ServiceSet { services }
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.factories.iter().map(|(name, factory)| (name, factory.methods())))
            .finish()
    }
}

/// The service instances serving one connection.
pub struct ServiceSet {
    services: HashMap<String, Box<dyn BoundService>>,
}

impl ServiceSet {
    /// Resolves `Service.method` and binds it to `params`.
    ///
    /// Anything that is not exactly two non-empty dot-separated parts, an
    /// unknown service, or a method the service does not expose, is the
    /// same Method not found error quoting `method` verbatim.
    pub fn resolve(&self, method: &str, params: Params) -> Result<MethodFuture, RpcError> {
        let mut parts = method.split('.');
        let (Some(service), Some(name), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(RpcError::method_not_found(method));
        };
        if service.is_empty() || name.is_empty() {
            return Err(RpcError::method_not_found(method));
        }

        self.services
            .get(service)
            .and_then(|bound| bound.call(name, params))
            .ok_or_else(|| RpcError::method_not_found(method))
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
