//! Route registration and the route table.
//!
//! # Responsibilities
//! - Validate endpoint declarations at registration time
//! - Expand every endpoint under every responder prefix into a route entry
//! - Keep route entries in registration order
//! - Remove a responder together with all of its routes
//!
//! # Design Decisions
//! - The table is an immutable snapshot swapped atomically; dispatch never
//!   takes a lock, registration serialises on a writer mutex
//! - Registration is all-or-nothing: a responder with one invalid endpoint
//!   adds no routes
//! - Responder identity is the address of its `Arc`

use std::any::Any;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use axum::http::Method;
use thiserror::Error;

use crate::binding::{Arguments, ParamKind};
use crate::dispatch::hooks::EndpointEvent;
use crate::routing::endpoint::{HandlerResult, Param, Responder};
use crate::routing::pattern::{PathPattern, PatternCache};

/// Registration-time failures. These are programming errors and abort startup.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("responder {responder} declares no path prefixes and cannot be routed")]
    NotRoutable { responder: String },

    #[error("multiple placeholders named '{name}' in path pattern '{pattern}'")]
    DuplicatePlaceholder { name: String, pattern: String },

    #[error("endpoint {endpoint} ('{pattern}') declares parameter '{name}' more than once")]
    DuplicateParameter {
        endpoint: String,
        pattern: String,
        name: String,
    },

    #[error("endpoint {endpoint} ('{pattern}') does not handle argument '{name}': it is neither captured nor defaulted")]
    UnboundParameter {
        endpoint: String,
        pattern: String,
        name: String,
    },

    #[error("endpoint {endpoint} declares a {found} default for {expected} parameter '{name}'")]
    DefaultType {
        endpoint: String,
        name: String,
        expected: ParamKind,
        found: &'static str,
    },

    #[error("path pattern '{pattern}' failed to compile: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("registry lock poisoned")]
    Poisoned,
}

/// Opaque identity of a registered responder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResponderId(usize);

impl ResponderId {
    pub fn of<R>(responder: &Arc<R>) -> Self {
        Self(Arc::as_ptr(responder) as *const () as usize)
    }
}

type Invoker<C> = Arc<dyn Fn(&mut C, &Arguments) -> HandlerResult + Send + Sync>;

/// The compiled representation of one endpoint under one prefix.
pub struct RouteEntry<C> {
    pattern: PathPattern,
    method: Option<Method>,
    params: Arc<[Param]>,
    responder: ResponderId,
    responder_name: Arc<str>,
    endpoint_name: Arc<str>,
    invoke: Invoker<C>,
}

impl<C> RouteEntry<C> {
    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    /// Required HTTP method, `None` for any.
    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn responder(&self) -> ResponderId {
        self.responder
    }

    pub fn responder_name(&self) -> &str {
        &self.responder_name
    }

    pub fn endpoint_name(&self) -> &str {
        &self.endpoint_name
    }

    pub(crate) fn event(&self) -> EndpointEvent<'_> {
        EndpointEvent {
            responder: &self.responder_name,
            endpoint: &self.endpoint_name,
            pattern: self.pattern.source(),
        }
    }

    pub(crate) fn call(&self, ctx: &mut C, args: &Arguments) -> HandlerResult {
        (self.invoke)(ctx, args)
    }

    pub fn info(&self) -> RouteInfo {
        RouteInfo {
            pattern: self.pattern.source().to_string(),
            method: self.method.clone(),
            responder: self.responder_name.to_string(),
            endpoint: self.endpoint_name.to_string(),
        }
    }
}

/// Description of a registered route, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    pub pattern: String,
    pub method: Option<Method>,
    pub responder: String,
    pub endpoint: String,
}

#[derive(Clone)]
struct RegisteredResponder {
    id: ResponderId,
    // Keeps the responder alive while its routes are registered.
    _instance: Arc<dyn Any + Send + Sync>,
}

/// Immutable snapshot of the registered responders and their routes.
pub struct RouteTable<C> {
    responders: Vec<RegisteredResponder>,
    routes: Vec<Arc<RouteEntry<C>>>,
}

impl<C> RouteTable<C> {
    fn empty() -> Self {
        Self {
            responders: Vec::new(),
            routes: Vec::new(),
        }
    }

    /// Routes in registration order.
    pub fn routes(&self) -> &[Arc<RouteEntry<C>>] {
        &self.routes
    }

    pub fn responder_count(&self) -> usize {
        self.responders.len()
    }

    fn contains(&self, id: ResponderId) -> bool {
        self.responders.iter().any(|r| r.id == id)
    }
}

/// Ordered set of routes built from registered responders.
pub struct RouteRegistry<C> {
    table: ArcSwap<RouteTable<C>>,
    patterns: PatternCache,
    writer: Mutex<()>,
}

impl<C: 'static> Default for RouteRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: 'static> RouteRegistry<C> {
    pub fn new() -> Self {
        Self {
            table: ArcSwap::from_pointee(RouteTable::empty()),
            patterns: PatternCache::new(),
            writer: Mutex::new(()),
        }
    }

    /// Register a responder and all of its endpoints.
    ///
    /// Returns `Ok(false)` if this exact responder instance is already
    /// registered (no-op).
    pub fn add_responder<R: Responder<C>>(&self, responder: Arc<R>) -> Result<bool, RegistrationError> {
        let _writer = self.writer.lock().map_err(|_| RegistrationError::Poisoned)?;
        let id = ResponderId::of(&responder);
        let current = self.table.load_full();
        if current.contains(id) {
            tracing::debug!(responder = responder.name(), "Responder already registered");
            return Ok(false);
        }

        let entries = self.build_entries(&responder, id)?;
        let added = entries.len();

        let mut responders = current.responders.clone();
        responders.push(RegisteredResponder {
            id,
            _instance: responder.clone(),
        });
        let mut routes = current.routes.clone();
        routes.extend(entries);

        self.table.store(Arc::new(RouteTable { responders, routes }));
        tracing::info!(responder = responder.name(), routes = added, "Responder registered");
        Ok(true)
    }

    /// Unregister a responder and every route referencing it.
    ///
    /// Returns whether the responder was registered.
    pub fn remove_responder<R>(&self, responder: &Arc<R>) -> bool {
        let Ok(_writer) = self.writer.lock() else {
            tracing::error!("Registry lock poisoned; responder not removed");
            return false;
        };
        let id = ResponderId::of(responder);
        let current = self.table.load_full();
        if !current.contains(id) {
            return false;
        }

        let responders = current
            .responders
            .iter()
            .filter(|r| r.id != id)
            .cloned()
            .collect();
        let routes: Vec<_> = current
            .routes
            .iter()
            .filter(|route| route.responder != id)
            .cloned()
            .collect();
        let removed = current.routes.len() - routes.len();

        self.table.store(Arc::new(RouteTable { responders, routes }));
        tracing::info!(routes = removed, "Responder removed");
        true
    }

    /// Current route table. Dispatch holds one snapshot per request.
    pub fn snapshot(&self) -> Arc<RouteTable<C>> {
        self.table.load_full()
    }

    pub fn routes(&self) -> Vec<RouteInfo> {
        self.table.load().routes.iter().map(|r| r.info()).collect()
    }

    pub fn route_count(&self) -> usize {
        self.table.load().routes.len()
    }

    pub fn responder_count(&self) -> usize {
        self.table.load().responders.len()
    }

    pub fn patterns(&self) -> &PatternCache {
        &self.patterns
    }

    fn build_entries<R: Responder<C>>(
        &self,
        responder: &Arc<R>,
        id: ResponderId,
    ) -> Result<Vec<Arc<RouteEntry<C>>>, RegistrationError> {
        let responder_name: Arc<str> = Arc::from(responder.name());
        let prefixes = responder.prefixes();
        if prefixes.is_empty() {
            return Err(RegistrationError::NotRoutable {
                responder: responder_name.to_string(),
            });
        }

        let mut entries = Vec::new();
        for endpoint in responder.endpoints() {
            let params: Arc<[Param]> = Arc::from(endpoint.params);
            let endpoint_name: Arc<str> = Arc::from(endpoint.name.as_str());
            let handler = endpoint.handler;
            let owner = Arc::clone(responder);
            let invoke: Invoker<C> = Arc::new(move |ctx: &mut C, args: &Arguments| handler(&*owner, ctx, args));

            for prefix in &prefixes {
                let pattern = self.patterns.compile(prefix, &endpoint.path)?;
                validate_params(&pattern, &params, &endpoint_name)?;

                tracing::debug!(
                    responder = %responder_name,
                    endpoint = %endpoint_name,
                    pattern = pattern.source(),
                    method = ?endpoint.method,
                    "Route compiled"
                );
                entries.push(Arc::new(RouteEntry {
                    pattern,
                    method: endpoint.method.clone(),
                    params: Arc::clone(&params),
                    responder: id,
                    responder_name: Arc::clone(&responder_name),
                    endpoint_name: Arc::clone(&endpoint_name),
                    invoke: Arc::clone(&invoke),
                }));
            }
        }
        Ok(entries)
    }
}

/// Every parameter must be unique and either captured or defaulted, and a
/// default must fit the parameter's kind.
fn validate_params(pattern: &PathPattern, params: &[Param], endpoint: &str) -> Result<(), RegistrationError> {
    let mut seen = HashSet::new();
    for param in params {
        if !seen.insert(param.name()) {
            return Err(RegistrationError::DuplicateParameter {
                endpoint: endpoint.to_string(),
                pattern: pattern.source().to_string(),
                name: param.name().to_string(),
            });
        }
        match param.default() {
            Some(default) if !param.kind().accepts(default) => {
                return Err(RegistrationError::DefaultType {
                    endpoint: endpoint.to_string(),
                    name: param.name().to_string(),
                    expected: param.kind(),
                    found: default.type_name(),
                });
            }
            None if !pattern.has_placeholder(param.name()) => {
                return Err(RegistrationError::UnboundParameter {
                    endpoint: endpoint.to_string(),
                    pattern: pattern.source().to_string(),
                    name: param.name().to_string(),
                });
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::endpoint::Endpoint;

    struct Ctx;

    struct Plain;

    impl Plain {
        fn ok(&self, _: &mut Ctx, _: &Arguments) -> HandlerResult {
            Ok(())
        }
    }

    impl Responder<Ctx> for Plain {
        fn endpoints(&self) -> Vec<Endpoint<Self, Ctx>> {
            vec![
                Endpoint::get("/a/{id}", Self::ok).param(Param::int("id")),
                Endpoint::new("/b", Self::ok),
            ]
        }
    }

    struct Prefixed;

    impl Responder<Ctx> for Prefixed {
        fn prefixes(&self) -> Vec<String> {
            vec![String::new(), "/v1".to_string(), "v2/".to_string()]
        }

        fn endpoints(&self) -> Vec<Endpoint<Self, Ctx>> {
            vec![Endpoint::new("/ping", |_: &Self, _: &mut Ctx, _: &Arguments| Ok(()))]
        }
    }

    struct Unbound;

    impl Responder<Ctx> for Unbound {
        fn endpoints(&self) -> Vec<Endpoint<Self, Ctx>> {
            vec![
                Endpoint::new("/fine", |_: &Self, _: &mut Ctx, _: &Arguments| Ok(())),
                Endpoint::new("/x/{a}", |_: &Self, _: &mut Ctx, _: &Arguments| Ok(()))
                    .param(Param::int("a"))
                    .param(Param::int("b")),
            ]
        }
    }

    struct Unroutable;

    impl Responder<Ctx> for Unroutable {
        fn prefixes(&self) -> Vec<String> {
            Vec::new()
        }

        fn endpoints(&self) -> Vec<Endpoint<Self, Ctx>> {
            Vec::new()
        }
    }

    #[test]
    fn test_add_and_list_routes() {
        let registry = RouteRegistry::<Ctx>::new();
        assert!(registry.add_responder(Arc::new(Plain)).unwrap());

        let routes = registry.routes();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].pattern, "/a/{id}");
        assert_eq!(routes[0].method, Some(Method::GET));
        assert_eq!(routes[1].pattern, "/b");
        assert_eq!(routes[1].method, None);
        assert_eq!(registry.responder_count(), 1);
    }

    #[test]
    fn test_same_instance_registered_once() {
        let registry = RouteRegistry::<Ctx>::new();
        let responder = Arc::new(Plain);
        assert!(registry.add_responder(responder.clone()).unwrap());
        assert!(!registry.add_responder(responder.clone()).unwrap());
        assert_eq!(registry.route_count(), 2);

        // A distinct instance of the same type is a separate responder.
        assert!(registry.add_responder(Arc::new(Plain)).unwrap());
        assert_eq!(registry.route_count(), 4);
    }

    #[test]
    fn test_every_prefix_gets_a_route() {
        let registry = RouteRegistry::<Ctx>::new();
        registry.add_responder(Arc::new(Prefixed)).unwrap();
        let patterns: Vec<String> = registry.routes().into_iter().map(|r| r.pattern).collect();
        assert_eq!(patterns, ["/ping", "/v1/ping", "/v2/ping"]);
    }

    #[test]
    fn test_unbound_parameter_adds_nothing() {
        let registry = RouteRegistry::<Ctx>::new();
        let err = registry.add_responder(Arc::new(Unbound)).unwrap_err();
        assert!(matches!(err, RegistrationError::UnboundParameter { ref name, .. } if name == "b"));
        assert_eq!(registry.route_count(), 0);
        assert_eq!(registry.responder_count(), 0);
    }

    #[test]
    fn test_no_prefixes_rejected() {
        let registry = RouteRegistry::<Ctx>::new();
        let err = registry.add_responder(Arc::new(Unroutable)).unwrap_err();
        assert!(matches!(err, RegistrationError::NotRoutable { .. }));
    }

    #[test]
    fn test_remove_responder() {
        let registry = RouteRegistry::<Ctx>::new();
        let plain = Arc::new(Plain);
        let prefixed = Arc::new(Prefixed);
        registry.add_responder(plain.clone()).unwrap();
        registry.add_responder(prefixed.clone()).unwrap();
        assert_eq!(registry.route_count(), 5);

        assert!(registry.remove_responder(&plain));
        assert_eq!(registry.route_count(), 3);
        assert_eq!(registry.responder_count(), 1);
        assert!(!registry.remove_responder(&plain));

        // Re-adding after removal works.
        assert!(registry.add_responder(plain).unwrap());
        assert_eq!(registry.route_count(), 5);
    }

    #[test]
    fn test_snapshot_unaffected_by_later_registration() {
        let registry = RouteRegistry::<Ctx>::new();
        let before = registry.snapshot();
        registry.add_responder(Arc::new(Plain)).unwrap();
        assert!(before.routes().is_empty());
        assert_eq!(registry.snapshot().routes().len(), 2);
    }
}
