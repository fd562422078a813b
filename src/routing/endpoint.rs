//! Responder and endpoint declarations.
//!
//! Responders enumerate their endpoints explicitly: each [`Endpoint`] carries
//! the path pattern, the optional required method and the handler's formal
//! parameters (name, type, default) that the registry validates and the
//! dispatcher binds.

use std::fmt;
use std::sync::Arc;

use axum::http::Method;

use crate::binding::{Arguments, ParamKind, Value};
use crate::dispatch::HandlerError;

/// Result of an endpoint handler.
pub type HandlerResult = Result<(), HandlerError>;

pub(crate) type HandlerFn<R, C> = Arc<dyn Fn(&R, &mut C, &Arguments) -> HandlerResult + Send + Sync>;

/// An object owning request-handling procedures.
///
/// Implementing this trait marks a type as eligible for registration with a
/// [`RouteRegistry`](crate::routing::RouteRegistry).
pub trait Responder<C>: Send + Sync + Sized + 'static {
    /// Name used in logs and route listings.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Path prefixes every endpoint is mounted under.
    ///
    /// The empty string mounts without a prefix. A responder returning no
    /// prefixes at all cannot be routed and is rejected at registration.
    fn prefixes(&self) -> Vec<String> {
        vec![String::new()]
    }

    /// The endpoints this responder serves.
    fn endpoints(&self) -> Vec<Endpoint<Self, C>>;
}

/// A formal parameter of an endpoint handler (after the context).
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    name: String,
    kind: ParamKind,
    default: Option<Value>,
}

impl Param {
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Str)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Int)
    }

    pub fn long(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Long)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Float)
    }

    pub fn double(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Double)
    }

    pub fn decimal(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Decimal)
    }

    /// A parameter of a type only a parse-value hook can produce.
    pub fn custom(name: impl Into<String>, type_name: &'static str) -> Self {
        Self::new(name, ParamKind::Custom(type_name))
    }

    /// Value used when the pattern does not capture this parameter.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Shorthand for a `Null` default.
    pub fn optional(mut self) -> Self {
        self.default = Some(Value::Null);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ParamKind {
        self.kind
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

/// One (path pattern, optional method) declaration bound to a handler.
pub struct Endpoint<R, C> {
    pub(crate) name: String,
    pub(crate) path: String,
    pub(crate) method: Option<Method>,
    pub(crate) params: Vec<Param>,
    pub(crate) handler: HandlerFn<R, C>,
}

impl<R, C> Endpoint<R, C> {
    /// Endpoint answering any method at `path`.
    pub fn new<F>(path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&R, &mut C, &Arguments) -> HandlerResult + Send + Sync + 'static,
    {
        let path = path.into();
        Self {
            name: path.clone(),
            path,
            method: None,
            params: Vec::new(),
            handler: Arc::new(handler),
        }
    }

    pub fn get<F>(path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&R, &mut C, &Arguments) -> HandlerResult + Send + Sync + 'static,
    {
        Self::new(path, handler).method(Method::GET)
    }

    pub fn post<F>(path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&R, &mut C, &Arguments) -> HandlerResult + Send + Sync + 'static,
    {
        Self::new(path, handler).method(Method::POST)
    }

    pub fn put<F>(path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&R, &mut C, &Arguments) -> HandlerResult + Send + Sync + 'static,
    {
        Self::new(path, handler).method(Method::PUT)
    }

    pub fn delete<F>(path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&R, &mut C, &Arguments) -> HandlerResult + Send + Sync + 'static,
    {
        Self::new(path, handler).method(Method::DELETE)
    }

    /// Restrict the endpoint to one HTTP method.
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Name used in logs, hook events and route listings. Defaults to the path.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Declare the next formal parameter.
    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn required_method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }
}

impl<R, C> fmt::Debug for Endpoint<R, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("method", &self.method)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
