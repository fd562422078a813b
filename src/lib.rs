//! Route-matching and request-dispatch engine.
//!
//! Responders declare endpoints (path pattern, optional method, typed
//! parameters); the [`Dispatcher`] matches each request against them in
//! registration order, binds path parameters and invokes the handler, with
//! hook chains at every phase and default 404/500 responses.

pub mod binding;
pub mod config;
pub mod demo;
pub mod dispatch;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use binding::{Arguments, ParamKind, Value};
pub use config::DispatcherConfig;
pub use dispatch::{Dispatcher, Flow, HandlerError, Outcome, ParseOutcome, RequestContext};
pub use http::{HttpContext, HttpServer};
pub use lifecycle::Shutdown;
pub use routing::{Endpoint, HandlerResult, Param, RegistrationError, Responder};
