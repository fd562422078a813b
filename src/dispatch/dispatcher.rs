//! Per-request dispatch state machine.
//!
//! # Data Flow
//! ```text
//! Received  → request-received hooks
//! Matching  → scan route snapshot in registration order
//!           → method mismatch: remember method, keep scanning
//! Binding   → decode, parse-value hooks, coerce
//!           → coercion failure: fall through to the next route
//! Invoking  → calling-endpoint hooks, handler
//!           → handler error/panic: responder-exception hooks, else 500
//! Unhandled → unhandled-request hooks (with available methods), else 404
//! ```
//!
//! Any failure of the machinery itself (bad URL, invalid UTF-8, unknown
//! parameter type, a panicking hook) goes to the distribution-exception hooks,
//! else 500.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;

use crate::binding::{coerce, url_decode, Arguments, Coercion, Value};
use crate::dispatch::context::RequestContext;
use crate::dispatch::error::{panic_message, DispatchError, HandlerError};
use crate::dispatch::fallback;
use crate::dispatch::hooks::{
    EndpointEvent, Flow, Hooks, ParseOutcome, ParseValueEvent, ResponderFailure, UnhandledRequest,
};
use crate::observability::metrics;
use crate::routing::{RegistrationError, Responder, RouteEntry, RouteInfo, RouteRegistry};

/// Hook phase that short-circuited a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    RequestReceived,
    ParseValue,
    CallingEndpoint,
}

/// How a dispatched request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A handler ran successfully.
    Completed,
    /// A hook responded and stopped processing.
    Intercepted(Phase),
    /// A handler failed; a hook or the default 500 answered.
    ResponderFailed,
    /// No route served the request; a hook or the default 404 answered.
    Unhandled,
    /// The dispatch machinery failed; a hook or the default 500 answered.
    DistributionFailed,
}

impl Outcome {
    /// Metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Completed => "completed",
            Outcome::Intercepted(_) => "intercepted",
            Outcome::ResponderFailed => "responder_failed",
            Outcome::Unhandled => "unhandled",
            Outcome::DistributionFailed => "distribution_failed",
        }
    }
}

enum Binding {
    Bound(Arguments),
    /// A fragment did not coerce; try the next route.
    Mismatch,
    Responded,
}

/// Routes requests to registered responders.
pub struct Dispatcher<C: RequestContext> {
    registry: RouteRegistry<C>,
    hooks: ArcSwap<Hooks<C>>,
}

impl<C: RequestContext> Default for Dispatcher<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: RequestContext> Dispatcher<C> {
    pub fn new() -> Self {
        Self {
            registry: RouteRegistry::new(),
            hooks: ArcSwap::from_pointee(Hooks::new()),
        }
    }

    /// Register a responder. `Ok(false)` if it was already registered.
    pub fn add_responder<R: Responder<C>>(&self, responder: Arc<R>) -> Result<bool, RegistrationError> {
        self.registry.add_responder(responder)
    }

    /// Unregister a responder and all of its routes.
    pub fn remove_responder<R>(&self, responder: &Arc<R>) -> bool {
        self.registry.remove_responder(responder)
    }

    pub fn routes(&self) -> Vec<RouteInfo> {
        self.registry.routes()
    }

    pub fn responder_count(&self) -> usize {
        self.registry.responder_count()
    }

    pub fn registry(&self) -> &RouteRegistry<C> {
        &self.registry
    }

    pub fn on_request_received<F>(&self, hook: F)
    where
        F: Fn(&mut C) -> Flow + Send + Sync + 'static,
    {
        let hook = Arc::new(hook);
        self.update_hooks(|hooks| hooks.request_received.push(hook.clone()));
    }

    pub fn on_parse_value<F>(&self, hook: F)
    where
        F: Fn(&mut C, &ParseValueEvent<'_>) -> ParseOutcome + Send + Sync + 'static,
    {
        let hook = Arc::new(hook);
        self.update_hooks(|hooks| hooks.parse_value.push(hook.clone()));
    }

    pub fn on_calling_endpoint<F>(&self, hook: F)
    where
        F: Fn(&mut C, &EndpointEvent<'_>) -> Flow + Send + Sync + 'static,
    {
        let hook = Arc::new(hook);
        self.update_hooks(|hooks| hooks.calling_endpoint.push(hook.clone()));
    }

    pub fn on_responder_exception<F>(&self, hook: F)
    where
        F: Fn(&mut C, &ResponderFailure<'_>) -> Flow + Send + Sync + 'static,
    {
        let hook = Arc::new(hook);
        self.update_hooks(|hooks| hooks.responder_exception.push(hook.clone()));
    }

    pub fn on_distribution_exception<F>(&self, hook: F)
    where
        F: Fn(&mut C, &DispatchError) -> Flow + Send + Sync + 'static,
    {
        let hook = Arc::new(hook);
        self.update_hooks(|hooks| hooks.distribution_exception.push(hook.clone()));
    }

    pub fn on_unhandled_request<F>(&self, hook: F)
    where
        F: Fn(&mut C, &UnhandledRequest<'_>) -> Flow + Send + Sync + 'static,
    {
        let hook = Arc::new(hook);
        self.update_hooks(|hooks| hooks.unhandled_request.push(hook.clone()));
    }

    fn update_hooks(&self, mut apply: impl FnMut(&mut Hooks<C>)) {
        self.hooks.rcu(|current| {
            let mut next = Hooks::clone(current);
            apply(&mut next);
            next
        });
    }

    /// Serve one request. Never panics and never returns an error: every
    /// failure ends in a hook-authored or default response.
    pub fn dispatch(&self, ctx: &mut C) -> Outcome {
        let started = Instant::now();
        let hooks = self.hooks.load_full();

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| self.distribute(ctx, &hooks))) {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(error)) => distribution_failed(ctx, &hooks, error),
            Err(payload) => {
                distribution_failed(ctx, &hooks, DispatchError::Panicked(panic_message(&*payload)))
            }
        };

        metrics::record_dispatch(outcome.as_str(), started.elapsed());
        outcome
    }

    fn distribute(&self, ctx: &mut C, hooks: &Hooks<C>) -> Result<Outcome, DispatchError> {
        let url = ctx.url()?;
        let method = ctx.method().clone();
        let path = url.path().to_string();
        tracing::debug!(method = %method, path = %path, "Dispatching request");

        if hooks.request_received(ctx).is_responded() {
            tracing::debug!(path = %path, "Request claimed by request-received hook");
            return Ok(Outcome::Intercepted(Phase::RequestReceived));
        }

        let table = self.registry.snapshot();
        let mut available = Vec::new();

        for route in table.routes() {
            let Some(captures) = route.pattern().captures(&path) else {
                continue;
            };

            if let Some(required) = route.method() {
                if *required != method {
                    available.push(required.clone());
                    continue;
                }
            }

            match bind(ctx, hooks, route, &captures)? {
                Binding::Bound(args) => return Ok(invoke(ctx, hooks, route, &args)),
                Binding::Mismatch => {
                    metrics::record_fallthrough();
                    continue;
                }
                Binding::Responded => {
                    tracing::debug!(path = %path, "Request claimed by parse-value hook");
                    return Ok(Outcome::Intercepted(Phase::ParseValue));
                }
            }
        }

        let event = UnhandledRequest {
            method: &method,
            path: &path,
            available_methods: &available,
        };
        if hooks.unhandled_request(ctx, &event).is_responded() {
            tracing::debug!(path = %path, "Unhandled request claimed by hook");
        } else {
            tracing::debug!(method = %method, path = %path, available = ?available, "No route served request");
            fallback::not_found(ctx);
        }
        Ok(Outcome::Unhandled)
    }
}

fn bind<C>(
    ctx: &mut C,
    hooks: &Hooks<C>,
    route: &RouteEntry<C>,
    captures: &[&str],
) -> Result<Binding, DispatchError> {
    let mut args = Arguments::with_capacity(route.params().len());

    for param in route.params() {
        let Some(raw) = route.pattern().capture(param.name(), captures) else {
            // Registration guarantees uncaptured parameters carry a default.
            args.push(param.name(), param.default().cloned().unwrap_or(Value::Null));
            continue;
        };

        let text = url_decode(raw).map_err(|_| DispatchError::InvalidUtf8 {
            parameter: param.name().to_string(),
        })?;
        let event = ParseValueEvent {
            endpoint: route.event(),
            parameter: param.name(),
            kind: param.kind(),
            value: &text,
        };

        let value = match hooks.parse_value(ctx, &event) {
            ParseOutcome::Responded => return Ok(Binding::Responded),
            ParseOutcome::Parsed(value) => value,
            ParseOutcome::Continue => match coerce(param.kind(), &text) {
                Coercion::Parsed(value) => value,
                Coercion::Invalid => {
                    tracing::debug!(
                        endpoint = route.endpoint_name(),
                        parameter = param.name(),
                        kind = %param.kind(),
                        value = %text,
                        "Argument did not coerce, trying next route"
                    );
                    return Ok(Binding::Mismatch);
                }
                Coercion::Unsupported => {
                    return Err(DispatchError::UnsupportedParameter {
                        parameter: param.name().to_string(),
                        kind: param.kind(),
                        endpoint: route.endpoint_name().to_string(),
                    });
                }
            },
        };
        args.push(param.name(), value);
    }

    Ok(Binding::Bound(args))
}

fn invoke<C>(ctx: &mut C, hooks: &Hooks<C>, route: &RouteEntry<C>, args: &Arguments) -> Outcome
where
    C: RequestContext,
{
    let event = route.event();
    if hooks.calling_endpoint(ctx, &event).is_responded() {
        tracing::debug!(endpoint = event.endpoint, "Request claimed by calling-endpoint hook");
        return Outcome::Intercepted(Phase::CallingEndpoint);
    }

    tracing::trace!(responder = event.responder, endpoint = event.endpoint, "Invoking endpoint");
    let result = match panic::catch_unwind(AssertUnwindSafe(|| route.call(ctx, args))) {
        Ok(result) => result,
        Err(payload) => Err(HandlerError::Panicked(panic_message(&*payload))),
    };

    let Err(error) = result else {
        return Outcome::Completed;
    };

    tracing::warn!(
        responder = event.responder,
        endpoint = event.endpoint,
        error = %error,
        "Endpoint failed"
    );
    let failure = ResponderFailure {
        endpoint: event,
        error: &error,
    };
    if !hooks.responder_exception(ctx, &failure).is_responded() {
        fallback::internal_error(ctx);
    }
    Outcome::ResponderFailed
}

fn distribution_failed<C: RequestContext>(ctx: &mut C, hooks: &Hooks<C>, error: DispatchError) -> Outcome {
    tracing::error!(error = %error, "Dispatch failed");

    match panic::catch_unwind(AssertUnwindSafe(|| hooks.distribution_exception(ctx, &error))) {
        Ok(Flow::Responded) => {}
        Ok(Flow::Continue) => fallback::internal_error(ctx),
        Err(payload) => {
            tracing::error!(panic = %panic_message(&*payload), "Distribution-exception hook panicked");
            fallback::internal_error(ctx);
        }
    }
    Outcome::DistributionFailed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::context::ContextError;
    use crate::routing::{Endpoint, HandlerResult, Param};
    use axum::http::{Method, StatusCode};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    struct Ctx {
        method: Method,
        url: String,
        status: Option<StatusCode>,
        body: Vec<u8>,
    }

    impl Ctx {
        fn new(method: Method, path: &str) -> Self {
            Self {
                method,
                url: format!("http://localhost{path}"),
                status: None,
                body: Vec::new(),
            }
        }
    }

    impl RequestContext for Ctx {
        fn method(&self) -> &Method {
            &self.method
        }

        fn url(&self) -> Result<Url, ContextError> {
            Url::parse(&self.url).map_err(|source| ContextError::InvalidUrl {
                url: self.url.clone(),
                source,
            })
        }

        fn send(&mut self, status: StatusCode, _content_type: &str, body: &[u8]) -> Result<(), ContextError> {
            self.status = Some(status);
            self.body = body.to_vec();
            Ok(())
        }
    }

    struct Echo;

    impl Echo {
        fn echo(&self, ctx: &mut Ctx, args: &Arguments) -> HandlerResult {
            let word: String = args.get("word")?;
            ctx.send(StatusCode::OK, "text/plain", word.as_bytes())?;
            Ok(())
        }

        fn boom(&self, _: &mut Ctx, _: &Arguments) -> HandlerResult {
            panic!("kaboom");
        }
    }

    impl Responder<Ctx> for Echo {
        fn endpoints(&self) -> Vec<Endpoint<Self, Ctx>> {
            vec![
                Endpoint::get("/echo/{word}", Self::echo).param(Param::string("word")),
                Endpoint::new("/boom", Self::boom),
                Endpoint::get("/custom/{thing}", |_: &Self, _: &mut Ctx, _: &Arguments| Ok(()))
                    .param(Param::custom("thing", "Thing")),
            ]
        }
    }

    fn dispatcher() -> Dispatcher<Ctx> {
        let dispatcher = Dispatcher::<Ctx>::new();
        dispatcher.add_responder(Arc::new(Echo)).unwrap();
        dispatcher
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(Outcome::Completed.as_str(), "completed");
        assert_eq!(Outcome::Intercepted(Phase::ParseValue).as_str(), "intercepted");
        assert_eq!(Outcome::DistributionFailed.as_str(), "distribution_failed");
    }

    #[test]
    fn test_decoded_argument_reaches_handler() {
        let mut ctx = Ctx::new(Method::GET, "/echo/a%20b");
        assert_eq!(dispatcher().dispatch(&mut ctx), Outcome::Completed);
        assert_eq!(ctx.body, b"a b");
    }

    #[test]
    fn test_handler_panic_is_responder_failure() {
        let mut ctx = Ctx::new(Method::GET, "/boom");
        assert_eq!(dispatcher().dispatch(&mut ctx), Outcome::ResponderFailed);
        assert_eq!(ctx.status, Some(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn test_unclaimed_custom_kind_is_distribution_failure() {
        let dispatcher = dispatcher();
        let seen = Arc::new(AtomicUsize::new(0));
        let s = seen.clone();
        dispatcher.on_distribution_exception(move |_, error| {
            assert!(matches!(error, DispatchError::UnsupportedParameter { .. }));
            s.fetch_add(1, Ordering::SeqCst);
            Flow::Continue
        });

        let mut ctx = Ctx::new(Method::GET, "/custom/x");
        assert_eq!(dispatcher.dispatch(&mut ctx), Outcome::DistributionFailed);
        assert_eq!(ctx.status, Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalid_utf8_is_distribution_failure() {
        let mut ctx = Ctx::new(Method::GET, "/echo/%FF");
        assert_eq!(dispatcher().dispatch(&mut ctx), Outcome::DistributionFailed);
    }

    #[test]
    fn test_panicking_hook_is_distribution_failure() {
        let dispatcher = dispatcher();
        dispatcher.on_request_received(|_| panic!("hook bug"));

        let mut ctx = Ctx::new(Method::GET, "/echo/x");
        assert_eq!(dispatcher.dispatch(&mut ctx), Outcome::DistributionFailed);
        assert_eq!(ctx.status, Some(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn test_bad_url_is_distribution_failure() {
        let mut ctx = Ctx::new(Method::GET, "/echo/x");
        ctx.url = "not a url".to_string();
        assert_eq!(dispatcher().dispatch(&mut ctx), Outcome::DistributionFailed);
    }
}
