//! Extension hooks invoked at the dispatch phases.
//!
//! # Responsibilities
//! - Hold one ordered hook chain per phase
//! - Run a chain in registration order, stopping at the first hook that
//!   claims the event
//!
//! # Phases
//! - request received: before any route is examined
//! - parse value: before built-in coercion of one captured parameter
//! - calling endpoint: immediately before a handler runs
//! - responder exception: a handler failed or panicked
//! - distribution exception: the dispatch machinery itself failed
//! - unhandled request: no route served the request

use std::sync::Arc;

use axum::http::Method;

use crate::binding::{ParamKind, Value};
use crate::dispatch::error::{DispatchError, HandlerError};

/// Decision returned by a hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Let dispatch carry on (and the next hook in the chain run).
    Continue,
    /// The hook has written the response; stop processing the request.
    Responded,
}

impl Flow {
    pub fn is_responded(self) -> bool {
        self == Flow::Responded
    }
}

/// Decision returned by a parse-value hook.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// Not claimed; later hooks and then built-in coercion run.
    Continue,
    /// Claimed; the value is bound as the argument.
    Parsed(Value),
    /// The hook has written the response; stop processing the request.
    Responded,
}

/// The endpoint a request is being routed to.
#[derive(Debug, Clone, Copy)]
pub struct EndpointEvent<'a> {
    pub responder: &'a str,
    pub endpoint: &'a str,
    pub pattern: &'a str,
}

/// A captured parameter about to be parsed.
#[derive(Debug, Clone, Copy)]
pub struct ParseValueEvent<'a> {
    pub endpoint: EndpointEvent<'a>,
    pub parameter: &'a str,
    pub kind: ParamKind,
    /// Percent-decoded text of the captured segment.
    pub value: &'a str,
}

/// A handler that failed.
#[derive(Debug, Clone, Copy)]
pub struct ResponderFailure<'a> {
    pub endpoint: EndpointEvent<'a>,
    pub error: &'a HandlerError,
}

/// A request no route served.
#[derive(Debug, Clone, Copy)]
pub struct UnhandledRequest<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    /// Methods of routes whose pattern matched the path but whose method did
    /// not; empty when no pattern matched at all.
    pub available_methods: &'a [Method],
}

pub type RequestReceivedHook<C> = Arc<dyn Fn(&mut C) -> Flow + Send + Sync>;
pub type ParseValueHook<C> =
    Arc<dyn Fn(&mut C, &ParseValueEvent<'_>) -> ParseOutcome + Send + Sync>;
pub type CallingEndpointHook<C> = Arc<dyn Fn(&mut C, &EndpointEvent<'_>) -> Flow + Send + Sync>;
pub type ResponderExceptionHook<C> =
    Arc<dyn Fn(&mut C, &ResponderFailure<'_>) -> Flow + Send + Sync>;
pub type DistributionExceptionHook<C> = Arc<dyn Fn(&mut C, &DispatchError) -> Flow + Send + Sync>;
pub type UnhandledRequestHook<C> =
    Arc<dyn Fn(&mut C, &UnhandledRequest<'_>) -> Flow + Send + Sync>;

/// Hook chains for every dispatch phase.
pub struct Hooks<C> {
    pub(crate) request_received: Vec<RequestReceivedHook<C>>,
    pub(crate) parse_value: Vec<ParseValueHook<C>>,
    pub(crate) calling_endpoint: Vec<CallingEndpointHook<C>>,
    pub(crate) responder_exception: Vec<ResponderExceptionHook<C>>,
    pub(crate) distribution_exception: Vec<DistributionExceptionHook<C>>,
    pub(crate) unhandled_request: Vec<UnhandledRequestHook<C>>,
}

// Manual impls: derives would demand `C: Clone`/`C: Default`.
impl<C> Clone for Hooks<C> {
    fn clone(&self) -> Self {
        Self {
            request_received: self.request_received.clone(),
            parse_value: self.parse_value.clone(),
            calling_endpoint: self.calling_endpoint.clone(),
            responder_exception: self.responder_exception.clone(),
            distribution_exception: self.distribution_exception.clone(),
            unhandled_request: self.unhandled_request.clone(),
        }
    }
}

impl<C> Default for Hooks<C> {
    fn default() -> Self {
        Self {
            request_received: Vec::new(),
            parse_value: Vec::new(),
            calling_endpoint: Vec::new(),
            responder_exception: Vec::new(),
            distribution_exception: Vec::new(),
            unhandled_request: Vec::new(),
        }
    }
}

impl<C> Hooks<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of registered hooks across all phases.
    pub fn len(&self) -> usize {
        self.request_received.len()
            + self.parse_value.len()
            + self.calling_endpoint.len()
            + self.responder_exception.len()
            + self.distribution_exception.len()
            + self.unhandled_request.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn request_received(&self, ctx: &mut C) -> Flow {
        first_claim(&self.request_received, |hook| hook(ctx))
    }

    pub(crate) fn parse_value(&self, ctx: &mut C, event: &ParseValueEvent<'_>) -> ParseOutcome {
        for hook in &self.parse_value {
            match hook(ctx, event) {
                ParseOutcome::Continue => continue,
                claimed => return claimed,
            }
        }
        ParseOutcome::Continue
    }

    pub(crate) fn calling_endpoint(&self, ctx: &mut C, event: &EndpointEvent<'_>) -> Flow {
        first_claim(&self.calling_endpoint, |hook| hook(ctx, event))
    }

    pub(crate) fn responder_exception(&self, ctx: &mut C, failure: &ResponderFailure<'_>) -> Flow {
        first_claim(&self.responder_exception, |hook| hook(ctx, failure))
    }

    pub(crate) fn distribution_exception(&self, ctx: &mut C, error: &DispatchError) -> Flow {
        first_claim(&self.distribution_exception, |hook| hook(ctx, error))
    }

    pub(crate) fn unhandled_request(&self, ctx: &mut C, event: &UnhandledRequest<'_>) -> Flow {
        first_claim(&self.unhandled_request, |hook| hook(ctx, event))
    }
}

fn first_claim<H>(chain: &[H], mut call: impl FnMut(&H) -> Flow) -> Flow {
    for hook in chain {
        if call(hook).is_responded() {
            return Flow::Responded;
        }
    }
    Flow::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_chain_stops_at_first_claim() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut hooks: Hooks<Vec<&'static str>> = Hooks::new();

        let c = calls.clone();
        hooks.request_received.push(Arc::new(move |log: &mut Vec<&'static str>| {
            c.fetch_add(1, Ordering::SeqCst);
            log.push("first");
            Flow::Continue
        }));
        let c = calls.clone();
        hooks.request_received.push(Arc::new(move |log: &mut Vec<&'static str>| {
            c.fetch_add(1, Ordering::SeqCst);
            log.push("second");
            Flow::Responded
        }));
        let c = calls.clone();
        hooks.request_received.push(Arc::new(move |_: &mut Vec<&'static str>| {
            c.fetch_add(1, Ordering::SeqCst);
            Flow::Continue
        }));

        let mut log = Vec::new();
        assert_eq!(hooks.request_received(&mut log), Flow::Responded);
        assert_eq!(log, ["first", "second"]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_empty_chain_continues() {
        let hooks: Hooks<()> = Hooks::new();
        assert!(hooks.is_empty());
        assert_eq!(hooks.request_received(&mut ()), Flow::Continue);
    }

    #[test]
    fn test_parse_value_first_claim_wins() {
        let mut hooks: Hooks<()> = Hooks::new();
        hooks
            .parse_value
            .push(Arc::new(|_: &mut (), _: &ParseValueEvent<'_>| ParseOutcome::Continue));
        hooks
            .parse_value
            .push(Arc::new(|_: &mut (), event: &ParseValueEvent<'_>| {
                ParseOutcome::Parsed(Value::from(event.value.to_uppercase()))
            }));
        hooks
            .parse_value
            .push(Arc::new(|_: &mut (), _: &ParseValueEvent<'_>| ParseOutcome::Responded));

        let event = ParseValueEvent {
            endpoint: EndpointEvent {
                responder: "test",
                endpoint: "echo",
                pattern: "/echo/{word}",
            },
            parameter: "word",
            kind: ParamKind::Custom("shout"),
            value: "hi",
        };
        assert_eq!(
            hooks.parse_value(&mut (), &event),
            ParseOutcome::Parsed(Value::from("HI"))
        );
        assert_eq!(hooks.len(), 3);
    }
}
