//! Request-time error types.

use thiserror::Error;

use crate::binding::ParamKind;
use crate::dispatch::context::ContextError;

/// Failure raised by an endpoint handler.
///
/// Delivered to the responder-exception hooks; unclaimed failures produce the
/// default 500 response.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("argument '{name}' was not bound")]
    MissingArgument { name: String },

    #[error("argument '{name}' is a {found}, not a {expected}")]
    ArgumentType {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("handler panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    /// Handler failure with a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        HandlerError::Message(message.into())
    }
}

/// Failure inside the dispatch machinery itself (outside handler invocation).
///
/// Delivered to the distribution-exception hooks; unclaimed failures produce
/// the default 500 response.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("parameter '{parameter}' is not valid UTF-8 after percent decoding")]
    InvalidUtf8 { parameter: String },

    #[error("no parser for parameter '{parameter}' of type {kind} in endpoint {endpoint}")]
    UnsupportedParameter {
        parameter: String,
        kind: ParamKind,
        endpoint: String,
    },

    #[error("dispatch panicked: {0}")]
    Panicked(String),
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
