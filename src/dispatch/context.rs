//! Transport adapter contract.
//!
//! # Responsibilities
//! - Expose the request method and absolute URL to the dispatcher
//! - Let the fallback responses write status, content type and body
//!
//! # Design Decisions
//! - One implementation per concrete transport; the dispatch algorithm is
//!   written once against this trait
//! - Handlers use the concrete context type directly for richer access

use axum::http::{Method, StatusCode};
use thiserror::Error;
use url::Url;

/// Errors raised by a request context.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("invalid request URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid request host '{0}'")]
    InvalidHost(String),

    #[error("failed to read request body: {0}")]
    Body(String),

    #[error("invalid response header: {0}")]
    Header(String),

    #[error("response could not be written: {0}")]
    Write(String),
}

/// Per-request handle supplied by a transport.
pub trait RequestContext: Send + 'static {
    /// HTTP method of the request.
    fn method(&self) -> &Method;

    /// Absolute URL of the request.
    fn url(&self) -> Result<Url, ContextError>;

    /// Replace the response with the given status, content type and body.
    fn send(&mut self, status: StatusCode, content_type: &str, body: &[u8])
        -> Result<(), ContextError>;
}
