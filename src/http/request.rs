//! Request inspection helpers.
//!
//! # Responsibilities
//! - Rebuild the absolute request URL from scheme, host and request target
//! - Generate and read the per-request ID (UUID v4)
//!
//! # Design Decisions
//! - A run of leading slashes in the target collapses to one, so `//a/b`
//!   is the path `/a/b` rather than a URL with host `a`
//! - `Host` header first, then the URI authority (HTTP/2), then the
//!   configured fallback host; a value that is not a bare `host[:port]` is
//!   skipped
//! - The host only ever sets the URL authority. Path and query come from the
//!   request target alone

use axum::http::uri::Authority;
use axum::http::{header, HeaderMap, HeaderValue, Request, Uri};
use tower_http::request_id::{MakeRequestId, RequestId};
use url::Url;
use uuid::Uuid;

use crate::dispatch::ContextError;

/// Header carrying the per-request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Request ID generator for `SetRequestIdLayer`: a fresh UUID v4 per request.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Build the absolute URL of a request.
pub fn reconstruct_url(secure: bool, host: &str, target: &str) -> Result<Url, ContextError> {
    let scheme = if secure { "https" } else { "http" };
    let text = format!("{scheme}://{host}");
    let mut url = Url::parse(&text).map_err(|source| ContextError::InvalidUrl { url: text, source })?;
    let authority_only = url.path() == "/"
        && url.query().is_none()
        && url.fragment().is_none()
        && url.username().is_empty()
        && url.password().is_none();
    if !authority_only {
        return Err(ContextError::InvalidHost(host.to_string()));
    }

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    };
    url.set_path(&format!("/{}", path.trim_start_matches('/')));
    url.set_query(query);
    Ok(url)
}

/// Whether `host` is a bare `host[:port]` authority.
pub fn is_valid_host(host: &str) -> bool {
    !host.is_empty() && !host.contains('@') && host.parse::<Authority>().is_ok()
}

/// Host the client addressed, if it said so validly.
pub fn request_host<'a>(headers: &'a HeaderMap, uri: &'a Uri) -> Option<&'a str> {
    headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .filter(|host| is_valid_host(host))
        .or_else(|| uri.authority().map(|authority| authority.as_str()).filter(|host| is_valid_host(host)))
}

/// Path plus query of a request URI, `/` when absent.
pub fn request_target(uri: &Uri) -> &str {
    uri.path_and_query().map_or("/", |target| target.as_str())
}

/// The request ID set by the middleware stack.
pub fn request_id(headers: &HeaderMap) -> Option<&str> {
    headers.get(X_REQUEST_ID).and_then(|value| value.to_str().ok())
}
