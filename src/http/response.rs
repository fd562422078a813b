//! Response assembly.
//!
//! # Design Decisions
//! - Handler output is buffered in the context and turned into one
//!   `Response` after the handler returns
//! - Failures of the worker itself get the same 500 document as the
//!   dispatcher's fallback

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;

use crate::dispatch::fallback::ErrorBody;

/// Assemble a response from buffered parts.
pub fn build(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// 500 response for failures outside the dispatcher (e.g. a worker that
/// could not be joined).
pub fn internal_error() -> Response {
    let body = serde_json::to_vec(&ErrorBody::exception()).unwrap_or_default();
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    build(StatusCode::INTERNAL_SERVER_ERROR, headers, body)
}
