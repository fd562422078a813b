//! HTTP request context handed to handlers.
//!
//! # Responsibilities
//! - Implement [`RequestContext`] over an axum request
//! - Let handlers read the request (headers, body) and build the response
//!   (status, headers, body)
//!
//! # Design Decisions
//! - Dispatch runs on a blocking worker thread, so the body is read by
//!   blocking on the runtime handle captured when the request arrived
//! - The response is buffered; nothing reaches the client until the
//!   dispatcher returns

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{header, request, HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode, Uri};
use axum::response::Response;
use serde::Serialize;
use tokio::runtime::Handle;
use url::Url;

use crate::dispatch::{ContextError, RequestContext};
use crate::http::{request as inspect, response};

/// Listener-wide settings every context needs.
#[derive(Debug, Clone)]
pub struct ContextSettings {
    /// Rebuild URLs with the `https` scheme.
    pub secure: bool,
    /// Host used when the request names none.
    pub fallback_host: String,
    /// Default limit for [`HttpContext::read_body`] callers.
    pub max_body_bytes: usize,
}

/// Per-request context for the hyper/axum transport.
pub struct HttpContext {
    parts: request::Parts,
    body: Option<Body>,
    settings: Arc<ContextSettings>,
    runtime: Handle,
    status: StatusCode,
    headers: HeaderMap,
    output: Vec<u8>,
}

impl HttpContext {
    pub fn new(request: Request<Body>, settings: Arc<ContextSettings>, runtime: Handle) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            parts,
            body: Some(body),
            settings,
            runtime,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            output: Vec::new(),
        }
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    /// Request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn request_id(&self) -> Option<&str> {
        inspect::request_id(&self.parts.headers)
    }

    pub fn body_limit(&self) -> usize {
        self.settings.max_body_bytes
    }

    /// Read the whole request body, failing if it exceeds `limit` bytes.
    ///
    /// The body can be read once; later calls return an empty buffer. Must
    /// be called from a blocking worker, not from async code.
    pub fn read_body(&mut self, limit: usize) -> Result<Bytes, ContextError> {
        let Some(body) = self.body.take() else {
            return Ok(Bytes::new());
        };
        self.runtime
            .block_on(axum::body::to_bytes(body, limit))
            .map_err(|e| ContextError::Body(e.to_string()))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Set (replace) a response header.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), ContextError> {
        let name = HeaderName::try_from(name).map_err(|e| ContextError::Header(e.to_string()))?;
        let value = HeaderValue::try_from(value).map_err(|e| ContextError::Header(e.to_string()))?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Response headers set so far.
    pub fn response_headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Append to the response body.
    pub fn write(&mut self, bytes: &[u8]) {
        self.output.extend_from_slice(bytes);
    }

    /// Respond with a plain-text body.
    pub fn text(&mut self, status: StatusCode, body: &str) -> Result<(), ContextError> {
        self.send(status, "text/plain; charset=utf-8", body.as_bytes())
    }

    /// Respond with a JSON document.
    pub fn json<T: Serialize>(&mut self, status: StatusCode, value: &T) -> Result<(), ContextError> {
        let body = serde_json::to_vec(value).map_err(|e| ContextError::Write(e.to_string()))?;
        self.send(status, "application/json", &body)
    }

    /// Turn the buffered response into an HTTP response.
    pub fn into_response(self) -> Response {
        response::build(self.status, self.headers, self.output)
    }
}

impl RequestContext for HttpContext {
    fn method(&self) -> &Method {
        &self.parts.method
    }

    fn url(&self) -> Result<Url, ContextError> {
        let host = inspect::request_host(&self.parts.headers, &self.parts.uri)
            .unwrap_or(self.settings.fallback_host.as_str());
        inspect::reconstruct_url(self.settings.secure, host, inspect::request_target(&self.parts.uri))
    }

    fn send(&mut self, status: StatusCode, content_type: &str, body: &[u8]) -> Result<(), ContextError> {
        let content_type =
            HeaderValue::try_from(content_type).map_err(|e| ContextError::Header(e.to_string()))?;
        self.status = status;
        self.headers.insert(header::CONTENT_TYPE, content_type);
        self.output.clear();
        self.output.extend_from_slice(body);
        Ok(())
    }
}
