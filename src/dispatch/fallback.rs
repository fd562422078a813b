//! Default responses used when no hook has responded.
//!
//! # Design Decisions
//! - Bodies are fixed JSON documents so clients can rely on their shape
//! - Writing is best-effort: a failure (e.g. client gone) is logged and
//!   swallowed, there is no further fallback

use axum::http::StatusCode;
use serde::Serialize;

use crate::dispatch::context::RequestContext;

/// JSON error document written by the fallbacks.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub error: &'static str,
    #[serde(rename = "errorType", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<&'static str>,
}

impl ErrorBody {
    pub fn not_found() -> Self {
        Self {
            status: "error",
            error: "not found",
            error_type: None,
        }
    }

    pub fn exception() -> Self {
        Self {
            status: "error",
            error: "exception thrown",
            error_type: Some("EXCEPTION"),
        }
    }
}

/// Write the default 404 response.
pub fn not_found<C: RequestContext>(ctx: &mut C) {
    write_best_effort(ctx, StatusCode::NOT_FOUND, "application/json", &ErrorBody::not_found());
}

/// Write the default 500 response: a JSON body sent as `text/plain`.
pub fn internal_error<C: RequestContext>(ctx: &mut C) {
    write_best_effort(
        ctx,
        StatusCode::INTERNAL_SERVER_ERROR,
        "text/plain",
        &ErrorBody::exception(),
    );
}

fn write_best_effort<C: RequestContext>(
    ctx: &mut C,
    status: StatusCode,
    content_type: &str,
    body: &ErrorBody,
) {
    let bytes = match serde_json::to_vec(body) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize fallback body");
            return;
        }
    };
    if let Err(e) = ctx.send(status, content_type, &bytes) {
        tracing::debug!(status = %status, error = %e, "Fallback response could not be written");
    }
}
