//! HTTP transport subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (net::Listener)
//!     → server.rs (hyper HTTP/1.1 + HTTP/2, middleware stack)
//!     → request id, trace span, timeout (tower-http)
//!     → blocking worker: context.rs wraps the request
//!     → Dispatcher::dispatch
//!     → response.rs (buffered output → Response)
//!     → Send to client
//! ```

pub mod context;
pub mod request;
pub mod response;
pub mod server;

pub use context::{ContextSettings, HttpContext};
pub use request::X_REQUEST_ID;
pub use server::{HttpServer, ServerError};
