//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Transport (RequestContext)
//!     → dispatcher.rs (receive → match → bind → invoke)
//!     → hooks.rs (per-phase chains, first claim stops processing)
//!     → handler writes the response through its context
//!     → fallback.rs (default 404 / 500 when nobody answered)
//! ```
//!
//! # Design Decisions
//! - Generic over the context type; one adapter per transport
//! - Request-time failures never escape `Dispatcher::dispatch`
//! - Hooks and routes are read from snapshots, so registration while serving
//!   is safe

pub mod context;
pub mod dispatcher;
pub mod error;
pub mod fallback;
pub mod hooks;

pub use context::{ContextError, RequestContext};
pub use dispatcher::{Dispatcher, Outcome, Phase};
pub use error::{DispatchError, HandlerError};
pub use hooks::{
    EndpointEvent, Flow, Hooks, ParseOutcome, ParseValueEvent, ResponderFailure, UnhandledRequest,
};
