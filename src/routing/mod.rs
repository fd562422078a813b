//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration:
//!     Responder (prefixes, endpoints)
//!     → pattern.rs (normalise prefix, compile anchored matcher, cache)
//!     → registry.rs (validate parameters, append RouteEntry per prefix)
//!     → Swap in new immutable RouteTable
//!
//! Dispatch:
//!     RouteTable snapshot
//!     → Scan entries in registration order
//!     → PathPattern::captures (whole-path match)
//! ```
//!
//! # Design Decisions
//! - First registered route wins; there is no specificity ranking
//! - Tables are immutable once published, so readers never block
//! - Patterns are compiled once per distinct anchored expression

pub mod endpoint;
pub mod pattern;
pub mod registry;

pub use endpoint::{Endpoint, HandlerResult, Param, Responder};
pub use pattern::{normalize_prefix, PathPattern, PatternCache};
pub use registry::{RegistrationError, ResponderId, RouteEntry, RouteInfo, RouteRegistry, RouteTable};
