//! Argument binding subsystem.
//!
//! # Data Flow
//! ```text
//! captured path fragment ("100%25")
//!     → decode.rs (byte-wise percent decoding, strict UTF-8)
//!     → [parse-value hooks get first refusal] (dispatch layer)
//!     → coerce.rs (invariant numeric parsing by declared ParamKind)
//!     → value.rs (typed Value stored in Arguments)
//! ```
//!
//! # Design Decisions
//! - Coercion never errors: an unparseable fragment is "no value" and the
//!   dispatcher moves on to the next candidate route
//! - Parsing is locale-independent (`.` decimal point, no group separators)
//! - Malformed percent escapes are kept literally instead of being rejected

pub mod coerce;
pub mod decode;
pub mod value;

pub use coerce::{coerce, Coercion};
pub use decode::url_decode;
pub use value::{Arguments, FromValue, ParamKind, Value};
