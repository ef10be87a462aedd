//! Well-known span tag keys not covered by the semantic conventions crate.

use opentelemetry::Key;

/// Name of the client library the call went through.
///
/// # Examples
///
/// - reqwest
pub const COMPONENT: Key = Key::from_static_str("component");

/// Whether the call failed. Only ever set to `true`, and only on failure.
pub const ERROR: Key = Key::from_static_str("error");

/// Short type name of the underlying error.
///
/// # Examples
///
/// - ConnectionError
pub const ERROR_KIND: Key = Key::from_static_str("sfx.error.kind");

/// Fully-qualified type name of the underlying error.
pub const ERROR_OBJECT: Key = Key::from_static_str("sfx.error.object");

/// Message of the underlying error, unchanged.
pub const ERROR_MESSAGE: Key = Key::from_static_str("sfx.error.message");

/// Backtrace captured where the error was wrapped.
pub const ERROR_STACK: Key = Key::from_static_str("sfx.error.stack");
