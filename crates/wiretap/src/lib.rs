//! Distributed tracing for outbound HTTP sessions.
//!
//! [`TracingSession`] wraps a request-sending [`Transport`] so every outbound
//! call becomes an RPC-client span, with trace context propagated through the
//! request headers. [`init`] bootstraps the telemetry stack (log, trace and
//! metric pipelines) for services that host a session.

pub mod metrics;
pub mod tags;

mod global;
mod level;
mod logs;
mod session;
mod traces;
mod transport;

pub use global::{default, install_default};
pub use opentelemetry::KeyValue;
pub use session::{Builder, TracingSession};
pub use traces::Options;
pub use transport::{Transport, TransportError};

use std::panic;
use tracing::{error, Span};
use tracing_core::Subscriber;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub trait Sub: Subscriber + for<'span> LookupSpan<'span> {}
impl<T: Subscriber + for<'span> LookupSpan<'span>> Sub for T {}

/// Guard used to control cleanup of instrumentation configs
///
/// There's an empty unit field to prevent outsiders from creating it manually
pub struct Telemetry(());

pub fn init(opts: Options) -> Telemetry {
	tracing_subscriber::registry()
		.with(level::init())
		.with(traces::init(opts))
		.with(logs::init())
		.try_init()
		.expect("Unable to register tracing subscriber");

	metrics::init();

	panic::set_hook(Box::new(|info| {
		let message = info
			.payload()
			.downcast_ref::<&str>()
			.map(|message| message.to_string())
			.or_else(|| info.payload().downcast_ref::<String>().cloned())
			.unwrap_or_else(|| String::from("application crashed"));

		let (file, line) = match info.location() {
			Some(location) => (Some(location.file()), Some(location.line())),
			None => (None, None),
		};

		let span = Span::current();
		span.record("otel.status_code", "ERROR");
		span.record("otel.status_message", "panic");

		error!(message, panic.file = file, panic.line = line)
	}));

	Telemetry(())
}

impl Drop for Telemetry {
	fn drop(&mut self) {
		traces::stop();
	}
}
