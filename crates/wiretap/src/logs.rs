use super::Sub;

use tracing_subscriber::Layer;

pub fn init<S: Sub>() -> impl Layer<S> {
	tracing_subscriber::fmt::layer()
		.json()
		.flatten_event(true)
		.with_current_span(true)
		.with_span_list(false)
}
