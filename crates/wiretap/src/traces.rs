use super::Sub;

use opentelemetry::global;
use opentelemetry::sdk::propagation::TraceContextPropagator;
use opentelemetry::sdk::trace as sdktrace;
use opentelemetry::sdk::Resource;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_semantic_conventions as semcov;
use tracing_subscriber::filter;
use tracing_subscriber::Layer;

/// Identity and destination of the trace pipeline.
pub struct Options<'a> {
	pub service: &'a str,
	pub version: &'a str,
	pub endpoint: &'a str,
}

/// Installs the W3C propagator and the OTLP pipeline, returning the layer
/// that bridges `tracing` spans into it.
pub fn init<S: Sub>(opts: Options) -> impl Layer<S> {
	global::set_text_map_propagator(TraceContextPropagator::new());

	let resource = Resource::new(vec![
		semcov::resource::SERVICE_NAME.string(opts.service.to_string()),
		semcov::resource::SERVICE_VERSION.string(opts.version.to_string()),
	]);

	let tracer = opentelemetry_otlp::new_pipeline()
		.tracing()
		.with_exporter(
			opentelemetry_otlp::new_exporter()
				.tonic()
				.with_endpoint(opts.endpoint),
		)
		.with_trace_config(sdktrace::config().with_resource(resource))
		.install_batch(opentelemetry::runtime::Tokio)
		.expect("Unable to create OTLP pipeline");

	tracing_opentelemetry::layer()
		.with_tracer(tracer)
		.with_exception_field_propagation(true)
		.with_threads(true)
		.with_location(true)
		.with_tracked_inactivity(true)
		.with_filter(filter::filter_fn(|metadata| metadata.is_span()))
}

pub fn stop() {
	global::shutdown_tracer_provider();
}
