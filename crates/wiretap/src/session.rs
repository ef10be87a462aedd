use crate::tags;
use crate::transport::{Transport, TransportError};

use bytes::Bytes;
use http::{HeaderMap, Method, Request, Response};
use opentelemetry::global::{self, BoxedTracer};
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::trace::{FutureExt, SpanKind, TraceContextExt, Tracer};
use opentelemetry::{Context, KeyValue};
use opentelemetry_http::HeaderInjector;
use opentelemetry_semantic_conventions as semcov;
use std::time::{Duration, Instant};

/// Decorator over a [`Transport`] that wraps every outbound request in an
/// RPC-client span.
///
/// One span per call, named `<component>.<method>`, tagged with the standard
/// client metadata plus any configured extras. When propagation is on, the
/// span's context is injected into the outgoing headers so the callee can
/// continue the trace. Failures are annotated on the span and handed back
/// untouched.
pub struct TracingSession<T = reqwest::Client> {
	transport: T,
	tracer: BoxedTracer,
	propagate: bool,
	propagator: Option<Box<dyn TextMapPropagator + Send + Sync>>,
	tags: Vec<KeyValue>,
}

impl<T: Transport> TracingSession<T> {
	/// Wraps the transport with default settings: the global tracer, the
	/// global propagator, propagation on, no extra tags.
	pub fn new(transport: T) -> Self {
		Self::builder(transport).build()
	}

	pub fn builder(transport: T) -> Builder<T> {
		Builder {
			transport,
			tracer: None,
			propagate: true,
			propagator: None,
			tags: Vec::new(),
		}
	}

	pub async fn get(&self, url: &str) -> Result<Response<Bytes>, TransportError> {
		self.request(Method::GET, url).await
	}

	/// Sends an empty-bodied request to `url`. Use [`send`] to control
	/// headers and body.
	///
	/// [`send`]: TracingSession::send
	pub async fn request(&self, method: Method, url: &str) -> Result<Response<Bytes>, TransportError> {
		let request = Request::builder()
			.method(method)
			.uri(url)
			.body(Bytes::new())
			.map_err(TransportError::new)?;

		self.send(request).await
	}

	pub async fn send(&self, mut request: Request<Bytes>) -> Result<Response<Bytes>, TransportError> {
		let method = request.method().as_str().to_lowercase();
		let url = request.uri().to_string();

		let span = self
			.tracer
			.span_builder(format!("{}.{}", T::COMPONENT, method))
			.with_kind(SpanKind::Client)
			.with_attributes(vec![
				tags::COMPONENT.string(T::COMPONENT),
				semcov::trace::HTTP_METHOD.string(method.clone()),
				semcov::trace::HTTP_URL.string(url),
			])
			.start(&self.tracer);
		let cx = Context::current_with_span(span);

		// Extras go in after the standard tags so a colliding key wins.
		for tag in &self.tags {
			cx.span().set_attribute(tag.clone());
		}

		if self.propagate {
			self.inject(&cx, request.headers_mut());
		}

		let started = Instant::now();
		let result = self.transport.send(request).with_context(cx.clone()).await;

		let span = cx.span();
		match result {
			Ok(response) => {
				let status = response.status().as_u16();
				span.set_attribute(semcov::trace::HTTP_STATUS_CODE.i64(i64::from(status)));
				span.end();

				observe(&method, "success", started.elapsed());

				Ok(response)
			}
			Err(error) => {
				span.set_attribute(tags::ERROR.bool(true));
				span.set_attribute(tags::ERROR_KIND.string(error.kind()));
				span.set_attribute(tags::ERROR_OBJECT.string(error.object()));
				span.set_attribute(tags::ERROR_MESSAGE.string(error.to_string()));
				span.set_attribute(tags::ERROR_STACK.string(error.stack().to_string()));
				span.end();

				observe(&method, "error", started.elapsed());

				Err(error)
			}
		}
	}

	fn inject(&self, cx: &Context, headers: &mut HeaderMap) {
		let mut carrier = HeaderInjector(headers);

		match &self.propagator {
			Some(propagator) => propagator.inject_context(cx, &mut carrier),
			None => global::get_text_map_propagator(|propagator| {
				propagator.inject_context(cx, &mut carrier)
			}),
		}
	}
}

fn observe(method: &str, outcome: &'static str, elapsed: Duration) {
	metrics::increment_counter!(
		"wiretap_requests_total",
		"method" => method.to_owned(),
		"outcome" => outcome
	);
	metrics::histogram!(
		"wiretap_request_seconds",
		elapsed.as_secs_f64(),
		"method" => method.to_owned()
	);
}

pub struct Builder<T = reqwest::Client> {
	transport: T,
	tracer: Option<BoxedTracer>,
	propagate: bool,
	propagator: Option<Box<dyn TextMapPropagator + Send + Sync>>,
	tags: Vec<KeyValue>,
}

impl<T: Transport> Builder<T> {
	/// Tracer the spans come from. Defaults to the global tracer.
	pub fn tracer(mut self, tracer: BoxedTracer) -> Self {
		self.tracer = Some(tracer);
		self
	}

	/// Whether to inject trace context into outgoing headers. On by default.
	pub fn propagate(mut self, propagate: bool) -> Self {
		self.propagate = propagate;
		self
	}

	/// Propagator used for header injection instead of the global one.
	pub fn propagator(mut self, propagator: impl TextMapPropagator + Send + Sync + 'static) -> Self {
		self.propagator = Some(Box::new(propagator));
		self
	}

	/// Extra tag applied to every span, overriding standard tags on collision.
	pub fn tag(mut self, tag: KeyValue) -> Self {
		self.tags.push(tag);
		self
	}

	pub fn tags(mut self, tags: impl IntoIterator<Item = KeyValue>) -> Self {
		self.tags.extend(tags);
		self
	}

	pub fn build(self) -> TracingSession<T> {
		TracingSession {
			transport: self.transport,
			tracer: self.tracer.unwrap_or_else(|| global::tracer("wiretap")),
			propagate: self.propagate,
			propagator: self.propagator,
			tags: self.tags,
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	use once_cell::sync::Lazy;
	use opentelemetry::propagation::text_map_propagator::FieldIter;
	use opentelemetry::propagation::{Extractor, Injector};
	use opentelemetry::sdk::export::trace::{ExportResult, SpanData, SpanExporter};
	use opentelemetry::sdk::propagation::TraceContextPropagator;
	use opentelemetry::sdk::trace::TracerProvider;
	use std::error::Error;
	use std::fmt;
	use std::sync::{Arc, Mutex};

	#[derive(Clone, Debug, Default)]
	struct Capture {
		spans: Arc<Mutex<Vec<SpanData>>>,
	}

	impl SpanExporter for Capture {
		fn export(&mut self, batch: Vec<SpanData>) -> futures::future::BoxFuture<'static, ExportResult> {
			self.spans.lock().unwrap().extend(batch);

			Box::pin(futures::future::ready(Ok(())))
		}
	}

	static CAPTURE: Lazy<Capture> = Lazy::new(|| {
		let capture = Capture::default();
		let provider = TracerProvider::builder()
			.with_simple_exporter(capture.clone())
			.build();

		let _ = global::set_tracer_provider(provider);
		global::set_text_map_propagator(TraceContextPropagator::new());

		capture
	});

	/// Installs the capturing provider before any session grabs a tracer.
	fn harness() {
		Lazy::force(&CAPTURE);
	}

	fn exported(url: &str) -> SpanData {
		// The span processor may hand spans over asynchronously.
		for _ in 0..200 {
			let found = CAPTURE
				.spans
				.lock()
				.unwrap()
				.iter()
				.find(|span| attr(span, "http.url").as_deref() == Some(url))
				.cloned();

			if let Some(span) = found {
				return span;
			}

			std::thread::sleep(Duration::from_millis(5));
		}

		panic!("no span exported for {}", url);
	}

	fn attr(span: &SpanData, key: &str) -> Option<String> {
		span.attributes
			.iter()
			.find(|(k, _)| k.as_str() == key)
			.map(|(_, value)| value.as_str().into_owned())
	}

	#[derive(Clone, Debug)]
	struct FakeWire {
		status: u16,
		seen: Arc<Mutex<Option<HeaderMap>>>,
	}

	impl FakeWire {
		fn new(status: u16) -> Self {
			Self {
				status,
				seen: Arc::new(Mutex::new(None)),
			}
		}

		fn seen_headers(&self) -> HeaderMap {
			self.seen
				.lock()
				.unwrap()
				.clone()
				.expect("no request went through the wire")
		}
	}

	#[async_trait::async_trait]
	impl Transport for FakeWire {
		const COMPONENT: &'static str = "fake";

		async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>, TransportError> {
			*self.seen.lock().unwrap() = Some(request.headers().clone());

			Ok(Response::builder()
				.status(self.status)
				.body(Bytes::new())
				.unwrap())
		}
	}

	#[derive(Debug)]
	struct ConnectionError(&'static str);

	impl fmt::Display for ConnectionError {
		fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
			f.write_str(self.0)
		}
	}

	impl Error for ConnectionError {}

	#[derive(Debug)]
	struct DeadWire;

	#[async_trait::async_trait]
	impl Transport for DeadWire {
		const COMPONENT: &'static str = "fake";

		async fn send(&self, _request: Request<Bytes>) -> Result<Response<Bytes>, TransportError> {
			Err(TransportError::new(ConnectionError("refused")))
		}
	}

	/// Propagator with no format support: injects nothing.
	#[derive(Debug)]
	struct Blackhole;

	impl TextMapPropagator for Blackhole {
		fn inject_context(&self, _cx: &Context, _injector: &mut dyn Injector) {}

		fn extract_with_context(&self, cx: &Context, _extractor: &dyn Extractor) -> Context {
			cx.clone()
		}

		fn fields(&self) -> FieldIter<'_> {
			FieldIter::new(&[])
		}
	}

	mod send {
		use super::*;

		#[tokio::test]
		async fn tags_successful_calls() {
			harness();
			let session = TracingSession::new(FakeWire::new(200));

			let response = session.get("http://example.test/tags-ok").await.unwrap();
			assert_eq!(response.status(), 200);

			let span = exported("http://example.test/tags-ok");
			assert_eq!(span.name, "fake.get");
			assert_eq!(span.span_kind, SpanKind::Client);
			assert_eq!(attr(&span, "component").as_deref(), Some("fake"));
			assert_eq!(attr(&span, "http.method").as_deref(), Some("get"));
			assert_eq!(attr(&span, "http.status_code").as_deref(), Some("200"));
			assert_eq!(attr(&span, "error"), None);
		}

		#[tokio::test]
		async fn lowercases_the_method_in_name_and_tag() {
			harness();
			let session = TracingSession::new(FakeWire::new(200));

			session
				.request(Method::POST, "http://example.test/naming")
				.await
				.unwrap();

			let span = exported("http://example.test/naming");
			assert_eq!(span.name, "fake.post");
			assert_eq!(attr(&span, "http.method").as_deref(), Some("post"));
		}

		#[tokio::test]
		async fn tags_status_without_error_on_server_failures() {
			harness();
			let session = TracingSession::new(FakeWire::new(503));

			let response = session.get("http://example.test/status-503").await.unwrap();
			assert_eq!(response.status(), 503);

			let span = exported("http://example.test/status-503");
			assert_eq!(attr(&span, "http.status_code").as_deref(), Some("503"));
			assert_eq!(attr(&span, "error"), None);
		}

		#[tokio::test]
		async fn tags_failures_and_returns_the_same_error() {
			harness();
			let session = TracingSession::new(DeadWire);

			let error = session.get("http://example.test/tags-err").await.unwrap_err();
			assert_eq!(error.to_string(), "refused");
			assert_eq!(error.kind(), "ConnectionError");

			let span = exported("http://example.test/tags-err");
			assert_eq!(attr(&span, "error").as_deref(), Some("true"));
			assert_eq!(attr(&span, "sfx.error.kind").as_deref(), Some("ConnectionError"));
			assert_eq!(attr(&span, "sfx.error.message").as_deref(), Some("refused"));
			assert!(attr(&span, "sfx.error.object").unwrap().ends_with("ConnectionError"));
			assert!(!attr(&span, "sfx.error.stack").unwrap().is_empty());
			assert_eq!(attr(&span, "http.status_code"), None);
		}

		#[tokio::test]
		async fn extra_tags_reach_every_span() {
			harness();
			let session = TracingSession::builder(FakeWire::new(200))
				.tag(KeyValue::new("peer.service", "catalog"))
				.build();

			session.get("http://example.test/extras").await.unwrap();

			let span = exported("http://example.test/extras");
			assert_eq!(attr(&span, "peer.service").as_deref(), Some("catalog"));
		}

		#[tokio::test]
		async fn extra_tags_override_standard_ones() {
			harness();
			let session = TracingSession::builder(FakeWire::new(200))
				.tag(semcov::trace::HTTP_METHOD.string("masked"))
				.build();

			session.get("http://example.test/override").await.unwrap();

			let span = exported("http://example.test/override");
			assert_eq!(attr(&span, "http.method").as_deref(), Some("masked"));
		}
	}

	mod propagation {
		use super::*;

		#[tokio::test]
		async fn injects_trace_context_into_headers() {
			harness();
			let wire = FakeWire::new(200);
			let session = TracingSession::new(wire.clone());

			session.get("http://example.test/prop-on").await.unwrap();

			assert!(wire.seen_headers().contains_key("traceparent"));
		}

		#[tokio::test]
		async fn keeps_caller_headers_when_injecting() {
			harness();
			let wire = FakeWire::new(200);
			let session = TracingSession::new(wire.clone());

			let request = Request::builder()
				.method(Method::GET)
				.uri("http://example.test/prop-keep")
				.header("x-api-key", "sekret")
				.body(Bytes::new())
				.unwrap();
			session.send(request).await.unwrap();

			let headers = wire.seen_headers();
			assert_eq!(headers.get("x-api-key").unwrap(), "sekret");
			assert!(headers.contains_key("traceparent"));
		}

		#[tokio::test]
		async fn disabled_propagation_leaves_headers_alone() {
			harness();
			let wire = FakeWire::new(200);
			let session = TracingSession::builder(wire.clone())
				.propagate(false)
				.build();

			session.get("http://example.test/prop-off").await.unwrap();

			assert!(!wire.seen_headers().contains_key("traceparent"));
		}

		#[tokio::test]
		async fn unsupported_propagator_skips_injection_silently() {
			harness();
			let wire = FakeWire::new(200);
			let session = TracingSession::builder(wire.clone())
				.propagator(Blackhole)
				.build();

			let response = session.get("http://example.test/prop-none").await.unwrap();

			assert_eq!(response.status(), 200);
			assert!(!wire.seen_headers().contains_key("traceparent"));
		}
	}
}
