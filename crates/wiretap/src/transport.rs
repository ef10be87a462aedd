use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use std::any::type_name;
use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;

/// The request-sending capability a [`TracingSession`] delegates to.
///
/// Implementations adapt a concrete HTTP client behind a uniform entry point
/// and name themselves through [`COMPONENT`], which ends up in span names and
/// the `component` tag.
///
/// [`TracingSession`]: crate::TracingSession
/// [`COMPONENT`]: Transport::COMPONENT
#[async_trait]
pub trait Transport: Send + Sync {
	/// Name of the underlying client library, e.g. `"reqwest"`.
	const COMPONENT: &'static str;

	/// Send the request and return the response, whatever its status code.
	///
	/// A non-2xx status is a response, not an error. Errors are reserved for
	/// calls that produced no response at all and must be wrapped into a
	/// [`TransportError`] at the failure site.
	async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>, TransportError>;
}

#[async_trait]
impl Transport for reqwest::Client {
	const COMPONENT: &'static str = "reqwest";

	async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>, TransportError> {
		let request = reqwest::Request::try_from(request).map_err(TransportError::new)?;

		let mut response = self.execute(request).await.map_err(TransportError::new)?;
		let status = response.status();
		let headers = std::mem::take(response.headers_mut());
		let body = response.bytes().await.map_err(TransportError::new)?;

		let mut response = Response::builder()
			.status(status)
			.body(body)
			.map_err(TransportError::new)?;
		*response.headers_mut() = headers;

		Ok(response)
	}
}

/// Failure of a transport call, carrying the metadata the tracing layer tags
/// spans with.
///
/// Created by transport adapters at the point of failure, where the concrete
/// error type is still statically known. Display and [`source`] forward to
/// the original error untouched.
///
/// [`source`]: std::error::Error::source
pub struct TransportError {
	kind: &'static str,
	object: &'static str,
	stack: Backtrace,
	source: Box<dyn Error + Send + Sync>,
}

impl TransportError {
	pub fn new<E>(source: E) -> Self
	where
		E: Error + Send + Sync + 'static,
	{
		let object = type_name::<E>();

		Self {
			kind: short_name(object),
			object,
			stack: Backtrace::force_capture(),
			source: Box::new(source),
		}
	}

	/// Short type name of the underlying error, e.g. `"ConnectionError"`.
	pub fn kind(&self) -> &'static str {
		self.kind
	}

	/// Fully-qualified type name of the underlying error.
	pub fn object(&self) -> &'static str {
		self.object
	}

	/// Backtrace captured when the error was wrapped.
	pub fn stack(&self) -> &Backtrace {
		&self.stack
	}
}

impl fmt::Display for TransportError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.source.fmt(f)
	}
}

impl fmt::Debug for TransportError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TransportError")
			.field("kind", &self.kind)
			.field("source", &self.source)
			.finish()
	}
}

impl Error for TransportError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		Some(self.source.as_ref())
	}
}

fn short_name(object: &str) -> &str {
	let base = object.split('<').next().unwrap_or(object);

	base.rsplit("::").next().unwrap_or(base)
}
