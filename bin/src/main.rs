mod router;
mod server;

use futures::future;
use tracing::error;

#[tokio::main]
async fn main() {
	let endpoint = std::env::var("OTLP_ENDPOINT")
		.unwrap_or_else(|_| String::from("http://localhost:4317"));

	let _guard = wiretap::init(wiretap::Options {
		service: "courier",
		version: env!("CARGO_PKG_VERSION"),
		endpoint: &endpoint,
	});

	wiretap::install_default(
		wiretap::TracingSession::builder(reqwest::Client::new())
			.tag(wiretap::KeyValue::new("peer.service", "courier"))
			.build(),
	);

	let application = Box::pin(server::serve(router::application(), 3000));
	let monitoring = Box::pin(server::serve(router::monitoring(), 8000));

	let (result, failed_future_index, _) = future::select_all(vec![application, monitoring]).await;

	match failed_future_index {
		0 => error!("application server aborted: {:?}", result),
		1 => error!("monitoring server aborted: {:?}", result),
		_ => unreachable!("unreachable code. a catastrophic error happened"),
	}
}
