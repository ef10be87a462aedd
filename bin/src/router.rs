use axum::{routing::get, Router};
use tracing::info;

pub fn application() -> Router {
	Router::new()
		.route("/", get(fetch))
		.route("/manifest", get(manifest))
		.route("/crash", get(crash))
}

pub fn monitoring() -> Router {
	Router::new().route("/metrics", get(|| async { wiretap::metrics::render() }))
}

async fn fetch() -> String {
	let response = wiretap::default()
		.get("http://localhost:3000/manifest")
		.await
		.unwrap();

	format!(
		"upstream said: {:?}",
		String::from_utf8_lossy(response.body())
	)
}

async fn manifest() -> &'static str {
	"courier is ready to deliver"
}

async fn crash() {
	info!("tripping the panic hook");

	panic!("delivery failed");
}
