use axum::Router;
use std::net::SocketAddr;
use tracing::info;

pub async fn serve(router: Router, port: u16) {
	let addr = SocketAddr::from(([0, 0, 0, 0], port));

	info!(port = addr.port(), "listening");

	axum::Server::bind(&addr)
		.serve(router.into_make_service())
		.with_graceful_shutdown(interrupted())
		.await
		.expect("server error");
}

async fn interrupted() {
	tokio::signal::ctrl_c()
		.await
		.expect("failed to install CTRL+C signal handler");
}
