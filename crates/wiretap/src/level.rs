use super::Sub;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

/// Level filter from `RUST_LOG`, defaulting to `info`.
pub fn init<S: Sub>() -> impl Layer<S> {
	EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
