use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

pub fn init() {
	HANDLE.get_or_init(|| {
		PrometheusBuilder::new()
			.install_recorder()
			.expect("Unable to install prometheus recorder")
	});
}

/// Renders the current metrics in Prometheus exposition format, for whatever
/// endpoint the host application serves them from.
pub fn render() -> String {
	HANDLE
		.get()
		.expect("metrics recorder was not installed, call init first")
		.render()
}
