use crate::session::TracingSession;

use once_cell::sync::OnceCell;
use reqwest::Client;

static DEFAULT: OnceCell<TracingSession<Client>> = OnceCell::new();

/// Installs the process-wide default session handed out by [`default`].
///
/// A single explicit step, effective until the process restarts. The first
/// install wins; later calls are safe no-ops and return `false`. Code holding
/// its own session is unaffected.
pub fn install_default(session: TracingSession<Client>) -> bool {
	DEFAULT.set(session).is_ok()
}

/// The process-wide default session.
///
/// Falls back to a plain traced client when nothing was installed.
pub fn default() -> &'static TracingSession<Client> {
	DEFAULT.get_or_init(|| TracingSession::new(Client::new()))
}
