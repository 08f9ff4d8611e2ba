//! TCP server: accept loop and per-connection sessions.

mod listener;
mod session;

pub use listener::MetricsServer;
pub use session::Session;
