//! Tracing installation for hosting daemons.
//!
//! Library code logs through the `log` facade; hosts call [`init`] once to
//! route everything through a tracing subscriber filtered by `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber and the log-to-tracing bridge.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .finish();

    let _ = tracing_log::LogTracer::init();
    if tracing::subscriber::set_global_default(subscriber).is_ok() {
        tracing::debug!("logging initialized");
    }
}
