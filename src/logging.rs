//! Tracing subscriber setup for host applications.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global subscriber that honours `RUST_LOG`.
///
/// Falls back to `default_directive` (e.g. `"info"` or `"setpace=debug"`)
/// when the environment does not set a filter. Returns `false` if a global
/// subscriber was already installed.
pub fn init_tracing(default_directive: &str) -> bool {
    let installed = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Starting SetPace v{}", env!("CARGO_PKG_VERSION"));
    }

    installed
}
