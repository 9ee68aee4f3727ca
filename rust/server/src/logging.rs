//! Process-wide tracing setup.

use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,felt_server=debug"))
}

/// Install the global subscriber. Filter defaults to
/// `info,felt_server=debug` and is overridable with `RUST_LOG`; set
/// `FELT_LOG_JSON=1` for machine-readable output.
pub fn init_logging() {
    let json = std::env::var("FELT_LOG_JSON").is_ok_and(|v| v == "1");
    let installed = if json {
        tracing::subscriber::set_global_default(
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_target(true)
                .json()
                .finish(),
        )
    } else {
        tracing::subscriber::set_global_default(
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_target(true)
                .finish(),
        )
    };
    if installed.is_err() {
        tracing::debug!("global subscriber already installed");
    }
}
