//! Structured logging configuration.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging for binaries and integration tests.
///
/// Log levels come from `RUST_LOG`; the default keeps the engine at
/// `info` and quietens sqlx statement logging.
///
/// # Example
///
/// ```no_run
/// use courtbook::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("engine starting");
/// }
/// ```
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}
