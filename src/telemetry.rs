use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log filter from `RUST_LOG`, `default` when unset or invalid
pub fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Initialise structured JSON logging on stdout.
///
/// `log` records (actix's `Logger`, `LoggerMiddleware`) are forwarded into
/// the same subscriber. Safe to call more than once; later calls are no-ops.
pub fn init_telemetry() {
    let formatting_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .json();

    let _ = tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(formatting_layer)
        .try_init();
}
