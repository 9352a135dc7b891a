use crate::color::ColorMode;

/// The filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "warn";

/// Sends diagnostics to stderr, filtered by `RUST_LOG`. Does nothing if a
/// subscriber was already installed.
pub fn init_logging(color: ColorMode) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(color == ColorMode::On)
        .with_target(false)
        .try_init();
}
