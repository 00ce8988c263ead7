//! Tracing setup for hosts embedding the exchange core.

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber from the logging section of the config.
/// `RUST_LOG` wins over the configured level when set.
pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("info,swapdeck={}", config.level)));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(console_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(console_layer)
            .init();
    }
}

/// Minimal logging for tests and one-shot tooling.
pub fn init_logging_simple() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}
