//! Logging utilities for svite
//!
//! This module is only available with the `logging` feature.
//!
//! For library users: svite emits tracing events - install your own subscriber.
//! For application developers: use these convenience functions.

use std::sync::Once;

use svite_config::LogLevel;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Initialize logging with the given level, unless `RUST_LOG` overrides it.
///
/// Installs a global subscriber; only the first call in a process has an
/// effect.
///
/// # Example
///
/// ```rust,no_run
/// use svite::logging::init_logging;
/// use svite_config::LogLevel;
///
/// init_logging(LogLevel::Info);
/// ```
pub fn init_logging(level: LogLevel) {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()));
        install(filter);
    });
}

/// Initialize logging from the `RUST_LOG` environment variable.
///
/// Falls back to info when it is unset or invalid.
pub fn init_logging_from_env() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(LogLevel::Info.as_filter()));
        install(filter);
    });
}

fn install(filter: EnvFilter) {
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_target(false).without_time())
        .init();
}
