pub mod analytics;
pub mod analyzer;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod instrument;
pub mod metrics;
pub mod monitor;
pub mod slow_log;
pub mod ticker;

pub use engine::PerformanceEngine;
pub use error::{MonitorError, Result};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing/logging
///
/// `RUST_LOG` takes precedence over `level`. `format` is "json" or "text".
/// Can only be called once per process.
pub fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);

    if format == "json" {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
