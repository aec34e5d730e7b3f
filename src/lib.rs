pub mod config;
pub mod dashboard;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod parser;
pub mod pipeline;
pub mod record;
pub mod store;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing/logging.
///
/// Diagnostics go to stderr so they do not interleave with the dashboard on
/// stdout; `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}
