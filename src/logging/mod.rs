//! Logging: `tracing` everywhere, with a file sink drained by the Logger service.
//!
//! ```text
//! tracing::info!(..) ──► registry ──► EnvFilter ──┬─► fmt layer (stderr)
//!                                                 └─► SinkLayer ──► LogQueue ──► LogFileWriter ──► Log*.txt
//! ```

mod layer;
mod sink;
mod writer;

use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

pub use layer::SinkLayer;
pub use sink::{LogEntry, LogLevel, LogQueue};
pub use writer::LogFileWriter;

/// Installs the global subscriber and returns the queue feeding the log files.
///
/// `RUST_LOG` overrides `default_level`. Fails if a global subscriber is
/// already installed.
pub fn init(default_level: &str) -> anyhow::Result<Arc<LogQueue>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let queue = Arc::new(LogQueue::default());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(SinkLayer::new(Arc::clone(&queue)))
        .try_init()?;
    Ok(queue)
}
