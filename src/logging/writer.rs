//! # LogFileWriter: the Logger service.
//!
//! Drains the [`LogQueue`] every flush interval and appends the entries to
//! files under the log directory:
//!
//! ```text
//! Log.txt          every entry
//! LogWarning.txt   warnings
//! LogError.txt     errors
//! ```
//!
//! With disk logging disabled the entries are drained and discarded. A stop
//! performs one last drain before the context exits.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use super::sink::{LogEntry, LogLevel, LogQueue};
use crate::error::ServiceError;
use crate::service::Job;

const LOG_ALL: &str = "Log.txt";
const LOG_WARNING: &str = "LogWarning.txt";
const LOG_ERROR: &str = "LogError.txt";

/// Background job persisting queued log entries.
pub struct LogFileWriter {
    queue: Arc<LogQueue>,
    dir: PathBuf,
    to_disk: bool,
    every: Duration,
}

impl LogFileWriter {
    /// Writer draining `queue` into `dir` every `every`.
    pub fn new(queue: Arc<LogQueue>, dir: impl Into<PathBuf>, to_disk: bool, every: Duration) -> Self {
        Self {
            queue,
            dir: dir.into(),
            to_disk,
            every: every.max(Duration::from_millis(1)),
        }
    }

    /// Drains the queue once; returns the number of entries taken.
    pub async fn flush(&self) -> Result<usize, ServiceError> {
        let entries = self.queue.drain();
        let dropped = self.queue.take_dropped();
        if entries.is_empty() && dropped == 0 {
            return Ok(0);
        }
        if !self.to_disk {
            return Ok(entries.len());
        }

        let mut all = String::new();
        let mut warnings = String::new();
        let mut errors = String::new();
        if dropped > 0 {
            let note = LogEntry::now(
                LogLevel::Warn,
                format!("log queue overflowed; {dropped} entries lost"),
            );
            push_line(&mut all, &note);
            push_line(&mut warnings, &note);
        }
        for e in &entries {
            push_line(&mut all, e);
            match e.level {
                LogLevel::Warn => push_line(&mut warnings, e),
                LogLevel::Error => push_line(&mut errors, e),
                _ => {}
            }
        }

        self.append(LOG_ALL, &all).await?;
        self.append(LOG_WARNING, &warnings).await?;
        self.append(LOG_ERROR, &errors).await?;
        Ok(entries.len())
    }

    async fn append(&self, file: &str, text: &str) -> Result<(), ServiceError> {
        if text.is_empty() {
            return Ok(());
        }
        let path = self.dir.join(file);
        let io_err = |e: std::io::Error| ServiceError::fail(format!("{}: {e}", path.display()));
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(io_err)?;
        f.write_all(text.as_bytes()).await.map_err(io_err)?;
        f.flush().await.map_err(io_err)?;
        Ok(())
    }
}

fn push_line(buf: &mut String, e: &LogEntry) {
    buf.push_str(&e.render());
    buf.push('\n');
}

#[async_trait]
impl Job for LogFileWriter {
    fn name(&self) -> &str {
        "Logger"
    }

    async fn on_start(&self) -> Result<(), ServiceError> {
        if self.to_disk {
            tokio::fs::create_dir_all(&self.dir)
                .await
                .map_err(|e| ServiceError::fail(format!("{}: {e}", self.dir.display())))?;
        }
        Ok(())
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), ServiceError> {
        let mut ticker = tokio::time::interval(self.every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    self.flush().await?;
                    return Ok(());
                }
                _ = ticker.tick() => {
                    self.flush().await?;
                }
            }
        }
    }
}
