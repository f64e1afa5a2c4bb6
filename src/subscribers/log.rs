//! # LogWriter: events → `tracing`
//!
//! Maps each runtime [`Event`] onto a structured `tracing` record. Crashes and
//! failed reloads go out at `error`, skipped restarts and subscriber trouble at
//! `warn`, everything else at `info`/`debug`.
//!
//! ## Example output (fmt layer)
//! ```text
//! INFO  pushvisor::events: service starting service="Logger" context=1
//! ERROR pushvisor::events: service crashed service="Dispatcher" context=2 reason="panicked: boom"
//! INFO  pushvisor::events: restart scheduled service="Dispatcher" delay_ms=500 attempt=1
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

const TARGET: &str = "pushvisor::events";

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let service = e.service.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::ServiceStarting => {
                tracing::info!(target: TARGET, service, context = ?e.context, "service starting");
            }
            EventKind::ServiceStarted => {
                tracing::debug!(target: TARGET, service, context = ?e.context, "service running");
            }
            EventKind::ServiceStopping => {
                tracing::info!(target: TARGET, service, context = ?e.context, "service stopping");
            }
            EventKind::ServiceStopped => {
                tracing::info!(target: TARGET, service, context = ?e.context, "service stopped");
            }
            EventKind::ServiceCrashed => {
                tracing::error!(target: TARGET, service, context = ?e.context, reason, "service crashed");
            }
            EventKind::RestartScheduled => {
                tracing::info!(
                    target: TARGET,
                    service,
                    delay_ms = ?e.delay_ms,
                    attempt = ?e.attempt,
                    "restart scheduled"
                );
            }
            EventKind::ServiceRestarted => {
                tracing::info!(target: TARGET, service, context = ?e.context, "service restarted");
            }
            EventKind::RestartFailed => {
                tracing::error!(target: TARGET, service, reason, "restart failed");
            }
            EventKind::RestartSkipped => {
                tracing::warn!(target: TARGET, service, reason, "restart skipped");
            }
            EventKind::GroupStarting => tracing::info!(target: TARGET, "starting services"),
            EventKind::GroupStopping => tracing::info!(target: TARGET, "stopping services"),
            EventKind::ShutdownRequested => tracing::info!(target: TARGET, "shutdown requested"),
            EventKind::CatalogReloaded => {
                tracing::debug!(
                    target: TARGET,
                    loaded = ?e.count,
                    skipped = ?e.skipped,
                    "notification catalog reloaded"
                );
            }
            EventKind::CatalogReloadFailed => {
                tracing::error!(target: TARGET, reason, "notification catalog reload failed");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(target: TARGET, subscriber = service, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                tracing::warn!(target: TARGET, subscriber = service, reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
