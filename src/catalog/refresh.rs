//! Periodic rescan ticker.
//!
//! Every tick marks the catalog stale; the next `resolve` reloads. No traffic
//! means no rescans.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::catalog::NotificationCatalog;
use crate::error::ServiceError;
use crate::service::Job;

/// Background job flagging the catalog for rescan at a fixed interval.
pub struct CatalogRefresh {
    catalog: Arc<NotificationCatalog>,
    every: Duration,
}

impl CatalogRefresh {
    /// Ticks every `every` (clamped to at least 1ms).
    pub fn new(catalog: Arc<NotificationCatalog>, every: Duration) -> Self {
        Self {
            catalog,
            every: every.max(Duration::from_millis(1)),
        }
    }
}

#[async_trait]
impl Job for CatalogRefresh {
    fn name(&self) -> &str {
        "Notification Loader"
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), ServiceError> {
        let start = tokio::time::Instant::now() + self.every;
        let mut ticker = tokio::time::interval_at(start, self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ctx.cancelled() => return Ok(()),
                _ = ticker.tick() => {
                    tracing::trace!("notification rescan requested");
                    self.catalog.mark_stale();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticSource;
    use crate::events::Bus;

    #[tokio::test(start_paused = true)]
    async fn ticks_mark_the_catalog_stale() {
        let catalog = Arc::new(NotificationCatalog::new(
            Arc::new(StaticSource::default()),
            Bus::new(8),
        ));
        let job = CatalogRefresh::new(catalog.clone(), Duration::from_secs(10));
        let ctx = CancellationToken::new();
        let run = tokio::spawn({
            let ctx = ctx.clone();
            async move { job.run(ctx).await }
        });

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!catalog.is_stale());
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(catalog.is_stale());

        ctx.cancel();
        assert!(run.await.unwrap().is_ok());
    }
}
