//! # RequestDispatcher: accept loop + fixed worker pool.
//!
//! ```text
//! run(ctx)
//!   ├─ transport.bind()                     (failure → ServiceError::Bind → crash report)
//!   ├─ spawn N workers: loop { queue.pop(ctx) → serve(exchange) }
//!   └─ accept loop: select { ctx.cancelled | listener.accept() → queue.push }
//! stop
//!   └─ cancel workers, join all, drop listener
//! ```
//!
//! ## Rules
//! - The queue belongs to the dispatcher, not to one context: requests
//!   accepted but not served survive a restart.
//! - A failing or panicking handler costs one request, never a worker.
//! - A worker finishing unexpectedly is a crash of the whole context.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::handler::{Handler, error_body};
use super::queue::DispatchQueue;
use super::transport::{Exchange, Transport};
use crate::error::{DispatchError, ServiceError, panic_message};
use crate::service::Job;

/// Pause after a failed accept before trying again.
const ACCEPT_RETRY: Duration = Duration::from_millis(50);

/// Counters shared with the workers.
#[derive(Debug, Default)]
struct Stats {
    served: AtomicU64,
    failed: AtomicU64,
}

/// Dispatcher job; wrap in a [`Service`](crate::Service) to run it.
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    handler: Arc<dyn Handler>,
    queue: Arc<DispatchQueue<Exchange>>,
    workers: usize,
    stats: Arc<Stats>,
    bound: Mutex<Option<String>>,
}

impl Dispatcher {
    /// Dispatcher with `workers` workers (min 1).
    pub fn new(transport: Arc<dyn Transport>, handler: Arc<dyn Handler>, workers: usize) -> Self {
        Self {
            transport,
            handler,
            queue: Arc::new(DispatchQueue::new()),
            workers: workers.max(1),
            stats: Arc::new(Stats::default()),
            bound: Mutex::new(None),
        }
    }

    /// Requests answered successfully, all contexts combined.
    pub fn served(&self) -> u64 {
        self.stats.served.load(Ordering::Relaxed)
    }

    /// Requests that ended in a handler or transport failure.
    pub fn failed(&self) -> u64 {
        self.stats.failed.load(Ordering::Relaxed)
    }

    /// Requests accepted and waiting for a worker.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Address of the current listener, once bound.
    pub fn local_addr(&self) -> Option<String> {
        self.bound.lock().clone()
    }
}

async fn serve(ex: Exchange, handler: &dyn Handler) -> Result<(), DispatchError> {
    let Exchange {
        peer,
        mut connection,
    } = ex;
    tracing::debug!(%peer, "request received");

    let outcome = match connection.read_request().await {
        Ok(body) => match std::panic::AssertUnwindSafe(handler.handle(&peer, &body))
            .catch_unwind()
            .await
        {
            Ok(r) => r,
            Err(payload) => Err(DispatchError::Panicked {
                info: panic_message(&*payload),
            }),
        },
        Err(e) => Err(e),
    };

    match outcome {
        Ok(body) => connection.respond(&body).await,
        Err(e) => {
            tracing::warn!(%peer, label = e.as_label(), error = %e, "Dispatch threw, request dropped");
            let _ = connection.respond(&error_body(&e)).await;
            Err(e)
        }
    }
}

async fn worker(
    id: usize,
    queue: Arc<DispatchQueue<Exchange>>,
    handler: Arc<dyn Handler>,
    stats: Arc<Stats>,
    ctx: CancellationToken,
) {
    tracing::trace!(worker = id, "worker up");
    while let Some(ex) = queue.pop(&ctx).await {
        match serve(ex, handler.as_ref()).await {
            Ok(()) => stats.served.fetch_add(1, Ordering::Relaxed),
            Err(_) => stats.failed.fetch_add(1, Ordering::Relaxed),
        };
    }
    tracing::trace!(worker = id, "worker down");
}

#[async_trait]
impl Job for Dispatcher {
    fn name(&self) -> &str {
        "Notification Dispatch Server"
    }

    async fn on_stop(&self) {
        tracing::debug!(queued = self.queue.len(), "dispatcher stopping");
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), ServiceError> {
        let mut listener = self.transport.bind().await?;
        let addr = listener
            .local_addr()
            .unwrap_or_else(|| self.transport.endpoint());
        tracing::info!(endpoint = %addr, workers = self.workers, "dispatcher listening");
        *self.bound.lock() = Some(addr);

        let workers_ctx = ctx.child_token();
        let mut pool = JoinSet::new();
        for id in 0..self.workers {
            pool.spawn(worker(
                id,
                Arc::clone(&self.queue),
                Arc::clone(&self.handler),
                Arc::clone(&self.stats),
                workers_ctx.clone(),
            ));
        }

        let result = loop {
            tokio::select! {
                biased;
                _ = ctx.cancelled() => break Ok(()),
                accepted = listener.accept() => match accepted {
                    Ok(Some(ex)) => self.queue.push(ex),
                    Ok(None) => break Err(ServiceError::fail("request source closed")),
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        tokio::select! {
                            _ = ctx.cancelled() => break Ok(()),
                            _ = tokio::time::sleep(ACCEPT_RETRY) => {}
                        }
                    }
                },
                Some(joined) = pool.join_next() => {
                    // workers also wind down on a stop; that is not a crash
                    if ctx.is_cancelled() {
                        break Ok(());
                    }
                    let info = match joined {
                        Ok(()) => "worker exited".to_string(),
                        Err(e) => format!("worker failed: {e}"),
                    };
                    break Err(ServiceError::fail(info));
                }
            }
        };

        workers_ctx.cancel();
        while pool.join_next().await.is_some() {}
        drop(listener);
        *self.bound.lock() = None;
        tracing::info!("Work Dispatch server terminated.");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::ChannelTransport;

    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        async fn handle(&self, _peer: &str, body: &[u8]) -> Result<Vec<u8>, DispatchError> {
            if body == b"panic" {
                panic!("handler exploded");
            }
            if body == b"fail" {
                return Err(DispatchError::BadRequest {
                    details: "fail".into(),
                });
            }
            Ok(body.to_vec())
        }
    }

    #[tokio::test]
    async fn handler_failures_do_not_stop_workers() {
        let (transport, client) = ChannelTransport::new();
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(transport), Arc::new(Echo), 1));
        let ctx = CancellationToken::new();
        let run = tokio::spawn({
            let d = dispatcher.clone();
            let ctx = ctx.clone();
            async move { d.run(ctx).await }
        });

        let panicked = client.call(b"panic".to_vec()).await.unwrap();
        assert!(String::from_utf8(panicked).unwrap().contains("handler exploded"));
        let failed = client.call(b"fail".to_vec()).await.unwrap();
        assert!(String::from_utf8(failed).unwrap().starts_with("{\"Error\""));
        assert_eq!(client.call(b"ok".to_vec()).await.unwrap(), b"ok");

        // counters move right after the response is handed over
        for _ in 0..200 {
            if dispatcher.served() + dispatcher.failed() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(dispatcher.served(), 1);
        assert_eq!(dispatcher.failed(), 2);

        ctx.cancel();
        assert!(run.await.unwrap().is_ok());
        assert_eq!(dispatcher.local_addr(), None);
    }
}
