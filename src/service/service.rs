//! # Service: supervised unit of background work.
//!
//! A [`Service`] wraps one [`Job`] with a uniform lifecycle:
//!
//! ```text
//!            start()                      stop()
//! Stopped ──────────► Starting ──► Running ──────► Stopping ──► Stopped
//!    ▲                                │
//!    └──────── crash (error/panic/exit) ──► CrashReport ──► Supervisor
//! ```
//!
//! ## Rules
//! - At most one execution context per service; `start()` joins a previous
//!   context that is still winding down before launching a new one.
//! - `stop()` returns only after the context has fully exited, and is a
//!   no-op on a stopped service.
//! - Every launch gets a fresh context id (monotonic, starts at 1).
//! - Faults are caught at the context boundary, logged, published as
//!   `ServiceCrashed`, and sent as a [`CrashReport`]. A service never
//!   restarts itself.
//! - Lifecycle calls on one service are serialized.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::job::JobRef;
use super::priority::Priority;
use crate::error::{RuntimeError, ServiceError, panic_message};
use crate::events::{Bus, Event, EventKind};

/// Lifecycle state of a service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceState {
    /// No context is running.
    Stopped,
    /// A context is being launched.
    Starting,
    /// A context is running.
    Running,
    /// A stop was requested; the context is being joined.
    Stopping,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceState::Stopped => "stopped",
            ServiceState::Starting => "starting",
            ServiceState::Running => "running",
            ServiceState::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

/// Crash notification sent by a service to its supervisor.
#[derive(Clone, Debug)]
pub struct CrashReport {
    /// Name of the crashed service.
    pub service: Arc<str>,
    /// Context id that crashed.
    pub context_id: u64,
    /// Rendered failure.
    pub reason: Arc<str>,
    /// How long the context ran before crashing.
    pub uptime: Duration,
}

#[derive(Default)]
struct Slot {
    token: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
}

struct Inner {
    name: Arc<str>,
    priority: Priority,
    job: JobRef,
    bus: Bus,
    settle: Mutex<Duration>,
    crash_tx: Mutex<Option<mpsc::UnboundedSender<CrashReport>>>,
    lifecycle: AsyncMutex<Slot>,
    state: Mutex<ServiceState>,
    should_run: AtomicBool,
    context_id: AtomicU64,
    live_context: AtomicU64,
    crash_next: AtomicBool,
}

/// Cheaply clonable handle to a supervised unit of work.
#[derive(Clone)]
pub struct Service {
    inner: Arc<Inner>,
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.inner.name)
            .field("priority", &self.inner.priority)
            .field("state", &self.state())
            .field("context_id", &self.context_id())
            .finish()
    }
}

impl Service {
    /// Wraps `job` into a stopped service.
    pub fn new(job: JobRef, priority: Priority, bus: Bus) -> Self {
        let name: Arc<str> = Arc::from(job.name());
        Self {
            inner: Arc::new(Inner {
                name,
                priority,
                job,
                bus,
                settle: Mutex::new(Duration::ZERO),
                crash_tx: Mutex::new(None),
                lifecycle: AsyncMutex::new(Slot::default()),
                state: Mutex::new(ServiceState::Stopped),
                should_run: AtomicBool::new(false),
                context_id: AtomicU64::new(0),
                live_context: AtomicU64::new(0),
                crash_next: AtomicBool::new(false),
            }),
        }
    }

    /// Sets the pause between stop and start inside [`restart`](Self::restart).
    #[must_use]
    pub fn with_settle(self, settle: Duration) -> Self {
        *self.inner.settle.lock() = settle;
        self
    }

    /// Service name (the job's name).
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Shared service name.
    pub fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.inner.name)
    }

    /// Ordering key inside a group.
    pub fn priority(&self) -> Priority {
        self.inner.priority
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServiceState {
        *self.inner.state.lock()
    }

    /// Intended state: true between `start()` and `stop()`, crashes included.
    pub fn should_run(&self) -> bool {
        self.inner.should_run.load(Ordering::Acquire)
    }

    /// Id of the most recently launched context (0 if never started).
    pub fn context_id(&self) -> u64 {
        self.inner.context_id.load(Ordering::Acquire)
    }

    /// True while a context body is executing.
    pub fn is_alive(&self) -> bool {
        self.inner.live_context.load(Ordering::Acquire) != 0
    }

    /// Arms a one-shot flag: the next launched context goes straight to its crash path.
    pub fn crash_immediately(&self) {
        self.inner.crash_next.store(true, Ordering::Release);
    }

    /// Routes crash reports of this service to `tx`.
    pub(crate) fn attach(&self, tx: mpsc::UnboundedSender<CrashReport>) {
        *self.inner.crash_tx.lock() = Some(tx);
    }

    /// Launches a fresh execution context and returns its id.
    ///
    /// Idempotent: on a running service it returns the live context id.
    pub async fn start(&self) -> Result<u64, RuntimeError> {
        let inner = &self.inner;
        let mut slot = inner.lifecycle.lock().await;

        if slot.handle.as_ref().is_some_and(|h| !h.is_finished()) {
            inner.should_run.store(true, Ordering::Release);
            return Ok(self.context_id());
        }
        if let Some(prev) = slot.handle.take() {
            let _ = prev.await;
        }
        slot.token = None;

        self.set_state(ServiceState::Starting);
        if let Err(source) = inner.job.on_start().await {
            self.set_state(ServiceState::Stopped);
            return Err(RuntimeError::StartFailed {
                name: inner.name.to_string(),
                source,
            });
        }

        let id = inner.context_id.fetch_add(1, Ordering::AcqRel) + 1;
        inner.should_run.store(true, Ordering::Release);
        inner.live_context.store(id, Ordering::Release);
        inner.bus.publish(
            Event::new(EventKind::ServiceStarting)
                .with_service(Arc::clone(&inner.name))
                .with_context(id),
        );

        let token = CancellationToken::new();
        let forced = inner.crash_next.swap(false, Ordering::AcqRel);
        self.set_state(ServiceState::Running);
        slot.handle = Some(tokio::spawn(Self::context(
            Arc::clone(inner),
            id,
            token.clone(),
            forced,
        )));
        slot.token = Some(token);

        inner.bus.publish(
            Event::new(EventKind::ServiceStarted)
                .with_service(Arc::clone(&inner.name))
                .with_context(id),
        );
        Ok(id)
    }

    /// Signals the context to stop and joins it.
    pub async fn stop(&self) {
        let inner = &self.inner;
        let mut slot = inner.lifecycle.lock().await;
        inner.should_run.store(false, Ordering::Release);

        let Some(handle) = slot.handle.take() else {
            self.set_state(ServiceState::Stopped);
            return;
        };
        let id = self.context_id();
        self.set_state(ServiceState::Stopping);
        inner.bus.publish(
            Event::new(EventKind::ServiceStopping)
                .with_service(Arc::clone(&inner.name))
                .with_context(id),
        );

        inner.job.on_stop().await;
        if let Some(token) = slot.token.take() {
            token.cancel();
        }
        if let Err(e) = handle.await {
            tracing::error!(service = %inner.name, context = id, error = %e, "context join failed");
        }

        self.set_state(ServiceState::Stopped);
        inner.bus.publish(
            Event::new(EventKind::ServiceStopped)
                .with_service(Arc::clone(&inner.name))
                .with_context(id),
        );
    }

    /// `stop()`, optional settle pause, then `start()`.
    pub async fn restart(&self) -> Result<u64, RuntimeError> {
        self.stop().await;
        let settle = *self.inner.settle.lock();
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }
        self.start().await
    }

    fn set_state(&self, state: ServiceState) {
        *self.inner.state.lock() = state;
    }

    /// Body of one execution context.
    async fn context(inner: Arc<Inner>, id: u64, token: CancellationToken, forced: bool) {
        let started = Instant::now();
        let outcome = if forced {
            Err(ServiceError::Forced)
        } else {
            let fut = inner.job.run(token.clone());
            match std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(())) if token.is_cancelled() => Ok(()),
                Ok(Ok(())) => Err(ServiceError::Exited),
                Ok(Err(ServiceError::Canceled)) if token.is_cancelled() => Ok(()),
                Ok(Err(e)) => Err(e),
                Err(payload) => Err(ServiceError::Panicked {
                    info: panic_message(&*payload),
                }),
            }
        };
        let _ = inner
            .live_context
            .compare_exchange(id, 0, Ordering::AcqRel, Ordering::Acquire);

        if let Err(err) = outcome {
            Self::report_crash(&inner, id, started.elapsed(), err);
        }
    }

    fn report_crash(inner: &Inner, id: u64, uptime: Duration, err: ServiceError) {
        tracing::error!(
            service = %inner.name,
            context = id,
            label = err.as_label(),
            error = %err,
            "service crashed"
        );
        if inner.context_id.load(Ordering::Acquire) == id {
            let mut state = inner.state.lock();
            if *state == ServiceState::Running {
                *state = ServiceState::Stopped;
            }
        }

        let reason: Arc<str> = Arc::from(err.to_string());
        inner.bus.publish(
            Event::new(EventKind::ServiceCrashed)
                .with_service(Arc::clone(&inner.name))
                .with_context(id)
                .with_reason(Arc::clone(&reason)),
        );
        if let Some(tx) = inner.crash_tx.lock().as_ref() {
            let _ = tx.send(CrashReport {
                service: Arc::clone(&inner.name),
                context_id: id,
                reason,
                uptime,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::JobFn;
    use std::sync::atomic::AtomicUsize;

    fn idle(name: &'static str) -> Service {
        let job = JobFn::arc(name, |ctx: CancellationToken| async move {
            ctx.cancelled().await;
            Ok::<_, ServiceError>(())
        });
        Service::new(job, Priority(1), Bus::new(64))
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_is_safe_twice() {
        let svc = idle("idle");
        assert_eq!(svc.state(), ServiceState::Stopped);
        svc.stop().await;

        let a = svc.start().await.unwrap();
        let b = svc.start().await.unwrap();
        assert_eq!(a, b);
        assert_eq!(svc.state(), ServiceState::Running);
        assert!(svc.should_run());

        svc.stop().await;
        svc.stop().await;
        assert_eq!(svc.state(), ServiceState::Stopped);
        assert!(!svc.should_run());
        assert!(!svc.is_alive());
    }

    #[tokio::test]
    async fn restart_changes_context_id() {
        let svc = idle("idle");
        let first = svc.start().await.unwrap();
        let second = svc.restart().await.unwrap();
        assert_eq!(second, first + 1);
        assert_eq!(svc.context_id(), second);
        svc.stop().await;
    }

    #[tokio::test]
    async fn errors_panics_and_early_exit_are_reported() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let job = JobFn::arc("flaky", move |_ctx: CancellationToken| {
            let n = c.fetch_add(1, Ordering::SeqCst);
            async move {
                match n {
                    0 => Err(ServiceError::fail("boom")),
                    1 => panic!("kaboom"),
                    _ => Ok(()),
                }
            }
        });
        let svc = Service::new(job, Priority(1), Bus::new(64));
        let (tx, mut rx) = mpsc::unbounded_channel();
        svc.attach(tx);

        for expected in ["execution failed: boom", "panicked: kaboom", "exited unexpectedly"] {
            let id = svc.restart().await.unwrap();
            let report = rx.recv().await.unwrap();
            assert_eq!(report.context_id, id);
            assert_eq!(&*report.reason, expected);
            assert_eq!(&*report.service, "flaky");
            assert_eq!(svc.state(), ServiceState::Stopped);
            assert!(svc.should_run());
        }
        svc.stop().await;
    }

    #[tokio::test]
    async fn crash_immediately_is_one_shot() {
        let svc = idle("idle");
        let (tx, mut rx) = mpsc::unbounded_channel();
        svc.attach(tx);

        svc.crash_immediately();
        let id = svc.start().await.unwrap();
        let report = rx.recv().await.unwrap();
        assert_eq!(report.context_id, id);
        assert_eq!(&*report.reason, "forced crash");

        svc.restart().await.unwrap();
        assert!(svc.is_alive());
        svc.stop().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failing_start_hook_aborts_start() {
        use async_trait::async_trait;

        struct Refuses;
        #[async_trait]
        impl crate::service::Job for Refuses {
            fn name(&self) -> &str {
                "refuses"
            }
            async fn on_start(&self) -> Result<(), ServiceError> {
                Err(ServiceError::fail("no"))
            }
            async fn run(&self, _ctx: CancellationToken) -> Result<(), ServiceError> {
                Ok(())
            }
        }

        let svc = Service::new(Arc::new(Refuses), Priority(1), Bus::new(8));
        let err = svc.start().await.unwrap_err();
        assert_eq!(err.as_label(), "runtime_start_failed");
        assert_eq!(svc.state(), ServiceState::Stopped);
        assert_eq!(svc.context_id(), 0);
    }
}
