//! # Supervisor: restarts exactly the service that crashed.
//!
//! The [`Supervisor`] owns the receiving end of the crash channel. Services are
//! attached at registration and send a [`CrashReport`] when a context fails.
//! The supervisor is itself a [`Job`]: the server runs it as the lowest
//! priority service, so it comes up after everything it watches and goes down
//! first.
//!
//! ## Crash path
//! ```text
//! Service ctx fails ──► CrashReport ──► mpsc ──► Supervisor::run()
//!                                                  ├─ stale (old context / stopped on purpose) → ignore
//!                                                  ├─ RestartPolicy::Never → RestartSkipped
//!                                                  └─ OnCrash → RestartScheduled
//!                                                        └─► restart task: sleep(backoff) → service.restart()
//!                                                               ├─ Ok  → ServiceRestarted
//!                                                               └─ Err → RestartFailed (logged, swallowed)
//! ```
//!
//! ## Rules
//! - Each crashed context is handled at most once.
//! - Restarts of different services run concurrently; the backoff of one never
//!   delays another.
//! - The consecutive crash counter of a service resets once a context stayed up
//!   longer than `backoff.max`.
//! - Stopping the supervisor cancels pending backoff waits and joins
//!   in-flight restarts.
//! - With a liveness interval, a periodic scan synthesizes reports for services
//!   meant to run whose context is gone. The report channel stays authoritative.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::task::JoinSet;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::{RuntimeError, ServiceError};
use crate::events::{Bus, Event, EventKind};
use crate::policies::{BackoffPolicy, RestartPolicy};
use crate::service::{CrashReport, Job, Service, ServiceState};

/// Per-service bookkeeping.
#[derive(Default)]
struct Track {
    last_handled: u64,
    consecutive: u32,
}

struct Inner {
    bus: Bus,
    policy: RestartPolicy,
    backoff: BackoffPolicy,
    liveness: Mutex<Option<Duration>>,
    tx: mpsc::UnboundedSender<CrashReport>,
    rx: AsyncMutex<mpsc::UnboundedReceiver<CrashReport>>,
    services: Mutex<HashMap<Arc<str>, Service>>,
    tracks: Mutex<HashMap<Arc<str>, Track>>,
}

/// Crash-driven restarter for a set of services. Cheap to clone.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

impl Supervisor {
    /// Creates a supervisor with the given restart policy and backoff.
    pub fn new(bus: Bus, policy: RestartPolicy, backoff: BackoffPolicy) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                bus,
                policy,
                backoff,
                liveness: Mutex::new(None),
                tx,
                rx: AsyncMutex::new(rx),
                services: Mutex::new(HashMap::new()),
                tracks: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Enables the polling liveness scan; read when the supervisor's context starts.
    #[must_use]
    pub fn with_liveness(self, every: Option<Duration>) -> Self {
        *self.inner.liveness.lock() = every.filter(|d| !d.is_zero());
        self
    }

    /// Registers a service and attaches it to the crash channel.
    pub fn register(&self, service: &Service) -> Result<(), RuntimeError> {
        let mut services = self.inner.services.lock();
        let name = service.name_arc();
        if services.contains_key(&name) {
            return Err(RuntimeError::DuplicateService {
                name: name.to_string(),
            });
        }
        service.attach(self.inner.tx.clone());
        services.insert(name, service.clone());
        Ok(())
    }

    /// Looks up a registered service by name.
    pub fn service(&self, name: &str) -> Result<Service, RuntimeError> {
        self.inner
            .services
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownService {
                name: name.to_string(),
            })
    }

    /// Names of registered services, sorted.
    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .services
            .lock()
            .keys()
            .map(|k| k.to_string())
            .collect();
        names.sort();
        names
    }

    /// Decides what to do with one report; returns the service to restart and its delay.
    fn admit(&self, report: &CrashReport) -> Option<(Service, Duration, u32)> {
        let inner = &self.inner;
        let service = inner.services.lock().get(&report.service).cloned()?;

        if !service.should_run() || service.context_id() != report.context_id {
            tracing::debug!(
                service = %report.service,
                context = report.context_id,
                "ignoring stale crash report"
            );
            return None;
        }

        let mut tracks = inner.tracks.lock();
        let track = tracks.entry(Arc::clone(&report.service)).or_default();
        if report.context_id <= track.last_handled {
            return None;
        }
        track.last_handled = report.context_id;

        if !inner.policy.restarts() {
            tracing::warn!(service = %report.service, "restart policy is never; leaving service down");
            inner.bus.publish(
                Event::new(EventKind::RestartSkipped)
                    .with_service(Arc::clone(&report.service))
                    .with_reason("restart policy is never"),
            );
            return None;
        }

        if report.uptime > inner.backoff.max {
            track.consecutive = 0;
        }
        track.consecutive = track.consecutive.saturating_add(1);
        let attempt = track.consecutive;
        let delay = inner.backoff.next(attempt - 1);

        tracing::warn!(
            service = %report.service,
            context = report.context_id,
            reason = %report.reason,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "service crashed; scheduling restart"
        );
        inner.bus.publish(
            Event::new(EventKind::RestartScheduled)
                .with_service(Arc::clone(&report.service))
                .with_context(report.context_id)
                .with_delay(delay)
                .with_attempt(attempt),
        );
        Some((service, delay, attempt))
    }

    /// Reports for services meant to run whose context is gone.
    fn scan(&self) -> Vec<CrashReport> {
        self.inner
            .services
            .lock()
            .values()
            .filter(|s| s.should_run() && s.state() == ServiceState::Running && !s.is_alive())
            .map(|s| CrashReport {
                service: s.name_arc(),
                context_id: s.context_id(),
                reason: Arc::from("context exited without reporting"),
                uptime: Duration::ZERO,
            })
            .collect()
    }

    fn dispatch(&self, report: CrashReport, restarts: &mut JoinSet<()>, ctx: &CancellationToken) {
        let Some((service, delay, attempt)) = self.admit(&report) else {
            return;
        };
        let bus = self.inner.bus.clone();
        let ctx = ctx.clone();
        restarts.spawn(async move {
            tokio::select! {
                _ = ctx.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            // An operator may have stopped or restarted it during the backoff.
            if !service.should_run() || service.context_id() != report.context_id {
                return;
            }
            match service.restart().await {
                Ok(id) => {
                    tracing::info!(service = service.name(), context = id, attempt, "service restarted");
                    bus.publish(
                        Event::new(EventKind::ServiceRestarted)
                            .with_service(service.name_arc())
                            .with_context(id)
                            .with_attempt(attempt),
                    );
                }
                Err(e) => {
                    tracing::error!(service = service.name(), label = e.as_label(), error = %e, "restart failed");
                    bus.publish(
                        Event::new(EventKind::RestartFailed)
                            .with_service(service.name_arc())
                            .with_reason(e.to_string()),
                    );
                }
            }
        });
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(i) => {
            i.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[async_trait]
impl Job for Supervisor {
    fn name(&self) -> &str {
        "Supervisor"
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), ServiceError> {
        let mut rx = self.inner.rx.lock().await;
        let mut restarts = JoinSet::new();
        let every = *self.inner.liveness.lock();
        let mut liveness = every.map(|every| {
            let mut i = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
            i.set_missed_tick_behavior(MissedTickBehavior::Delay);
            i
        });

        loop {
            tokio::select! {
                _ = ctx.cancelled() => break,
                report = rx.recv() => match report {
                    Some(report) => self.dispatch(report, &mut restarts, &ctx),
                    None => return Err(ServiceError::fail("crash channel closed")),
                },
                _ = tick(&mut liveness) => {
                    for report in self.scan() {
                        self.dispatch(report, &mut restarts, &ctx);
                    }
                }
                Some(_) = restarts.join_next(), if !restarts.is_empty() => {}
            }
        }

        while restarts.join_next().await.is_some() {}
        Ok(())
    }
}
