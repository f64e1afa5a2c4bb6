//! # Runtime events emitted by services, the supervisor, and the catalog.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Lifecycle events**: a service moving through `Starting → Running → Stopping → Stopped`
//! - **Supervision events**: crashes and the restarts they trigger
//! - **Catalog events**: snapshot reloads
//! - **Subscriber events**: overflow/panic inside the fan-out set
//!
//! The [`Event`] struct carries optional metadata (service name, execution
//! context id, reason, delay, counts) set depending on the kind.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use pushvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::RestartScheduled)
//!     .with_service("Logger")
//!     .with_context(3)
//!     .with_delay(Duration::from_millis(500));
//!
//! assert_eq!(ev.kind, EventKind::RestartScheduled);
//! assert_eq!(ev.service.as_deref(), Some("Logger"));
//! assert_eq!(ev.delay_ms, Some(500));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Service lifecycle ===
    /// A service is launching a new execution context.
    ///
    /// Sets: `service`, `context`.
    ServiceStarting,

    /// A service's new execution context is running.
    ///
    /// Sets: `service`, `context`.
    ServiceStarted,

    /// A service stop was requested.
    ///
    /// Sets: `service`, `context` (if one was running).
    ServiceStopping,

    /// A service's execution context has fully exited after a stop.
    ///
    /// Sets: `service`, `context`.
    ServiceStopped,

    // === Supervision ===
    /// A service's execution context crashed (error, panic, or unexpected exit).
    ///
    /// Sets: `service`, `context`, `reason`.
    ServiceCrashed,

    /// The supervisor will restart a crashed service after `delay_ms`.
    ///
    /// Sets: `service`, `context` (crashed one), `delay_ms`, `attempt`.
    RestartScheduled,

    /// The supervisor restarted a crashed service.
    ///
    /// Sets: `service`, `context` (new one).
    ServiceRestarted,

    /// A restart attempt failed; the supervisor keeps running.
    ///
    /// Sets: `service`, `reason`.
    RestartFailed,

    /// A crash was observed but policy or intent leaves the service stopped.
    ///
    /// Sets: `service`, `reason`.
    RestartSkipped,

    // === Group ===
    /// The whole server group is starting.
    GroupStarting,

    /// The whole server group is stopping.
    GroupStopping,

    /// Shutdown requested (OS signal or operator `exit`).
    ShutdownRequested,

    // === Catalog ===
    /// The catalog snapshot was replaced.
    ///
    /// Sets: `count` (entries loaded), `skipped` (items that failed to load).
    CatalogReloaded,

    /// A reload failed entirely; the previous snapshot stays in service.
    ///
    /// Sets: `reason`.
    CatalogReloadFailed,

    // === Subscribers ===
    /// A subscriber dropped an event (queue full or closed).
    ///
    /// Sets: `service` (subscriber name), `reason`.
    SubscriberOverflow,

    /// A subscriber panicked while handling an event.
    ///
    /// Sets: `service` (subscriber name), `reason`.
    SubscriberPanicked,
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Name of the service (or subscriber), if applicable.
    pub service: Option<Arc<str>>,
    /// Execution context id of the service, if applicable.
    pub context: Option<u64>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Restart delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Consecutive restart attempt (1-based).
    pub attempt: Option<u32>,
    /// Number of catalog entries loaded.
    pub count: Option<usize>,
    /// Number of catalog items skipped.
    pub skipped: Option<usize>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            service: None,
            context: None,
            reason: None,
            delay_ms: None,
            attempt: None,
            count: None,
            skipped: None,
        }
    }

    /// Attaches a service name.
    #[inline]
    pub fn with_service(mut self, name: impl Into<Arc<str>>) -> Self {
        self.service = Some(name.into());
        self
    }

    /// Attaches an execution context id.
    #[inline]
    pub fn with_context(mut self, id: u64) -> Self {
        self.context = Some(id);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a restart delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(d.as_millis().min(u128::from(u32::MAX)) as u32);
        self
    }

    /// Attaches a consecutive restart attempt number.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches catalog load counts.
    #[inline]
    pub fn with_counts(mut self, loaded: usize, skipped: usize) -> Self {
        self.count = Some(loaded);
        self.skipped = Some(skipped);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_service(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_service(subscriber)
            .with_reason(info)
    }
}
