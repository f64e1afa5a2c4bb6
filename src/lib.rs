//! # pushvisor
//!
//! **Pushvisor** is a version-gated push notification server built on a small
//! supervised service runtime.
//!
//! Clients send their application version (and optionally their product); the
//! server answers with every notification whose upper version bound the client
//! does not exceed, highest `Type` first. Everything long-running in the
//! server is a [`Service`]: a named, prioritized unit of background work that
//! a [`Supervisor`] restarts on its own when it crashes.
//!
//! ## Architecture
//! ```text
//!                        ┌────────────────────────────────────────────┐
//!                        │             NotificationServer             │
//!                        │   ServiceGroup (start ↓prio, stop ↑prio)   │
//!                        └──┬──────────────┬───────────────┬───────┬──┘
//!                           ▼              ▼               ▼       ▼
//!                       ┌────────┐  ┌─────────────┐ ┌───────────┐ ┌────────────┐
//!                       │ Logger │  │ Notification│ │Notification│ │ Supervisor │
//!                       │  (100) │  │ Loader (50) │ │Dispatch(10)│ │    (0)     │
//!                       └───┬────┘  └──────┬──────┘ └─────┬─────┘ └─────▲──────┘
//!                           │              │ mark_stale   │ resolve      │
//!                  LogQueue ▲              ▼              ▼              │
//!                           │        ┌──────────────────────────┐        │
//!              tracing ──► SinkLayer │   NotificationCatalog    │        │
//!                                    │ ArcSwap<Snapshot + cache>│        │
//!                                    └──────────────────────────┘        │
//!      any service context fails ──► CrashReport ──► mpsc ───────────────┘
//!                                                     └─► backoff ─► service.restart()
//!
//!      Service / Supervisor / Catalog ── publish(Event) ──► Bus ──► SubscriberSet ──► LogWriter
//! ```
//!
//! ### Service lifecycle
//! ```text
//! start():  Stopped ─► Starting ─► on_start() ─► spawn context #n ─► Running
//! context:  run(ctx) ─┬─ Err / panic / early Ok ─► ServiceCrashed ─► CrashReport{n}
//!                     └─ cancelled ─► Ok
//! stop():   should_run=false ─► cancel ─► join ─► on_stop() ─► Stopped
//! restart(): stop() ─► settle ─► start()   (context id n+1)
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                          |
//! |-------------------|---------------------------------------------------------------|---------------------------------------------|
//! | **Services**      | Supervised background jobs with crash capture.                | [`Job`], [`JobFn`], [`Service`]             |
//! | **Supervision**   | Restart exactly the crashed service, with backoff.            | [`Supervisor`], [`ServiceGroup`]            |
//! | **Policies**      | Restart and backoff strategies.                               | [`RestartPolicy`], [`BackoffPolicy`]        |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics, alerts).        | [`Subscribe`], [`Event`]                    |
//! | **Catalog**       | Version-gated notifications with cached resolution.           | [`catalog::NotificationCatalog`]            |
//! | **Dispatch**      | Accept loop feeding a fixed worker pool.                      | [`dispatch::Dispatcher`]                    |
//! | **Errors**        | Typed errors with stable labels.                              | [`ServiceError`], [`RuntimeError`]          |
//! | **Configuration** | TOML file plus CLI overrides.                                 | [`ServerConfig`]                            |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use pushvisor::{
//!     BackoffPolicy, Bus, JobFn, JobRef, Priority, RestartPolicy, Service, ServiceError, Supervisor,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bus = Bus::default();
//!     let ticker: JobRef = JobFn::arc("ticker", |ctx: CancellationToken| async move {
//!         ctx.cancelled().await;
//!         Ok::<_, ServiceError>(())
//!     });
//!
//!     let service = Service::new(ticker, Priority(10), bus.clone());
//!     let supervisor = Supervisor::new(bus, RestartPolicy::OnCrash, BackoffPolicy::default());
//!     supervisor.register(&service)?;
//!
//!     let first = service.start().await?;
//!     let second = service.restart().await?;
//!     assert!(second > first);
//!     service.stop().await;
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod policies;
mod server;
mod service;
mod subscribers;

pub mod catalog;
pub mod console;
pub mod dispatch;
pub mod logging;

// ---- Public re-exports ----

pub use config::{RestartConfig, ServerConfig};
pub use core::{ServiceGroup, ShutdownSignal, Supervisor, wait_for_shutdown_signal};
pub use error::{CatalogError, ConfigError, DispatchError, RuntimeError, ServiceError, VersionError};
pub use events::{Bus, Event, EventKind};
pub use policies::{BackoffPolicy, JitterPolicy, RestartPolicy};
pub use server::{NotificationServer, ServerBuilder};
pub use service::{CrashReport, Job, JobFn, JobRef, Priority, Service, ServiceState};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
