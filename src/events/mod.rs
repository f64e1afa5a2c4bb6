//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Service` (lifecycle + crash), `Supervisor` (restarts),
//!   `NotificationServer` (group transitions), `NotificationCatalog` (reloads),
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the server's subscriber listener, which fans out to the
//!   `SubscriberSet` (by default the `LogWriter`).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
