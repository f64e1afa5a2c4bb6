//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`]: services, the
//! supervisor, and the catalog publish; the server's listener fans events out
//! to the [`SubscriberSet`](crate::SubscriberSet).
//!
//! ```text
//! Service  ──┐
//! Supervisor ┼──► Bus ───► subscriber listener ───► SubscriberSet ──► LogWriter, ...
//! Catalog  ──┘
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never waits.
//! - **Bounded ring buffer**: slow receivers observe `RecvError::Lagged(n)` and skip.
//! - **No persistence**: events published with no receiver are lost.
//!
//! Crash reports do **not** travel on the bus; they use a dedicated channel
//! owned by the [`Supervisor`](crate::Supervisor) so none can be lagged away.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (min 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers; returns immediately.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver that observes subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(1024)
    }
}
