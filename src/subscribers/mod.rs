//! # Event subscribers.
//!
//! The [`Subscribe`] trait, the [`SubscriberSet`] fan-out, and the built-in
//! [`LogWriter`] that turns runtime events into `tracing` records.
//!
//! ```text
//! Service ── publish(Event) ──► Bus ──► listener ──► SubscriberSet
//!                                                        ├──► LogWriter
//!                                                        └──► custom subscribers
//! ```

mod log;
mod set;
mod subscriber;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
