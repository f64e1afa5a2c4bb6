//! Runtime core: supervision and group lifecycle.
//!
//! - [`supervisor`]: crash channel receiver that restarts individual services;
//! - [`group`]: priority-ordered start/stop of several services;
//! - [`shutdown`]: cross-platform termination signal handling.

mod group;
mod shutdown;
mod supervisor;

pub use group::ServiceGroup;
pub use shutdown::{ShutdownSignal, wait_for_shutdown_signal};
pub use supervisor::Supervisor;
