//! Restart and backoff policies.
//!
//! This module groups the knobs that control **if** a crashed service is
//! restarted and **how long** the supervisor waits before doing so.
//!
//! ## Contents
//! - [`RestartPolicy`] restart crashed services or leave them down
//! - [`BackoffPolicy`] how delays grow across consecutive crashes of one service
//! - [`JitterPolicy`]  randomization so simultaneous crashes do not restart in lock-step
//!
//! ## Quick wiring
//! ```text
//! ServerConfig.restart ──► Supervisor { policy: RestartPolicy, backoff: BackoffPolicy }
//!      └─► on CrashReport:
//!           - policy.restarts() to decide restart/leave
//!           - backoff.next(consecutive_crashes) to schedule the restart
//! ```

mod backoff;
mod jitter;
mod restart;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use restart::RestartPolicy;
