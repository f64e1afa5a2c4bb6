//! # Restart policy for supervised services.
//!
//! [`RestartPolicy`] decides whether the supervisor restarts a service after
//! its background context crashes.
//!
//! ```text
//! crash report ──► RestartPolicy::Never    → log, leave the service stopped
//!              └─► RestartPolicy::OnCrash  → wait backoff, restart that service only
//! ```
//!
//! A service that was stopped on purpose is never restarted, whatever the policy.

/// Policy controlling whether a crashed service is restarted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Leave crashed services stopped.
    Never,
    /// Restart a crashed service that is still meant to run (default).
    #[default]
    OnCrash,
}

impl RestartPolicy {
    /// Whether a crash should lead to a restart.
    pub fn restarts(self) -> bool {
        matches!(self, RestartPolicy::OnCrash)
    }
}
