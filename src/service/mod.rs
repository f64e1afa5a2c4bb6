//! Supervised services.
//!
//! ## Contents
//! - [`Job`], [`JobFn`], [`JobRef`] pluggable background logic
//! - [`Service`] lifecycle wrapper with crash capture
//! - [`ServiceState`], [`CrashReport`], [`Priority`]

mod job;
mod priority;
#[allow(clippy::module_inception)]
mod service;

pub use job::{Job, JobFn, JobRef};
pub use priority::Priority;
pub use service::{CrashReport, Service, ServiceState};
