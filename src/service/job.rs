//! # Background logic run by a [`Service`](crate::Service).
//!
//! A [`Job`] is the long-running body of a service. The service owns the
//! lifecycle (one execution context at a time, crash capture, stop/join); the
//! job only has to honor its [`CancellationToken`].
//!
//! - [`Job::run`] is expected to loop until `ctx` is cancelled. Returning
//!   `Ok(())` before that counts as a crash.
//! - [`Job::on_start`] runs before each launch; an error aborts the start.
//! - [`Job::on_stop`] runs after a stop is requested and before the stop
//!   signal fires (e.g. to poke an interrupt handle).
//!
//! [`JobFn`] wraps a closure so background logic can be supplied as a value.

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ServiceError;

/// Shared handle to a job.
pub type JobRef = Arc<dyn Job>;

/// # Cancellable background loop.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use pushvisor::{Job, ServiceError};
///
/// struct Ticker;
///
/// #[async_trait]
/// impl Job for Ticker {
///     fn name(&self) -> &str { "ticker" }
///
///     async fn run(&self, ctx: CancellationToken) -> Result<(), ServiceError> {
///         loop {
///             tokio::select! {
///                 _ = ctx.cancelled() => return Ok(()),
///                 _ = tokio::time::sleep(std::time::Duration::from_secs(1)) => {}
///             }
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// Stable, human-readable name; also the service name.
    fn name(&self) -> &str;

    /// Pre-start hook.
    async fn on_start(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    /// Pre-stop hook.
    async fn on_stop(&self) {}

    /// Runs until `ctx` is cancelled.
    async fn run(&self, ctx: CancellationToken) -> Result<(), ServiceError>;
}

/// Closure-backed job.
///
/// The closure *creates* a new future per launch, so it must be `Fn`.
pub struct JobFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> JobFn<F> {
    /// Creates a new closure-backed job.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the job and returns it as a shared handle.
    ///
    /// ## Example
    /// ```rust
    /// use tokio_util::sync::CancellationToken;
    /// use pushvisor::{JobFn, JobRef, ServiceError};
    ///
    /// let job: JobRef = JobFn::arc("idle", |ctx: CancellationToken| async move {
    ///     ctx.cancelled().await;
    ///     Ok::<_, ServiceError>(())
    /// });
    /// assert_eq!(job.name(), "idle");
    /// ```
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F> std::fmt::Debug for JobFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobFn").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F, Fut> Job for JobFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ServiceError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), ServiceError> {
        (self.f)(ctx).await
    }
}
