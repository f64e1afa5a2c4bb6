//! Error types used by the pushvisor runtime, its services, and the catalog.
//!
//! This module defines the error enums shared across the crate:
//!
//! - [`RuntimeError`]: errors raised by the orchestration layer (supervisor, service group).
//! - [`ServiceError`]: errors raised by one execution of a service's background job.
//! - [`CatalogError`]: failures while enumerating or parsing notification sources.
//! - [`VersionError`]: malformed client version strings.
//! - [`DispatchError`]: per-request failures inside the dispatcher's workers.
//! - [`ConfigError`]: configuration file loading/validation failures.
//!
//! Each type provides `as_label` with a stable snake_case label for logs.

use std::path::PathBuf;

use thiserror::Error;

/// # Errors produced by the orchestration runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A service with the same name is already registered.
    #[error("service {name:?} is already registered")]
    DuplicateService {
        /// Name of the offending service.
        name: String,
    },

    /// No service with the given name is registered.
    #[error("service {name:?} is not registered")]
    UnknownService {
        /// Requested service name.
        name: String,
    },

    /// A service refused to start (its start hook failed).
    #[error("service {name:?} failed to start: {source}")]
    StartFailed {
        /// Name of the service.
        name: String,
        /// Underlying failure.
        #[source]
        source: ServiceError,
    },

    /// The notification catalog could not be opened.
    #[error("notification catalog unavailable: {0}")]
    Catalog(#[from] CatalogError),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use pushvisor::RuntimeError;
    ///
    /// let err = RuntimeError::UnknownService { name: "logger".into() };
    /// assert_eq!(err.as_label(), "runtime_unknown_service");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::DuplicateService { .. } => "runtime_duplicate_service",
            RuntimeError::UnknownService { .. } => "runtime_unknown_service",
            RuntimeError::StartFailed { .. } => "runtime_start_failed",
            RuntimeError::Catalog(_) => "runtime_catalog",
        }
    }
}

/// # Errors produced by a service's background job.
///
/// Any of these escaping a job's `run` (other than [`ServiceError::Canceled`]
/// after a stop request) is reported to the supervisor as a crash.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The job failed with a recoverable error.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The job could not bind its endpoint.
    #[error("failed to bind {endpoint}: {source}")]
    Bind {
        /// Endpoint that was requested.
        endpoint: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The job panicked; the panic was caught at the context boundary.
    #[error("panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },

    /// The job returned without a stop request.
    #[error("exited unexpectedly")]
    Exited,

    /// The context was forced into its crash path.
    #[error("forced crash")]
    Forced,

    /// The job observed its stop signal.
    #[error("context cancelled")]
    Canceled,
}

impl ServiceError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceError::Fail { .. } => "service_failed",
            ServiceError::Bind { .. } => "service_bind_failed",
            ServiceError::Panicked { .. } => "service_panicked",
            ServiceError::Exited => "service_exited",
            ServiceError::Forced => "service_forced_crash",
            ServiceError::Canceled => "service_canceled",
        }
    }

    /// Shorthand for [`ServiceError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        ServiceError::Fail {
            error: error.into(),
        }
    }
}

/// # Errors raised while loading the notification catalog.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CatalogError {
    /// A file or directory could not be read or written.
    #[error("io failure at {path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A catalog item could not be decoded.
    #[error("malformed notification in {path}: {details}")]
    Parse {
        /// Path of the item.
        path: PathBuf,
        /// Decoder message.
        details: String,
    },

    /// The whole source is unavailable.
    #[error("catalog source unavailable: {details}")]
    Unavailable {
        /// Reason.
        details: String,
    },
}

impl CatalogError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            CatalogError::Io { .. } => "catalog_io",
            CatalogError::Parse { .. } => "catalog_parse",
            CatalogError::Unavailable { .. } => "catalog_unavailable",
        }
    }

    /// Convenience constructor for IO errors with a known path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CatalogError::Io {
            path: path.into(),
            source,
        }
    }
}

/// # Malformed dotted version strings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// The version string was empty.
    #[error("version string is empty")]
    Empty,

    /// The version did not have exactly three components.
    #[error("version {input:?} must have exactly 3 components, found {found}")]
    Components {
        /// Original input.
        input: String,
        /// Number of components found.
        found: usize,
    },

    /// A component was not a non-negative integer.
    #[error("version {input:?} has a non-numeric component {component:?}")]
    NotNumeric {
        /// Original input.
        input: String,
        /// Offending component.
        component: String,
    },
}

/// # Per-request failures inside the dispatcher.
///
/// These are recovered at the worker boundary and never stop a worker.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The request body could not be decoded.
    #[error("bad request: {details}")]
    BadRequest {
        /// Decoder message.
        details: String,
    },

    /// The client version was malformed.
    #[error(transparent)]
    Version(#[from] VersionError),

    /// The response could not be encoded.
    #[error("response encoding failed: {details}")]
    Encode {
        /// Encoder message.
        details: String,
    },

    /// Reading or writing the connection failed.
    #[error("connection io failure: {0}")]
    Io(#[from] std::io::Error),

    /// The handler panicked while serving this request.
    #[error("handler panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl DispatchError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchError::BadRequest { .. } => "dispatch_bad_request",
            DispatchError::Version(_) => "dispatch_bad_version",
            DispatchError::Encode { .. } => "dispatch_encode",
            DispatchError::Io(_) => "dispatch_io",
            DispatchError::Panicked { .. } => "dispatch_handler_panicked",
        }
    }
}

/// # Configuration loading failures.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read config {path}: {source}")]
    Io {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`ServerConfig`](crate::ServerConfig).
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid config: {details}")]
    Invalid {
        /// What is wrong.
        details: String,
    },
}

/// Renders a caught panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(ServiceError::Exited.as_label(), "service_exited");
        assert_eq!(ServiceError::fail("x").as_label(), "service_failed");
        assert_eq!(
            CatalogError::Unavailable {
                details: "gone".into()
            }
            .as_label(),
            "catalog_unavailable"
        );
        assert_eq!(
            DispatchError::from(VersionError::Empty).as_label(),
            "dispatch_bad_version"
        );
    }

    #[test]
    fn panic_message_handles_str_and_string() {
        let a: Box<dyn std::any::Any + Send> = Box::new("boom");
        let b: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        let c: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(&*a), "boom");
        assert_eq!(panic_message(&*b), "bang");
        assert_eq!(panic_message(&*c), "unknown panic");
    }
}
