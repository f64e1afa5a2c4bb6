//! # Server configuration.
//!
//! Provides [`ServerConfig`], the centralized settings for the notification
//! server and the supervision runtime under it.
//!
//! Config is built in layers:
//! 1. **Defaults**: [`ServerConfig::default`]
//! 2. **File**: optional TOML file via [`ServerConfig::from_file`] (missing keys keep defaults)
//! 3. **CLI**: flags in the binary override individual fields
//!
//! ## Sentinel values
//! - `liveness_interval_ms = 0` → polling liveness scan disabled (event path only)
//! - `restart_settle_ms = 0` → no pause between stop and start on restart
//!
//! Durations are stored as milliseconds so the TOML stays flat and obvious.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::policies::{BackoffPolicy, JitterPolicy, RestartPolicy};

/// Global configuration for the notification server.
///
/// ## Field semantics
/// - `bind`: endpoint the dispatcher binds (`host:port`)
/// - `threads`: dispatcher worker count (min 1)
/// - `write_logs`: whether the log writer persists entries to `log_dir`
/// - `refresh_interval_ms`: how often the catalog is marked for rescan
/// - `restart`: supervisor restart/backoff knobs
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Endpoint the request dispatcher binds to.
    pub bind: String,

    /// Number of dispatcher workers draining the request queue.
    pub threads: usize,

    /// Persist log entries to disk (`Log.txt`, `LogWarning.txt`, `LogError.txt`).
    pub write_logs: bool,

    /// Directory for log files.
    pub log_dir: PathBuf,

    /// Default log filter (overridden by `RUST_LOG`).
    pub log_level: String,

    /// How often the log writer drains its queue.
    pub log_flush_interval_ms: u64,

    /// Root directory of the on-disk notification catalog.
    pub notification_dir: PathBuf,

    /// Catalog rescan tick.
    pub refresh_interval_ms: u64,

    /// Pause between stop and start when a service restarts.
    pub restart_settle_ms: u64,

    /// Polling liveness scan period (`0` = disabled).
    pub liveness_interval_ms: u64,

    /// Capacity of the runtime event bus ring buffer (min 1).
    pub bus_capacity: usize,

    /// Supervisor restart behavior.
    pub restart: RestartConfig,
}

/// Restart knobs for the supervisor.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RestartConfig {
    /// Restart crashed services at all.
    pub enabled: bool,
    /// First restart delay.
    pub first_ms: u64,
    /// Maximum restart delay.
    pub max_ms: u64,
    /// Multiplicative growth between consecutive crashes.
    pub factor: f64,
    /// Randomization applied to each delay.
    pub jitter: JitterPolicy,
}

impl Default for RestartConfig {
    /// Defaults: enabled, first=500ms, max=30s, factor=2.0, no jitter.
    fn default() -> Self {
        Self {
            enabled: true,
            first_ms: 500,
            max_ms: 30_000,
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl RestartConfig {
    /// Restart policy derived from `enabled`.
    pub fn policy(&self) -> RestartPolicy {
        if self.enabled {
            RestartPolicy::OnCrash
        } else {
            RestartPolicy::Never
        }
    }

    /// Backoff policy derived from the delay knobs.
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(self.first_ms),
            max: Duration::from_millis(self.max_ms),
            factor: self.factor,
            jitter: self.jitter,
        }
    }
}

impl Default for ServerConfig {
    /// Default configuration:
    ///
    /// - `bind = 127.0.0.1:8080`
    /// - `threads = 4`
    /// - `write_logs = true`, `log_dir = .`, `log_level = info`, flush every 100ms
    /// - `notification_dir = ./Notifications`, rescan every 10s
    /// - no restart settle pause, liveness scan disabled
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            threads: 4,
            write_logs: true,
            log_dir: PathBuf::from("."),
            log_level: "info".to_string(),
            log_flush_interval_ms: 100,
            notification_dir: PathBuf::from("Notifications"),
            refresh_interval_ms: 10_000,
            restart_settle_ms: 0,
            liveness_interval_ms: 0,
            bus_capacity: 1024,
            restart: RestartConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Loads a config file; keys absent from the file keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg = Self::from_toml(&raw)?;
        Ok(cfg)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects values the runtime cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind.trim().is_empty() {
            return Err(ConfigError::Invalid {
                details: "bind must not be empty".to_string(),
            });
        }
        if self.refresh_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                details: "refresh_interval_ms must be > 0".to_string(),
            });
        }
        if self.log_flush_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                details: "log_flush_interval_ms must be > 0".to_string(),
            });
        }
        if !self.restart.factor.is_finite() || self.restart.factor <= 0.0 {
            return Err(ConfigError::Invalid {
                details: format!("restart.factor must be > 0, got {}", self.restart.factor),
            });
        }
        Ok(())
    }

    /// Worker count clamped to a minimum of 1.
    #[inline]
    pub fn worker_count(&self) -> usize {
        self.threads.max(1)
    }

    /// Bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Catalog rescan tick.
    #[inline]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    /// Log drain period.
    #[inline]
    pub fn log_flush_interval(&self) -> Duration {
        Duration::from_millis(self.log_flush_interval_ms)
    }

    /// Pause between stop and start on restart.
    #[inline]
    pub fn restart_settle(&self) -> Duration {
        Duration::from_millis(self.restart_settle_ms)
    }

    /// Polling liveness scan period as an `Option`.
    ///
    /// - `None` → disabled
    /// - `Some(d)` → scan every `d`
    #[inline]
    pub fn liveness_interval(&self) -> Option<Duration> {
        if self.liveness_interval_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.liveness_interval_ms))
        }
    }
}
