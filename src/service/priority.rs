//! # Service priority.
//!
//! Higher priority services are infrastructure: they start first and stop last.
//! Lower priority services depend on them: they start last and stop first.
//!
//! ```text
//! start:  Logger(100) → CatalogRefresh(50) → Dispatcher(10) → Supervisor(0)
//! stop:   Supervisor(0) → Dispatcher(10) → CatalogRefresh(50) → Logger(100)
//! ```

/// Ordering key of a service inside a group.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(pub u8);

impl Priority {
    /// Log sink writer.
    pub const LOGGER: Priority = Priority(100);
    /// Catalog refresh ticker.
    pub const CATALOG: Priority = Priority(50);
    /// Request dispatcher.
    pub const DISPATCHER: Priority = Priority(10);
    /// Crash supervisor; started last so every other service exists when it runs.
    pub const SUPERVISOR: Priority = Priority(0);
}

impl From<u8> for Priority {
    fn from(v: u8) -> Self {
        Priority(v)
    }
}
