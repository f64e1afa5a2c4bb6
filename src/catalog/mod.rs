//! Notification catalog.
//!
//! ## Contents
//! - [`Version`] dotted client version with lexicographic eligibility
//! - [`Notification`], [`NotificationEntry`] payloads and their bounds
//! - [`CatalogSource`], [`DirectorySource`], [`StaticSource`] where entries come from
//! - [`NotificationCatalog`], [`ClientQuery`] snapshot + cached resolution
//! - [`CatalogRefresh`] ticker job requesting rescans

#[allow(clippy::module_inception)]
mod catalog;
mod entry;
mod refresh;
mod source;
mod version;

pub use catalog::{CACHE_CAPACITY, ClientQuery, LoadSummary, NotificationCatalog};
pub use entry::{Notification, NotificationEntry};
pub use refresh::CatalogRefresh;
pub use source::{CatalogSource, DirectorySource, Listing, StaticSource};
pub use version::Version;
