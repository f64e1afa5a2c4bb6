//! Notification payloads and their catalog entries.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::version::Version;

/// Payload delivered to clients.
///
/// Field names on the wire are `Id`, `Message`, `Type`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Identifier; also the file stem on disk.
    #[serde(rename = "Id")]
    pub id: i64,
    /// Text shown to the user.
    #[serde(rename = "Message")]
    pub message: String,
    /// Importance; higher sorts first.
    #[serde(rename = "Type")]
    pub kind: i32,
}

impl Notification {
    /// Builds a notification.
    pub fn new(id: i64, message: impl Into<String>, kind: i32) -> Self {
        Self {
            id,
            message: message.into(),
            kind,
        }
    }
}

/// One version-gated notification in the catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotificationEntry {
    /// Owning product; `None` means visible to every product.
    pub product: Option<Arc<str>>,
    /// Highest client version that still sees the notification.
    pub bound: Version,
    /// Payload.
    pub notification: Notification,
}

impl NotificationEntry {
    /// Builds an entry.
    pub fn new(product: Option<&str>, bound: Version, notification: Notification) -> Self {
        Self {
            product: product.map(Arc::from),
            bound,
            notification,
        }
    }
}
