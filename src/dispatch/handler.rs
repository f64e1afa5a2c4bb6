//! Request handlers.
//!
//! [`NotificationHandler`] decodes `{"Version": "6.2.0", "Product": "app"}`,
//! resolves it against the catalog, and encodes
//! `{"Notifications": [{"Id": 1, "Message": "...", "Type": 2}]}`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::catalog::{ClientQuery, Notification, NotificationCatalog};
use crate::error::DispatchError;

/// Per-request business logic.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Turns one request body into one response body.
    async fn handle(&self, peer: &str, body: &[u8]) -> Result<Vec<u8>, DispatchError>;
}

/// Client request payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    /// Dotted client version.
    #[serde(rename = "Version", alias = "version")]
    pub version: String,
    /// Client product.
    #[serde(rename = "Product", alias = "product", default)]
    pub product: Option<String>,
}

/// Response payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationResponse {
    /// Eligible notifications, highest `Type` first.
    #[serde(rename = "Notifications")]
    pub notifications: Vec<Notification>,
}

/// Body sent back when a request fails.
#[derive(Serialize)]
struct ErrorBody<'a> {
    #[serde(rename = "Error")]
    error: &'a str,
}

/// Renders a per-request failure as a response body.
pub(crate) fn error_body(err: &DispatchError) -> Vec<u8> {
    let msg = err.to_string();
    serde_json::to_vec(&ErrorBody { error: &msg }).unwrap_or_default()
}

/// Serves notification queries from a catalog.
pub struct NotificationHandler {
    catalog: Arc<NotificationCatalog>,
}

impl NotificationHandler {
    /// Handler backed by `catalog`.
    pub fn new(catalog: Arc<NotificationCatalog>) -> Self {
        Self { catalog }
    }

    /// Decodes a request body into a query.
    pub fn decode(body: &[u8]) -> Result<ClientQuery, DispatchError> {
        let req: NotificationRequest =
            serde_json::from_slice(body).map_err(|e| DispatchError::BadRequest {
                details: e.to_string(),
            })?;
        let product = req.product.as_deref().filter(|p| !p.is_empty());
        Ok(ClientQuery::parse(&req.version, product)?)
    }
}

#[async_trait]
impl Handler for NotificationHandler {
    async fn handle(&self, peer: &str, body: &[u8]) -> Result<Vec<u8>, DispatchError> {
        let query = Self::decode(body)?;
        tracing::info!(
            peer,
            version = %query.version,
            product = query.product.as_deref().unwrap_or("-"),
            "Info requested from v{}",
            query.version
        );

        if self.catalog.is_stale() {
            // The rescan reads the source; keep it off the async workers.
            let catalog = Arc::clone(&self.catalog);
            tokio::task::spawn_blocking(move || catalog.refresh_if_stale())
                .await
                .map_err(|e| DispatchError::Panicked {
                    info: e.to_string(),
                })?;
        }
        let list = self.catalog.resolve_current(&query);

        let resp = NotificationResponse {
            notifications: list.to_vec(),
        };
        serde_json::to_vec(&resp).map_err(|e| DispatchError::Encode {
            details: e.to_string(),
        })
    }
}
