//! Remote catalog gateway
//!
//! Typed transport boundary to the external B2B catalog. Implementations only
//! move data across the wire; all merge decisions live in the reconciler.

mod http;

pub use http::{GatewayConfig, HttpCatalogGateway};

use crate::error::GatewayError;
use crate::product::{ProductRecord, Sku};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One product as the remote catalog currently describes it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSnapshotEntry {
    pub sku: Sku,
    pub display_name: String,
    pub unit_price: Decimal,
    /// Kept signed so a bad remote value can be reported instead of failing the fetch
    pub quantity_on_hand: i64,
    pub remote_version: String,
}

/// Remote acknowledgement of a pushed change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushAck {
    /// Version the remote assigned to the product after accepting the change
    pub remote_version: String,
}

#[async_trait]
pub trait CatalogGateway: Send + Sync {
    /// Fetch the full catalog, or only changes after `since_version` when given.
    /// Yields a complete sequence or fails; never a partial one.
    async fn fetch_snapshot(
        &self,
        since_version: Option<&str>,
    ) -> Result<Vec<RemoteSnapshotEntry>, GatewayError>;

    /// Fetch a single product, `None` if the remote does not know the SKU
    async fn fetch_product(&self, sku: &Sku) -> Result<Option<RemoteSnapshotEntry>, GatewayError>;

    /// Send a locally edited record to the remote catalog
    async fn push_local_change(&self, record: &ProductRecord) -> Result<PushAck, GatewayError>;
}
