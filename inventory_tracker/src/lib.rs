//! Inventory Tracker - local product store kept in sync with a B2B catalog
//!
//! Products live in a local SQLite store and are edited through the
//! [`InventoryFacade`]. A [`Reconciler`] pass merges the remote catalog
//! snapshot into the store and pushes local edits back. Callers are
//! resolved to a role through the [`UserRegistry`].

pub mod config;
pub mod context;
pub mod error;
pub mod export;
pub mod facade;
pub mod gateway;
pub mod product;
pub mod reconciler;
pub mod store;
pub mod users;

pub use config::{default_db_path, TrackerConfig};
pub use context::{CallerContext, Role};
pub use error::{GatewayError, InventoryError, Result};
pub use export::ExportKind;
pub use facade::InventoryFacade;
pub use gateway::{CatalogGateway, GatewayConfig, HttpCatalogGateway, PushAck, RemoteSnapshotEntry};
pub use product::{NewProduct, ProductInfo, ProductRecord, Sku};
pub use reconciler::{
    CancelFlag, OutcomeCounts, PassStatus, PassSummary, Reconciler, SkuOutcome, SyncOutcome,
    SyncPolicy,
};
pub use store::{MemoryStore, RecordStore, SqliteStore};
pub use users::{User, UserDirectory, UserRegistry, DEFAULT_ADMIN};
