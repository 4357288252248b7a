//! Catalog record store
//!
//! The store exclusively owns product records. Every `upsert` is atomic for
//! its SKU and serialized against other writers, so when a local edit races
//! a sync commit the last committed write wins.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::{InventoryError, Result};
use crate::product::{ProductRecord, Sku};
use rust_decimal::Decimal;

/// Persistence contract shared by the SQLite and in-memory stores
pub trait RecordStore: Send + Sync {
    /// Fetch one record, `NotFound` if the SKU is unknown
    fn get(&self, sku: &Sku) -> Result<ProductRecord>;

    /// Insert a new record, `AlreadyExists` if the SKU is taken
    fn insert(&self, record: ProductRecord) -> Result<()>;

    /// Insert or replace a record, returning the previous value if any
    fn upsert(&self, record: ProductRecord) -> Result<Option<ProductRecord>>;

    /// Read-modify-write one record under the store's write lock.
    /// The edit is discarded if `apply` fails or the result is invalid.
    fn update(
        &self,
        sku: &Sku,
        apply: &mut dyn FnMut(&mut ProductRecord) -> Result<()>,
    ) -> Result<ProductRecord>;

    /// Delete a record, returning it, `NotFound` if the SKU is unknown
    fn remove(&self, sku: &Sku) -> Result<ProductRecord>;

    /// All records ordered by SKU
    fn list_all(&self) -> Result<Vec<ProductRecord>>;

    /// Number of records in the store
    fn count(&self) -> Result<usize> {
        Ok(self.list_all()?.len())
    }

    /// Sum of `unit_price * quantity_on_hand`, recomputed on every call
    fn total_value(&self) -> Result<Decimal> {
        self.list_all()?
            .iter()
            .try_fold(Decimal::ZERO, |total, record| {
                total.checked_add(record.total_value()?).ok_or_else(|| {
                    InventoryError::InvalidInput("Total inventory value overflows".to_string())
                })
            })
    }
}
