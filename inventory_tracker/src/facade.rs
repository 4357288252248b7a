//! Inventory facade
//!
//! Entry point for user-initiated operations. Every call takes the caller's
//! context explicitly; mutations require the admin role and mark the record
//! dirty so the next reconciliation pass pushes it.

use crate::context::CallerContext;
use crate::error::Result;
use crate::export::ExportKind;
use crate::gateway::{CatalogGateway, RemoteSnapshotEntry};
use crate::product::{
    validate_name, validate_price, validate_quantity, NewProduct, ProductInfo, ProductRecord, Sku,
};
use crate::reconciler::{CancelFlag, PassSummary, Reconciler, SyncPolicy};
use crate::store::RecordStore;
use rust_decimal::Decimal;
use std::sync::Arc;

pub struct InventoryFacade {
    store: Arc<dyn RecordStore>,
    gateway: Arc<dyn CatalogGateway>,
    reconciler: Reconciler,
}

impl InventoryFacade {
    pub fn new(
        store: Arc<dyn RecordStore>,
        gateway: Arc<dyn CatalogGateway>,
        policy: SyncPolicy,
    ) -> Self {
        let reconciler = Reconciler::new(Arc::clone(&store), Arc::clone(&gateway), policy);
        Self {
            store,
            gateway,
            reconciler,
        }
    }

    pub fn add_product(&self, ctx: &CallerContext, product: NewProduct) -> Result<ProductInfo> {
        ctx.require_modify("add products")?;
        let sku = Sku::parse(&product.sku)?;
        let record = ProductRecord::new_local(sku, &product.name, product.price, product.quantity)?;
        let info = record.info()?;
        self.store.insert(record)?;
        log::info!("{} added product {} ({})", ctx.username, info.sku, info.name);
        Ok(info)
    }

    pub fn remove_product(&self, ctx: &CallerContext, sku: &str) -> Result<ProductInfo> {
        ctx.require_modify("remove products")?;
        let sku = Sku::parse(sku)?;
        let removed = self.store.remove(&sku)?;
        log::info!("{} removed product {}", ctx.username, sku);
        removed.info()
    }

    /// Set the on-hand quantity. Setting the current value still marks the record dirty.
    pub fn update_quantity(
        &self,
        ctx: &CallerContext,
        sku: &str,
        quantity: i64,
    ) -> Result<ProductInfo> {
        ctx.require_modify("update quantities")?;
        let sku = Sku::parse(sku)?;
        let quantity = validate_quantity(quantity)?;
        let record = self.store.update(&sku, &mut |record: &mut ProductRecord| {
            record.quantity_on_hand = quantity;
            record.dirty = true;
            Ok(())
        })?;
        log::info!("{} set quantity of {} to {}", ctx.username, sku, quantity);
        record.info()
    }

    pub fn update_price(
        &self,
        ctx: &CallerContext,
        sku: &str,
        price: Decimal,
    ) -> Result<ProductInfo> {
        ctx.require_modify("update prices")?;
        let sku = Sku::parse(sku)?;
        let price = validate_price(price)?;
        let record = self.store.update(&sku, &mut |record: &mut ProductRecord| {
            record.unit_price = price;
            record.dirty = true;
            Ok(())
        })?;
        log::info!("{} set price of {} to {}", ctx.username, sku, price);
        record.info()
    }

    pub fn rename_product(&self, ctx: &CallerContext, sku: &str, name: &str) -> Result<ProductInfo> {
        ctx.require_modify("rename products")?;
        let sku = Sku::parse(sku)?;
        let name = validate_name(name)?;
        let record = self.store.update(&sku, &mut |record: &mut ProductRecord| {
            record.display_name = name.clone();
            record.dirty = true;
            Ok(())
        })?;
        log::info!("{} renamed {} to {}", ctx.username, sku, record.display_name);
        record.info()
    }

    pub fn get_product_info(&self, _ctx: &CallerContext, sku: &str) -> Result<ProductInfo> {
        let sku = Sku::parse(sku)?;
        self.store.get(&sku)?.info()
    }

    /// All products ordered by SKU
    pub fn list_products(&self, _ctx: &CallerContext) -> Result<Vec<ProductInfo>> {
        self.store
            .list_all()?
            .iter()
            .map(ProductRecord::info)
            .collect()
    }

    pub fn get_total_inventory_value(&self, _ctx: &CallerContext) -> Result<Decimal> {
        self.store.total_value()
    }

    pub fn export(&self, ctx: &CallerContext, kind: ExportKind) -> Result<String> {
        let products = self.list_products(ctx)?;
        log::debug!("Exporting {} products as {}", products.len(), kind);
        kind.render(&products)
    }

    /// Look a product up directly in the remote catalog without touching the store
    pub async fn fetch_remote_product(
        &self,
        _ctx: &CallerContext,
        sku: &str,
    ) -> Result<Option<RemoteSnapshotEntry>> {
        let sku = Sku::parse(sku)?;
        Ok(self.gateway.fetch_product(&sku).await?)
    }

    /// Run one reconciliation pass. Per-SKU problems land in the summary, not in `Err`.
    pub async fn trigger_sync(
        &self,
        ctx: &CallerContext,
        cancel: &CancelFlag,
    ) -> Result<PassSummary> {
        ctx.require_modify("trigger catalog sync")?;
        log::info!("{} triggered catalog sync", ctx.username);
        Ok(self.reconciler.run_pass(cancel).await)
    }
}

#[cfg(test)]
#[path = "facade_tests.rs"]
mod tests;
