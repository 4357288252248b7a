//! Tests for the inventory facade

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::context::CallerContext;
use crate::error::{GatewayError, InventoryError};
use crate::export::ExportKind;
use crate::facade::InventoryFacade;
use crate::gateway::{CatalogGateway, PushAck, RemoteSnapshotEntry};
use crate::product::{NewProduct, ProductRecord, Sku};
use crate::reconciler::{CancelFlag, PassStatus, SyncOutcome, SyncPolicy};
use crate::store::{MemoryStore, RecordStore, SqliteStore};

/// Remote catalog that serves a fixed list and accepts every push
#[derive(Default)]
struct FixedCatalog {
    entries: Mutex<Vec<RemoteSnapshotEntry>>,
}

impl FixedCatalog {
    fn with(entries: Vec<RemoteSnapshotEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }
}

#[async_trait]
impl CatalogGateway for FixedCatalog {
    async fn fetch_snapshot(
        &self,
        _since_version: Option<&str>,
    ) -> Result<Vec<RemoteSnapshotEntry>, GatewayError> {
        Ok(self.entries.lock().unwrap().clone())
    }

    async fn fetch_product(&self, sku: &Sku) -> Result<Option<RemoteSnapshotEntry>, GatewayError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .find(|e| &e.sku == sku)
            .cloned())
    }

    async fn push_local_change(&self, record: &ProductRecord) -> Result<PushAck, GatewayError> {
        let version = format!(
            "{}-next",
            record.remote_version.as_deref().unwrap_or("new")
        );
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.iter_mut().find(|e| e.sku == record.sku) {
            entry.display_name = record.display_name.clone();
            entry.unit_price = record.unit_price;
            entry.quantity_on_hand = i64::from(record.quantity_on_hand);
            entry.remote_version = version.clone();
        }
        Ok(PushAck {
            remote_version: version,
        })
    }
}

fn admin() -> CallerContext {
    CallerContext::admin("alice")
}

fn partner() -> CallerContext {
    CallerContext::partner("shop-b")
}

fn new_product(sku: &str, name: &str, price: Decimal, quantity: i64) -> NewProduct {
    NewProduct {
        sku: sku.to_string(),
        name: name.to_string(),
        price,
        quantity,
    }
}

fn facade_with(gateway: FixedCatalog) -> (InventoryFacade, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let facade = InventoryFacade::new(store.clone(), Arc::new(gateway), SyncPolicy::default());
    (facade, store)
}

fn facade() -> InventoryFacade {
    facade_with(FixedCatalog::default()).0
}

// ── Local CRUD ───────────────────────────────────────────────────────

#[test]
fn add_then_get_product_info() {
    let facade = facade();
    facade
        .add_product(&admin(), new_product(" A-1 ", "Laptop", dec!(999.99), 5))
        .unwrap();

    let info = facade.get_product_info(&partner(), "A-1").unwrap();
    assert_eq!(info.name, "Laptop");
    assert_eq!(info.price, dec!(999.99));
    assert_eq!(info.quantity, 5);
    assert_eq!(info.total_value, dec!(4999.95));
    assert!(info.dirty);
    assert!(info.last_synced_at.is_none());
}

#[test]
fn add_existing_sku_fails() {
    let facade = facade();
    facade
        .add_product(&admin(), new_product("A-1", "Laptop", dec!(999.99), 5))
        .unwrap();
    let err = facade
        .add_product(&admin(), new_product("A-1", "Other", dec!(1), 1))
        .unwrap_err();
    assert!(matches!(err, InventoryError::AlreadyExists(ref s) if s == "A-1"));
}

#[test]
fn add_rejects_invalid_fields() {
    let facade = facade();
    for bad in [
        new_product("  ", "Laptop", dec!(1), 1),
        new_product("A-1", "", dec!(1), 1),
        new_product("A-1", "Laptop", dec!(-0.01), 1),
        new_product("A-1", "Laptop", dec!(1), -1),
    ] {
        let err = facade.add_product(&admin(), bad).unwrap_err();
        assert!(matches!(err, InventoryError::InvalidInput(_)), "{:?}", err);
    }
    assert!(facade.list_products(&admin()).unwrap().is_empty());
}

#[test]
fn free_product_is_allowed() {
    let facade = facade();
    let info = facade
        .add_product(&admin(), new_product("GIFT", "Sticker", dec!(0), 100))
        .unwrap();
    assert_eq!(info.total_value, Decimal::ZERO);
}

#[test]
fn huge_price_is_rejected_instead_of_overflowing() {
    let facade = facade();
    let err = facade
        .add_product(&admin(), new_product("GOLD", "Bar", Decimal::MAX / dec!(2), 3))
        .unwrap_err();
    assert!(matches!(err, InventoryError::InvalidInput(_)), "{:?}", err);
    assert!(facade.list_products(&admin()).unwrap().is_empty());
    assert_eq!(facade.get_total_inventory_value(&admin()).unwrap(), Decimal::ZERO);

    facade
        .add_product(&admin(), new_product("GOLD", "Bar", dec!(1), 3))
        .unwrap();
    let err = facade
        .update_price(&admin(), "GOLD", Decimal::MAX / dec!(2))
        .unwrap_err();
    assert!(matches!(err, InventoryError::InvalidInput(_)));
    assert_eq!(facade.get_product_info(&admin(), "GOLD").unwrap().price, dec!(1));
}

#[test]
fn update_quantity_marks_dirty_even_when_unchanged() {
    let (facade, store) = facade_with(FixedCatalog::default());
    let mut record =
        ProductRecord::new_local(Sku::parse("A-1").unwrap(), "Mouse", dec!(29.99), 20).unwrap();
    record.dirty = false;
    record.remote_version = Some("v1".to_string());
    store.upsert(record).unwrap();

    let info = facade.update_quantity(&admin(), "A-1", 20).unwrap();
    assert_eq!(info.quantity, 20);
    assert!(info.dirty);
    assert!(store.get(&Sku::parse("A-1").unwrap()).unwrap().dirty);
}

#[test]
fn update_quantity_rejects_negative_and_unknown() {
    let facade = facade();
    facade
        .add_product(&admin(), new_product("A-1", "Mouse", dec!(29.99), 20))
        .unwrap();

    let err = facade.update_quantity(&admin(), "A-1", -5).unwrap_err();
    assert!(matches!(err, InventoryError::InvalidInput(_)));
    assert_eq!(facade.get_product_info(&admin(), "A-1").unwrap().quantity, 20);

    let err = facade.update_quantity(&admin(), "B-2", 1).unwrap_err();
    assert!(matches!(err, InventoryError::NotFound(_)));
}

#[test]
fn update_price_and_rename() {
    let facade = facade();
    facade
        .add_product(&admin(), new_product("A-1", "Mouse", dec!(29.99), 2))
        .unwrap();

    let info = facade.update_price(&admin(), "A-1", dec!(24.50)).unwrap();
    assert_eq!(info.total_value, dec!(49.00));
    assert!(facade.update_price(&admin(), "A-1", dec!(-1)).is_err());

    let info = facade.rename_product(&admin(), "A-1", "  Gaming Mouse ").unwrap();
    assert_eq!(info.name, "Gaming Mouse");
    assert!(facade.rename_product(&admin(), "A-1", " ").is_err());
}

#[test]
fn remove_product_then_not_found() {
    let facade = facade();
    facade
        .add_product(&admin(), new_product("A-1", "Keyboard", dec!(59.99), 15))
        .unwrap();
    let removed = facade.remove_product(&admin(), "A-1").unwrap();
    assert_eq!(removed.name, "Keyboard");

    assert!(matches!(
        facade.get_product_info(&admin(), "A-1"),
        Err(InventoryError::NotFound(_))
    ));
    assert!(matches!(
        facade.remove_product(&admin(), "A-1"),
        Err(InventoryError::NotFound(_))
    ));
}

#[test]
fn total_inventory_value() {
    let facade = facade();
    assert_eq!(facade.get_total_inventory_value(&admin()).unwrap(), Decimal::ZERO);

    facade
        .add_product(&admin(), new_product("A", "Laptop", dec!(999.99), 5))
        .unwrap();
    facade
        .add_product(&admin(), new_product("B", "Mouse", dec!(29.99), 20))
        .unwrap();
    facade
        .add_product(&admin(), new_product("C", "Keyboard", dec!(59.99), 15))
        .unwrap();

    assert_eq!(
        facade.get_total_inventory_value(&partner()).unwrap(),
        dec!(6499.60)
    );
}

#[test]
fn export_text_through_facade() {
    let facade = facade();
    assert_eq!(
        facade.export(&partner(), ExportKind::Text).unwrap(),
        "Inventory is empty\n"
    );
    facade
        .add_product(&admin(), new_product("A", "Laptop", dec!(999.99), 5))
        .unwrap();
    let text = facade.export(&partner(), ExportKind::Text).unwrap();
    assert!(text.starts_with("Laptop - Price: $999.99, Quantity: 5\n"));
}

// ── Permissions ──────────────────────────────────────────────────────

#[tokio::test]
async fn partner_cannot_mutate_or_sync() {
    let facade = facade();
    facade
        .add_product(&admin(), new_product("A-1", "Laptop", dec!(999.99), 5))
        .unwrap();

    let denied = |err: InventoryError| matches!(err, InventoryError::PermissionDenied { .. });
    assert!(denied(
        facade
            .add_product(&partner(), new_product("B", "X", dec!(1), 1))
            .unwrap_err()
    ));
    assert!(denied(facade.remove_product(&partner(), "A-1").unwrap_err()));
    assert!(denied(facade.update_quantity(&partner(), "A-1", 1).unwrap_err()));
    assert!(denied(facade.update_price(&partner(), "A-1", dec!(1)).unwrap_err()));
    assert!(denied(
        facade
            .trigger_sync(&partner(), &CancelFlag::new())
            .await
            .unwrap_err()
    ));

    // Denied edits leave the record alone
    let info = facade.get_product_info(&partner(), "A-1").unwrap();
    assert_eq!(info.quantity, 5);
    assert_eq!(info.price, dec!(999.99));
}

// ── Sync through the facade ──────────────────────────────────────────

fn remote(sku: &str, name: &str, price: Decimal, qty: i64, version: &str) -> RemoteSnapshotEntry {
    RemoteSnapshotEntry {
        sku: Sku::parse(sku).unwrap(),
        display_name: name.to_string(),
        unit_price: price,
        quantity_on_hand: qty,
        remote_version: version.to_string(),
    }
}

#[tokio::test]
async fn edit_is_pushed_on_next_sync() {
    let (facade, store) = facade_with(FixedCatalog::with(vec![remote(
        "A-1",
        "Laptop",
        dec!(999.99),
        5,
        "v1",
    )]));

    let first = facade.trigger_sync(&admin(), &CancelFlag::new()).await.unwrap();
    assert_eq!(first.status, PassStatus::Completed);
    assert_eq!(first.outcome_for("A-1"), Some(&SyncOutcome::Applied));
    assert!(!store.get(&Sku::parse("A-1").unwrap()).unwrap().dirty);

    facade.update_quantity(&admin(), "A-1", 3).unwrap();
    let second = facade.trigger_sync(&admin(), &CancelFlag::new()).await.unwrap();
    assert_eq!(second.outcome_for("A-1"), Some(&SyncOutcome::Applied));

    let record = store.get(&Sku::parse("A-1").unwrap()).unwrap();
    assert!(!record.dirty);
    assert_eq!(record.quantity_on_hand, 3);
    assert_eq!(record.remote_version.as_deref(), Some("v1-next"));

    let third = facade.trigger_sync(&admin(), &CancelFlag::new()).await.unwrap();
    assert_eq!(third.counts.unchanged, 1);
}

#[tokio::test]
async fn fetch_remote_product_does_not_touch_store() {
    let (facade, store) = facade_with(FixedCatalog::with(vec![remote(
        "A-1",
        "Laptop",
        dec!(999.99),
        5,
        "v1",
    )]));

    let entry = facade
        .fetch_remote_product(&partner(), "A-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.display_name, "Laptop");
    assert!(facade
        .fetch_remote_product(&partner(), "Z-9")
        .await
        .unwrap()
        .is_none());
    assert_eq!(store.count().unwrap(), 0);
}

// ── Randomized operation sequences ───────────────────────────────────

#[test]
fn random_edits_keep_records_valid_and_total_consistent() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let facade = InventoryFacade::new(
        store.clone(),
        Arc::new(FixedCatalog::default()),
        SyncPolicy::default(),
    );
    let ctx = admin();
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for _ in 0..500 {
        let sku = format!("SKU-{}", rng.gen_range(0..12));
        let price = Decimal::new(rng.gen_range(-500..100_000), 2);
        let qty: i64 = rng.gen_range(-10..1_000);

        // Errors are expected for invalid inputs and missing SKUs
        let _ = match rng.gen_range(0..4) {
            0 => facade
                .add_product(&ctx, new_product(&sku, "Random item", price, qty))
                .map(|_| ()),
            1 => facade.update_quantity(&ctx, &sku, qty).map(|_| ()),
            2 => facade.update_price(&ctx, &sku, price).map(|_| ()),
            _ => facade.remove_product(&ctx, &sku).map(|_| ()),
        };

        let records = store.list_all().unwrap();
        for record in &records {
            assert!(record.unit_price >= Decimal::ZERO);
            assert!(!record.display_name.trim().is_empty());
        }
        let expected: Decimal = records
            .iter()
            .map(|r| r.unit_price * Decimal::from(r.quantity_on_hand))
            .sum();
        assert_eq!(facade.get_total_inventory_value(&ctx).unwrap(), expected);
    }
}
