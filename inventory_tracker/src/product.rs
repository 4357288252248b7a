//! Product records held in the local store
//!
//! A record is keyed by its SKU and carries the sync bookkeeping
//! (remote version, last sync time, dirty flag) next to the catalog fields.

use crate::error::{InventoryError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique product identifier, trimmed and never empty
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sku(String);

impl Sku {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InventoryError::InvalidInput(
                "SKU must be a non-empty string".to_string(),
            ));
        }
        Ok(Sku(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl TryFrom<String> for Sku {
    type Error = InventoryError;

    fn try_from(value: String) -> Result<Self> {
        Sku::parse(&value)
    }
}

impl From<Sku> for String {
    fn from(sku: Sku) -> Self {
        sku.0
    }
}

/// Validate and normalise a display name
pub fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(InventoryError::InvalidInput(
            "Product name must be a non-empty string".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Highest accepted unit price. Keeps `price * quantity` and inventory
/// totals far inside `Decimal`'s range for any `u32` quantity.
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Prices are non-negative decimals no larger than `MAX_UNIT_PRICE`
pub fn validate_price(price: Decimal) -> Result<Decimal> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(InventoryError::InvalidInput(format!(
            "Price must be a non-negative number, got {}",
            price
        )));
    }
    if price > MAX_UNIT_PRICE {
        return Err(InventoryError::InvalidInput(format!(
            "Price must not exceed {}, got {}",
            MAX_UNIT_PRICE, price
        )));
    }
    Ok(price)
}

/// Quantities arrive as signed integers from callers and are stored unsigned
pub fn validate_quantity(quantity: i64) -> Result<u32> {
    u32::try_from(quantity).map_err(|_| {
        InventoryError::InvalidInput(format!(
            "Quantity must be a non-negative integer, got {}",
            quantity
        ))
    })
}

/// Local product state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub sku: Sku,
    pub display_name: String,
    pub unit_price: Decimal,
    pub quantity_on_hand: u32,
    /// Opaque token from the remote catalog; `None` until first synced
    pub remote_version: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Set on every local edit, cleared once the remote has our state
    pub dirty: bool,
}

impl ProductRecord {
    /// Build a record for a product created locally (never synced, dirty)
    pub fn new_local(sku: Sku, name: &str, price: Decimal, quantity: i64) -> Result<Self> {
        Ok(Self {
            sku,
            display_name: validate_name(name)?,
            unit_price: validate_price(price)?,
            quantity_on_hand: validate_quantity(quantity)?,
            remote_version: None,
            last_synced_at: None,
            dirty: true,
        })
    }

    /// Check the invariants that the type system does not already enforce
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.display_name)?;
        validate_price(self.unit_price)?;
        Ok(())
    }

    /// `unit_price * quantity_on_hand`
    pub fn total_value(&self) -> Result<Decimal> {
        self.unit_price
            .checked_mul(Decimal::from(self.quantity_on_hand))
            .ok_or_else(|| {
                InventoryError::InvalidInput(format!(
                    "Total value of {} overflows ({} x {})",
                    self.sku, self.unit_price, self.quantity_on_hand
                ))
            })
    }

    /// Whether the catalog-visible fields match another record's
    pub fn same_catalog_fields(&self, other: &ProductRecord) -> bool {
        self.display_name == other.display_name
            && self.unit_price == other.unit_price
            && self.quantity_on_hand == other.quantity_on_hand
    }

    pub fn info(&self) -> Result<ProductInfo> {
        Ok(ProductInfo {
            sku: self.sku.clone(),
            name: self.display_name.clone(),
            price: self.unit_price,
            quantity: self.quantity_on_hand,
            total_value: self.total_value()?,
            dirty: self.dirty,
            last_synced_at: self.last_synced_at,
        })
    }
}

impl fmt::Display for ProductRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - Price: ${:.2}, Quantity: {}",
            self.display_name, self.unit_price, self.quantity_on_hand
        )
    }
}

/// Read view of a product, as handed to UI/CLI callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductInfo {
    pub sku: Sku,
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
    pub total_value: Decimal,
    pub dirty: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Input for `add_product`
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub price: Decimal,
    pub quantity: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sku(raw: &str) -> Sku {
        Sku::parse(raw).unwrap()
    }

    #[test]
    fn sku_is_trimmed() {
        assert_eq!(sku("  A-1 ").as_str(), "A-1");
    }

    #[test]
    fn sku_rejects_blank() {
        assert!(matches!(
            Sku::parse("   "),
            Err(InventoryError::InvalidInput(_))
        ));
        assert!(Sku::parse("").is_err());
    }

    #[test]
    fn sku_deserialize_validates() {
        let ok: Sku = serde_json::from_str("\"X-100\"").unwrap();
        assert_eq!(ok.as_str(), "X-100");
        assert!(serde_json::from_str::<Sku>("\"  \"").is_err());
    }

    #[test]
    fn valid_product_creation() {
        let record = ProductRecord::new_local(sku("T-1"), " Test Product ", dec!(10.99), 5).unwrap();
        assert_eq!(record.display_name, "Test Product");
        assert_eq!(record.unit_price, dec!(10.99));
        assert_eq!(record.quantity_on_hand, 5);
        assert!(record.dirty);
        assert!(record.remote_version.is_none());
    }

    #[test]
    fn invalid_product_creation() {
        assert!(ProductRecord::new_local(sku("T-1"), "", dec!(10.99), 5).is_err());
        assert!(ProductRecord::new_local(sku("T-1"), "Test", dec!(-10), 5).is_err());
        assert!(ProductRecord::new_local(sku("T-1"), "Test", dec!(10.99), -5).is_err());
    }

    #[test]
    fn zero_price_is_allowed() {
        assert!(validate_price(dec!(0)).is_ok());
        assert!(validate_price(dec!(-0.00)).is_ok());
    }

    #[test]
    fn quantity_out_of_range() {
        assert!(validate_quantity(i64::from(u32::MAX) + 1).is_err());
        assert_eq!(validate_quantity(0).unwrap(), 0);
    }

    #[test]
    fn product_info_total_value() {
        let record = ProductRecord::new_local(sku("T-1"), "Test Product", dec!(10.99), 5).unwrap();
        let info = record.info().unwrap();
        assert_eq!(info.name, "Test Product");
        assert_eq!(info.total_value, dec!(54.95));
    }

    #[test]
    fn display_matches_inventory_listing() {
        let record = ProductRecord::new_local(sku("L-1"), "Laptop", dec!(999.99), 5).unwrap();
        assert_eq!(record.to_string(), "Laptop - Price: $999.99, Quantity: 5");
    }

    #[test]
    fn price_ceiling() {
        assert_eq!(validate_price(MAX_UNIT_PRICE).unwrap(), dec!(1000000000));
        assert!(validate_price(MAX_UNIT_PRICE + dec!(0.01)).is_err());
        assert!(validate_price(Decimal::MAX / dec!(2)).is_err());
    }

    #[test]
    fn total_value_overflow_is_an_error() {
        let mut record = ProductRecord::new_local(sku("T-1"), "Test", dec!(1), 3).unwrap();
        // Bypasses validation, as a hand-built record could
        record.unit_price = Decimal::MAX / dec!(2);
        assert!(matches!(
            record.total_value(),
            Err(InventoryError::InvalidInput(_))
        ));
        assert!(record.info().is_err());
    }

    #[test]
    fn largest_valid_record_total_fits() {
        let mut record = ProductRecord::new_local(sku("T-1"), "Test", MAX_UNIT_PRICE, 0).unwrap();
        record.quantity_on_hand = u32::MAX;
        assert_eq!(
            record.total_value().unwrap(),
            MAX_UNIT_PRICE * Decimal::from(u32::MAX)
        );
    }
}
