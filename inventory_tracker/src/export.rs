//! Inventory exports
//!
//! Each format is a variant with its own formatting function; the kind is
//! resolved once at the boundary (CLI flag, request parameter).

use crate::error::{InventoryError, Result};
use crate::product::ProductInfo;
use csv::WriterBuilder;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Csv,
    Json,
    Text,
}

impl ExportKind {
    pub fn render(&self, products: &[ProductInfo]) -> Result<String> {
        match self {
            ExportKind::Csv => to_csv(products),
            ExportKind::Json => to_json(products),
            ExportKind::Text => to_text(products),
        }
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportKind::Csv => "csv",
            ExportKind::Json => "json",
            ExportKind::Text => "text",
        })
    }
}

impl FromStr for ExportKind {
    type Err = InventoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportKind::Csv),
            "json" => Ok(ExportKind::Json),
            "text" | "txt" => Ok(ExportKind::Text),
            other => Err(InventoryError::InvalidInput(format!(
                "Unknown export format '{}', expected csv, json or text",
                other
            ))),
        }
    }
}

/// Flat export row; money stays an exact decimal string
#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    sku: &'a str,
    name: &'a str,
    price: String,
    quantity: u32,
    total_value: String,
}

impl<'a> From<&'a ProductInfo> for ExportRow<'a> {
    fn from(info: &'a ProductInfo) -> Self {
        Self {
            sku: info.sku.as_str(),
            name: &info.name,
            price: info.price.to_string(),
            quantity: info.quantity,
            total_value: info.total_value.to_string(),
        }
    }
}

fn to_csv(products: &[ProductInfo]) -> Result<String> {
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(vec![]);
    // Serialized rows only emit the header alongside the first row
    if products.is_empty() {
        writer
            .write_record(["sku", "name", "price", "quantity", "total_value"])
            .map_err(|e| InventoryError::Export(e.to_string()))?;
    }
    for info in products {
        writer
            .serialize(ExportRow::from(info))
            .map_err(|e| InventoryError::Export(e.to_string()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| InventoryError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| InventoryError::Export(e.to_string()))
}

fn to_json(products: &[ProductInfo]) -> Result<String> {
    let rows: Vec<ExportRow<'_>> = products.iter().map(ExportRow::from).collect();
    serde_json::to_string_pretty(&rows).map_err(|e| InventoryError::Export(e.to_string()))
}

fn to_text(products: &[ProductInfo]) -> Result<String> {
    if products.is_empty() {
        return Ok("Inventory is empty\n".to_string());
    }

    let mut output = String::new();
    for info in products {
        output.push_str(&format!(
            "{} - Price: ${:.2}, Quantity: {}\n",
            info.name, info.price, info.quantity
        ));
    }
    let total = products
        .iter()
        .try_fold(Decimal::ZERO, |total, p| total.checked_add(p.total_value))
        .ok_or_else(|| InventoryError::Export("Total inventory value overflows".to_string()))?;
    output.push_str(&format!("\nTotal Inventory Value: ${:.2}\n", total));
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::{ProductRecord, Sku};
    use rust_decimal_macros::dec;

    fn sample() -> Vec<ProductInfo> {
        vec![
            ProductRecord::new_local(Sku::parse("K-1").unwrap(), "Keyboard", dec!(59.99), 15)
                .unwrap()
                .info()
                .unwrap(),
            ProductRecord::new_local(Sku::parse("L-1").unwrap(), "Laptop, 14\"", dec!(999.99), 5)
                .unwrap()
                .info()
                .unwrap(),
        ]
    }

    #[test]
    fn parses_kinds() {
        assert_eq!("CSV".parse::<ExportKind>().unwrap(), ExportKind::Csv);
        assert_eq!("txt".parse::<ExportKind>().unwrap(), ExportKind::Text);
        assert!("pdf".parse::<ExportKind>().is_err());
    }

    #[test]
    fn csv_has_header_and_quotes_fields() {
        let csv = ExportKind::Csv.render(&sample()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("sku,name,price,quantity,total_value"));
        assert_eq!(lines.next(), Some("K-1,Keyboard,59.99,15,899.85"));
        assert_eq!(lines.next(), Some("L-1,\"Laptop, 14\"\"\",999.99,5,4999.95"));
    }

    #[test]
    fn csv_of_empty_inventory_is_header_only() {
        let csv = ExportKind::Csv.render(&[]).unwrap();
        assert_eq!(csv.trim_end(), "sku,name,price,quantity,total_value");
    }

    #[test]
    fn json_keeps_exact_prices() {
        let json = ExportKind::Json.render(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["sku"], "K-1");
        assert_eq!(value[0]["price"], "59.99");
        assert_eq!(value[1]["total_value"], "4999.95");
    }

    #[test]
    fn text_lists_products_and_total() {
        let text = ExportKind::Text.render(&sample()).unwrap();
        assert!(text.starts_with("Keyboard - Price: $59.99, Quantity: 15\n"));
        assert!(text.ends_with("Total Inventory Value: $5899.80\n"));
    }

    #[test]
    fn text_of_empty_inventory() {
        assert_eq!(ExportKind::Text.render(&[]).unwrap(), "Inventory is empty\n");
    }
}
