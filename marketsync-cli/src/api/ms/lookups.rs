//! Code, barcode and stock lookups against the ERP

use anyhow::Result;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use super::client::MsClient;
use super::models::{Meta, row_meta, row_str};

/// Codes of all rows
pub fn codes_of(rows: &[Value]) -> HashSet<String> {
    rows.iter()
        .filter_map(|row| row_str(row, "code"))
        .map(str::to_string)
        .collect()
}

/// Codes of products that have no variants
pub fn single_product_codes_of(rows: &[Value]) -> HashSet<String> {
    rows.iter()
        .filter(|row| variants_count(row) == 0)
        .filter_map(|row| row_str(row, "code"))
        .map(str::to_string)
        .collect()
}

/// code → id; the first row wins when a code repeats
pub fn code_ids_of<'a>(rows: impl IntoIterator<Item = &'a Value>) -> HashMap<String, String> {
    let mut ids = HashMap::new();
    for row in rows {
        if let (Some(code), Some(id)) = (row_str(row, "code"), row_str(row, "id")) {
            ids.entry(code.to_string()).or_insert_with(|| id.to_string());
        }
    }
    ids
}

fn variants_count(row: &Value) -> u64 {
    row.get("variantsCount").and_then(Value::as_u64).unwrap_or(0)
}

/// barcode → stock for assortment rows. Each row counts once, under its
/// `stock_barcode`; products with variants hold no stock of their own.
pub fn stocks_of(rows: &[Value]) -> HashMap<String, i64> {
    let mut stocks = HashMap::new();
    for row in rows.iter().filter(|row| variants_count(row) == 0) {
        let Some(barcode) = stock_barcode(row) else {
            continue;
        };
        let stock = row
            .get("stock")
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
            .round() as i64;

        *stocks.entry(barcode).or_insert(0) += stock;
    }
    stocks
}

/// The barcode the marketplace reports a row under: the first `ean13`,
/// otherwise the first non-empty barcode of any type.
/// Rows carry barcodes as `[{"ean13": "..."}, {"code128": "..."}]`.
pub fn stock_barcode(row: &Value) -> Option<String> {
    let entries: Vec<(&String, &str)> = row
        .get("barcodes")
        .and_then(Value::as_array)?
        .iter()
        .filter_map(Value::as_object)
        .flat_map(|entry| entry.iter())
        .filter_map(|(kind, value)| value.as_str().map(|v| (kind, v)))
        .filter(|(_, value)| !value.is_empty())
        .collect();

    entries
        .iter()
        .find(|(kind, _)| kind.as_str() == "ean13")
        .or_else(|| entries.first())
        .map(|(_, value)| value.to_string())
}

impl MsClient {
    /// Codes of every record of an entity
    pub async fn all_codes(&self, entity: &str) -> Result<HashSet<String>> {
        let rows = self.list_all(entity, None).await?;
        Ok(codes_of(&rows))
    }

    pub async fn product_codes(&self) -> Result<HashSet<String>> {
        self.all_codes("product").await
    }

    pub async fn single_product_codes(&self) -> Result<HashSet<String>> {
        let rows = self.list_all("product", None).await?;
        Ok(single_product_codes_of(&rows))
    }

    /// code → id of products without variants
    pub async fn single_product_ids(&self) -> Result<HashMap<String, String>> {
        let rows = self.list_all("product", None).await?;
        Ok(code_ids_of(rows.iter().filter(|row| variants_count(row) == 0)))
    }

    pub async fn variant_codes(&self) -> Result<HashSet<String>> {
        self.all_codes("variant").await
    }

    /// code → id of every variant
    pub async fn variant_ids(&self) -> Result<HashMap<String, String>> {
        let rows = self.list_all("variant", None).await?;
        Ok(code_ids_of(&rows))
    }

    pub async fn product_meta_by_code(&self, code: &str) -> Result<Option<Meta>> {
        let row = self.find_first("product", &format!("code={}", code)).await?;
        Ok(row.as_ref().and_then(row_meta))
    }

    /// Meta of the product or variant carrying a barcode
    pub async fn barcode_meta(&self, barcode: &str) -> Result<Option<Meta>> {
        let row = self
            .find_first("assortment", &format!("barcode={}", barcode))
            .await?;
        Ok(row.as_ref().and_then(row_meta))
    }

    pub async fn store_by_name(&self, name: &str) -> Result<Option<Meta>> {
        let row = self.find_first("store", &format!("name={}", name)).await?;
        Ok(row.as_ref().and_then(row_meta))
    }

    /// barcode → stock held in one store
    pub async fn stocks_by_store(&self, store: &Meta) -> Result<HashMap<String, i64>> {
        let filter = format!("stockStore={}", store.href);
        let rows = self.list_all("assortment", Some(&filter)).await?;
        Ok(stocks_of(&rows))
    }

    /// Filenames of the images already attached to a product or variant
    pub async fn image_filenames(&self, entity: &str, id: &str) -> Result<HashSet<String>> {
        let rows = self.list_all(&format!("{}/{}/images", entity, id), None).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row_str(row, "filename"))
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn products() -> Vec<Value> {
        vec![
            json!({"id": "p1", "code": "A1_4600001", "variantsCount": 0}),
            json!({"id": "p2", "code": "ART_base", "variantsCount": 3}),
            json!({"id": "p3", "code": "B2_4600002"}),
            json!({"id": "p4"}),
        ]
    }

    #[test]
    fn test_codes_of() {
        let codes = codes_of(&products());
        assert_eq!(codes.len(), 3);
        assert!(codes.contains("ART_base"));
    }

    #[test]
    fn test_single_product_codes_skip_products_with_variants() {
        let codes = single_product_codes_of(&products());
        assert!(codes.contains("A1_4600001"));
        assert!(codes.contains("B2_4600002"));
        assert!(!codes.contains("ART_base"));
    }

    #[test]
    fn test_code_ids_keep_first() {
        let rows = vec![
            json!({"id": "v1", "code": "K"}),
            json!({"id": "v2", "code": "K"}),
            json!({"id": "v3", "code": "L"}),
        ];
        let ids = code_ids_of(&rows);
        assert_eq!(ids["K"], "v1");
        assert_eq!(ids["L"], "v3");
    }

    #[test]
    fn test_stocks_of_sums_by_barcode() {
        let rows = vec![
            json!({"stock": 3.0, "barcodes": [{"ean13": "4600001"}]}),
            json!({"stock": 2.0, "barcodes": [{"ean13": "4600001"}]}),
            json!({"stock": 5.0}),
            json!({"barcodes": [{"ean13": "4600009"}]}),
        ];
        let stocks = stocks_of(&rows);
        assert_eq!(stocks["4600001"], 5);
        assert_eq!(stocks["4600009"], 0);
        assert_eq!(stocks.len(), 2);
    }

    #[test]
    fn test_stocks_of_counts_multi_barcode_row_once() {
        let rows = vec![json!({
            "stock": 5,
            "barcodes": [{"code128": "X-1"}, {"ean13": "4600001"}, {"ean8": "20000011"}]
        })];
        let stocks = stocks_of(&rows);
        assert_eq!(stocks, HashMap::from([("4600001".to_string(), 5)]));
    }

    #[test]
    fn test_stocks_of_skips_products_with_variants() {
        let rows = vec![
            json!({"stock": 7, "variantsCount": 2, "barcodes": [{"ean8": "20000011"}]}),
            json!({"stock": 4, "variantsCount": 0, "barcodes": [{"code128": "X-2"}]}),
        ];
        let stocks = stocks_of(&rows);
        assert_eq!(stocks, HashMap::from([("X-2".to_string(), 4)]));
    }

    #[test]
    fn test_stock_barcode_prefers_ean13() {
        let row = json!({"barcodes": [{"ean13": ""}, {"ean8": "20000011"}]});
        assert_eq!(stock_barcode(&row).as_deref(), Some("20000011"));

        let row = json!({"barcodes": [{"gtin": "0460"}, {"ean13": "4600001"}]});
        assert_eq!(stock_barcode(&row).as_deref(), Some("4600001"));

        assert!(stock_barcode(&json!({})).is_none());
    }
}
