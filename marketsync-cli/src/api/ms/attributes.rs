//! Product attributes and variant characteristics

use anyhow::{Context, Result};
use log::warn;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};

use super::client::MsClient;
use super::models::{Meta, row_meta, row_str};

pub const COLOR_ATTRIBUTE: &str = "Основной цвет";
pub const SIZE_ATTRIBUTE: &str = "Размер";
pub const BRAND_ATTRIBUTE: &str = "Бренд";
pub const BARCODE_ATTRIBUTE: &str = "Баркод";

pub const COLOR_CHARACTERISTIC: &str = "Цвет";
pub const SIZE_CHARACTERISTIC: &str = "Размер";
pub const BARCODE_CHARACTERISTIC: &str = "Баркод";

/// Meta of the first attribute with the given name
pub fn attribute_meta(attributes: &[Value], name: &str) -> Option<Meta> {
    attributes
        .iter()
        .find(|attr| row_str(attr, "name") == Some(name))
        .and_then(row_meta)
}

/// Product attributes the catalog sync fills in
#[derive(Debug, Clone)]
pub struct ProductAttributes {
    pub color: Meta,
    pub size: Meta,
    pub brand: Meta,
    pub barcode: Meta,
}

impl ProductAttributes {
    /// Resolve from an attribute list; `brand_override` replaces the looked-up brand
    pub fn from_rows(attributes: &[Value], brand_override: Option<&Meta>) -> Result<Self> {
        let find = |name: &str| {
            attribute_meta(attributes, name)
                .with_context(|| format!("Product attribute '{}' is not defined in MS", name))
        };

        let color = find(COLOR_ATTRIBUTE)?;
        let size = find(SIZE_ATTRIBUTE)?;
        let brand = match brand_override {
            Some(meta) => meta.clone(),
            None => find(BRAND_ATTRIBUTE)?,
        };
        let barcode = find(BARCODE_ATTRIBUTE)?;

        Ok(Self {
            color,
            size,
            brand,
            barcode,
        })
    }

    pub async fn load(client: &MsClient, brand_override: Option<&Meta>) -> Result<Self> {
        let attributes = client
            .list_all("product/metadata/attributes", None)
            .await
            .context("Failed to load product attributes")?;
        Self::from_rows(&attributes, brand_override)
    }
}

/// Characteristic name → id, gathered from existing variants
#[derive(Debug, Clone, Default)]
pub struct VariantCharacteristics {
    ids: HashMap<String, String>,
}

impl VariantCharacteristics {
    pub fn from_variants(variants: &[Value], names: &[&str]) -> Self {
        let mut wanted: HashSet<&str> = names.iter().copied().collect();
        let mut ids = HashMap::new();

        for variant in variants {
            if wanted.is_empty() {
                break;
            }
            let Some(chars) = variant.get("characteristics").and_then(Value::as_array) else {
                continue;
            };
            for ch in chars {
                if let (Some(name), Some(id)) = (row_str(ch, "name"), row_str(ch, "id")) {
                    if wanted.remove(name) {
                        ids.insert(name.to_string(), id.to_string());
                    }
                }
            }
        }

        for name in wanted {
            warn!(
                "Characteristic '{}' not found on any variant; it will be referenced by name",
                name
            );
        }

        Self { ids }
    }

    pub async fn load(client: &MsClient) -> Result<Self> {
        let variants = client
            .list_all("variant", None)
            .await
            .context("Failed to load variants")?;
        Ok(Self::from_variants(
            &variants,
            &[SIZE_CHARACTERISTIC, COLOR_CHARACTERISTIC, BARCODE_CHARACTERISTIC],
        ))
    }

    pub fn id(&self, name: &str) -> Option<&str> {
        self.ids.get(name).map(String::as_str)
    }

    /// `{"id": ..., "value": ...}`, or by name when no variant carries the characteristic yet
    pub fn entry(&self, name: &str, value: &str) -> Value {
        match self.id(name) {
            Some(id) => json!({ "id": id, "value": value }),
            None => json!({ "name": name, "value": value }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(name: &str, id: &str) -> Value {
        json!({
            "name": name,
            "meta": {
                "href": format!("https://h/entity/product/metadata/attributes/{}", id),
                "type": "attributemetadata",
                "mediaType": "application/json"
            }
        })
    }

    #[test]
    fn test_product_attributes_from_rows() {
        let rows = vec![
            attr(COLOR_ATTRIBUTE, "c"),
            attr(SIZE_ATTRIBUTE, "s"),
            attr(BRAND_ATTRIBUTE, "b"),
            attr(BARCODE_ATTRIBUTE, "bc"),
        ];
        let attrs = ProductAttributes::from_rows(&rows, None).unwrap();
        assert!(attrs.color.href.ends_with("/c"));
        assert!(attrs.brand.href.ends_with("/b"));
    }

    #[test]
    fn test_brand_override() {
        let rows = vec![
            attr(COLOR_ATTRIBUTE, "c"),
            attr(SIZE_ATTRIBUTE, "s"),
            attr(BARCODE_ATTRIBUTE, "bc"),
        ];
        let brand: Meta = serde_json::from_value(attr("x", "configured")["meta"].clone()).unwrap();
        let attrs = ProductAttributes::from_rows(&rows, Some(&brand)).unwrap();
        assert!(attrs.brand.href.ends_with("/configured"));
    }

    #[test]
    fn test_missing_attribute_is_an_error() {
        let rows = vec![attr(COLOR_ATTRIBUTE, "c")];
        let err = ProductAttributes::from_rows(&rows, None).unwrap_err();
        assert!(err.to_string().contains(SIZE_ATTRIBUTE));

        // lookups run color, size, brand, barcode
        let rows = vec![attr(COLOR_ATTRIBUTE, "c"), attr(SIZE_ATTRIBUTE, "s")];
        let err = ProductAttributes::from_rows(&rows, None).unwrap_err();
        assert!(err.to_string().contains(BRAND_ATTRIBUTE));
    }

    #[test]
    fn test_characteristics_from_variants() {
        let variants = vec![
            json!({"characteristics": [{"id": "id-size", "name": "Размер", "value": "M"}]}),
            json!({}),
            json!({"characteristics": [
                {"id": "id-size-2", "name": "Размер", "value": "L"},
                {"id": "id-color", "name": "Цвет", "value": "red"}
            ]}),
        ];
        let chars = VariantCharacteristics::from_variants(
            &variants,
            &[SIZE_CHARACTERISTIC, COLOR_CHARACTERISTIC, BARCODE_CHARACTERISTIC],
        );

        assert_eq!(chars.id(SIZE_CHARACTERISTIC), Some("id-size"));
        assert_eq!(chars.id(COLOR_CHARACTERISTIC), Some("id-color"));
        assert_eq!(chars.id(BARCODE_CHARACTERISTIC), None);
        assert_eq!(
            chars.entry(BARCODE_CHARACTERISTIC, "4600001"),
            json!({"name": "Баркод", "value": "4600001"})
        );
        assert_eq!(
            chars.entry(COLOR_CHARACTERISTIC, "A-RED"),
            json!({"id": "id-color", "value": "A-RED"})
        );
    }
}
