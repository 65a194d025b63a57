//! Card flattening and catalog rows
//!
//! A card holds nomenclatures, a nomenclature holds variations. Each variation
//! becomes one [`CatalogItem`] carrying the merged parameters of all three
//! levels, deeper levels overriding shallower ones.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

/// Vendor parameter names
mod field {
    pub const BARCODE: &str = "barcode";
    pub const BRAND: &str = "Бренд";
    pub const COLOR_ARTICLE: &str = "vendorCode";
    pub const SUBJECT: &str = "object";
    pub const TITLE: &str = "Заголовок";
    pub const COUNTRY: &str = "countryProduction";
    pub const SIZE: &str = "Размер";
    pub const TNVED: &str = "Тнвэд";
    pub const KIT: &str = "Комплектация";
    pub const COLOR: &str = "Основной цвет";
    pub const SUPPLIER_ARTICLE: &str = "supplierVendorCode";
    pub const CREATED_AT: &str = "createdAt";
    pub const DESCRIPTION: &str = "Описание";
    pub const CHRT_ID: &str = "chrtId";
    pub const PHOTOS: &str = "Фото";
}

/// Flatten one level of a card into `name → value`.
///
/// `addin` lists become `type → values joined with '/'` (photo URLs with
/// ';'), other lists are flattened recursively, everything else is copied
/// as-is.
pub fn flatten_params(item: &Value) -> Map<String, Value> {
    let mut params = Map::new();

    match item {
        Value::Object(obj) => {
            for (key, value) in obj {
                match value {
                    Value::Array(fields) if key == "addin" => {
                        for field in fields {
                            let Some(kind) = field.get("type").and_then(Value::as_str) else {
                                continue;
                            };
                            let separator = if kind == field::PHOTOS { ";" } else { "/" };
                            let joined = join_param_values(field.get("params"), separator);
                            params.insert(kind.to_string(), Value::String(joined));
                        }
                    }
                    Value::Array(_) => params.extend(flatten_params(value)),
                    _ => {
                        params.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        Value::Array(elements) => {
            for element in elements {
                params.extend(flatten_params(element));
            }
        }
        _ => {}
    }

    params
}

fn join_param_values(params: Option<&Value>, separator: &str) -> String {
    let Some(params) = params.and_then(Value::as_array) else {
        return String::new();
    };

    params
        .iter()
        .filter_map(|p| p.get("value"))
        .filter(|v| is_truthy(v))
        .map(scalar_to_string)
        .collect::<Vec<_>>()
        .join(separator)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Text form of a scalar; null becomes empty
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Flatten one level, leaving out the list of its children
fn flatten_level(item: &Value, children: &str) -> Map<String, Value> {
    match item {
        Value::Object(obj) => {
            let mut own = obj.clone();
            own.remove(children);
            flatten_params(&Value::Object(own))
        }
        _ => flatten_params(item),
    }
}

/// One row per card × nomenclature × variation
pub fn flatten_cards(cards: &[Value]) -> Vec<Map<String, Value>> {
    let mut rows = Vec::new();

    for card in cards {
        let card_params = flatten_level(card, "nomenclatures");
        let nomenclatures = card.get("nomenclatures").and_then(Value::as_array);

        for item in nomenclatures.into_iter().flatten() {
            let item_params = flatten_level(item, "variations");
            let variations = item.get("variations").and_then(Value::as_array);

            for variation in variations.into_iter().flatten() {
                let mut row = card_params.clone();
                row.extend(item_params.clone());
                row.extend(flatten_params(variation));
                rows.push(row);
            }
        }
    }

    rows
}

/// Catalog row of the marketplace
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogItem {
    pub barcode: String,
    pub brand: String,
    pub color_article: String,
    pub subject: String,
    pub title: String,
    pub country: String,
    pub size: String,
    pub tnved: String,
    pub kit: String,
    pub color: String,
    /// Present only for items sold as variants of a base product
    pub supplier_article: Option<String>,
    pub created_at: String,
    pub description: String,
    pub chrt_id: String,
    pub photos: String,
}

impl CatalogItem {
    pub fn from_params(params: &Map<String, Value>) -> Self {
        let text = |key: &str| params.get(key).map(scalar_to_string).unwrap_or_default();
        let supplier_article = Some(text(field::SUPPLIER_ARTICLE)).filter(|s| !s.is_empty());

        Self {
            barcode: text(field::BARCODE),
            brand: text(field::BRAND),
            color_article: text(field::COLOR_ARTICLE),
            subject: text(field::SUBJECT),
            title: text(field::TITLE),
            country: text(field::COUNTRY),
            size: text(field::SIZE),
            tnved: text(field::TNVED),
            kit: text(field::KIT),
            color: text(field::COLOR),
            supplier_article,
            created_at: text(field::CREATED_AT),
            description: text(field::DESCRIPTION),
            chrt_id: text(field::CHRT_ID),
            photos: text(field::PHOTOS),
        }
    }

    pub fn is_multi(&self) -> bool {
        self.supplier_article.is_some()
    }

    /// `{color_article}_{barcode}`
    pub fn single_key(&self) -> String {
        format!("{}_{}", self.color_article, self.barcode)
    }

    /// `{supplier_article}_{color_article}_{size}_{barcode}`
    pub fn multi_key(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.supplier_article.as_deref().unwrap_or_default(),
            self.color_article,
            self.size,
            self.barcode
        )
    }

    /// ERP code of the product or variant this row maps to
    pub fn code(&self) -> String {
        if self.is_multi() {
            self.multi_key()
        } else {
            self.single_key()
        }
    }

    pub fn photo_urls(&self) -> Vec<&str> {
        self.photos
            .split(';')
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .collect()
    }
}

/// Split into (single, multi) rows
pub fn split_items(items: Vec<CatalogItem>) -> (Vec<CatalogItem>, Vec<CatalogItem>) {
    let (multi, single) = items.into_iter().partition(CatalogItem::is_multi);
    (single, multi)
}

/// Rows whose code is not in the ERP yet
pub fn new_items(items: Vec<CatalogItem>, existing_codes: &HashSet<String>) -> Vec<CatalogItem> {
    items
        .into_iter()
        .filter(|item| !existing_codes.contains(&item.code()))
        .collect()
}

/// Multi rows grouped by supplier article
pub fn group_by_supplier_article(items: &[CatalogItem]) -> BTreeMap<String, Vec<&CatalogItem>> {
    let mut groups: BTreeMap<String, Vec<&CatalogItem>> = BTreeMap::new();
    for item in items {
        if let Some(article) = &item.supplier_article {
            groups.entry(article.clone()).or_default().push(item);
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn card() -> Value {
        json!({
            "id": 1,
            "object": "Платья",
            "countryProduction": "Китай",
            "supplierVendorCode": "DRS-1",
            "addin": [
                {"type": "Бренд", "params": [{"value": "Acme"}]},
                {"type": "Описание", "params": [{"value": "Летнее"}, {"value": ""}, {"value": "платье"}]}
            ],
            "nomenclatures": [
                {
                    "vendorCode": "DRS-1-RED",
                    "addin": [
                        {"type": "Основной цвет", "params": [{"value": "красный"}]},
                        {"type": "Фото", "params": [{"value": "https://img/1.jpg"}, {"value": "https://img/2.jpg"}]}
                    ],
                    "variations": [
                        {"barcode": "4600001", "chrtId": 1001, "addin": [{"type": "Размер", "params": [{"value": "42"}]}]},
                        {"barcode": "4600002", "chrtId": 1002, "addin": [{"type": "Размер", "params": [{"value": "44"}]}]}
                    ]
                },
                {
                    "vendorCode": "DRS-1-BLUE",
                    "variations": [
                        {"barcode": "4600003", "chrtId": 1003}
                    ]
                }
            ]
        })
    }

    #[test]
    fn test_flatten_addin_joins_non_empty_values() {
        let params = flatten_params(&card());
        assert_eq!(params["Бренд"], "Acme");
        assert_eq!(params["Описание"], "Летнее/платье");
        assert_eq!(params["object"], "Платья");
    }

    #[test]
    fn test_flatten_addin_skips_falsy_numbers() {
        let item = json!({"addin": [{"type": "Вес", "params": [{"value": 0}, {"value": 350}]}]});
        assert_eq!(flatten_params(&item)["Вес"], "350");
    }

    #[test]
    fn test_flatten_cards_one_row_per_variation() {
        let rows = flatten_cards(&[card()]);
        assert_eq!(rows.len(), 3);

        let first = CatalogItem::from_params(&rows[0]);
        assert_eq!(first.barcode, "4600001");
        assert_eq!(first.brand, "Acme");
        assert_eq!(first.color_article, "DRS-1-RED");
        assert_eq!(first.color, "красный");
        assert_eq!(first.size, "42");
        assert_eq!(first.chrt_id, "1001");
        assert_eq!(first.supplier_article.as_deref(), Some("DRS-1"));
        assert_eq!(first.country, "Китай");

        // siblings do not leak into each other
        let third = CatalogItem::from_params(&rows[2]);
        assert_eq!(third.color_article, "DRS-1-BLUE");
        assert_eq!(third.size, "");
        assert_eq!(third.color, "");
    }

    #[test]
    fn test_keys() {
        let multi = CatalogItem {
            barcode: "4600001".into(),
            color_article: "DRS-1-RED".into(),
            size: "42".into(),
            supplier_article: Some("DRS-1".into()),
            ..Default::default()
        };
        assert_eq!(multi.code(), "DRS-1_DRS-1-RED_42_4600001");

        let single = CatalogItem {
            barcode: "4600009".into(),
            color_article: "CAP-9".into(),
            ..Default::default()
        };
        assert!(!single.is_multi());
        assert_eq!(single.code(), "CAP-9_4600009");
    }

    #[test]
    fn test_empty_supplier_article_is_single() {
        let mut params = Map::new();
        params.insert("supplierVendorCode".into(), json!(""));
        params.insert("vendorCode".into(), json!("CAP-9"));
        params.insert("barcode".into(), Value::Null);

        let item = CatalogItem::from_params(&params);
        assert!(!item.is_multi());
        assert_eq!(item.barcode, "");
    }

    #[test]
    fn test_split_and_new_items() {
        let rows = flatten_cards(&[card()]);
        let mut items: Vec<CatalogItem> = rows.iter().map(CatalogItem::from_params).collect();
        items.push(CatalogItem {
            barcode: "4600009".into(),
            color_article: "CAP-9".into(),
            ..Default::default()
        });

        let (single, multi) = split_items(items);
        assert_eq!(single.len(), 1);
        assert_eq!(multi.len(), 3);

        let existing: HashSet<String> = ["DRS-1_DRS-1-RED_42_4600001".to_string()].into();
        let fresh = new_items(multi, &existing);
        assert_eq!(fresh.len(), 2);

        let groups = group_by_supplier_article(&fresh);
        assert_eq!(groups["DRS-1"].len(), 2);
    }

    #[test]
    fn test_card_photos_become_separate_urls() {
        let rows = flatten_cards(&[card()]);
        let red = CatalogItem::from_params(&rows[0]);
        assert_eq!(red.photo_urls(), vec!["https://img/1.jpg", "https://img/2.jpg"]);

        let blue = CatalogItem::from_params(&rows[2]);
        assert!(blue.photo_urls().is_empty());
    }

    #[test]
    fn test_photo_urls() {
        let item = CatalogItem {
            photos: "https://img/1.jpg; ;https://img/2.jpg;".into(),
            ..Default::default()
        };
        assert_eq!(item.photo_urls(), vec!["https://img/1.jpg", "https://img/2.jpg"]);
    }
}
