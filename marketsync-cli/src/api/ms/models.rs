//! ERP response models

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

/// Reference to an ERP object, sent back verbatim inside `{"meta": ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_href: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid_href: Option<String>,
}

impl Meta {
    /// UUID at the end of `href`
    pub fn id(&self) -> Option<Uuid> {
        let path = self.href.split('?').next()?;
        let last = path.trim_end_matches('/').rsplit('/').next()?;
        Uuid::parse_str(last).ok()
    }

    /// `{"meta": {...}}` wrapper used wherever the ERP expects a reference
    pub fn wrap(&self) -> Value {
        json!({ "meta": self })
    }
}

/// Pagination block of a list response; `size` is the total row count
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListMeta {
    #[serde(default)]
    pub size: usize,
}

/// `{"meta": {...}, "rows": [...]}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListResponse {
    #[serde(default)]
    pub meta: ListMeta,
    #[serde(default)]
    pub rows: Vec<Value>,
}

/// Parse the `meta` of a row
pub fn row_meta(row: &Value) -> Option<Meta> {
    serde_json::from_value(row.get("meta")?.clone()).ok()
}

/// String field of a row
pub fn row_str<'a>(row: &'a Value, key: &str) -> Option<&'a str> {
    row.get(key).and_then(Value::as_str)
}

/// Join the messages of an ERP `{"errors": [...]}` body
pub fn error_message(body: &Value) -> Option<String> {
    let errors = body.get("errors")?.as_array()?;
    let messages: Vec<&str> = errors
        .iter()
        .filter_map(|e| e.get("error").and_then(Value::as_str))
        .collect();

    if messages.is_empty() {
        None
    } else {
        Some(messages.join("; "))
    }
}
