//! Native and user-defined ERP dictionaries

use anyhow::{Result, bail};
use serde_json::{Value, json};
use std::collections::{BTreeSet, HashMap};

use super::client::MsClient;
use super::models::row_str;
use crate::api::operations::{Operation, OperationResult};

/// Built-in dictionary such as `country` or `currency`. Rows are fetched once.
pub struct MsDict<'a> {
    client: &'a MsClient,
    name: String,
    rows: Option<Vec<Value>>,
}

impl<'a> MsDict<'a> {
    pub fn new(client: &'a MsClient, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
            rows: None,
        }
    }

    pub async fn rows(&mut self) -> Result<&[Value]> {
        if self.rows.is_none() {
            self.rows = Some(self.client.list_all(&self.name, None).await?);
        }
        Ok(self.rows.as_deref().unwrap_or_default())
    }

    /// First row whose `attr` equals `value`
    pub async fn find_by(&mut self, attr: &str, value: &str) -> Result<Option<Value>> {
        let rows = self.rows().await?;
        Ok(rows.iter().find(|row| row_str(row, attr) == Some(value)).cloned())
    }
}

/// Custom dictionary (`customentity/{id}`), matched by name case-insensitively
pub struct UserDict<'a> {
    client: &'a MsClient,
    id: String,
}

impl<'a> UserDict<'a> {
    pub fn new(client: &'a MsClient, id: impl Into<String>) -> Self {
        Self {
            client,
            id: id.into(),
        }
    }

    fn path(&self) -> String {
        format!("customentity/{}", self.id)
    }

    pub async fn items(&self) -> Result<Vec<Value>> {
        self.client.list_all(&self.path(), None).await
    }

    /// Create every non-empty name that is not in the dictionary yet
    pub async fn create_items_if_not_exists<'n>(
        &self,
        names: impl IntoIterator<Item = &'n String>,
    ) -> Result<Vec<OperationResult>> {
        let items = self.items().await?;
        let mut results = Vec::new();

        for name in missing_names(&items, names) {
            let op = Operation::create(self.path(), json!({ "name": name }));
            results.push(self.client.execute(&op).await?);
        }

        Ok(results)
    }

    /// name → item for the given names that exist; missing names are left out
    pub async fn items_matching_names<'n>(
        &self,
        names: impl IntoIterator<Item = &'n String>,
    ) -> Result<HashMap<String, Value>> {
        let items = self.items().await?;
        Ok(match_names(&items, names).0)
    }

    /// name → item for the given names; every non-empty name must exist
    pub async fn items_filtered_by_names<'n>(
        &self,
        names: impl IntoIterator<Item = &'n String>,
    ) -> Result<HashMap<String, Value>> {
        let items = self.items().await?;
        filter_by_names(&items, names)
    }
}

pub fn find_by_name_in<'v>(items: &'v [Value], name: &str) -> Option<&'v Value> {
    let wanted = name.to_lowercase();
    items
        .iter()
        .find(|item| row_str(item, "name").is_some_and(|n| n.to_lowercase() == wanted))
}

/// Names to create so that every non-empty name exists, sorted and de-duplicated
pub fn missing_names<'n>(items: &[Value], names: impl IntoIterator<Item = &'n String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut missing = Vec::new();

    let wanted: BTreeSet<&String> = names.into_iter().filter(|n| !n.is_empty()).collect();
    for name in wanted {
        if !seen.insert(name.to_lowercase()) {
            continue;
        }
        if find_by_name_in(items, name).is_none() {
            missing.push(name.clone());
        }
    }

    missing
}

/// Splits non-empty names into found items, keyed by the name as asked for,
/// and names with no case-insensitive match
pub fn match_names<'n>(
    items: &[Value],
    names: impl IntoIterator<Item = &'n String>,
) -> (HashMap<String, Value>, Vec<String>) {
    let mut found = HashMap::new();
    let mut missing = Vec::new();
    for name in names.into_iter().filter(|n| !n.is_empty()) {
        match find_by_name_in(items, name) {
            Some(item) => {
                found.insert(name.clone(), item.clone());
            }
            None => missing.push(name.clone()),
        }
    }
    (found, missing)
}

pub fn filter_by_names<'n>(
    items: &[Value],
    names: impl IntoIterator<Item = &'n String>,
) -> Result<HashMap<String, Value>> {
    let (found, missing) = match_names(items, names);
    if let Some(name) = missing.first() {
        bail!("Item '{}' does not exist in dictionary", name);
    }
    Ok(found)
}
