//! Content API: login and product cards

use anyhow::{Context, Result};
use log::{debug, info};
use serde_json::{Value, json};

use super::nomenclature::{CatalogItem, flatten_cards};
use crate::api::constants::{WB_AUTH_LOGIN_URL, WB_CARDS_RPC_ID, WB_CARDS_URL};

/// Cookie-authenticated content client
#[derive(Debug, Clone)]
pub struct WbContentClient {
    http: reqwest::Client,
    supplier_id: String,
}

impl WbContentClient {
    /// Log in with the supplier token; the session cookies stay in the client
    pub async fn login(token: &str, supplier_id: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .context("Failed to build content HTTP client")?;

        debug!("POST {}", WB_AUTH_LOGIN_URL);
        http.post(WB_AUTH_LOGIN_URL)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&login_body(token))
            .send()
            .await
            .context("Content login request failed")?
            .error_for_status()
            .context("Content login was rejected")?;

        Ok(Self {
            http,
            supplier_id: supplier_id.into(),
        })
    }

    /// Raw cards of the supplier
    pub async fn cards(&self) -> Result<Vec<Value>> {
        debug!("POST {}", WB_CARDS_URL);
        let body: Value = self
            .http
            .post(WB_CARDS_URL)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&cards_body(&self.supplier_id))
            .send()
            .await
            .context("Card list request failed")?
            .error_for_status()
            .context("Card list request was rejected")?
            .json()
            .await
            .context("Card list response is not JSON")?;

        extract_cards(body)
    }

    /// Cards flattened to one row per card × nomenclature × variation
    pub async fn catalog(&self) -> Result<Vec<CatalogItem>> {
        let cards = self.cards().await?;
        let items: Vec<CatalogItem> = flatten_cards(&cards)
            .iter()
            .map(CatalogItem::from_params)
            .collect();
        info!("Loaded {} catalog rows from {} cards", items.len(), cards.len());
        Ok(items)
    }
}

fn login_body(token: &str) -> Value {
    json!({
        "country": "RU",
        "device": "MacBookPro13",
        "token": token,
    })
}

fn cards_body(supplier_id: &str) -> Value {
    json!({
        "id": WB_CARDS_RPC_ID,
        "jsonrpc": "2.0",
        "params": {
            "supplierID": supplier_id,
        }
    })
}

fn extract_cards(mut body: Value) -> Result<Vec<Value>> {
    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        anyhow::bail!("Card list returned an error: {}", error);
    }

    match body.pointer_mut("/result/cards").map(Value::take) {
        Some(Value::Array(cards)) => Ok(cards),
        Some(Value::Null) => Ok(Vec::new()),
        _ => anyhow::bail!("Card list response has no result.cards"),
    }
}
