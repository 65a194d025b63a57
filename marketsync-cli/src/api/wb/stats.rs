//! Statistics API: sales and stock reports

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;

use crate::api::constants::{WB_MAX_REPORT_DAYS, WB_STATS_URL};
use crate::api::resilience::{ResilienceConfig, RetryPolicy, RetryableError};

const DATE_PATTERN: &str = "%Y-%m-%d";

/// One row of the `sales` report
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleRow {
    #[serde(rename = "saleID")]
    pub sale_id: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub barcode: String,
    pub quantity: i64,
    pub for_pay: f64,
    pub date: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub warehouse_name: String,
}

/// One row of the `stocks` report
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StockRow {
    #[serde(default, deserialize_with = "nullable_string")]
    pub barcode: String,
    #[serde(default)]
    pub quantity: i64,
}

fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// `today - days` as `YYYY-MM-DD`; the report window is capped at 90 days
pub fn reporting_date(days: i64, today: NaiveDate) -> String {
    let days = if days > WB_MAX_REPORT_DAYS {
        warn!(
            "Days cannot be more than {} ({} got). Using {}",
            WB_MAX_REPORT_DAYS, days, WB_MAX_REPORT_DAYS
        );
        WB_MAX_REPORT_DAYS
    } else {
        days.max(0)
    };

    (today - Duration::days(days)).format(DATE_PATTERN).to_string()
}

/// Client for the supplier statistics endpoint, authenticated by `key`
#[derive(Debug, Clone)]
pub struct WbStatsClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    retry: RetryPolicy,
}

impl WbStatsClient {
    pub fn new(token: impl Into<String>, resilience: &ResilienceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("Failed to build statistics HTTP client")?;

        Ok(Self {
            http,
            base_url: WB_STATS_URL.to_string(),
            token: token.into(),
            retry: RetryPolicy::new(resilience.retry.clone()),
        })
    }

    /// Raw rows of a report starting at `date_from`
    pub async fn rows(&self, report: &str, date_from: &str) -> Result<Vec<Value>> {
        let url = format!("{}/{}", self.base_url, report);
        debug!("GET {} dateFrom={}", url, date_from);

        self.retry
            .execute(&format!("statistics report '{}'", report), || {
                let request = self
                    .http
                    .get(&url)
                    .query(&[("key", self.token.as_str()), ("dateFrom", date_from)]);
                async move {
                    let response = request.send().await?;
                    let status = response.status();
                    let text = response.text().await?;
                    parse_report(status, &text)
                }
            })
            .await
    }

    pub async fn sales(&self, date_from: &str) -> Result<Vec<SaleRow>> {
        let rows = self.rows("sales", date_from).await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).context("Unexpected sales row"))
            .collect()
    }

    pub async fn stocks(&self, date_from: &str) -> Result<Vec<StockRow>> {
        let rows = self.rows("stocks", date_from).await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).context("Unexpected stocks row"))
            .collect()
    }
}

/// Body of a report response. Non-JSON bodies are retryable, HTTP errors are not.
fn parse_report(status: reqwest::StatusCode, text: &str) -> Result<Vec<Value>, RetryableError> {
    if !status.is_success() {
        return Err(RetryableError::Fatal(anyhow::anyhow!(
            "statistics API returned {}: {}",
            status,
            text
        )));
    }

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(rows)) => Ok(rows),
        Ok(Value::Null) => Ok(Vec::new()),
        Ok(other) => Err(RetryableError::Fatal(anyhow::anyhow!(
            "statistics API returned an unexpected body: {}",
            other
        ))),
        Err(err) => Err(RetryableError::Decode(err.to_string())),
    }
}
