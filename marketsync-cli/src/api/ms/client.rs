//! HTTP client for the ERP REST API

use anyhow::{Context, Result};
use log::{debug, error, info};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::Value;

use super::models::{ListResponse, error_message};
use crate::api::constants::{MS_ENTITY_URL, MS_PAGE_LIMIT};
use crate::api::operations::{Operation, OperationResult};
use crate::api::resilience::ResilienceConfig;

/// ERP client authenticated with a Basic token
#[derive(Debug, Clone)]
pub struct MsClient {
    http: reqwest::Client,
    base_url: String,
    dry_run: bool,
    request_logging: bool,
}

impl MsClient {
    pub fn new(token: &str, resilience: &ResilienceConfig, dry_run: bool) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Basic {}", token))
            .context("MS_TOKEN contains characters not allowed in a header")?;
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to build ERP HTTP client")?;

        Ok(Self {
            http,
            base_url: MS_ENTITY_URL.to_string(),
            dry_run,
            request_logging: resilience.monitoring.request_logging,
        })
    }

    /// Point the client at another entity root
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GET a path relative to the entity root
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = self.url(path);
        if self.request_logging {
            debug!("GET {} {:?}", url, query);
        }

        let response = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read response of GET {}", url))?;

        if !status.is_success() {
            let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
            let message = error_message(&body).unwrap_or(text);
            anyhow::bail!("GET {} returned {}: {}", url, status, message);
        }

        serde_json::from_str(&text).with_context(|| format!("GET {} returned invalid JSON", url))
    }

    /// One page of a list endpoint
    pub async fn list_page(
        &self,
        path: &str,
        filter: Option<&str>,
        offset: usize,
        limit: usize,
    ) -> Result<ListResponse> {
        let mut query = vec![("limit", limit.to_string()), ("offset", offset.to_string())];
        if let Some(filter) = filter {
            query.push(("filter", filter.to_string()));
        }

        let body = self.get(path, &query).await?;
        serde_json::from_value(body).with_context(|| format!("Unexpected list response for {}", path))
    }

    /// Every row of a list endpoint, following `meta.size` in pages of 1000
    pub async fn list_all(&self, path: &str, filter: Option<&str>) -> Result<Vec<Value>> {
        let first = self.list_page(path, filter, 0, MS_PAGE_LIMIT).await?;
        let size = first.meta.size;
        let mut rows = first.rows;

        for offset in page_offsets(size, MS_PAGE_LIMIT) {
            let page = self.list_page(path, filter, offset, MS_PAGE_LIMIT).await?;
            if page.rows.is_empty() {
                break;
            }
            rows.extend(page.rows);
        }

        debug!("Loaded {} rows from {}", rows.len(), path);
        Ok(rows)
    }

    /// First row matching a filter
    pub async fn find_first(&self, path: &str, filter: &str) -> Result<Option<Value>> {
        let page = self.list_page(path, Some(filter), 0, 1).await?;
        Ok(page.rows.into_iter().next())
    }

    /// Execute a write. Non-2xx responses come back as failed results, not errors.
    pub async fn execute(&self, operation: &Operation) -> Result<OperationResult> {
        let url = self.url(&operation.path());
        let body = operation.body();

        if self.dry_run {
            info!(
                "[dry-run] {} {} {}",
                operation.http_method(),
                url,
                preview(&body)
            );
            return Ok(OperationResult::dry_run(operation.clone()));
        }

        if self.request_logging {
            debug!("{} {}", operation.http_method(), url);
        }

        let request = match operation {
            Operation::Update { .. } => self.http.put(&url),
            Operation::Create { .. } | Operation::UploadImage { .. } => self.http.post(&url),
        };

        let response = request
            .json(&body)
            .send()
            .await
            .with_context(|| format!("{} {} failed", operation.http_method(), url))?;

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => Some(text),
            Err(e) => {
                error!("Failed to read response of {} {}: {}", operation.http_method(), url, e);
                None
            }
        };
        Ok(write_result(operation, status, text))
    }
}

/// Offsets of the pages after the first one for a list of `size` rows
pub fn page_offsets(size: usize, limit: usize) -> impl Iterator<Item = usize> {
    (limit..size).step_by(limit.max(1))
}

/// Classify a write response. An unreadable body or an `errors` array
/// fails the write even on 2xx.
fn write_result(operation: &Operation, status: StatusCode, text: Option<String>) -> OperationResult {
    let Some(text) = text else {
        return OperationResult::error(
            operation.clone(),
            format!("Response body of {} could not be read", operation.path()),
            Some(status.as_u16()),
        );
    };
    let data: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

    if status.is_success() && error_message(&data).is_none() {
        OperationResult::success(operation.clone(), Some(data), Some(status.as_u16()))
    } else {
        let message = error_message(&data).unwrap_or(text);
        error!(
            "{} {} returned {}: {}",
            operation.http_method(),
            operation.path(),
            status,
            message
        );
        OperationResult::error(operation.clone(), message, Some(status.as_u16()))
    }
}

/// Shorten a request body for log output
fn preview(body: &Value) -> String {
    const MAX: usize = 300;
    let text = body.to_string();
    if text.chars().count() <= MAX {
        text
    } else {
        let head: String = text.chars().take(MAX).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(dry_run: bool) -> MsClient {
        MsClient::new("dG9rZW4=", &ResilienceConfig::disabled(), dry_run).unwrap()
    }

    #[test]
    fn test_url_joining() {
        let client = client(false);
        assert_eq!(
            client.url("product/metadata/attributes"),
            format!("{}/product/metadata/attributes", MS_ENTITY_URL)
        );

        let local = client.with_base_url("http://localhost:8080/entity/");
        assert_eq!(local.url("/variant"), "http://localhost:8080/entity/variant");
    }

    #[test]
    fn test_rejects_token_with_newline() {
        let result = MsClient::new("bad\ntoken", &ResilienceConfig::disabled(), false);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_dry_run_does_not_send() {
        // Unroutable base url: any real request would fail
        let client = client(true).with_base_url("http://127.0.0.1:9/entity");
        let op = Operation::create("supply", json!({"positions": []}));

        let result = client.execute(&op).await.unwrap();
        assert!(result.is_success());
        assert!(result.status_code.is_none());
    }

    #[test]
    fn test_page_offsets() {
        let offsets = |size| page_offsets(size, MS_PAGE_LIMIT).collect::<Vec<_>>();
        assert!(offsets(0).is_empty());
        assert!(offsets(1).is_empty());
        assert!(offsets(MS_PAGE_LIMIT).is_empty());
        assert_eq!(offsets(MS_PAGE_LIMIT + 1), vec![1000]);
        assert_eq!(offsets(2500), vec![1000, 2000]);
        assert_eq!(offsets(3000), vec![1000, 2000]);
    }

    #[test]
    fn test_write_result_classification() {
        let op = Operation::create("product", json!({"name": "x"}));

        let ok = write_result(&op, StatusCode::OK, Some(r#"{"id": "1"}"#.to_string()));
        assert!(ok.is_success());

        let vendor_error = r#"{"errors": [{"error": "duplicate code"}]}"#.to_string();
        let failed = write_result(&op, StatusCode::OK, Some(vendor_error));
        assert!(!failed.is_success());
        assert_eq!(failed.error.as_deref(), Some("duplicate code"));

        let unread = write_result(&op, StatusCode::OK, None);
        assert!(!unread.is_success());
        assert_eq!(unread.status_code, Some(200));

        let rejected = write_result(&op, StatusCode::BAD_REQUEST, Some("bad".to_string()));
        assert!(!rejected.is_success());
        assert_eq!(rejected.error.as_deref(), Some("bad"));
    }

    #[test]
    fn test_preview_truncates() {
        let long = json!({"content": "x".repeat(1000)});
        let shown = preview(&long);
        assert!(shown.ends_with("..."));
        assert_eq!(shown.chars().count(), 303);
        assert_eq!(preview(&json!({"a": 1})), r#"{"a":1}"#);
    }
}
