//! Marketplace sales → ERP demands and sales returns
//!
//! Each report row becomes one document coded by its `saleID`, so rows that
//! already have a demand or return are skipped on the next run.

use anyhow::Result;
use chrono::Local;
use log::{debug, info, warn};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap, HashSet};

use super::{SyncContext, progress_bar};
use crate::api::wb::{SaleRow, WbStatsClient, reporting_date};
use crate::api::{Meta, MsClient, Operation};
use crate::report::SyncReport;

pub const STORE_PREFIX: &str = "[WB]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaleKind {
    Sale,
    Return,
    /// Neither a sale nor a return; nothing is pushed
    Other,
}

impl SaleKind {
    pub fn classify(row: &SaleRow) -> Self {
        let id = &row.sale_id;
        if (id.contains('R') || id.contains('D')) && row.quantity < 0 {
            Self::Return
        } else if id.contains('S') && row.quantity > 0 {
            Self::Sale
        } else {
            Self::Other
        }
    }

    pub fn entity(self) -> Option<&'static str> {
        match self {
            Self::Sale => Some("demand"),
            Self::Return => Some("salesreturn"),
            Self::Other => None,
        }
    }
}

/// `2021-03-01T12:30:00` → `2021-03-01 12:30:00.000`
pub fn ms_moment(date: &str) -> String {
    format!("{}.000", date.replace('T', " "))
}

pub fn price_in_kopecks(for_pay: f64) -> i64 {
    (for_pay * 100.0).round() as i64
}

pub fn store_name(warehouse: &str) -> String {
    format!("{} {}", STORE_PREFIX, warehouse)
}

/// Shared document references
#[derive(Debug, Clone)]
pub struct SaleRefs<'a> {
    pub organization: &'a Meta,
    pub agent: &'a Meta,
    pub store: &'a Meta,
}

pub fn demand_payload(row: &SaleRow, refs: &SaleRefs<'_>, assortment: &Meta) -> Value {
    json!({
        "name": row.sale_id,
        "code": row.sale_id,
        "moment": ms_moment(&row.date),
        "applicable": true,
        "vatEnabled": true,
        "vatIncluded": true,
        "organization": refs.organization.wrap(),
        "store": refs.store.wrap(),
        "agent": refs.agent.wrap(),
        "positions": [
            {
                "quantity": row.quantity,
                "price": price_in_kopecks(row.for_pay),
                "discount": 0,
                "vat": 0,
                "assortment": assortment.wrap(),
            }
        ],
    })
}

pub fn return_payload(row: &SaleRow, refs: &SaleRefs<'_>, assortment: &Meta) -> Value {
    json!({
        "name": row.sale_id,
        "description": "",
        "code": row.sale_id,
        "moment": ms_moment(&row.date),
        "applicable": true,
        "organization": refs.organization.wrap(),
        "store": refs.store.wrap(),
        "agent": refs.agent.wrap(),
        "positions": [
            {
                "quantity": -row.quantity,
                "price": -price_in_kopecks(row.for_pay),
                "discount": 0,
                "vat": 0,
                "assortment": assortment.wrap(),
            }
        ],
    })
}

/// Rows that have no demand or return yet
pub fn pending_sales(rows: Vec<SaleRow>, existing_codes: &HashSet<String>) -> Vec<SaleRow> {
    rows.into_iter()
        .filter(|row| !existing_codes.contains(&row.sale_id))
        .collect()
}

pub fn rows_by_warehouse(rows: &[SaleRow]) -> BTreeMap<&str, Vec<&SaleRow>> {
    let mut groups: BTreeMap<&str, Vec<&SaleRow>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.warehouse_name.as_str()).or_default().push(row);
    }
    groups
}

/// Barcode lookups repeat across rows; resolve each barcode once
struct BarcodeCache<'a> {
    ms: &'a MsClient,
    metas: HashMap<String, Option<Meta>>,
}

impl<'a> BarcodeCache<'a> {
    fn new(ms: &'a MsClient) -> Self {
        Self {
            ms,
            metas: HashMap::new(),
        }
    }

    async fn get(&mut self, barcode: &str) -> Result<Option<Meta>> {
        if let Some(meta) = self.metas.get(barcode) {
            return Ok(meta.clone());
        }
        let meta = self.ms.barcode_meta(barcode).await?;
        self.metas.insert(barcode.to_string(), meta.clone());
        Ok(meta)
    }
}

pub async fn run(ctx: &SyncContext, days: i64) -> Result<SyncReport> {
    let mut report = SyncReport::new("sales");
    let sync = &ctx.config.sync;
    let ms = &ctx.ms;
    let organization = sync.organization()?;
    let agent = sync.agent()?;

    let stats = WbStatsClient::new(ctx.config.env.wb_token_64()?, &ctx.resilience)?;
    let date_from = reporting_date(days, Local::now().date_naive());
    info!("Reading WB sales from {}", date_from);
    let sales = stats.sales(&date_from).await?;

    let mut existing = ms.all_codes("demand").await?;
    existing.extend(ms.all_codes("salesreturn").await?);
    let total = sales.len();
    let sales = pending_sales(sales, &existing);
    report.skipped += total - sales.len();
    info!("{} of {} sales are new", sales.len(), total);

    let mut barcodes = BarcodeCache::new(ms);

    for (warehouse, rows) in rows_by_warehouse(&sales) {
        let name = store_name(warehouse);
        let Some(store) = ms.store_by_name(&name).await? else {
            warn!("Store {} not found", name);
            report.not_found(format!("store '{}'", name));
            report.skipped += rows.len();
            continue;
        };
        let refs = SaleRefs {
            organization,
            agent,
            store: &store,
        };

        let pb = progress_bar(rows.len(), &name);
        for row in rows {
            pb.inc(1);
            let kind = SaleKind::classify(row);
            let Some(entity) = kind.entity() else {
                debug!("{} is neither a sale nor a return", row.sale_id);
                report.not_found(row.barcode.clone());
                continue;
            };
            let Some(assortment) = barcodes.get(&row.barcode).await? else {
                report.not_found(row.barcode.clone());
                continue;
            };

            let payload = match kind {
                SaleKind::Return => return_payload(row, &refs, &assortment),
                _ => demand_payload(row, &refs, &assortment),
            };
            let result = ms.execute(&Operation::create(entity, payload)).await?;
            if result.is_error() {
                report.not_found(row.barcode.clone());
            }
            report.record(&result);
        }
        pb.finish_and_clear();
    }

    Ok(report)
}
