//! FBO stock reconciliation
//!
//! The marketplace warehouse is the source of truth. Surpluses become one
//! `supply` document, shortages one `loss` document, both on the FBO store.

use anyhow::Result;
use chrono::Local;
use log::{info, warn};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::{SyncContext, progress_bar};
use crate::api::wb::{StockRow, WbStatsClient, reporting_date};
use crate::api::{Meta, MsClient, Operation};
use crate::report::SyncReport;

/// Barcodes considered for one supply document
pub const MAX_SUPPLY_POSITIONS: usize = 500;

/// barcode → total quantity over all marketplace warehouses
pub fn wb_stock_by_barcode(rows: &[StockRow]) -> HashMap<String, i64> {
    let mut stocks = HashMap::new();
    for row in rows.iter().filter(|r| !r.barcode.is_empty()) {
        *stocks.entry(row.barcode.clone()).or_insert(0) += row.quantity;
    }
    stocks
}

/// Corrections to apply to the ERP, split by sign
#[derive(Debug, Default, PartialEq)]
pub struct StockDeltas {
    /// barcode → units to add
    pub supplies: BTreeMap<String, i64>,
    /// barcode → units to write off (positive)
    pub losses: BTreeMap<String, i64>,
}

/// `wb - ms` over the union of barcodes
pub fn stock_deltas(wb: &HashMap<String, i64>, ms: &HashMap<String, i64>) -> StockDeltas {
    let barcodes: BTreeSet<&String> = wb.keys().chain(ms.keys()).collect();
    let mut deltas = StockDeltas::default();

    for barcode in barcodes {
        let delta = wb.get(barcode).copied().unwrap_or(0) - ms.get(barcode).copied().unwrap_or(0);
        if delta > 0 {
            deltas.supplies.insert(barcode.clone(), delta);
        } else if delta < 0 {
            deltas.losses.insert(barcode.clone(), -delta);
        }
    }

    deltas
}

pub fn supply_position(assortment: &Meta, quantity: i64) -> Value {
    json!({
        "quantity": quantity,
        "assortment": assortment.wrap(),
        "price": 0,
        "discount": 0,
        "vat": 0,
    })
}

pub fn loss_position(assortment: &Meta, quantity: i64) -> Value {
    json!({
        "quantity": quantity,
        "assortment": assortment.wrap(),
    })
}

pub fn supply_document(
    organization: &Meta,
    agent: &Meta,
    store: &Meta,
    positions: Vec<Value>,
) -> Value {
    json!({
        "applicable": true,
        "vatEnabled": true,
        "vatIncluded": true,
        "organization": organization.wrap(),
        "agent": agent.wrap(),
        "store": store.wrap(),
        "positions": positions,
    })
}

pub fn loss_document(organization: &Meta, store: &Meta, positions: Vec<Value>) -> Value {
    json!({
        "store": store.wrap(),
        "organization": organization.wrap(),
        "positions": positions,
    })
}

/// Resolve barcodes to positions; unknown barcodes go to the report
async fn positions<'a>(
    ms: &MsClient,
    quantities: impl ExactSizeIterator<Item = (&'a String, &'a i64)>,
    position: fn(&Meta, i64) -> Value,
    report: &mut SyncReport,
) -> Result<Vec<Value>> {
    let pb = progress_bar(quantities.len(), "barcodes");
    let mut positions = Vec::new();

    for (barcode, quantity) in quantities {
        pb.inc(1);
        match ms.barcode_meta(barcode).await? {
            Some(meta) => positions.push(position(&meta, *quantity)),
            None => {
                warn!("{} not found in MS. sync item failed", barcode);
                report.not_found(barcode.clone());
            }
        }
    }
    pb.finish_and_clear();

    Ok(positions)
}

pub async fn run(ctx: &SyncContext, days: i64) -> Result<SyncReport> {
    let mut report = SyncReport::new("stocks");
    let sync = &ctx.config.sync;
    let ms = &ctx.ms;
    let organization = sync.organization()?;
    let agent = sync.agent()?;
    let store = sync.fbo_store()?;

    let stats = WbStatsClient::new(ctx.config.env.wb_token_64()?, &ctx.resilience)?;
    let date_from = reporting_date(days, Local::now().date_naive());

    info!("Reading WB stocks from {}", date_from);
    let wb = wb_stock_by_barcode(&stats.stocks(&date_from).await?);
    info!("Reading MS stocks");
    let ms_stock = ms.stocks_by_store(store).await?;

    let deltas = stock_deltas(&wb, &ms_stock);
    info!(
        "{} barcodes to supply, {} to write off",
        deltas.supplies.len(),
        deltas.losses.len()
    );

    if deltas.supplies.len() > MAX_SUPPLY_POSITIONS {
        warn!(
            "{} barcodes to supply; only the first {} are pushed this run",
            deltas.supplies.len(),
            MAX_SUPPLY_POSITIONS
        );
        report.skipped += deltas.supplies.len() - MAX_SUPPLY_POSITIONS;
    }
    let supply_positions = positions(
        ms,
        deltas.supplies.iter().take(MAX_SUPPLY_POSITIONS),
        supply_position,
        &mut report,
    )
    .await?;
    let loss_positions = positions(ms, deltas.losses.iter(), loss_position, &mut report).await?;

    if supply_positions.is_empty() {
        info!("No supply to push");
    } else {
        let doc = supply_document(organization, agent, store, supply_positions);
        let result = ms.execute(&Operation::create("supply", doc)).await?;
        report.record(&result);
    }

    if loss_positions.is_empty() {
        info!("No loss to push");
    } else {
        let doc = loss_document(organization, store, loss_positions);
        let result = ms.execute(&Operation::create("loss", doc)).await?;
        report.record(&result);
    }

    Ok(report)
}
