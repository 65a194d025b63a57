//! Catalog → ERP products and variants
//!
//! Single items become products coded `{color_article}_{barcode}`. Items with
//! a supplier article get one base product per article (`{article}_base`) and
//! one variant per row. Brands and countries are added to their user
//! dictionaries before anything references them.

use anyhow::{Context, Result};
use log::{info, warn};
use serde_json::{Value, json};
use std::collections::{BTreeSet, HashMap};

use super::{SyncContext, progress_bar};
use crate::api::ms::attributes::{BARCODE_CHARACTERISTIC, COLOR_CHARACTERISTIC, SIZE_CHARACTERISTIC};
use crate::api::ms::models::row_meta;
use crate::api::ms::{MsDict, ProductAttributes, UserDict, VariantCharacteristics};
use crate::api::wb::nomenclature::{group_by_supplier_article, new_items, split_items};
use crate::api::wb::{CatalogItem, WbContentClient};
use crate::api::{Meta, MsClient, Operation};
use crate::config::ProductDefaults;
use crate::report::SyncReport;

/// Barcode placed on base products, which are never sold themselves
pub const BASE_PRODUCT_BARCODE: &str = "20000011";

pub fn base_product_code(supplier_article: &str) -> String {
    format!("{}_base", supplier_article)
}

/// Builds create payloads from catalog rows
#[derive(Debug, Clone)]
pub struct ProductPayloads {
    pub defaults: ProductDefaults,
    pub attributes: ProductAttributes,
    pub characteristics: VariantCharacteristics,
}

impl ProductPayloads {
    fn attribute(meta: &Meta, value: Value) -> Value {
        json!({ "meta": meta, "value": value })
    }

    fn brand_attribute(&self, brand: &Meta) -> Value {
        Self::attribute(&self.attributes.brand, brand.wrap())
    }

    fn with_country(mut payload: Value, country: Option<&Meta>) -> Value {
        if let Some(country) = country {
            payload["country"] = country.wrap();
        }
        payload
    }

    pub fn single_product_payload(
        &self,
        item: &CatalogItem,
        brand: &Meta,
        country: Option<&Meta>,
    ) -> Value {
        let payload = json!({
            "name": format!("{} {} {}", item.color_article, item.brand, item.subject),
            "code": item.single_key(),
            "article": item.color_article,
            "externalCode": item.color_article,
            "description": item.description,
            "uom": self.defaults.uom.wrap(),
            "supplier": self.defaults.counterparty.wrap(),
            "attributes": [
                Self::attribute(&self.attributes.color, json!(item.color)),
                Self::attribute(&self.attributes.size, json!(item.size)),
                self.brand_attribute(brand),
                Self::attribute(&self.attributes.barcode, json!(item.barcode)),
            ],
            "barcodes": [
                { "ean13": item.barcode },
            ],
        });
        Self::with_country(payload, country)
    }

    /// Base product for all rows sharing a supplier article
    pub fn base_product_payload(
        &self,
        item: &CatalogItem,
        brand: &Meta,
        country: Option<&Meta>,
    ) -> Value {
        let article = item.supplier_article.as_deref().unwrap_or_default();
        let payload = json!({
            "name": format!("{} {} {}", article, item.brand, item.subject),
            "code": base_product_code(article),
            "externalCode": article,
            "description": item.description,
            "article": article,
            "uom": self.defaults.uom.wrap(),
            "supplier": self.defaults.counterparty.wrap(),
            "attributes": [
                self.brand_attribute(brand),
            ],
            "barcodes": [
                { "ean8": BASE_PRODUCT_BARCODE },
            ],
        });
        Self::with_country(payload, country)
    }

    pub fn variant_payload(&self, product: &Meta, item: &CatalogItem) -> Value {
        let mut characteristics = Vec::new();
        if !item.color_article.is_empty() {
            characteristics.push(
                self.characteristics
                    .entry(COLOR_CHARACTERISTIC, &item.color_article),
            );
        }
        if !item.size.is_empty() {
            characteristics.push(self.characteristics.entry(SIZE_CHARACTERISTIC, &item.size));
        }
        characteristics.push(
            self.characteristics
                .entry(BARCODE_CHARACTERISTIC, &item.barcode),
        );

        json!({
            "name": format!("{} {}", item.size, item.color_article),
            "code": item.multi_key(),
            "characteristics": characteristics,
            "barcodes": [
                { "ean13": item.barcode },
            ],
            "product": product.wrap(),
        })
    }
}

/// Unique non-empty values of a field
fn distinct<'a>(
    items: impl IntoIterator<Item = &'a CatalogItem>,
    field: fn(&CatalogItem) -> &str,
) -> BTreeSet<String> {
    items
        .into_iter()
        .map(field)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

async fn country_meta(countries: &mut MsDict<'_>, name: &str) -> Result<Option<Meta>> {
    if name.is_empty() {
        return Ok(None);
    }
    Ok(countries.find_by("name", name).await?.as_ref().and_then(row_meta))
}

pub async fn run(ctx: &SyncContext) -> Result<SyncReport> {
    let mut report = SyncReport::new("products");
    let sync = &ctx.config.sync;
    let defaults = sync.product_defaults()?.clone();
    let dictionaries = sync.dictionaries()?.clone();
    let ms: &MsClient = &ctx.ms;

    let wb = WbContentClient::login(ctx.config.env.wb_token()?, ctx.config.env.supplier_id()?)
        .await?;

    info!("Loading metadata from MS");
    let attributes = ProductAttributes::load(ms, sync.brand_attribute()).await?;
    let characteristics = VariantCharacteristics::load(ms).await?;

    info!("Loading codes from MS");
    let variant_codes = ms.variant_codes().await?;
    let single_codes = ms.single_product_codes().await?;
    let product_codes = ms.product_codes().await?;

    info!("Loading catalog from WB");
    let (single, multi) = split_items(wb.catalog().await?);
    let new_single = new_items(single, &single_codes);
    let new_multi = new_items(multi, &variant_codes);
    info!(
        "{} new single items, {} new variants",
        new_single.len(),
        new_multi.len()
    );

    info!("Adding new values to MS dictionaries");
    let all_new = new_single.iter().chain(new_multi.iter());
    let brands = distinct(all_new.clone(), |i| i.brand.as_str());
    let country_names = distinct(all_new, |i| i.country.as_str());

    let brands_dict = UserDict::new(ms, &dictionaries.brands);
    let countries_dict = UserDict::new(ms, &dictionaries.countries);
    for result in brands_dict.create_items_if_not_exists(&brands).await? {
        report.record(&result);
    }
    for result in countries_dict.create_items_if_not_exists(&country_names).await? {
        report.record(&result);
    }

    // Brands created during a dry run do not exist, so do not insist on them
    let brands_map: HashMap<String, Value> = if ms.is_dry_run() {
        brands_dict.items_matching_names(&brands).await?
    } else {
        brands_dict
            .items_filtered_by_names(&brands)
            .await
            .context("Brand dictionary is missing values that were just added")?
    };
    let brand_meta = |name: &str| brands_map.get(name).and_then(row_meta);

    let payloads = ProductPayloads {
        defaults,
        attributes,
        characteristics,
    };
    let mut countries = MsDict::new(ms, "country");

    info!("Creating single products");
    let pb = progress_bar(new_single.len(), "single products");
    for item in &new_single {
        pb.inc(1);
        if item.barcode.is_empty() {
            warn!("Empty barcode for {}; product not created", item.color_article);
            report.skip();
            continue;
        }
        let Some(brand) = brand_meta(&item.brand) else {
            report.not_found(format!("brand '{}'", item.brand));
            report.skip();
            continue;
        };
        let country = country_meta(&mut countries, &item.country).await?;
        let payload = payloads.single_product_payload(item, &brand, country.as_ref());
        let result = ms.execute(&Operation::create("product", payload)).await?;
        report.record(&result);
    }
    pb.finish_and_clear();

    info!("Creating base products and variants");
    let groups = group_by_supplier_article(&new_multi);
    let pb = progress_bar(groups.len(), "base products");
    for (article, rows) in groups {
        pb.inc(1);
        let Some(first) = rows.first().copied() else {
            continue;
        };
        let base_code = base_product_code(&article);

        let product_meta = if product_codes.contains(&base_code) {
            ms.product_meta_by_code(&base_code).await?
        } else {
            let Some(brand) = brand_meta(&first.brand) else {
                report.not_found(format!("brand '{}'", first.brand));
                report.skipped += rows.len();
                continue;
            };
            let country = country_meta(&mut countries, &first.country).await?;
            let payload = payloads.base_product_payload(first, &brand, country.as_ref());
            let result = ms.execute(&Operation::create("product", payload)).await?;
            report.record(&result);
            match result.into_result() {
                Ok(created) => row_meta(&created),
                Err(_) => {
                    report.skipped += rows.len();
                    continue;
                }
            }
        };

        let Some(product_meta) = product_meta else {
            warn!(
                "No meta for base product {}; variants of {} not created",
                base_code, article
            );
            report.skipped += rows.len();
            continue;
        };

        for item in rows {
            if item.barcode.is_empty() {
                warn!("Empty barcode for {}; variant not created", item.color_article);
                report.skip();
                continue;
            }
            let payload = payloads.variant_payload(&product_meta, item);
            let result = ms.execute(&Operation::create("variant", payload)).await?;
            report.record(&result);
        }
    }
    pb.finish_and_clear();

    Ok(report)
}
