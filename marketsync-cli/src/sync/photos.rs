//! Catalog photos → ERP product and variant images

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap, HashSet};

use super::{SyncContext, progress_bar};
use crate::api::wb::{CatalogItem, WbContentClient};
use crate::api::{MsClient, Operation};
use crate::report::SyncReport;

pub const IMAGE_EXTENSIONS: [&str; 3] = ["img", "jpg", "jpeg"];

/// Photo reference; the filename is the last URL segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub url: String,
    pub filename: String,
}

impl Image {
    pub fn from_url(url: &str) -> Result<Self> {
        let filename = url.rsplit('/').next().unwrap_or_default().to_string();
        let extension = filename.rsplit_once('.').map(|(_, ext)| ext).unwrap_or_default();

        if !IMAGE_EXTENSIONS.contains(&extension.to_lowercase().as_str()) {
            bail!("Incorrect extension for image {}: '{}'", url, extension);
        }

        Ok(Self {
            url: url.to_string(),
            filename,
        })
    }

    /// Download and encode for upload
    pub async fn download_base64(&self, http: &reqwest::Client) -> Result<String> {
        let bytes = http
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("Failed to download {}", self.url))?
            .error_for_status()
            .with_context(|| format!("Failed to download {}", self.url))?
            .bytes()
            .await
            .with_context(|| format!("Failed to read {}", self.url))?;

        Ok(STANDARD.encode(bytes))
    }
}

/// code → valid images. Rejected URLs are logged and left out.
pub fn images_by_code(items: &[CatalogItem]) -> BTreeMap<String, Vec<Image>> {
    let mut images = BTreeMap::new();

    for item in items {
        let code = item.code();
        if images.contains_key(&code) {
            warn!("Duplicate catalog code {}; keeping the first row", code);
            continue;
        }

        let photos = item
            .photo_urls()
            .into_iter()
            .filter_map(|url| match Image::from_url(url) {
                Ok(image) => Some(image),
                Err(e) => {
                    warn!("{}", e);
                    None
                }
            })
            .collect();
        images.insert(code, photos);
    }

    images
}

/// Images whose filename is not attached yet
pub fn missing_images<'a>(images: &'a [Image], existing: &HashSet<String>) -> Vec<&'a Image> {
    images
        .iter()
        .filter(|image| !existing.contains(&image.filename))
        .collect()
}

async fn upload_for(
    ms: &MsClient,
    http: &reqwest::Client,
    entity: &str,
    ids: &HashMap<String, String>,
    images: &BTreeMap<String, Vec<Image>>,
    report: &mut SyncReport,
) -> Result<()> {
    let matching: Vec<(&String, &String)> = images
        .keys()
        .filter_map(|code| ids.get(code).map(|id| (code, id)))
        .collect();
    info!("{} {} codes have photos", matching.len(), entity);

    let pb = progress_bar(matching.len(), entity);
    for (code, id) in matching {
        pb.inc(1);
        let existing = ms.image_filenames(entity, id).await?;
        let pending = missing_images(&images[code], &existing);
        if pending.is_empty() {
            debug!("{} {} has all its images", entity, code);
            continue;
        }

        for image in pending {
            debug!("Uploading {} to {} {}", image.url, entity, code);
            let content = match image.download_base64(http).await {
                Ok(content) => content,
                Err(e) => {
                    report.fail(format!("{:#}", e));
                    continue;
                }
            };
            let op = Operation::upload_image(entity, id.as_str(), image.filename.as_str(), content);
            let result = ms.execute(&op).await?;
            report.record(&result);
        }
    }
    pb.finish_and_clear();

    Ok(())
}

pub async fn run(ctx: &SyncContext) -> Result<SyncReport> {
    let mut report = SyncReport::new("photos");
    let ms = &ctx.ms;

    let wb = WbContentClient::login(ctx.config.env.wb_token()?, ctx.config.env.supplier_id()?)
        .await?;
    info!("Loading catalog from WB");
    let images = images_by_code(&wb.catalog().await?);

    let http = reqwest::Client::builder()
        .build()
        .context("Failed to build image HTTP client")?;

    info!("Uploading product photos");
    let product_ids = ms.single_product_ids().await?;
    upload_for(ms, &http, "product", &product_ids, &images, &mut report).await?;

    info!("Uploading variant photos");
    let variant_ids = ms.variant_ids().await?;
    upload_for(ms, &http, "variant", &variant_ids, &images, &mut report).await?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_from_url() {
        let image = Image::from_url("https://img.example/big/new/1234/5678-1.jpg").unwrap();
        assert_eq!(image.filename, "5678-1.jpg");

        assert!(Image::from_url("https://img.example/5678-1.JPEG").is_ok());
        assert!(Image::from_url("https://img.example/5678-1.img").is_ok());
    }

    #[test]
    fn test_image_rejects_other_extensions() {
        assert!(Image::from_url("https://img.example/5678-1.png").is_err());
        assert!(Image::from_url("https://img.example/video").is_err());
    }

    #[test]
    fn test_images_by_code() {
        let items = vec![
            CatalogItem {
                barcode: "4600009".into(),
                color_article: "CAP-9".into(),
                photos: "https://img/1.jpg;https://img/2.webp".into(),
                ..Default::default()
            },
            CatalogItem {
                barcode: "4600001".into(),
                color_article: "DRS-1-RED".into(),
                size: "42".into(),
                supplier_article: Some("DRS-1".into()),
                photos: "https://img/3.jpeg".into(),
                ..Default::default()
            },
        ];

        let images = images_by_code(&items);
        assert_eq!(images.len(), 2);
        assert_eq!(images["CAP-9_4600009"].len(), 1);
        assert_eq!(images["CAP-9_4600009"][0].filename, "1.jpg");
        assert_eq!(images["DRS-1_DRS-1-RED_42_4600001"][0].filename, "3.jpeg");
    }

    #[test]
    fn test_missing_images() {
        let images = vec![
            Image::from_url("https://img/1.jpg").unwrap(),
            Image::from_url("https://img/2.jpg").unwrap(),
        ];
        let existing: HashSet<String> = ["1.jpg".to_string()].into();

        let pending = missing_images(&images, &existing);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].filename, "2.jpg");

        let all: HashSet<String> = ["1.jpg".to_string(), "2.jpg".to_string()].into();
        assert!(missing_images(&images, &all).is_empty());
    }
}
