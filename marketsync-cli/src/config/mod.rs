//! Runtime configuration
//!
//! Tokens come from the environment (optionally via `.env`), vendor metadata
//! references from a JSON file next to the binary (`config.json` by default).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::api::Meta;

pub const MS_TOKEN: &str = "MS_TOKEN";
pub const WB_TOKEN: &str = "WB_TOKEN";
pub const WB_TOKEN_64: &str = "WB_TOKEN_64";
pub const SUPPLIER_ID: &str = "SUPPLIER_ID";

pub const DEFAULT_MOVE_MARKER: &str = "ID поставки";

/// Tokens and ids read from the environment. Each job asks only for what it uses.
#[derive(Debug, Clone, Default)]
pub struct EnvTokens {
    pub ms_token: Option<String>,
    pub wb_token: Option<String>,
    pub wb_token_64: Option<String>,
    pub supplier_id: Option<String>,
}

impl EnvTokens {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            ms_token: var(MS_TOKEN),
            wb_token: var(WB_TOKEN),
            wb_token_64: var(WB_TOKEN_64),
            supplier_id: var(SUPPLIER_ID),
        }
    }

    fn require<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
        value
            .as_deref()
            .with_context(|| format!("Environment variable {} is not set", name))
    }

    pub fn ms_token(&self) -> Result<&str> {
        Self::require(&self.ms_token, MS_TOKEN)
    }

    pub fn wb_token(&self) -> Result<&str> {
        Self::require(&self.wb_token, WB_TOKEN)
    }

    pub fn wb_token_64(&self) -> Result<&str> {
        Self::require(&self.wb_token_64, WB_TOKEN_64)
    }

    pub fn supplier_id(&self) -> Result<&str> {
        Self::require(&self.supplier_id, SUPPLIER_ID)
    }
}

/// Default references used when creating products
#[derive(Debug, Clone, Deserialize)]
pub struct ProductDefaults {
    pub uom: Meta,
    pub counterparty: Meta,
}

/// Ids of the user dictionaries the product sync fills
#[derive(Debug, Clone, Deserialize)]
pub struct Dictionaries {
    pub brands: String,
    pub countries: String,
}

/// Contents of the JSON config file
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    #[serde(rename = "ORGANIZATIONS", default)]
    pub organizations: HashMap<String, Meta>,
    #[serde(rename = "AGENTS", default)]
    pub agents: HashMap<String, Meta>,
    #[serde(rename = "MS_WAREHOUSES", default)]
    pub warehouses: HashMap<String, Meta>,
    #[serde(rename = "PRODUCT_DEFAULTS", default)]
    pub product_defaults: Option<ProductDefaults>,
    #[serde(rename = "PRODUCT_ATTRIBUTES", default)]
    pub product_attributes: HashMap<String, Meta>,
    #[serde(rename = "DICTIONARIES", default)]
    pub dictionaries: Option<Dictionaries>,
    #[serde(rename = "MOVE_MARKER_ATTRIBUTE", default = "default_move_marker")]
    pub move_marker_attribute: String,
}

fn default_move_marker() -> String {
    DEFAULT_MOVE_MARKER.to_string()
}

fn lookup<'a>(map: &'a HashMap<String, Meta>, section: &str, key: &str) -> Result<&'a Meta> {
    map.get(key)
        .with_context(|| format!("{}.{} is missing from the config file", section, key))
}

impl SyncConfig {
    pub fn parse(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Config file is not valid")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("In {}", path.display()))
    }

    pub fn organization(&self) -> Result<&Meta> {
        lookup(&self.organizations, "ORGANIZATIONS", "DEFAULT")
    }

    pub fn agent(&self) -> Result<&Meta> {
        lookup(&self.agents, "AGENTS", "WBAgent")
    }

    pub fn warehouse(&self, key: &str) -> Result<&Meta> {
        lookup(&self.warehouses, "MS_WAREHOUSES", key)
    }

    /// Store mirroring the marketplace warehouse stock
    pub fn fbo_store(&self) -> Result<&Meta> {
        self.warehouse("WB_FBO")
    }

    pub fn move_from(&self) -> Result<&Meta> {
        self.warehouse("MOVE_FROM")
    }

    pub fn move_to(&self) -> Result<&Meta> {
        self.warehouse("MOVE_TO")
    }

    pub fn product_defaults(&self) -> Result<&ProductDefaults> {
        self.product_defaults
            .as_ref()
            .context("PRODUCT_DEFAULTS is missing from the config file")
    }

    pub fn dictionaries(&self) -> Result<&Dictionaries> {
        self.dictionaries
            .as_ref()
            .context("DICTIONARIES is missing from the config file")
    }

    /// Brand attribute meta, when pinned in the config instead of looked up by name
    pub fn brand_attribute(&self) -> Option<&Meta> {
        self.product_attributes.get("brand")
    }
}

/// Everything a job needs to know before it starts
#[derive(Debug, Clone)]
pub struct Config {
    pub env: EnvTokens,
    pub sync: SyncConfig,
}

impl Config {
    pub fn load(config_path: &Path) -> Result<Self> {
        Ok(Self {
            env: EnvTokens::from_env(),
            sync: SyncConfig::load(config_path)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "ORGANIZATIONS": {
            "DEFAULT": {"href": "https://h/entity/organization/1", "type": "organization", "mediaType": "application/json"}
        },
        "AGENTS": {
            "WBAgent": {"href": "https://h/entity/counterparty/2", "type": "counterparty"}
        },
        "MS_WAREHOUSES": {
            "WB_FBO": {"href": "https://h/entity/store/3", "type": "store"}
        }
    }"#;

    #[test]
    fn test_parse_minimal_config() {
        let config = SyncConfig::parse(SAMPLE).unwrap();

        assert!(config.organization().unwrap().href.ends_with("/organization/1"));
        assert!(config.agent().unwrap().href.ends_with("/counterparty/2"));
        assert!(config.fbo_store().unwrap().href.ends_with("/store/3"));
        assert_eq!(config.move_marker_attribute, DEFAULT_MOVE_MARKER);
        assert!(config.brand_attribute().is_none());
    }

    #[test]
    fn test_missing_sections_are_reported() {
        let config = SyncConfig::parse(SAMPLE).unwrap();

        let err = config.move_to().unwrap_err().to_string();
        assert!(err.contains("MS_WAREHOUSES.MOVE_TO"));
        assert!(config.product_defaults().is_err());
        assert!(config.dictionaries().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "PRODUCT_DEFAULTS": {{
                    "uom": {{"href": "https://h/entity/uom/pcs"}},
                    "counterparty": {{"href": "https://h/entity/counterparty/9"}}
                }},
                "DICTIONARIES": {{"brands": "b-id", "countries": "c-id"}},
                "MOVE_MARKER_ATTRIBUTE": "Supply ID"
            }}"#
        )
        .unwrap();

        let config = SyncConfig::load(file.path()).unwrap();
        assert_eq!(config.dictionaries().unwrap().brands, "b-id");
        assert!(config.product_defaults().unwrap().uom.href.ends_with("/uom/pcs"));
        assert_eq!(config.move_marker_attribute, "Supply ID");
        assert!(config.organization().is_err());
    }

    #[test]
    fn test_product_defaults_ignore_extra_keys() {
        let config = SyncConfig::parse(
            r#"{
                "PRODUCT_DEFAULTS": {
                    "uom": {"href": "https://h/entity/uom/pcs"},
                    "counterparty": {"href": "https://h/entity/counterparty/9"},
                    "currency": {"href": "https://h/entity/currency/rub"}
                }
            }"#,
        )
        .unwrap();

        let defaults = config.product_defaults().unwrap();
        assert!(defaults.counterparty.href.ends_with("/counterparty/9"));
    }

    #[test]
    fn test_example_config_is_complete() {
        let config = SyncConfig::parse(include_str!("../../../config.example.json")).unwrap();

        assert!(config.organization().is_ok());
        assert!(config.agent().is_ok());
        assert!(config.fbo_store().is_ok());
        assert!(config.move_from().is_ok());
        assert!(config.move_to().is_ok());
        assert!(config.product_defaults().is_ok());
        assert_eq!(config.dictionaries().unwrap().countries.len(), 36);
        assert_eq!(config.move_marker_attribute, DEFAULT_MOVE_MARKER);
    }

    #[test]
    fn test_load_missing_file() {
        let err = SyncConfig::load(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read config file"));
    }

    #[test]
    fn test_env_tokens_require() {
        let tokens = EnvTokens {
            ms_token: Some("ms".to_string()),
            ..Default::default()
        };

        assert_eq!(tokens.ms_token().unwrap(), "ms");
        let err = tokens.wb_token_64().unwrap_err().to_string();
        assert!(err.contains(WB_TOKEN_64));
    }
}
