//! Marketplace supplier platform
//!
//! `stats` reads sales and stock reports, `content` logs in and reads the
//! product cards, `nomenclature` flattens cards into catalog rows.

pub mod content;
pub mod nomenclature;
pub mod stats;

pub use content::WbContentClient;
pub use nomenclature::CatalogItem;
pub use stats::{SaleRow, StockRow, WbStatsClient, reporting_date};
