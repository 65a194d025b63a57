//! ERP backend client
//!
//! Basic-auth REST wrapper with offset pagination, filter lookups and the
//! dictionary/attribute helpers the product sync needs.

pub mod attributes;
pub mod client;
pub mod dictionary;
pub mod lookups;
pub mod models;

pub use attributes::{ProductAttributes, VariantCharacteristics};
pub use client::MsClient;
pub use dictionary::{MsDict, UserDict};
pub use models::{ListMeta, ListResponse, Meta};
