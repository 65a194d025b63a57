//! Vendor API clients
//!
//! Two thin REST wrappers, one per vendor: `ms` for the ERP/inventory backend
//! and `wb` for the marketplace supplier platform. Every write to the ERP goes
//! through an [`Operation`] so that runs can be logged and dry-run uniformly.

pub mod constants;
pub mod ms;
pub mod operations;
pub mod resilience;
pub mod wb;

pub use ms::{Meta, MsClient};
pub use operations::{Operation, OperationResult};
pub use resilience::{LogLevel, ResilienceConfig, RetryConfig, RetryPolicy, RetryableError};
