//! Retry and monitoring configuration
//!
//! The marketplace statistics endpoint occasionally answers with a body that is
//! not JSON; those calls are retried on a fixed schedule. Nothing else retries.

pub mod config;
pub mod retry;

pub use config::{LogLevel, MonitoringConfig, ResilienceConfig};
pub use retry::{RetryConfig, RetryPolicy, RetryableError};
