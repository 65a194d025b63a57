//! Sync jobs
//!
//! One module per job. Each exposes pure payload builders (tested in place)
//! and an async `run` that pulls, transforms and pushes sequentially.

pub mod photos;
pub mod products;
pub mod sales;
pub mod stocks;
pub mod stores;

use indicatif::{ProgressBar, ProgressStyle};

use crate::api::{MsClient, ResilienceConfig};
use crate::config::Config;

/// Shared state of a run
pub struct SyncContext {
    pub config: Config,
    pub ms: MsClient,
    pub resilience: ResilienceConfig,
}

/// Progress bar for per-item loops; hidden when stderr is not a terminal
pub fn progress_bar(len: usize, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    ) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(msg.to_string());
    pb
}
