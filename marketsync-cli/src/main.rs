//! marketsync: one-shot sync jobs between the marketplace supplier platform
//! and the ERP backend.
//!
//! Commands:
//! - `marketsync products` - create missing products and variants
//! - `marketsync photos` - upload missing product and variant images
//! - `marketsync stocks` - reconcile FBO stock with supply and loss documents
//! - `marketsync sales` - record sales and returns as demands and sales returns
//! - `marketsync stores` - retarget marked moves

mod api;
mod config;
mod report;
mod sync;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use std::path::PathBuf;

use api::resilience::config::STATS_MAX_ATTEMPTS;
use api::{LogLevel, MsClient, ResilienceConfig};
use config::Config;
use sync::SyncContext;

#[derive(Parser)]
#[command(name = "marketsync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Config file with ERP references
    #[arg(short, long, global = true, default_value = "config.json")]
    config: PathBuf,

    /// Log writes instead of sending them
    #[arg(long, global = true)]
    dry_run: bool,

    /// Attempts per statistics report request
    #[arg(long, global = true, default_value_t = STATS_MAX_ATTEMPTS)]
    retries: u32,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create missing products, base products and variants from the catalog
    Products,

    /// Upload catalog photos missing from products and variants
    Photos,

    /// Reconcile FBO stock with the marketplace warehouse
    Stocks {
        /// Report window in days (at most 90)
        #[arg(long, default_value_t = 90)]
        days: i64,
    },

    /// Record new sales and returns
    Sales {
        /// Report window in days (at most 90)
        #[arg(long, default_value_t = 0)]
        days: i64,
    },

    /// Retarget marked moves to the configured store
    Stores,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Products => "products",
            Commands::Photos => "photos",
            Commands::Stocks { .. } => "stocks",
            Commands::Sales { .. } => "sales",
            Commands::Stores => "stores",
        }
    }
}

fn init_logging(level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(level.to_level_filter())
        .parse_default_env()
        .format_timestamp_secs()
        .init();
}

fn resilience(cli: &Cli) -> ResilienceConfig {
    ResilienceConfig::builder()
        .max_retries(cli.retries)
        .log_level(LogLevel::from_verbosity(cli.verbose))
        .request_logging(cli.verbose > 0)
        .build()
}

async fn run(cli: Cli, resilience: ResilienceConfig) -> Result<()> {
    let config = Config::load(&cli.config)?;
    let ms = MsClient::new(config.env.ms_token()?, &resilience, cli.dry_run)?;
    if cli.dry_run {
        info!("Dry run: nothing will be written to MS");
    }

    let ctx = SyncContext {
        config,
        ms,
        resilience,
    };

    info!("Sync started: {}", cli.command.name());
    let report = match cli.command {
        Commands::Products => sync::products::run(&ctx).await?,
        Commands::Photos => sync::photos::run(&ctx).await?,
        Commands::Stocks { days } => sync::stocks::run(&ctx, days).await?,
        Commands::Sales { days } => sync::sales::run(&ctx, days).await?,
        Commands::Stores => sync::stores::run(&ctx).await?,
    };
    report.print_summary();
    if !report.is_clean() {
        warn!("Sync finished with problems, see the summary above");
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let resilience = resilience(&cli);
    init_logging(resilience.monitoring.log_level);

    if let Err(e) = run(cli, resilience).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_days() {
        let cli = Cli::parse_from(["marketsync", "stocks"]);
        assert!(matches!(cli.command, Commands::Stocks { days: 90 }));
        assert_eq!(cli.config, PathBuf::from("config.json"));

        let cli = Cli::parse_from(["marketsync", "--dry-run", "-vv", "sales", "--days", "3"]);
        assert!(matches!(cli.command, Commands::Sales { days: 3 }));
        assert!(cli.dry_run);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_resilience_from_flags() {
        let cli = Cli::parse_from(["marketsync", "--retries", "3", "-v", "stores"]);
        let config = resilience(&cli);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.monitoring.log_level, LogLevel::Debug);
        assert!(config.monitoring.request_logging);

        let quiet = resilience(&Cli::parse_from(["marketsync", "stores"]));
        assert!(!quiet.monitoring.request_logging);
    }
}
