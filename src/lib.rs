pub mod cli;
pub mod core;
pub mod importers;
pub mod providers;
pub mod store;

use crate::cli::growth::GrowthOptions;
use crate::cli::{AppContext, ReportSource};
use crate::core::config::AppConfig;
use crate::store::DataStores;
use anyhow::{Context, Result};
use chrono::Local;
use tracing::{debug, info};

pub enum AppCommand {
    Summary {
        source: ReportSource,
        account: Option<i64>,
    },
    Portfolio {
        source: ReportSource,
        account: Option<i64>,
        all: bool,
    },
    Contributions {
        source: ReportSource,
        json: bool,
    },
    Growth {
        source: ReportSource,
        options: GrowthOptions,
    },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("cadfolio starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let data_path = config.default_data_path()?;
    let stores = DataStores::open(&data_path)
        .with_context(|| format!("Failed to open data directory: {}", data_path.display()))?;
    let today = Local::now().date_naive();
    let (rates, prices) = providers::build_providers(&config, &stores, today)?;
    let ctx = AppContext {
        stores,
        rates,
        prices,
        today,
    };

    match command {
        AppCommand::Summary { source, account } => cli::summary::run(&ctx, &source, account).await,
        AppCommand::Portfolio { source, account, all } => {
            cli::portfolio::run(&ctx, &source, account, all).await
        }
        AppCommand::Contributions { source, json } => {
            cli::contributions::run(&ctx, &source, json).await
        }
        AppCommand::Growth { source, options } => cli::growth::run(&ctx, &source, &options).await,
    }
}
