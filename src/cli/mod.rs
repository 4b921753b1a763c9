//! Command implementations and terminal rendering.

pub mod contributions;
pub mod growth;
pub mod portfolio;
pub mod setup;
pub mod summary;
pub mod ui;

use crate::core::ActivityReport;
use crate::importers::{self, ImportOptions};
use crate::providers::{CachedPrices, CachedRates};
use crate::store::DataStores;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::info;

/// Where a command reads its report from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportSource {
    /// A brokerage export to import, normalize and save.
    File(PathBuf),
    /// A previously saved report, by id.
    Stored(String),
}

/// Everything a command needs besides its own arguments.
pub struct AppContext {
    pub stores: DataStores,
    pub rates: CachedRates,
    pub prices: CachedPrices,
    pub today: NaiveDate,
}

impl AppContext {
    /// Builds or loads the report named by `source`, optionally narrowed to
    /// one account. Imported reports are saved before narrowing.
    pub async fn open_report(
        &self,
        source: &ReportSource,
        account: Option<i64>,
    ) -> Result<ActivityReport> {
        let report = match source {
            ReportSource::File(path) => {
                let raw = importers::import_file(path, &ImportOptions::default())
                    .with_context(|| format!("Failed to import {}", path.display()))?;

                let spinner = ui::new_spinner("Fetching USD/CAD rates...");
                let built = ActivityReport::build(raw, &self.rates, self.today).await;
                spinner.finish_and_clear();
                let report = built?;

                if report.save(self.stores.reports.as_ref()).await? {
                    println!(
                        "Saved report {}",
                        ui::style_text(report.id(), ui::StyleType::Subtle)
                    );
                }
                report
            }
            ReportSource::Stored(id) => {
                ActivityReport::load(id, self.stores.reports.as_ref()).await?
            }
        };

        match account {
            Some(account) => {
                info!(account, "Narrowing report to one account");
                let records = report
                    .records()
                    .iter()
                    .filter(|r| r.account_id == account)
                    .cloned()
                    .collect();
                Ok(ActivityReport::from_normalized(records)?)
            }
            None => Ok(report),
        }
    }
}
