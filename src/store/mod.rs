pub mod disk;
pub mod files;
pub mod memory;

use crate::core::cache::ReportStore;
use crate::core::error::Result;
use disk::FjallReportStore;
use files::CsvSeriesStore;
use std::path::Path;
use std::sync::Arc;

/// The persisted caches under one data directory:
///
/// - `fx/`: the USD/CAD rate series
/// - `history/`: one price history file per symbol
/// - `quotes/`: one file of daily quotes per symbol
/// - `reports/`: normalized reports keyed by content hash
pub struct DataStores {
    pub rates: Arc<CsvSeriesStore>,
    pub history: Arc<CsvSeriesStore>,
    pub quotes: Arc<CsvSeriesStore>,
    pub reports: Arc<dyn ReportStore>,
}

impl DataStores {
    pub fn open(data_path: &Path) -> Result<Self> {
        Ok(Self {
            rates: Arc::new(CsvSeriesStore::new(data_path.join("fx"))?),
            history: Arc::new(CsvSeriesStore::new(data_path.join("history"))?),
            quotes: Arc::new(CsvSeriesStore::new(data_path.join("quotes"))?),
            reports: Arc::new(FjallReportStore::open(&data_path.join("reports"))?),
        })
    }
}
