//! Readers for brokerage activity exports.

pub mod activity_export;
pub mod delimited;
pub mod excel;

use crate::core::activity::TransactionRecord;
use crate::core::error::{ReportError, Result};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    Xlsx,
    Xls,
    Csv,
}

impl ImportFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .ok_or_else(|| ReportError::Parse(format!("{} has no extension", path.display())))?;
        match extension.as_str() {
            "xlsx" => Ok(ImportFormat::Xlsx),
            "xls" => Ok(ImportFormat::Xls),
            "csv" => Ok(ImportFormat::Csv),
            other => Err(ReportError::Parse(format!("unsupported export format: .{other}"))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Keep only this account's rows.
    pub account: Option<i64>,
}

/// Parses an export held in memory.
pub fn import_bytes(
    bytes: &[u8],
    format: ImportFormat,
    options: &ImportOptions,
) -> Result<Vec<TransactionRecord>> {
    let rows = match format {
        ImportFormat::Xlsx => excel::read_xlsx(bytes)?,
        ImportFormat::Xls => excel::read_xls(bytes)?,
        ImportFormat::Csv => delimited::read_csv(bytes)?,
    };
    let mut records = activity_export::parse_rows(&rows)?;

    if let Some(account) = options.account {
        info!(account, "Filtering by account number");
        records.retain(|r| r.account_id == account);
    }
    info!(records = records.len(), ?format, "Imported activity export");
    Ok(records)
}

pub fn import_file(path: &Path, options: &ImportOptions) -> Result<Vec<TransactionRecord>> {
    let format = ImportFormat::from_path(path)?;
    let bytes = std::fs::read(path)?;
    import_bytes(&bytes, format, options)
}
