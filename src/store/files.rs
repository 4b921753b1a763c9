//! Date-indexed series persisted as one CSV file per key.

use crate::core::cache::SeriesStore;
use crate::core::error::{ReportError, Result};
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct CsvSeriesStore {
    dir: PathBuf,
}

impl CsvSeriesStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", file_stem(key)))
    }
}

/// Keeps tickers like `XYZ.TO` or `BRK-B` readable while making anything
/// else safe as a file name.
fn file_stem(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn storage_error(path: &Path, e: impl std::fmt::Display) -> ReportError {
    ReportError::Storage(format!("{}: {e}", path.display()))
}

#[async_trait]
impl<T> SeriesStore<T> for CsvSeriesStore
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn load(&self, key: &str) -> Result<Option<Vec<T>>> {
        let path = self.path_for(key);
        if !path.exists() {
            debug!(key, "Series file MISS");
            return Ok(None);
        }

        let mut reader = csv::Reader::from_path(&path).map_err(|e| storage_error(&path, e))?;
        let series = reader
            .deserialize()
            .collect::<std::result::Result<Vec<T>, _>>()
            .map_err(|e| storage_error(&path, e))?;
        debug!(key, entries = series.len(), "Series file HIT");
        Ok(Some(series))
    }

    async fn save(&self, key: &str, series: &[T]) -> Result<()> {
        let path = self.path_for(key);
        // Write beside the target and rename, so a crash never leaves a torn file
        let tmp = path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp).map_err(|e| storage_error(&tmp, e))?;
            for entry in series {
                writer.serialize(entry).map_err(|e| storage_error(&tmp, e))?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, &path)?;
        debug!(key, entries = series.len(), path = %path.display(), "Series file SAVE");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::currency::RateObservation;
    use crate::core::price::PriceBar;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_rate_series_round_trip() {
        let dir = tempdir().unwrap();
        let store = CsvSeriesStore::new(dir.path()).unwrap();
        let rates = vec![
            RateObservation {
                date: NaiveDate::from_ymd_opt(2023, 1, 3).unwrap(),
                rate: 1.3618,
            },
            RateObservation {
                date: NaiveDate::from_ymd_opt(2023, 1, 4).unwrap(),
                rate: 1.3491,
            },
        ];

        let missing: Option<Vec<RateObservation>> = store.load("FXUSDCAD").await.unwrap();
        assert!(missing.is_none());

        store.save("FXUSDCAD", &rates).await.unwrap();
        let loaded: Vec<RateObservation> = store.load("FXUSDCAD").await.unwrap().unwrap();
        assert_eq!(loaded, rates);

        let text = fs::read_to_string(store.path_for("FXUSDCAD")).unwrap();
        assert!(text.starts_with("date,FXUSDCAD\n2023-01-03,1.3618"));
    }

    #[tokio::test]
    async fn test_price_history_file_per_symbol() {
        let dir = tempdir().unwrap();
        let store = CsvSeriesStore::new(dir.path()).unwrap();
        let bars = vec![PriceBar {
            date: NaiveDate::from_ymd_opt(2023, 1, 3).unwrap(),
            open: 10.0,
            high: 11.0,
            low: 9.5,
            close: 10.5,
            volume: 1200,
        }];

        store.save("XEQT.TO", &bars).await.unwrap();
        assert!(dir.path().join("XEQT.TO.csv").exists());
        let loaded: Vec<PriceBar> = store.load("XEQT.TO").await.unwrap().unwrap();
        assert_eq!(loaded, bars);
    }

    #[test]
    fn test_file_stem_sanitizes_separators() {
        assert_eq!(file_stem("BRK/B"), "BRK_B");
        assert_eq!(file_stem("XYZ.TO"), "XYZ.TO");
    }
}
