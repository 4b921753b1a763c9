use crate::core::cache::ReportStore;
use crate::core::error::Result;
use async_trait::async_trait;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use tracing::debug;

const REPORTS_PARTITION: &str = "reports";

/// Normalized reports kept in a fjall keyspace, keyed by report id.
pub struct FjallReportStore {
    keyspace: Keyspace,
    reports: PartitionHandle,
}

impl FjallReportStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;
        let keyspace = Config::new(path).open()?;
        let reports =
            keyspace.open_partition(REPORTS_PARTITION, PartitionCreateOptions::default())?;
        Ok(Self { keyspace, reports })
    }
}

#[async_trait]
impl ReportStore for FjallReportStore {
    async fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.reports.contains_key(id)?)
    }

    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let value = self.reports.get(id)?.map(|slice| slice.to_vec());
        debug!(id, hit = value.is_some(), "Report GET");
        Ok(value)
    }

    async fn put(&self, id: &str, payload: &[u8]) -> Result<()> {
        self.reports.insert(id, payload)?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!(id, bytes = payload.len(), "Report PUT");
        Ok(())
    }
}
