use crate::core::cache::{ReportStore, SeriesStore};
use crate::core::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory series store, used by tests and one-off runs.
pub struct MemorySeriesStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<Mutex<HashMap<String, Vec<T>>>>,
}

impl<T> MemorySeriesStore<T>
where
    T: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<T> Default for MemorySeriesStore<T>
where
    T: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> SeriesStore<T> for MemorySeriesStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn load(&self, key: &str) -> Result<Option<Vec<T>>> {
        let store = self.inner.lock().await;
        let series = store.get(key).cloned();
        debug!(key, hit = series.is_some(), "Memory series LOAD");
        Ok(series)
    }

    async fn save(&self, key: &str, series: &[T]) -> Result<()> {
        let mut store = self.inner.lock().await;
        debug!(key, entries = series.len(), "Memory series SAVE");
        store.insert(key.to_string(), series.to_vec());
        Ok(())
    }
}

/// In-memory report store.
#[derive(Default)]
pub struct MemoryReportStore {
    inner: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.inner.lock().await.contains_key(id))
    }

    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.lock().await.get(id).cloned())
    }

    async fn put(&self, id: &str, payload: &[u8]) -> Result<()> {
        debug!(id, "Memory report PUT");
        self.inner
            .lock()
            .await
            .insert(id.to_string(), payload.to_vec());
        Ok(())
    }
}
