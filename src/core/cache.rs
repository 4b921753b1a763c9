use crate::core::error::{ReportError, Result};
use crate::core::series::{self, DateRange, Dated};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

/// Persisted date-indexed series, one per key.
#[async_trait]
pub trait SeriesStore<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    async fn load(&self, key: &str) -> Result<Option<Vec<T>>>;
    async fn save(&self, key: &str, series: &[T]) -> Result<()>;
}

/// Persisted normalized reports, keyed by content hash.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn contains(&self, id: &str) -> Result<bool>;
    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>>;
    async fn put(&self, id: &str, payload: &[u8]) -> Result<()>;
}

/// One async mutex per key, created on first use.
#[derive(Clone, Default)]
pub struct KeyedLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().await;
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// What the store already has for a key and what still has to be fetched.
#[derive(Debug, Clone)]
pub struct CacheLookup<T> {
    pub cached: Vec<T>,
    pub missing: Vec<DateRange>,
}

/// Read-through cache over a [`SeriesStore`] that only ever fetches the
/// sub-ranges it does not already hold.
pub struct SeriesCache<T>
where
    T: Send + Sync + 'static,
{
    store: Arc<dyn SeriesStore<T>>,
    locks: KeyedLocks,
}

impl<T> SeriesCache<T>
where
    T: Dated + Clone + Send + Sync + 'static,
{
    pub fn new(store: Arc<dyn SeriesStore<T>>) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
        }
    }

    pub async fn lookup(&self, key: &str, range: DateRange) -> Result<CacheLookup<T>> {
        let cached = self.store.load(key).await?.unwrap_or_default();
        let missing = series::missing_ranges(&cached, range);
        Ok(CacheLookup { cached, missing })
    }

    /// Merges freshly fetched entries into the stored series and persists it.
    pub async fn put(&self, key: &str, cached: Vec<T>, fetched: Vec<T>) -> Result<Vec<T>> {
        let merged = series::merge_series(cached, fetched);
        self.store.save(key, &merged).await?;
        debug!(key, entries = merged.len(), "Series PUT");
        Ok(merged)
    }

    /// Returns the entries of `range` for `key`, fetching uncovered ends.
    ///
    /// The key stays locked for the whole read-fetch-merge-persist cycle.
    /// If a fetch fails, whatever was fetched before it is still persisted.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &str,
        range: DateRange,
        fetch: F,
    ) -> Result<Vec<T>>
    where
        F: Fn(DateRange) -> Fut + Send + Sync,
        Fut: Future<Output = Result<Vec<T>>> + Send,
    {
        let _guard = self.locks.acquire(key).await;

        let CacheLookup { cached, missing } = self.lookup(key, range).await?;
        if missing.is_empty() {
            debug!(key, %range, "Series cache HIT");
            return Ok(series::slice_range(&cached, range));
        }

        let mut fetched = Vec::new();
        let mut failure: Option<ReportError> = None;
        for gap in missing {
            debug!(key, %gap, "Series cache MISS, fetching");
            match fetch(gap).await {
                Ok(mut batch) => fetched.append(&mut batch),
                Err(e) => {
                    warn!(key, %gap, error = %e, "Fetch failed");
                    failure = Some(e);
                    break;
                }
            }
        }

        let merged = if fetched.is_empty() {
            cached
        } else {
            self.put(key, cached, fetched).await?
        };

        match failure {
            Some(e) => Err(e),
            None => Ok(series::slice_range(&merged, range)),
        }
    }
}
