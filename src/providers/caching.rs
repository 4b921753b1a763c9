use crate::core::cache::{SeriesCache, SeriesStore};
use crate::core::currency::{CurrencyRateProvider, RateObservation};
use crate::core::error::{ReportError, Result};
use crate::core::price::{PriceBar, PriceProvider, PriceQuote, QuoteObservation};
use crate::core::series::{self, DateRange};
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use std::sync::Arc;
use tracing::debug;

/// Key of the single USD/CAD series.
pub const RATE_SERIES_KEY: &str = "FXUSDCAD";

// Caching for CurrencyRateProvider
pub struct CachingCurrencyRateProvider<T: CurrencyRateProvider> {
    inner: T,
    cache: SeriesCache<RateObservation>,
}

impl<T: CurrencyRateProvider> CachingCurrencyRateProvider<T> {
    pub fn new(inner: T, store: Arc<dyn SeriesStore<RateObservation>>) -> Self {
        Self {
            inner,
            cache: SeriesCache::new(store),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: CurrencyRateProvider> CurrencyRateProvider for CachingCurrencyRateProvider<T> {
    async fn get_rates(&self, range: DateRange) -> Result<Vec<RateObservation>> {
        let range = range.to_weekdays();
        self.cache
            .get_or_fetch(RATE_SERIES_KEY, range, |gap| self.inner.get_rates(gap))
            .await
    }
}

// Caching for PriceProvider
pub struct CachingPriceProvider<T: PriceProvider> {
    inner: T,
    history: SeriesCache<PriceBar>,
    quotes: SeriesCache<QuoteObservation>,
    today: NaiveDate,
}

impl<T: PriceProvider> CachingPriceProvider<T> {
    pub fn new(
        inner: T,
        history: Arc<dyn SeriesStore<PriceBar>>,
        quotes: Arc<dyn SeriesStore<QuoteObservation>>,
    ) -> Self {
        Self {
            inner,
            history: SeriesCache::new(history),
            quotes: SeriesCache::new(quotes),
            today: Local::now().date_naive(),
        }
    }

    /// Pins the day quotes are keyed by and history is capped against.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: PriceProvider> PriceProvider for CachingPriceProvider<T> {
    /// One fetch per symbol per day; the quote is kept on disk under the day
    /// it was taken.
    async fn fetch_quote(&self, symbol: &str) -> Result<PriceQuote> {
        let day = DateRange::single(self.today);
        let observed = self
            .quotes
            .get_or_fetch(symbol, day, |_| async move {
                let quote = self.inner.fetch_quote(symbol).await?;
                Ok(vec![QuoteObservation::new(self.today, quote)])
            })
            .await?;
        observed
            .into_iter()
            .next_back()
            .map(QuoteObservation::into_quote)
            .ok_or_else(|| {
                let message = format!("No quote stored for {symbol} on {}", self.today);
                ReportError::remote("cache", message)
            })
    }

    /// Bars are only stored once their session has closed, so the range is
    /// capped at the last completed session.
    async fn fetch_history(&self, symbol: &str, range: DateRange) -> Result<Vec<PriceBar>> {
        let cap = series::last_completed_session(self.today);
        let range = range.to_weekdays();
        if range.start > cap {
            debug!(symbol, %range, %cap, "No completed session in range");
            return Ok(Vec::new());
        }
        let range = DateRange::new(range.start, range.end.min(cap));
        self.history
            .get_or_fetch(symbol, range, |gap| async move {
                let mut bars = self.inner.fetch_history(symbol, gap).await?;
                bars.retain(|bar| bar.date <= cap);
                Ok(bars)
            })
            .await
    }
}
