pub mod bank_of_canada;
pub mod caching;
pub mod util;
pub mod yahoo_finance;

use crate::core::config::AppConfig;
use crate::core::error::Result;
use crate::store::DataStores;
use bank_of_canada::BankOfCanadaProvider;
use caching::{CachingCurrencyRateProvider, CachingPriceProvider};
use chrono::NaiveDate;
use util::HttpClient;
use yahoo_finance::YahooFinanceProvider;

pub type CachedRates = CachingCurrencyRateProvider<BankOfCanadaProvider>;
pub type CachedPrices = CachingPriceProvider<YahooFinanceProvider>;

/// The remote providers named in `config`, each behind its persistent cache.
pub fn build_providers(
    config: &AppConfig,
    stores: &DataStores,
    today: NaiveDate,
) -> Result<(CachedRates, CachedPrices)> {
    let http = HttpClient::new(&config.http)?;
    let rates = CachingCurrencyRateProvider::new(
        BankOfCanadaProvider::new(&config.providers.bank_of_canada.base_url, http.clone()),
        stores.rates.clone(),
    );
    let prices = CachingPriceProvider::new(
        YahooFinanceProvider::new(&config.providers.yahoo.base_url, http),
        stores.history.clone(),
        stores.quotes.clone(),
    )
    .with_today(today);
    Ok((rates, prices))
}
