//! Pricing abstractions and core types

use crate::core::error::Result;
use crate::core::series::{DateRange, Dated};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Last close of a security and the currency it trades in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub symbol: String,
    pub price: f64,
    pub currency: String,
}

/// One trading day of a security's price history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Volume")]
    pub volume: u64,
}

impl Dated for PriceBar {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

/// A quote as persisted: the close of record for `symbol` on `date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteObservation {
    pub date: NaiveDate,
    pub symbol: String,
    pub price: f64,
    pub currency: String,
}

impl Dated for QuoteObservation {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

impl QuoteObservation {
    pub fn new(date: NaiveDate, quote: PriceQuote) -> Self {
        QuoteObservation {
            date,
            symbol: quote.symbol,
            price: quote.price,
            currency: quote.currency,
        }
    }

    pub fn into_quote(self) -> PriceQuote {
        PriceQuote {
            symbol: self.symbol,
            price: self.price,
            currency: self.currency,
        }
    }
}

#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Close of the last completed session and the trading currency.
    async fn fetch_quote(&self, symbol: &str) -> Result<PriceQuote>;

    /// Daily bars inside `range`, sorted by date, one per trading day.
    async fn fetch_history(&self, symbol: &str, range: DateRange) -> Result<Vec<PriceBar>>;
}
