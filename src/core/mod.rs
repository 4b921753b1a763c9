//! Core business logic abstractions

pub mod activity;
pub mod cache;
pub mod classify;
pub mod config;
pub mod currency;
pub mod error;
pub mod growth;
pub mod log;
pub mod price;
pub mod report;
pub mod series;

// Re-export main types for cleaner imports
pub use activity::{ActivityType, TransactionRecord};
pub use currency::CurrencyRateProvider;
pub use error::{ReportError, Result};
pub use price::{PriceBar, PriceProvider, PriceQuote};
pub use report::{ActivityReport, ChartPoint, Holding};
pub use series::DateRange;
