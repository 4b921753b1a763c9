//! The Activity Report: owner of the normalized dataset and every view
//! derived from it.

use crate::core::activity::{ActivityType, TransactionRecord};
use crate::core::cache::ReportStore;
use crate::core::classify::classify;
use crate::core::currency::{self, CurrencyRateProvider, USD};
use crate::core::error::{ReportError, Result};
use crate::core::price::PriceProvider;
use chrono::NaiveDate;
use futures::future::try_join_all;
use rust_decimal::{Decimal, prelude::*};
use rust_finprim::rate::cagr;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, instrument};

/// Net share counts below this are treated as a fully liquidated position.
const SHARE_EPSILON: f64 = 1e-9;

/// One point of a date-indexed chart series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub x: NaiveDate,
    pub y: f64,
}

/// Shares held of one symbol in one account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Holding {
    pub account: i64,
    pub symbol: String,
    pub shares: f64,
}

/// Immutable, currency-normalized view of one activity export.
#[derive(Debug, Clone)]
pub struct ActivityReport {
    records: Vec<TransactionRecord>,
    id: String,
}

impl ActivityReport {
    /// Runs the full pipeline over raw rows: classify, repair symbols, align
    /// rates and convert to CAD.
    #[instrument(name = "build_report", skip_all, fields(rows = raw.len()))]
    pub async fn build(
        raw: Vec<TransactionRecord>,
        rate_provider: &(dyn CurrencyRateProvider + Send + Sync),
        today: NaiveDate,
    ) -> Result<Self> {
        let classified = classify(raw);
        let normalized = currency::normalize_with_provider(classified, rate_provider, today).await?;
        let report = Self::from_normalized(normalized)?;
        info!(id = %report.id, records = report.records.len(), "Built activity report");
        Ok(report)
    }

    /// Wraps an already normalized dataset.
    pub fn from_normalized(records: Vec<TransactionRecord>) -> Result<Self> {
        let id = content_id(&canonical_csv(&records)?);
        Ok(Self { records, id })
    }

    /// Content hash of the canonical serialization, lowercase hex.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    pub fn partition<'a>(
        &'a self,
        activity: &'a ActivityType,
    ) -> impl Iterator<Item = &'a TransactionRecord> + 'a {
        self.records
            .iter()
            .filter(move |r| &r.activity_type == activity)
    }

    /// Trade rows carrying a usable symbol, optionally limited to `accounts`.
    /// An empty account list means every account.
    pub fn trades<'a>(
        &'a self,
        accounts: &'a [i64],
    ) -> impl Iterator<Item = &'a TransactionRecord> + 'a {
        self.records.iter().filter(move |r| {
            r.is_trade()
                && r.symbol.is_some()
                && (accounts.is_empty() || accounts.contains(&r.account_id))
        })
    }

    /// Sum of net amounts in one category; 0 for an empty category.
    pub fn sum(&self, activity: &ActivityType) -> f64 {
        self.partition(activity).map(|r| r.net_amount).sum()
    }

    pub fn deposits_sum(&self) -> f64 {
        self.sum(&ActivityType::Deposit)
    }

    pub fn withdrawals_sum(&self) -> f64 {
        self.sum(&ActivityType::Withdrawal)
    }

    pub fn fees_and_rebates_sum(&self) -> f64 {
        self.sum(&ActivityType::FeesAndRebates)
    }

    pub fn interest_sum(&self) -> f64 {
        self.sum(&ActivityType::Interest)
    }

    pub fn trades_sum(&self) -> f64 {
        self.sum(&ActivityType::Trade)
    }

    pub fn dividends_sum(&self) -> f64 {
        self.sum(&ActivityType::Dividend)
    }

    /// Net capital contributed. Withdrawals are negative, so this is a plain
    /// sum of both categories.
    pub fn initial_investment(&self) -> f64 {
        self.deposits_sum() + self.withdrawals_sum()
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.records.iter().map(|r| r.settlement_date).min()
    }

    pub fn accounts(&self) -> Vec<i64> {
        self.records
            .iter()
            .map(|r| r.account_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Signed share count per symbol across all accounts, liquidated
    /// positions removed.
    pub fn open_positions(&self) -> BTreeMap<String, f64> {
        let mut positions: BTreeMap<String, f64> = BTreeMap::new();
        for trade in self.trades(&[]) {
            if let Some(symbol) = &trade.symbol {
                *positions.entry(symbol.clone()).or_default() += trade.quantity;
            }
        }
        positions.retain(|_, shares| shares.abs() > SHARE_EPSILON);
        positions
    }

    /// Market value of the open positions in CAD, at each symbol's last
    /// close. USD-quoted symbols are converted at `fx_rate`.
    #[instrument(name = "current_value", skip(self, price_provider))]
    pub async fn current_value(
        &self,
        fx_rate: f64,
        price_provider: &(dyn PriceProvider + Send + Sync),
    ) -> Result<f64> {
        let positions = self.open_positions();
        let quotes = try_join_all(
            positions
                .keys()
                .map(|symbol| price_provider.fetch_quote(symbol)),
        )
        .await?;

        let value = positions
            .values()
            .zip(quotes)
            .map(|(shares, quote)| {
                let value = shares * quote.price;
                debug!(
                    symbol = %quote.symbol,
                    shares,
                    price = quote.price,
                    currency = %quote.currency,
                    "Valued position"
                );
                if quote.currency == USD {
                    value * fx_rate
                } else {
                    value
                }
            })
            .sum();
        Ok(value)
    }

    /// `current_value / initial_investment - 1`.
    pub async fn roi(
        &self,
        fx_rate: f64,
        price_provider: &(dyn PriceProvider + Send + Sync),
    ) -> Result<f64> {
        let invested = self.initial_investment();
        if invested == 0.0 {
            return Err(ReportError::DivisionByZero);
        }
        let current = self.current_value(fx_rate, price_provider).await?;
        Ok(current / invested - 1.0)
    }

    /// Compound annual growth from the net contribution to `current_value`
    /// over the years elapsed since the first settlement. Returned as a
    /// fraction (0.05 is 5%).
    pub fn annualized_return(&self, current_value: f64, today: NaiveDate) -> Result<f64> {
        let invested = self.initial_investment();
        if invested == 0.0 {
            return Err(ReportError::DivisionByZero);
        }
        if invested < 0.0 || current_value <= 0.0 {
            return Err(ReportError::UndefinedReturn(format!(
                "needs positive balances, got {invested:.2} → {current_value:.2}"
            )));
        }
        let start = self
            .start_date()
            .ok_or_else(|| ReportError::UndefinedReturn("report has no records".to_string()))?;
        let years = (today - start).num_days() as f64 / 365.0;
        if years <= 0.0 {
            return Err(ReportError::UndefinedReturn(format!(
                "no time elapsed since {start}"
            )));
        }

        let to_decimal = |v: f64, what: &str| {
            Decimal::from_f64(v)
                .ok_or_else(|| ReportError::UndefinedReturn(format!("invalid {what}: {v}")))
        };
        let rate = cagr(
            to_decimal(invested, "initial investment")?,
            to_decimal(current_value, "current value")?,
            to_decimal(years, "duration")?,
        );
        debug!(invested, current_value, years, %rate, "Annualized return");
        rate.to_f64()
            .ok_or_else(|| ReportError::UndefinedReturn(format!("rate out of range: {rate}")))
    }

    /// Share count per (account, symbol).
    pub fn portfolio(&self, drop_zero_shares: bool) -> Vec<Holding> {
        let mut grouped: BTreeMap<(i64, String), f64> = BTreeMap::new();
        for trade in self.trades(&[]) {
            if let Some(symbol) = &trade.symbol {
                *grouped
                    .entry((trade.account_id, symbol.clone()))
                    .or_default() += trade.quantity;
            }
        }
        grouped
            .into_iter()
            .filter(|(_, shares)| !drop_zero_shares || shares.abs() > SHARE_EPSILON)
            .map(|((account, symbol), shares)| Holding {
                account,
                symbol,
                shares,
            })
            .collect()
    }

    /// Running total of net amounts per settlement date, rounded to cents.
    pub fn net_amount_cumsum(&self) -> Vec<ChartPoint> {
        let mut per_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for record in &self.records {
            *per_day.entry(record.settlement_date).or_default() += record.net_amount;
        }

        let mut running = 0.0;
        per_day
            .into_iter()
            .map(|(x, amount)| {
                running += amount;
                ChartPoint {
                    x,
                    y: round_cents(running),
                }
            })
            .collect()
    }

    pub fn net_amount_cumsum_labels(&self) -> Vec<String> {
        self.net_amount_cumsum()
            .into_iter()
            .map(|p| p.x.format("%Y-%m-%d").to_string())
            .collect()
    }

    /// Persists the canonical dataset under its id. Returns `false` when a
    /// report with this id was already stored.
    pub async fn save(&self, store: &dyn ReportStore) -> Result<bool> {
        if store.contains(&self.id).await? {
            debug!(id = %self.id, "Report already stored");
            return Ok(false);
        }
        store.put(&self.id, &canonical_csv(&self.records)?).await?;
        info!(id = %self.id, "Saved activity report");
        Ok(true)
    }

    pub async fn load(id: &str, store: &dyn ReportStore) -> Result<Self> {
        let payload = store
            .get(id)
            .await?
            .ok_or_else(|| ReportError::ReportNotFound(id.to_string()))?;

        let mut reader = csv::Reader::from_reader(payload.as_slice());
        let records = reader
            .deserialize()
            .collect::<std::result::Result<Vec<TransactionRecord>, _>>()
            .map_err(|e| ReportError::Storage(format!("report {id}: {e}")))?;
        let report = Self::from_normalized(records)?;
        if report.id != id {
            return Err(ReportError::Storage(format!(
                "report {id} does not match its content hash {}",
                report.id
            )));
        }
        Ok(report)
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Header row plus one line per record, fields in declaration order, floats
/// in shortest round-trip form.
pub fn canonical_csv(records: &[TransactionRecord]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(Vec::new());
    if records.is_empty() {
        // serialize() writes the header lazily, so write it by hand
        writer.write_record(CANONICAL_HEADER)?;
    }
    for record in records {
        writer.serialize(record)?;
    }
    writer
        .into_inner()
        .map_err(|e| ReportError::Storage(e.to_string()))
}

const CANONICAL_HEADER: [&str; 16] = [
    "transaction_date",
    "settlement_date",
    "action",
    "symbol",
    "description",
    "etf_name",
    "quantity",
    "price",
    "gross_amount",
    "commission",
    "net_amount",
    "currency",
    "account_id",
    "activity_type",
    "account_type",
    "fx_rate",
];

fn content_id(canonical: &[u8]) -> String {
    let digest = Sha256::digest(canonical);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
