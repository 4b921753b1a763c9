//! Replays trade history against daily prices to value the portfolio over
//! time.

use crate::core::activity::TransactionRecord;
use crate::core::currency::{
    CurrencyRateProvider, RATE_LOOKBACK_DAYS, REPORTING_CURRENCY, RateObservation, USD,
};
use crate::core::error::{ReportError, Result};
use crate::core::price::{PriceBar, PriceProvider};
use crate::core::report::{ActivityReport, ChartPoint};
use crate::core::series::{self, DateRange, Dated};
use chrono::{Duration, NaiveDate};
use futures::future::try_join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// One trading day of one symbol: the bar in CAD, shares held that day and
/// their market value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthPoint {
    pub date: NaiveDate,
    pub symbol: String,
    pub currency: String,
    pub shares: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub market_value: f64,
}

impl Dated for GrowthPoint {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

#[derive(Debug, Clone, Copy)]
struct ShareStep {
    date: NaiveDate,
    shares: f64,
}

impl Dated for ShareStep {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

/// Cumulative shares after each settlement date.
fn share_steps<'a>(trades: impl IntoIterator<Item = &'a TransactionRecord>) -> Vec<ShareStep> {
    let mut per_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for trade in trades {
        *per_day.entry(trade.settlement_date).or_default() += trade.quantity;
    }
    let mut held = 0.0;
    per_day
        .into_iter()
        .map(|(date, quantity)| {
            held += quantity;
            ShareStep { date, shares: held }
        })
        .collect()
}

/// Lays a symbol's running share count over its price calendar.
///
/// Share counts carry forward between trades and are zero before the first
/// one. Prices stay in the symbol's own currency.
pub fn build_symbol_series(
    symbol: &str,
    currency: &str,
    trades: &[&TransactionRecord],
    history: &[PriceBar],
) -> Vec<GrowthPoint> {
    let steps = share_steps(trades.iter().copied());
    let dates: Vec<NaiveDate> = history.iter().map(|bar| bar.date).collect();

    history
        .iter()
        .zip(series::asof_backward(&dates, &steps))
        .map(|(bar, step)| {
            let shares = step.map_or(0.0, |s| s.shares);
            GrowthPoint {
                date: bar.date,
                symbol: symbol.to_string(),
                currency: currency.to_string(),
                shares,
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
                market_value: shares * bar.close,
            }
        })
        .collect()
}

/// Converts USD-priced points to CAD with the rate in effect on each date
/// and recomputes market value. `points` must be sorted by date.
pub fn convert_growth(
    points: Vec<GrowthPoint>,
    rates: &[RateObservation],
) -> Result<Vec<GrowthPoint>> {
    let dates: Vec<NaiveDate> = points.iter().map(|p| p.date).collect();
    let aligned: Vec<Option<f64>> = series::asof_backward(&dates, rates)
        .into_iter()
        .map(|obs| obs.map(|o| o.rate))
        .collect();

    points
        .into_iter()
        .zip(aligned)
        .map(|(point, rate)| {
            let factor = match point.currency.as_str() {
                REPORTING_CURRENCY => 1.0,
                USD => rate.ok_or(ReportError::MissingRate { date: point.date })?,
                other => return Err(ReportError::UnsupportedCurrency(other.to_string())),
            };
            let close = point.close * factor;
            Ok(GrowthPoint {
                open: point.open * factor,
                high: point.high * factor,
                low: point.low * factor,
                close,
                market_value: point.shares * close,
                ..point
            })
        })
        .collect()
}

/// Rebuilds the daily valuation of every symbol traded in `accounts` (all
/// accounts when empty), from each symbol's first trade up to `today`.
///
/// Histories are fetched concurrently. The result is sorted by date, then
/// symbol.
#[instrument(name = "portfolio_growth", skip(report, price_provider, rate_provider))]
pub async fn reconstruct(
    report: &ActivityReport,
    accounts: &[i64],
    price_provider: &(dyn PriceProvider + Send + Sync),
    rate_provider: &(dyn CurrencyRateProvider + Send + Sync),
    today: NaiveDate,
) -> Result<Vec<GrowthPoint>> {
    let mut by_symbol: BTreeMap<&str, Vec<&TransactionRecord>> = BTreeMap::new();
    for trade in report.trades(accounts) {
        if let Some(symbol) = trade.symbol.as_deref() {
            by_symbol.entry(symbol).or_default().push(trade);
        }
    }
    let Some(first_trade) = by_symbol.values().flatten().map(|t| t.settlement_date).min() else {
        return Ok(Vec::new());
    };

    let histories = try_join_all(by_symbol.iter().map(|(symbol, trades)| {
        let start = trades
            .iter()
            .map(|t| t.settlement_date)
            .min()
            .unwrap_or(first_trade);
        price_provider.fetch_history(symbol, DateRange::new(start, today))
    }))
    .await?;

    let mut points: Vec<GrowthPoint> = by_symbol
        .iter()
        .zip(histories)
        .flat_map(|((symbol, trades), history)| {
            // The first trade's currency is taken as the listing currency
            let currency = trades
                .first()
                .map_or(REPORTING_CURRENCY, |t| t.currency.as_str());
            debug!(symbol, bars = history.len(), currency, "Replaying trades");
            build_symbol_series(symbol, currency, trades, &history)
        })
        .collect();
    points.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.symbol.cmp(&b.symbol)));

    let rates = if points.iter().any(|p| p.currency == USD) {
        let span = DateRange::new(first_trade - Duration::days(RATE_LOOKBACK_DAYS), today);
        rate_provider.get_rates(span).await?
    } else {
        Vec::new()
    };

    let converted = convert_growth(points, &rates)?;
    info!(symbols = by_symbol.len(), points = converted.len(), "Reconstructed portfolio growth");
    Ok(converted)
}

/// Optional inclusive date bounds for growth views.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GrowthWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl GrowthWindow {
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start.is_none_or(|s| s <= day) && self.end.is_none_or(|e| day <= e)
    }
}

/// Total market value per date.
pub fn portfolio_growth_totals(points: &[GrowthPoint], window: GrowthWindow) -> Vec<ChartPoint> {
    let mut totals: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for point in points.iter().filter(|p| window.contains(p.date)) {
        *totals.entry(point.date).or_default() += point.market_value;
    }
    totals.into_iter().map(|(x, y)| ChartPoint { x, y }).collect()
}

/// A labelled series, one per symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolSeries {
    pub label: String,
    pub data: Vec<ChartPoint>,
}

pub fn symbols_growth(points: &[GrowthPoint], window: GrowthWindow) -> Vec<SymbolSeries> {
    let mut grouped: BTreeMap<&str, Vec<ChartPoint>> = BTreeMap::new();
    for point in points.iter().filter(|p| window.contains(p.date)) {
        grouped.entry(&point.symbol).or_default().push(ChartPoint {
            x: point.date,
            y: point.market_value,
        });
    }
    grouped
        .into_iter()
        .map(|(label, data)| SymbolSeries {
            label: label.to_string(),
            data,
        })
        .collect()
}
