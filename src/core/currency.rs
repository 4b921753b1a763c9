//! USD/CAD rates and conversion of records into the reporting currency.

use crate::core::activity::{ActivityType, TransactionRecord};
use crate::core::error::{ReportError, Result};
use crate::core::series::{self, DateRange, Dated};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const REPORTING_CURRENCY: &str = "CAD";
pub const USD: &str = "USD";

/// How far before a requested date rates are pulled, so that a date falling
/// on a holiday still finds the previous business day's rate.
pub const RATE_LOOKBACK_DAYS: i64 = 7;

/// One daily USD→CAD observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateObservation {
    pub date: NaiveDate,
    #[serde(rename = "FXUSDCAD")]
    pub rate: f64,
}

impl Dated for RateObservation {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

#[async_trait]
pub trait CurrencyRateProvider: Send + Sync {
    /// Daily observations inside `range`, sorted by date.
    async fn get_rates(&self, range: DateRange) -> Result<Vec<RateObservation>>;

    /// The rate in effect on `day`: the last observation on or before it.
    async fn get_rate(&self, day: NaiveDate) -> Result<f64> {
        let day = series::previous_weekday(day);
        let window = DateRange::new(day - Duration::days(RATE_LOOKBACK_DAYS), day);
        let rates = self.get_rates(window).await?;
        rates
            .iter()
            .rev()
            .find(|obs| obs.date <= day)
            .map(|obs| obs.rate)
            .ok_or(ReportError::MissingRate { date: day })
    }
}

/// Span of rates needed to normalize `records`: from just before the
/// earliest settlement date up to `today`.
pub fn conversion_span(records: &[TransactionRecord], today: NaiveDate) -> Option<DateRange> {
    records
        .iter()
        .map(|r| r.settlement_date)
        .min()
        .map(|start| DateRange::new(start - Duration::days(RATE_LOOKBACK_DAYS), today))
}

/// Activity types whose net amount is converted along with the other
/// monetary fields. Trades and fees keep their net amount as exported.
fn converts_net_amount(activity: &ActivityType) -> bool {
    matches!(
        activity,
        ActivityType::Deposit
            | ActivityType::Withdrawal
            | ActivityType::Dividend
            | ActivityType::Interest
    )
}

/// Converts every USD record into CAD using the rate in effect on its
/// settlement date.
///
/// Records come back sorted by settlement date (stable). Either every
/// record is converted or an error is returned; nothing is half done.
pub fn normalize_currency(
    records: Vec<TransactionRecord>,
    rates: &[RateObservation],
) -> Result<Vec<TransactionRecord>> {
    let mut records = records;
    records.sort_by_key(|r| r.settlement_date);

    let mut rates = rates.to_vec();
    rates.sort_by_key(|obs| obs.date);

    let dates: Vec<NaiveDate> = records.iter().map(|r| r.settlement_date).collect();
    let aligned: Vec<Option<f64>> = series::asof_backward(&dates, &rates)
        .into_iter()
        .map(|obs| obs.map(|o| o.rate))
        .collect();

    let mut converted = 0;
    let normalized = records
        .into_iter()
        .zip(aligned)
        .map(|(record, rate)| {
            let record = TransactionRecord {
                fx_rate: rate,
                ..record
            };
            match record.currency.as_str() {
                REPORTING_CURRENCY => Ok(record),
                USD => {
                    let rate = rate.ok_or(ReportError::MissingRate {
                        date: record.settlement_date,
                    })?;
                    converted += 1;
                    Ok(convert_usd_record(record, rate))
                }
                other => Err(ReportError::UnsupportedCurrency(other.to_string())),
            }
        })
        .collect::<Result<Vec<_>>>()?;

    info!(
        records = normalized.len(),
        converted, "Normalized records to {}", REPORTING_CURRENCY
    );
    Ok(normalized)
}

fn convert_usd_record(record: TransactionRecord, rate: f64) -> TransactionRecord {
    let net_amount = if converts_net_amount(&record.activity_type) {
        record.net_amount * rate
    } else {
        record.net_amount
    };
    debug!(
        settlement_date = %record.settlement_date,
        rate, "Converting USD record"
    );
    TransactionRecord {
        price: record.price * rate,
        gross_amount: record.gross_amount * rate,
        commission: record.commission * rate,
        net_amount,
        ..record
    }
}

/// Fetches the rates covering `records` and normalizes them.
pub async fn normalize_with_provider(
    records: Vec<TransactionRecord>,
    rate_provider: &(dyn CurrencyRateProvider + Send + Sync),
    today: NaiveDate,
) -> Result<Vec<TransactionRecord>> {
    let Some(span) = conversion_span(&records, today) else {
        return Ok(records);
    };
    debug!(%span, "Aligning records against USD/CAD rates");
    let rates = rate_provider.get_rates(span).await?;
    normalize_currency(records, &rates)
}


#[cfg(test)]
mod tests {
    use super::mocks::MockRateProvider;
    use super::*;
    use crate::core::activity::fixtures::{date, record, trade};

    fn usd(mut r: TransactionRecord) -> TransactionRecord {
        r.currency = USD.to_string();
        r
    }

    #[test]
    fn test_usd_trade_price_converted_at_settlement_rate() {
        let records = vec![trade("XYZ.TO", "2023-03-01", 10.0, 100.0, USD)];
        let rates = MockRateProvider::new(vec![("2023-03-01", 1.35)]).rates;

        let normalized = normalize_currency(records, &rates).unwrap();
        let t = &normalized[0];
        assert!((t.price - 135.0).abs() < 1e-9);
        assert!((t.gross_amount - -1350.0).abs() < 1e-9);
        // Trades keep their net amount as exported
        assert!((t.net_amount - -1000.0).abs() < 1e-9);
        assert_eq!(t.currency, USD);
        assert_eq!(t.fx_rate, Some(1.35));
    }

    #[test]
    fn test_net_amount_converted_only_for_cash_activities() {
        let records = vec![
            usd(record(ActivityType::Deposit, "2023-03-01", 100.0)),
            usd(record(ActivityType::Withdrawal, "2023-03-01", -100.0)),
            usd(record(ActivityType::Dividend, "2023-03-01", 10.0)),
            usd(record(ActivityType::Interest, "2023-03-01", 1.0)),
            usd(record(ActivityType::FeesAndRebates, "2023-03-01", -5.0)),
        ];
        let rates = MockRateProvider::new(vec![("2023-03-01", 1.5)]).rates;

        let normalized = normalize_currency(records, &rates).unwrap();
        let nets: Vec<f64> = normalized.iter().map(|r| r.net_amount).collect();
        assert_eq!(nets, vec![150.0, -150.0, 15.0, 1.5, -5.0]);
    }

    #[test]
    fn test_original_usd_values_recoverable_from_stored_rate() {
        let mut source = trade("SPY", "2023-03-03", 3.0, 401.17, USD);
        source.commission = -4.95;
        let rates = MockRateProvider::new(vec![("2023-03-01", 1.36), ("2023-03-02", 1.3612)]).rates;

        let normalized = normalize_currency(vec![source.clone()], &rates).unwrap();
        let t = &normalized[0];
        let rate = t.fx_rate.unwrap();
        assert_eq!(rate, 1.3612);
        assert!((t.price / rate - source.price).abs() < 1e-9);
        assert!((t.gross_amount / rate - source.gross_amount).abs() < 1e-9);
        assert!((t.commission / rate - source.commission).abs() < 1e-9);
    }

    #[test]
    fn test_cad_records_untouched() {
        let records = vec![record(ActivityType::Deposit, "2023-03-01", 1000.0)];
        let rates = MockRateProvider::new(vec![("2023-02-28", 1.3)]).rates;
        let normalized = normalize_currency(records, &rates).unwrap();
        assert_eq!(normalized[0].net_amount, 1000.0);
        assert_eq!(normalized[0].fx_rate, Some(1.3));
    }

    #[test]
    fn test_missing_rate_fails_whole_run() {
        let records = vec![
            usd(record(ActivityType::Deposit, "2023-03-10", 100.0)),
            usd(record(ActivityType::Deposit, "2023-01-02", 100.0)),
        ];
        let rates = MockRateProvider::new(vec![("2023-03-01", 1.3)]).rates;
        let err = normalize_currency(records, &rates).unwrap_err();
        match err {
            ReportError::MissingRate { date: d } => assert_eq!(d, date("2023-01-02")),
            other => panic!("expected MissingRate, got {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_currency_rejected() {
        let mut r = record(ActivityType::Deposit, "2023-03-01", 100.0);
        r.currency = "EUR".to_string();
        let err = normalize_currency(vec![r], &[]).unwrap_err();
        assert!(matches!(err, ReportError::UnsupportedCurrency(c) if c == "EUR"));
    }

    #[test]
    fn test_records_sorted_by_settlement_date() {
        let records = vec![
            record(ActivityType::Deposit, "2023-03-05", 2.0),
            record(ActivityType::Deposit, "2023-03-01", 1.0),
        ];
        let normalized = normalize_currency(records, &[]).unwrap();
        assert_eq!(normalized[0].settlement_date, date("2023-03-01"));
    }

    #[tokio::test]
    async fn test_get_rate_uses_prior_business_day() {
        let provider = MockRateProvider::new(vec![("2023-01-05", 1.34), ("2023-01-06", 1.35)]);
        // Sunday → Friday
        assert_eq!(provider.get_rate(date("2023-01-08")).await.unwrap(), 1.35);

        let empty = MockRateProvider::new(vec![]);
        let err = empty.get_rate(date("2023-01-06")).await.unwrap_err();
        assert!(matches!(err, ReportError::MissingRate { .. }));
    }

    #[tokio::test]
    async fn test_normalize_with_provider_requests_span_to_today() {
        let provider = MockRateProvider::new(vec![("2023-02-28", 1.3), ("2023-03-01", 1.4)]);
        let records = vec![usd(record(ActivityType::Dividend, "2023-03-01", 10.0))];
        let normalized = normalize_with_provider(records, &provider, date("2023-03-15"))
            .await
            .unwrap();
        assert_eq!(provider.call_count(), 1);
        assert!((normalized[0].net_amount - 14.0).abs() < 1e-9);
    }
}
