//! Transaction records as they flow through the normalization pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Category of a brokerage activity row.
///
/// The set is closed; labels the export uses for anything else are kept
/// verbatim in [`ActivityType::Other`] so they survive a save/load cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityType {
    Deposit,
    Withdrawal,
    FeesAndRebates,
    Interest,
    Trade,
    Dividend,
    Other(String),
}

impl ActivityType {
    pub const ALL: [ActivityType; 6] = [
        ActivityType::Deposit,
        ActivityType::Withdrawal,
        ActivityType::FeesAndRebates,
        ActivityType::Interest,
        ActivityType::Trade,
        ActivityType::Dividend,
    ];

    /// Parses the label used in the export's "Activity Type" column.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "deposits" | "deposit" => ActivityType::Deposit,
            "withdrawals" | "withdrawal" => ActivityType::Withdrawal,
            "fees and rebates" => ActivityType::FeesAndRebates,
            "interest" => ActivityType::Interest,
            "trades" | "trade" => ActivityType::Trade,
            "dividends" | "dividend" => ActivityType::Dividend,
            _ => ActivityType::Other(label.trim().to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ActivityType::Deposit => "Deposits",
            ActivityType::Withdrawal => "Withdrawals",
            ActivityType::FeesAndRebates => "Fees and rebates",
            ActivityType::Interest => "Interest",
            ActivityType::Trade => "Trades",
            ActivityType::Dividend => "Dividends",
            ActivityType::Other(label) => label,
        }
    }
}

impl Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl From<String> for ActivityType {
    fn from(label: String) -> Self {
        ActivityType::from_label(&label)
    }
}

impl From<ActivityType> for String {
    fn from(activity: ActivityType) -> Self {
        activity.label().to_string()
    }
}

/// One row of the activity export.
///
/// Field order is the column order of the canonical serialization used for
/// the report id, so reordering fields changes every stored id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_date: NaiveDate,
    pub settlement_date: NaiveDate,
    pub action: Option<String>,
    pub symbol: Option<String>,
    pub description: String,
    pub etf_name: Option<String>,
    pub quantity: f64,
    pub price: f64,
    pub gross_amount: f64,
    pub commission: f64,
    pub net_amount: f64,
    pub currency: String,
    pub account_id: i64,
    pub activity_type: ActivityType,
    pub account_type: String,
    /// USD/CAD rate aligned to the settlement date, once normalized.
    pub fx_rate: Option<f64>,
}

impl TransactionRecord {
    pub fn is_trade(&self) -> bool {
        self.activity_type == ActivityType::Trade
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    pub fn record(
        activity_type: ActivityType,
        settlement: &str,
        net_amount: f64,
    ) -> TransactionRecord {
        TransactionRecord {
            transaction_date: date(settlement),
            settlement_date: date(settlement),
            action: None,
            symbol: None,
            description: String::new(),
            etf_name: None,
            quantity: 0.0,
            price: 0.0,
            gross_amount: 0.0,
            commission: 0.0,
            net_amount,
            currency: "CAD".to_string(),
            account_id: 1,
            activity_type,
            account_type: "Individual TFSA".to_string(),
            fx_rate: None,
        }
    }

    pub fn trade(
        symbol: &str,
        settlement: &str,
        quantity: f64,
        price: f64,
        currency: &str,
    ) -> TransactionRecord {
        TransactionRecord {
            symbol: Some(symbol.to_string()),
            action: Some(if quantity < 0.0 { "Sell" } else { "Buy" }.to_string()),
            quantity,
            price,
            gross_amount: -quantity * price,
            net_amount: -quantity * price,
            currency: currency.to_string(),
            ..record(ActivityType::Trade, settlement, 0.0)
        }
    }
}
