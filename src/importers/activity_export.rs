//! Column mapping and cell parsing for the brokerage activity export.
//!
//! Both the workbook and the CSV readers hand rows over as calamine cells,
//! so this is the only place that knows the export's layout.

use crate::core::activity::{ActivityType, TransactionRecord};
use crate::core::error::{ReportError, Result};
use calamine::Data;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use tracing::debug;

pub const TRANSACTION_DATE: &str = "Transaction Date";
pub const SETTLEMENT_DATE: &str = "Settlement Date";
pub const ACTION: &str = "Action";
pub const SYMBOL: &str = "Symbol";
pub const DESCRIPTION: &str = "Description";
pub const QUANTITY: &str = "Quantity";
pub const PRICE: &str = "Price";
pub const GROSS_AMOUNT: &str = "Gross Amount";
pub const COMMISSION: &str = "Commission";
pub const NET_AMOUNT: &str = "Net Amount";
pub const CURRENCY: &str = "Currency";
pub const ACCOUNT_NUMBER: &str = "Account #";
pub const ACTIVITY_TYPE: &str = "Activity Type";
pub const ACCOUNT_TYPE: &str = "Account Type";

pub const REQUIRED_COLUMNS: [&str; 14] = [
    TRANSACTION_DATE,
    SETTLEMENT_DATE,
    ACTION,
    SYMBOL,
    DESCRIPTION,
    QUANTITY,
    PRICE,
    GROSS_AMOUNT,
    COMMISSION,
    NET_AMOUNT,
    CURRENCY,
    ACCOUNT_NUMBER,
    ACTIVITY_TYPE,
    ACCOUNT_TYPE,
];

/// Position of each required column in the header row.
#[derive(Debug, Clone)]
pub struct ColumnMapping {
    indices: [usize; 14],
}

impl ColumnMapping {
    pub fn from_header(header: &[Data]) -> Result<Self> {
        let names: Vec<String> = header
            .iter()
            .map(|cell| cell.to_string().trim().to_lowercase())
            .collect();

        let mut indices = [0; 14];
        for (slot, column) in indices.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = names
                .iter()
                .position(|name| *name == column.to_lowercase())
                .ok_or_else(|| {
                    ReportError::Parse(format!("missing required column \"{column}\""))
                })?;
        }
        debug!(?indices, "Mapped export columns");
        Ok(Self { indices })
    }

    fn index(&self, column: &str) -> usize {
        REQUIRED_COLUMNS
            .iter()
            .position(|c| *c == column)
            .map_or(usize::MAX, |i| self.indices[i])
    }

    fn cell<'a>(&self, row: &'a [Data], column: &str) -> &'a Data {
        row.get(self.index(column)).unwrap_or(&Data::Empty)
    }
}

fn cell_error(row_number: usize, column: &str, message: impl std::fmt::Display) -> ReportError {
    ReportError::Parse(format!("row {row_number}, column \"{column}\": {message}"))
}

pub fn is_blank_row(row: &[Data]) -> bool {
    row.iter().all(|cell| match cell {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    })
}

/// Largest serial a spreadsheet can hold (9999-12-31).
const MAX_SERIAL: f64 = 2_958_465.0;

/// Days since the spreadsheet epoch, time of day dropped.
fn from_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(0.0..=MAX_SERIAL).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::try_days(serial.floor() as i64)?)
}

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %I:%M:%S %p",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

pub fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|dt| dt.date())
}

pub fn parse_date(cell: &Data) -> Option<NaiveDate> {
    match cell {
        Data::DateTime(dt) => from_serial(dt.as_f64()),
        Data::Float(f) => from_serial(*f),
        Data::Int(i) => from_serial(*i as f64),
        Data::String(s) | Data::DateTimeIso(s) => parse_date_text(s),
        _ => None,
    }
}

/// Finite numbers; blank cells read as zero.
pub fn parse_number(cell: &Data) -> Option<f64> {
    let value = match cell {
        Data::Empty => Some(0.0),
        Data::Int(i) => Some(*i as f64),
        Data::Float(f) => Some(*f),
        Data::String(s) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| *c != ',' && *c != '$' && !c.is_whitespace())
                .collect();
            if cleaned.is_empty() {
                Some(0.0)
            } else {
                cleaned.parse().ok()
            }
        }
        _ => None,
    };
    value.filter(|v: &f64| v.is_finite())
}

pub fn parse_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty => return None,
        Data::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

fn parse_account(cell: &Data) -> Option<i64> {
    match cell {
        Data::Int(i) => Some(*i),
        Data::Float(f) if f.fract() == 0.0 => Some(*f as i64),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// One data row. `row_number` is 1-based, counting the header.
pub fn parse_row(
    row: &[Data],
    columns: &ColumnMapping,
    row_number: usize,
) -> Result<TransactionRecord> {
    let date = |column: &str| {
        let cell = columns.cell(row, column);
        parse_date(cell)
            .ok_or_else(|| cell_error(row_number, column, format!("unparseable date \"{cell}\"")))
    };
    let number = |column: &str| {
        let cell = columns.cell(row, column);
        parse_number(cell)
            .ok_or_else(|| cell_error(row_number, column, format!("invalid number \"{cell}\"")))
    };
    let text = |column: &str| parse_text(columns.cell(row, column));

    let account_cell = columns.cell(row, ACCOUNT_NUMBER);
    let account_id = parse_account(account_cell).ok_or_else(|| {
        cell_error(row_number, ACCOUNT_NUMBER, format!("invalid account \"{account_cell}\""))
    })?;

    Ok(TransactionRecord {
        transaction_date: date(TRANSACTION_DATE)?,
        settlement_date: date(SETTLEMENT_DATE)?,
        action: text(ACTION),
        symbol: text(SYMBOL),
        description: text(DESCRIPTION).unwrap_or_default(),
        etf_name: None,
        quantity: number(QUANTITY)?,
        price: number(PRICE)?,
        gross_amount: number(GROSS_AMOUNT)?,
        commission: number(COMMISSION)?,
        net_amount: number(NET_AMOUNT)?,
        currency: text(CURRENCY)
            .map(|c| c.to_uppercase())
            .ok_or_else(|| cell_error(row_number, CURRENCY, "missing currency"))?,
        account_id,
        activity_type: ActivityType::from_label(&text(ACTIVITY_TYPE).unwrap_or_default()),
        account_type: text(ACCOUNT_TYPE).unwrap_or_default(),
        fx_rate: None,
    })
}

/// Parses a whole sheet: header first, then data rows. Blank rows are
/// skipped; the first bad row aborts the import.
pub fn parse_rows(rows: &[Vec<Data>]) -> Result<Vec<TransactionRecord>> {
    let mut rows = rows.iter().enumerate().skip_while(|(_, row)| is_blank_row(row));
    let (_, header) = rows
        .next()
        .ok_or_else(|| ReportError::Parse("export is empty".to_string()))?;
    let columns = ColumnMapping::from_header(header)?;

    rows.filter(|(_, row)| !is_blank_row(row))
        .map(|(idx, row)| parse_row(row, &columns, idx + 1))
        .collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn header() -> Vec<Data> {
        REQUIRED_COLUMNS
            .iter()
            .map(|c| Data::String(c.to_string()))
            .collect()
    }

    /// A row in header order from string cells; "" becomes an empty cell.
    pub fn row(cells: [&str; 14]) -> Vec<Data> {
        cells
            .iter()
            .map(|c| {
                if c.is_empty() {
                    Data::Empty
                } else {
                    Data::String(c.to_string())
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{header, row};
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_parse_dates() {
        assert_eq!(parse_date(&Data::String("2023-03-01".to_string())), Some(d("2023-03-01")));
        assert_eq!(
            parse_date(&Data::String("2023-03-01 12:00:00 AM".to_string())),
            Some(d("2023-03-01"))
        );
        assert_eq!(
            parse_date(&Data::String("2023-03-01 15:30:00".to_string())),
            Some(d("2023-03-01"))
        );
        // 44986 is 2023-03-01 in spreadsheet serial days
        assert_eq!(parse_date(&Data::Float(44986.5)), Some(d("2023-03-01")));
        assert_eq!(parse_date(&Data::String("01/03/2023".to_string())), None);
        assert_eq!(parse_date(&Data::Empty), None);
    }

    #[test]
    fn test_out_of_range_serial_dates_are_rejected() {
        assert_eq!(parse_date(&Data::Float(1e300)), None);
        assert_eq!(parse_date(&Data::Float(f64::NAN)), None);
        assert_eq!(parse_date(&Data::Float(f64::INFINITY)), None);
        assert_eq!(parse_date(&Data::Float(-1.0)), None);
        assert_eq!(parse_date(&Data::Int(i64::MAX)), None);
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_number(&Data::Empty), Some(0.0));
        assert_eq!(parse_number(&Data::String(" ".to_string())), Some(0.0));
        assert_eq!(parse_number(&Data::String("-1,234.50".to_string())), Some(-1234.5));
        assert_eq!(parse_number(&Data::Int(3)), Some(3.0));
        assert_eq!(parse_number(&Data::String("n/a".to_string())), None);
        assert_eq!(parse_number(&Data::String("NaN".to_string())), None);
        assert_eq!(parse_number(&Data::String("inf".to_string())), None);
        assert_eq!(parse_number(&Data::String("-infinity".to_string())), None);
        assert_eq!(parse_number(&Data::Float(f64::NAN)), None);
        assert_eq!(parse_number(&Data::Float(f64::INFINITY)), None);
    }

    #[test]
    fn test_non_finite_amount_aborts_import() {
        let rows = vec![
            header(),
            row([
                "2023-03-01", "2023-03-01", "", "", "CONT", "", "", "", "", "NaN", "CAD", "1",
                "Deposits", "TFSA",
            ]),
        ];
        let err = parse_rows(&rows).unwrap_err();
        assert!(matches!(
            err,
            ReportError::Parse(msg) if msg.contains("row 2") && msg.contains("Net Amount")
        ));
    }

    #[test]
    fn test_header_matched_case_insensitively_in_any_order() {
        let mut cells: Vec<Data> = REQUIRED_COLUMNS
            .iter()
            .rev()
            .map(|c| Data::String(format!(" {} ", c.to_uppercase())))
            .collect();
        cells.push(Data::String("Extra".to_string()));
        let mapping = ColumnMapping::from_header(&cells).unwrap();
        assert_eq!(mapping.index(TRANSACTION_DATE), 13);
        assert_eq!(mapping.index(ACCOUNT_TYPE), 0);
    }

    #[test]
    fn test_missing_column_is_parse_error() {
        let mut cells = header();
        cells.retain(|c| c.to_string() != NET_AMOUNT);
        let err = ColumnMapping::from_header(&cells).unwrap_err();
        assert!(matches!(err, ReportError::Parse(msg) if msg.contains("Net Amount")));
    }

    #[test]
    fn test_parse_rows() {
        let rows = vec![
            header(),
            row([
                "2023-03-01", "2023-03-03", "Buy", "XEQT", "ISHARES CORE EQUITY WE ACTED AS AGENT",
                "10", "25.5", "-255", "-4.95", "-259.95", "cad", "12345", "Trades",
                "Individual TFSA",
            ]),
            row(["", "", "", "", "", "", "", "", "", "", "", "", "", ""]),
            row([
                "2023-03-01", "2023-03-01", "", "", "CONT", "", "", "", "", "1000", "CAD", "12345",
                "Deposits", "Individual TFSA",
            ]),
        ];
        let records = parse_rows(&rows).unwrap();
        assert_eq!(records.len(), 2);

        let trade = &records[0];
        assert_eq!(trade.settlement_date, d("2023-03-03"));
        assert_eq!(trade.symbol.as_deref(), Some("XEQT"));
        assert_eq!(trade.currency, "CAD");
        assert_eq!(trade.activity_type, ActivityType::Trade);
        assert_eq!(trade.net_amount, -259.95);
        assert_eq!(trade.account_id, 12345);
        assert!(trade.etf_name.is_none());

        let deposit = &records[1];
        assert_eq!(deposit.symbol, None);
        assert_eq!(deposit.action, None);
        assert_eq!(deposit.quantity, 0.0);
        assert_eq!(deposit.activity_type, ActivityType::Deposit);
    }

    #[test]
    fn test_unparseable_date_aborts_import() {
        let rows = vec![
            header(),
            row([
                "yesterday", "2023-03-01", "", "", "CONT", "", "", "", "", "1000", "CAD", "1",
                "Deposits", "TFSA",
            ]),
        ];
        let err = parse_rows(&rows).unwrap_err();
        assert!(matches!(
            err,
            ReportError::Parse(msg) if msg.contains("row 2") && msg.contains("Transaction Date")
        ));
    }

    #[test]
    fn test_empty_export() {
        assert!(matches!(parse_rows(&[]), Err(ReportError::Parse(_))));
    }
}
