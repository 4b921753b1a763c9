//! Error kinds surfaced by the normalization pipeline and its collaborators.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("no USD/CAD rate on or before {date}")]
    MissingRate { date: NaiveDate },

    #[error("fetch error ({provider}): {message}")]
    RemoteFetch { provider: String, message: String },

    #[error("return on investment is undefined: initial investment is zero")]
    DivisionByZero,

    #[error("annualized return is undefined: {0}")]
    UndefinedReturn(String),

    #[error("report not found: {0}")]
    ReportNotFound(String),

    #[error("unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("io error")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;

impl ReportError {
    pub fn remote(provider: &str, message: impl Into<String>) -> Self {
        ReportError::RemoteFetch {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for ReportError {
    fn from(e: reqwest::Error) -> Self {
        // Drop the query string so request parameters don't end up in logs
        let e = e.without_url();
        ReportError::remote("http", e.to_string())
    }
}

impl From<csv::Error> for ReportError {
    fn from(e: csv::Error) -> Self {
        ReportError::Parse(e.to_string())
    }
}

impl From<calamine::XlsxError> for ReportError {
    fn from(e: calamine::XlsxError) -> Self {
        ReportError::Parse(e.to_string())
    }
}

impl From<calamine::XlsError> for ReportError {
    fn from(e: calamine::XlsError) -> Self {
        ReportError::Parse(e.to_string())
    }
}

impl From<fjall::Error> for ReportError {
    fn from(e: fjall::Error) -> Self {
        ReportError::Storage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_formatting_is_readable() {
        let err = ReportError::MissingRate {
            date: NaiveDate::from_ymd_opt(2023, 1, 2).unwrap(),
        };
        assert_eq!(err.to_string(), "no USD/CAD rate on or before 2023-01-02");

        let err = ReportError::remote("Bank of Canada", "HTTP 503");
        assert_eq!(err.to_string(), "fetch error (Bank of Canada): HTTP 503");
    }

    #[test]
    fn test_not_found_is_distinct_from_storage_failure() {
        let not_found = ReportError::ReportNotFound("abc".to_string());
        let storage = ReportError::Storage("disk full".to_string());
        assert!(matches!(not_found, ReportError::ReportNotFound(_)));
        assert!(!matches!(storage, ReportError::ReportNotFound(_)));
        assert_eq!(not_found.to_string(), "report not found: abc");
    }
}
