//! ETF name derivation and ticker symbol repair.
//!
//! Exports sometimes carry provisional codes (e.g. `ENBR123`) instead of the
//! real ticker. The security's name, recovered from the free-text
//! description, links those rows back to a trade that used a clean symbol.

use crate::core::activity::TransactionRecord;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Description markers, applied in order. The text before a marker is the
/// security name; when several match, the last one wins.
pub const ETF_NAME_MARKERS: [&str; 3] = [" WE ACTED AS AGENT", " CASH DIV ON", " DIST ON"];

pub fn etf_name_from_description(description: &str) -> Option<String> {
    let mut name = None;
    for marker in ETF_NAME_MARKERS {
        if let Some((prefix, _)) = description.split_once(marker) {
            name = Some(prefix.to_string());
        }
    }
    // A description starting with a marker names nothing
    name.filter(|n| !n.is_empty())
}

pub fn derive_etf_names(records: Vec<TransactionRecord>) -> Vec<TransactionRecord> {
    records
        .into_iter()
        .map(|record| match etf_name_from_description(&record.description) {
            Some(name) => TransactionRecord {
                etf_name: Some(name),
                ..record
            },
            None => record,
        })
        .collect()
}

/// Present and free of decimal digits.
pub fn is_valid_symbol(symbol: Option<&str>) -> bool {
    symbol.is_some_and(|s| !s.is_empty() && !s.chars().any(|c| c.is_ascii_digit()))
}

/// ETF name → clean symbol, learned from trade rows.
///
/// If one name maps to several symbols, the later row wins and the
/// conflict is logged; there is no principled way to pick here.
pub fn symbol_lookup(records: &[TransactionRecord]) -> HashMap<String, String> {
    let mut lookup: HashMap<String, String> = HashMap::new();
    for record in records.iter().filter(|r| r.is_trade()) {
        let (Some(name), Some(symbol)) = (&record.etf_name, &record.symbol) else {
            continue;
        };
        if !is_valid_symbol(Some(symbol)) {
            continue;
        }
        if let Some(previous) = lookup.insert(name.clone(), symbol.clone()) {
            if previous != *symbol {
                warn!(
                    etf_name = %name,
                    %previous,
                    replacement = %symbol,
                    "Several symbols share one ETF name, keeping the last"
                );
            }
        }
    }
    lookup
}

/// Replaces each row's symbol with the clean symbol known for its ETF name.
///
/// Trade rows whose symbol is still invalid afterwards lose it: their cash
/// effect stays in the dataset but they no longer count as a holding.
pub fn repair_symbols(records: Vec<TransactionRecord>) -> Vec<TransactionRecord> {
    let lookup = symbol_lookup(&records);
    debug!(names = lookup.len(), "Built ETF symbol lookup");

    records
        .into_iter()
        .map(|record| {
            let repaired = record
                .etf_name
                .as_ref()
                .and_then(|name| lookup.get(name))
                .cloned();
            let symbol = match repaired {
                Some(symbol) => Some(symbol),
                None if record.is_trade() && !is_valid_symbol(record.symbol.as_deref()) => {
                    if let Some(code) = &record.symbol {
                        warn!(
                            symbol = %code,
                            settlement_date = %record.settlement_date,
                            "Trade symbol could not be repaired, dropping it"
                        );
                    }
                    None
                }
                None => record.symbol.clone(),
            };
            TransactionRecord { symbol, ..record }
        })
        .collect()
}

/// Runs the classification stage: names first, then symbols.
pub fn classify(records: Vec<TransactionRecord>) -> Vec<TransactionRecord> {
    repair_symbols(derive_etf_names(records))
}
