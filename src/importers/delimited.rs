use crate::core::error::Result;
use calamine::Data;
use csv::ReaderBuilder;
use tracing::info;

/// Comma-separated rows as text cells, header included.
pub fn read_csv(bytes: &[u8]) -> Result<Vec<Vec<Data>>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.trim().is_empty() {
                        Data::Empty
                    } else {
                        Data::String(field.to_string())
                    }
                })
                .collect(),
        );
    }
    info!(rows = rows.len(), "Read CSV export");
    Ok(rows)
}
