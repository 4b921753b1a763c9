use crate::core::error::{ReportError, Result};
use calamine::{Data, Reader, Xls, Xlsx};
use std::io::{Cursor, Read, Seek};
use tracing::info;

/// Rows of the workbook's first sheet.
fn first_sheet_rows<R, RS>(workbook: &mut R) -> Result<Vec<Vec<Data>>>
where
    RS: Read + Seek,
    R: Reader<RS>,
    ReportError: From<R::Error>,
{
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ReportError::Parse("workbook has no sheets".to_string()))?;
    let range = workbook.worksheet_range(&sheet)?;
    info!(sheet = %sheet, rows = range.height(), "Reading worksheet");
    Ok(range.rows().map(|row| row.to_vec()).collect())
}

pub fn read_xlsx(bytes: &[u8]) -> Result<Vec<Vec<Data>>> {
    let mut workbook = Xlsx::new(Cursor::new(bytes))?;
    first_sheet_rows(&mut workbook)
}

pub fn read_xls(bytes: &[u8]) -> Result<Vec<Vec<Data>>> {
    let mut workbook = Xls::new(Cursor::new(bytes))?;
    first_sheet_rows(&mut workbook)
}
