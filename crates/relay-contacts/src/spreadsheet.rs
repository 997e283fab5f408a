//! Contact list reader (xlsx, xls, xlsb, ods)

use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};
use tracing::info;

use crate::error::{ContactsError, Result};

/// Header naming the column with phone numbers
pub const PHONE_COLUMN: &str = "phone";

/// Read one phone number per data row of the first worksheet, in row order.
pub fn read_phone_numbers<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let mut workbook = open_workbook_auto(path)?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ContactsError::EmptySheet)??;

    let phones = phones_from_range(&range)?;
    info!("Read {} contacts from {}", phones.len(), path.display());
    Ok(phones)
}

/// Extract the phone column from a sheet whose first row is the header
fn phones_from_range(range: &Range<Data>) -> Result<Vec<String>> {
    let mut rows = range.rows();
    let header = rows.next().ok_or(ContactsError::EmptySheet)?;

    let column = header
        .iter()
        .position(|cell| match cell {
            Data::String(name) => name.trim().eq_ignore_ascii_case(PHONE_COLUMN),
            _ => false,
        })
        .ok_or_else(|| ContactsError::MissingColumn(PHONE_COLUMN.to_string()))?;

    let mut phones = Vec::new();
    for (i, row) in rows.enumerate() {
        // blank spacer rows
        if row.iter().all(|cell| matches!(cell, Data::Empty)) {
            continue;
        }

        // header is spreadsheet row 1
        let row_number = i + 2;
        let cell = row.get(column).unwrap_or(&Data::Empty);
        phones.push(phone_from_cell(cell, row_number)?);
    }

    Ok(phones)
}

/// Render a cell as a phone identifier. Whole-number floats lose the `.0`.
fn phone_from_cell(cell: &Data, row: usize) -> Result<String> {
    let invalid = |reason: String| ContactsError::InvalidPhone { row, reason };

    match cell {
        Data::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                Err(invalid("empty cell".to_string()))
            } else {
                Ok(s.to_string())
            }
        }
        Data::Int(n) => Ok(n.to_string()),
        Data::Float(f) if f.is_finite() && f.fract() == 0.0 => Ok(format!("{:.0}", f)),
        Data::Float(f) => Err(invalid(format!("non-integer number {}", f))),
        Data::Empty => Err(invalid("empty cell".to_string())),
        other => Err(invalid(format!("unsupported cell value {}", other))),
    }
}
