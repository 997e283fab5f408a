//! Error types for relay-contacts

use thiserror::Error;

/// relay-contacts error type
#[derive(Error, Debug)]
pub enum ContactsError {
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Spreadsheet has no worksheet")]
    EmptySheet,

    #[error("Column '{0}' not found in header row")]
    MissingColumn(String),

    #[error("Row {row}: invalid phone value ({reason})")]
    InvalidPhone { row: usize, reason: String },
}

impl From<calamine::Error> for ContactsError {
    fn from(err: calamine::Error) -> Self {
        ContactsError::Spreadsheet(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ContactsError>;
