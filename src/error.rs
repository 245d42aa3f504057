use thiserror::Error;

#[derive(Error, Debug)]
pub enum GagyebuError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The file is structurally unusable: unreadable workbook, missing sheet or header.
    #[error("Format error: {0}")]
    Format(String),

    /// Caller input rejected before any parsing or storage work.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Settings error: {0}")]
    Settings(String),
}

pub type Result<T> = std::result::Result<T, GagyebuError>;

/// Why a single spreadsheet row was dropped. Never fatal to a batch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowSkipError {
    #[error("row {row}: missing {field}")]
    Missing { row: usize, field: &'static str },

    #[error("row {row}: {field} is not numeric ({value:?})")]
    NotNumeric {
        row: usize,
        field: &'static str,
        value: String,
    },

    #[error("row {row}: date {value:?} is not YYYYMMDD")]
    BadDate { row: usize, value: String },
}
