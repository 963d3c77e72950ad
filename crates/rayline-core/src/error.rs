//! Errors raised by whole-beam operations.

use thiserror::Error;

/// Errors from beam construction, column access and interchange.
///
/// Per-ray physical failures never produce an error; those rays are flagged
/// lost instead.
#[derive(Debug, Error)]
pub enum BeamError {
    #[error("Column {0} does not exist (valid columns are 1..=34)")]
    InvalidColumn(usize),

    #[error("Expected {expected} values (one per ray), got {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("Interchange table must have 18 columns, got {0}")]
    ColumnCount(usize),

    #[error("Invalid boundary: {0}")]
    InvalidBoundary(String),

    #[error("Failed to read or write beam file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    FormatError { line: usize, message: String },
}
