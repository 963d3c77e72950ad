//! Geometry errors.

use thiserror::Error;

/// Errors raised while building surfaces or transforming beams.
///
/// These describe configuration problems. A ray that misses a surface is not
/// an error; it is flagged lost.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("Invalid surface: {0}")]
    InvalidSurface(String),

    #[error("Invalid element coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("Failed to read surface file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    FormatError { line: usize, message: String },

    #[error("Expected {expected} medium entries (one per ray), got {found}")]
    LengthMismatch { expected: usize, found: usize },
}
