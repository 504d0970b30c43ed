//! Error types for feature computations.

use thiserror::Error;

/// Result type for feature operations.
pub type Result<T> = std::result::Result<T, FeatureError>;

/// Errors that can occur while building the feature matrix.
///
/// Missing anchors, empty windows and flat trend sequences are not errors:
/// they are resolved by exclusion, the window merge policy, or a zero slope.
#[derive(Debug, Error)]
pub enum FeatureError {
    /// Missing required column in input data
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// A date that is still unparseable after sentinel substitution
    #[error("Invalid date in column {column}: {value:?}")]
    InvalidDate {
        /// Column holding the value
        column: String,
        /// Raw value as read from the source
        value: String,
    },

    /// Window offset outside the representable day range
    #[error("Invalid offset: {offset} days exceeds the maximum of {max}")]
    InvalidOffset {
        /// Requested offset
        offset: u32,
        /// Largest accepted offset
        max: u32,
    },

    /// Null or non-integer entity/contract identifier
    #[error("Invalid identifier in column {column}: {reason}")]
    InvalidIdentifier {
        /// Identifier column
        column: String,
        /// What is wrong with it
        reason: String,
    },

    /// A derived column contained a null where every row must have a value
    #[error("Unexpected null value in column: {0}")]
    NullValue(String),

    /// Polars DataFrame error
    #[error("DataFrame error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Filesystem error while reading sources or writing the matrix
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed configuration file
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    /// Feature block not found in registry
    #[error("Feature block not found: {0}")]
    NotFound(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),
}
