use thiserror::Error;

use crate::types::SqlValue;

/// Error type for sqlrs operations
#[derive(Debug, Error)]
pub enum Error {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("No parameter supplies placeholder @{0}")]
    MissingParameter(String),

    #[error("Duplicate parameter name: {0}")]
    DuplicateParameter(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Cannot convert {value:?} to {target}")]
    Conversion {
        value: SqlValue,
        target: &'static str,
    },

    #[error("Connection is closed")]
    ConnectionClosed,
}

/// Result type alias for sqlrs operations
pub type Result<T> = std::result::Result<T, Error>;
