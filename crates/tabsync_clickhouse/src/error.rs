//! Error types for the ClickHouse destination.

use tabsync_types::LogicalType;
use thiserror::Error;

/// Result type for destination operations.
pub type ClickHouseResult<T> = Result<T, ClickHouseError>;

/// Errors raised by the ClickHouse destination.
#[derive(Error, Debug)]
pub enum ClickHouseError {
    /// A row was written to a table that was never created.
    #[error("unknown table {0}")]
    UnknownTable(String),

    /// A row carried a column the table does not have.
    #[error("table {table} has no column {column}")]
    UnknownColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// A non-nullable column received no value.
    #[error("column {table}.{column} is not nullable")]
    NullInNonNullable {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// A stored cell cannot be read back as the requested logical type.
    #[error("cannot decode {found} cell as {expected}")]
    Decode {
        /// Requested logical type.
        expected: LogicalType,
        /// Kind of the stored cell.
        found: &'static str,
    },

    /// A text cell did not parse back into its logical type.
    #[error("cannot parse {expected} from {text:?}: {reason}")]
    Parse {
        /// Requested logical type.
        expected: LogicalType,
        /// Stored text.
        text: String,
        /// Parser message.
        reason: String,
    },
}

impl ClickHouseError {
    /// Creates a parse error.
    pub fn parse(expected: &LogicalType, text: &str, reason: impl ToString) -> Self {
        Self::Parse {
            expected: expected.clone(),
            text: text.to_string(),
            reason: reason.to_string(),
        }
    }
}
