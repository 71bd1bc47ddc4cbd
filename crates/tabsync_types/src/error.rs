//! Error types for value conversion.

use crate::logical::LogicalType;
use thiserror::Error;

/// Result type for type and value operations.
pub type TypeResult<T> = Result<T, TypeError>;

/// Errors raised while converting raw item fields into typed values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypeError {
    /// The raw field cannot be represented as the requested logical type.
    #[error("cannot convert {found} to {expected}")]
    Conversion {
        /// Target logical type.
        expected: LogicalType,
        /// Short description of the raw value.
        found: String,
    },

    /// The value is the right shape but out of range for the logical type.
    #[error("value {value} out of range for {expected}")]
    OutOfRange {
        /// Target logical type.
        expected: LogicalType,
        /// Rendered raw value.
        value: String,
    },
}

impl TypeError {
    /// Creates a conversion error.
    pub fn conversion(expected: &LogicalType, found: impl Into<String>) -> Self {
        Self::Conversion {
            expected: expected.clone(),
            found: found.into(),
        }
    }

    /// Creates an out-of-range error.
    pub fn out_of_range(expected: &LogicalType, value: impl ToString) -> Self {
        Self::OutOfRange {
            expected: expected.clone(),
            value: value.to_string(),
        }
    }
}
