//! Error types for the sync engine.

use tabsync_types::{LogicalType, TypeError};
use thiserror::Error;

/// Error type returned by fetch, detail, resolver and sink collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during a sync run.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A page fetch failed with an error not classified as not-found.
    #[error("fetch failed: {0}")]
    Fetch(#[source] BoxError),

    /// Detail resolution of a single item failed.
    #[error("detail resolution failed: {0}")]
    Detail(#[source] BoxError),

    /// A column resolver failed.
    #[error("column {column} failed: {source}")]
    Column {
        /// Column name.
        column: String,
        /// Resolver error.
        #[source]
        source: BoxError,
    },

    /// A raw field could not be converted to the column's logical type.
    #[error("column {column}: {source}")]
    Conversion {
        /// Column name.
        column: String,
        /// Conversion error.
        #[source]
        source: TypeError,
    },

    /// A resolver produced a value of the wrong logical type.
    #[error("column {column} expects {expected}, resolver produced {found}")]
    TypeMismatch {
        /// Column name.
        column: String,
        /// Declared logical type.
        expected: LogicalType,
        /// Kind of the produced value.
        found: &'static str,
    },

    /// A primary-key column resolved to no value.
    #[error("primary key column {column} resolved to no value")]
    MissingPrimaryKey {
        /// Column name.
        column: String,
    },

    /// A row with the same key was already emitted in this run.
    #[error("duplicate primary key {key}")]
    DuplicatePrimaryKey {
        /// Rendered row key.
        key: String,
    },

    /// A page returned the continuation token it was requested with.
    #[error("continuation token {token:?} repeated, pagination would not terminate")]
    CursorRepeated {
        /// The repeated token.
        token: String,
    },

    /// The destination rejected a schema or a row.
    #[error("sink error: {0}")]
    Sink(#[source] BoxError),

    /// A table descriptor is malformed.
    #[error("invalid table {table}: {reason}")]
    InvalidTable {
        /// Table name.
        table: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Invalid engine configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A run is already in progress on this engine.
    #[error("sync already running")]
    AlreadyRunning,

    /// The run was cancelled.
    #[error("sync cancelled")]
    Cancelled,

    /// A worker task panicked.
    #[error("worker panicked: {0}")]
    Panicked(String),
}

impl SyncError {
    /// Creates an invalid-table error.
    pub fn invalid_table(table: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTable {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for errors raised while resolving a single item.
    pub fn is_row_local(&self) -> bool {
        matches!(
            self,
            SyncError::Detail(_)
                | SyncError::Column { .. }
                | SyncError::Conversion { .. }
                | SyncError::TypeMismatch { .. }
                | SyncError::MissingPrimaryKey { .. }
                | SyncError::DuplicatePrimaryKey { .. }
                | SyncError::Sink(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_local_errors() {
        assert!(SyncError::MissingPrimaryKey { column: "arn".into() }.is_row_local());
        assert!(SyncError::Detail("boom".into()).is_row_local());
        assert!(!SyncError::Fetch("boom".into()).is_row_local());
        assert!(!SyncError::Cancelled.is_row_local());
    }

    #[test]
    fn error_display() {
        let err = SyncError::CursorRepeated { token: "T1".into() };
        assert!(err.to_string().contains("\"T1\""));

        let err = SyncError::TypeMismatch {
            column: "id".into(),
            expected: LogicalType::Uuid,
            found: "text",
        };
        assert_eq!(err.to_string(), "column id expects uuid, resolver produced text");

        let err = SyncError::Column {
            column: "tags".into(),
            source: "throttled".into(),
        };
        assert_eq!(err.to_string(), "column tags failed: throttled");
    }
}
