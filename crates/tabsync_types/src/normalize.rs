//! Destination type normalization.

use crate::logical::LogicalType;
use serde::Serialize;

/// Maps logical types onto a destination's physical type vocabulary.
///
/// Mapping happens once per column when a schema is materialized, never per
/// row. Implementations must be total: a logical type without a faithful
/// destination equivalent maps to the destination's most general textual
/// type instead of failing.
pub trait TypeNormalizer: Send + Sync {
    /// Short destination name used in logs.
    fn name(&self) -> &str;

    /// Physical type of a logical type.
    fn physical_type(&self, logical: &LogicalType) -> String;

    /// Physical type of a column, taking key-ness into account.
    ///
    /// Destinations that distinguish nullable columns override this.
    fn column_type(&self, logical: &LogicalType, primary_key: bool) -> String {
        let _ = primary_key;
        self.physical_type(logical)
    }
}

/// One materialized column: `(table, column, physical type, primary key)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaColumn {
    /// Owning table.
    pub table_name: String,
    /// Column name.
    pub column_name: String,
    /// Destination type.
    pub physical_type: String,
    /// Logical type the physical type was derived from.
    pub logical_type: LogicalType,
    /// Whether the column is part of the primary key.
    pub primary_key: bool,
}

/// The materialized schema of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    /// Table name.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Name of the parent table for child tables.
    pub parent: Option<String>,
    /// Columns in declared order.
    pub columns: Vec<SchemaColumn>,
}

impl TableSchema {
    /// Names of the primary-key columns, in declared order.
    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.column_name.as_str())
            .collect()
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&SchemaColumn> {
        self.columns.iter().find(|c| c.column_name == name)
    }
}
