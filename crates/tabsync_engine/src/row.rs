//! Emitted rows and row identity.

use std::fmt;
use tabsync_types::{ScopeContext, Value};

/// Identity of a row: `(table, scope, primary-key values)`.
///
/// Also serves as the parent back-reference of child rows; holding a key
/// never keeps the parent row alive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey {
    table: String,
    scope: ScopeContext,
    values: Vec<String>,
}

impl RowKey {
    /// Creates a key from canonical primary-key renderings.
    pub fn new(table: impl Into<String>, scope: ScopeContext, values: Vec<String>) -> Self {
        Self {
            table: table.into(),
            scope,
            values,
        }
    }

    /// Table the row belongs to.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Scope the row was produced in.
    pub fn scope(&self) -> &ScopeContext {
        &self.scope
    }

    /// Canonical primary-key values in declared order.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Returns true when the table declares no primary key.
    pub fn is_keyless(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]({})", self.table, self.scope, self.values.join(", "))
    }
}

/// A fully resolved item bound to one table and one scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    key: RowKey,
    cells: Vec<(String, Option<Value>)>,
    parent: Option<RowKey>,
}

impl Row {
    /// Creates a row. The engine builds rows itself; this is for sinks and
    /// tests that replay stored data.
    pub fn new(
        key: RowKey,
        cells: Vec<(String, Option<Value>)>,
        parent: Option<RowKey>,
    ) -> Self {
        Self { key, cells, parent }
    }

    /// Table the row belongs to.
    pub fn table(&self) -> &str {
        self.key.table()
    }

    /// Scope the row was produced in.
    pub fn scope(&self) -> &ScopeContext {
        self.key.scope()
    }

    /// The row's identity.
    pub fn key(&self) -> &RowKey {
        &self.key
    }

    /// Key of the parent row, for rows produced by fan-out.
    pub fn parent(&self) -> Option<&RowKey> {
        self.parent.as_ref()
    }

    /// Value of a column, `None` if absent or unknown.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, value)| value.as_ref())
    }

    /// Cells in declared column order.
    pub fn cells(&self) -> &[(String, Option<Value>)] {
        &self.cells
    }

    /// Consumes the row and returns its cells.
    pub fn into_cells(self) -> Vec<(String, Option<Value>)> {
        self.cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_display() {
        let key = RowKey::new(
            "aws_dynamodb_tables",
            ScopeContext::account_region("111", "us-east-1"),
            vec!["s:arn:1".into()],
        );
        assert_eq!(
            key.to_string(),
            "aws_dynamodb_tables[account=111/region=us-east-1](s:arn:1)"
        );
        assert!(!key.is_keyless());
    }

    #[test]
    fn row_lookup() {
        let key = RowKey::new("t", ScopeContext::global(), vec![]);
        let row = Row::new(
            key.clone(),
            vec![
                ("id".into(), Some(Value::from("a"))),
                ("tags".into(), None),
            ],
            None,
        );
        assert_eq!(row.get("id"), Some(&Value::from("a")));
        assert_eq!(row.get("tags"), None);
        assert_eq!(row.get("missing"), None);
        assert!(row.key().is_keyless());
        assert_eq!(row.table(), "t");
    }
}
