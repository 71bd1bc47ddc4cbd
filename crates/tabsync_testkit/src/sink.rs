//! Recording destination.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::time::Duration;
use tabsync_engine::{BoxError, Destination, Row, RowSink, SchemaSink};
use tabsync_types::{LogicalType, TableSchema, TypeNormalizer};

type RowFilter = Box<dyn Fn(&Row) -> bool + Send + Sync>;

/// Normalizer that uses the logical type name as the physical type.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoNormalizer;

impl TypeNormalizer for EchoNormalizer {
    fn name(&self) -> &str {
        "echo"
    }

    fn physical_type(&self, logical: &LogicalType) -> String {
        logical.to_string()
    }
}

/// Records every schema and row it receives.
///
/// Can be told to reject schemas of given tables or rows matching a
/// predicate, and to slow down row writes.
#[derive(Default)]
pub struct RecordingDestination {
    schemas: Mutex<Vec<TableSchema>>,
    rows: Mutex<Vec<Row>>,
    rejected_tables: HashSet<String>,
    reject_row: Option<RowFilter>,
    write_delay: Option<Duration>,
}

impl RecordingDestination {
    /// Creates a destination accepting everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects the schema of `table`.
    pub fn with_rejected_table(mut self, table: impl Into<String>) -> Self {
        self.rejected_tables.insert(table.into());
        self
    }

    /// Rejects rows for which `filter` returns true.
    pub fn with_rejected_rows<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Row) -> bool + Send + Sync + 'static,
    {
        self.reject_row = Some(Box::new(filter));
        self
    }

    /// Sleeps before storing every row.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// Schemas received, in order.
    pub fn schemas(&self) -> Vec<TableSchema> {
        self.schemas.lock().clone()
    }

    /// Rows stored, in order.
    pub fn rows(&self) -> Vec<Row> {
        self.rows.lock().clone()
    }

    /// Rows stored for one table.
    pub fn rows_for(&self, table: &str) -> Vec<Row> {
        self.rows
            .lock()
            .iter()
            .filter(|r| r.table() == table)
            .cloned()
            .collect()
    }

    /// Primary-key values of one table's rows, sorted.
    pub fn keys_for(&self, table: &str) -> Vec<Vec<String>> {
        let mut keys: Vec<Vec<String>> = self
            .rows_for(table)
            .iter()
            .map(|r| r.key().values().to_vec())
            .collect();
        keys.sort();
        keys
    }

    /// Text values of one column of one table, sorted.
    pub fn text_column(&self, table: &str, column: &str) -> Vec<String> {
        let mut values: Vec<String> = self
            .rows_for(table)
            .iter()
            .filter_map(|r| r.get(column).map(ToString::to_string))
            .collect();
        values.sort();
        values
    }
}

#[async_trait]
impl SchemaSink for RecordingDestination {
    async fn create_table(&self, schema: &TableSchema) -> Result<(), BoxError> {
        if self.rejected_tables.contains(&schema.name) {
            return Err(format!("cannot create table {}", schema.name).into());
        }
        self.schemas.lock().push(schema.clone());
        Ok(())
    }
}

#[async_trait]
impl RowSink for RecordingDestination {
    async fn write_row(&self, row: Row) -> Result<(), BoxError> {
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
        if self.reject_row.as_ref().is_some_and(|reject| reject(&row)) {
            return Err(format!("row {} rejected", row.key()).into());
        }
        self.rows.lock().push(row);
        Ok(())
    }
}

impl Destination for RecordingDestination {
    fn normalizer(&self) -> &dyn TypeNormalizer {
        &EchoNormalizer
    }
}
