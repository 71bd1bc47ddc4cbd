//! In-memory destination.
//!
//! Stores rows as ClickHouse cells under the materialized schema, so what
//! reads back out is exactly what a ClickHouse table would hand back.

use crate::cell::{from_cell, to_cell, Cell};
use crate::error::{ClickHouseError, ClickHouseResult};
use crate::normalizer::ClickHouseNormalizer;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tabsync_engine::{BoxError, Destination, Row, RowSink, SchemaSink};
use tabsync_types::{TableSchema, TypeNormalizer, Value};
use tracing::debug;

#[derive(Debug)]
struct MemoryTable {
    schema: TableSchema,
    rows: Vec<Vec<Cell>>,
}

/// A ClickHouse-typed destination held in memory.
#[derive(Debug, Default)]
pub struct MemoryDestination {
    normalizer: ClickHouseNormalizer,
    tables: RwLock<BTreeMap<String, MemoryTable>>,
}

impl MemoryDestination {
    /// Creates an empty destination.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table, or migrates it if its columns changed.
    ///
    /// Re-creating a table with an identical schema keeps its rows; a
    /// changed schema replaces the table.
    pub fn apply_schema(&self, schema: &TableSchema) {
        let mut tables = self.tables.write();
        if let Some(existing) = tables.get(&schema.name) {
            if existing.schema.columns == schema.columns {
                return;
            }
            debug!(table = %schema.name, "schema changed, recreating table");
        }
        tables.insert(
            schema.name.clone(),
            MemoryTable {
                schema: schema.clone(),
                rows: Vec::new(),
            },
        );
    }

    /// Encodes and stores one row.
    pub fn insert(&self, row: &Row) -> ClickHouseResult<()> {
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(row.table())
            .ok_or_else(|| ClickHouseError::UnknownTable(row.table().to_string()))?;

        for (name, _) in row.cells() {
            if table.schema.column(name).is_none() {
                return Err(ClickHouseError::UnknownColumn {
                    table: table.schema.name.clone(),
                    column: name.clone(),
                });
            }
        }

        let mut cells = Vec::with_capacity(table.schema.columns.len());
        for column in &table.schema.columns {
            let cell = match to_cell(row.get(&column.column_name)) {
                Cell::Null if !ClickHouseNormalizer::can_be_nullable(&column.logical_type) => {
                    Cell::Array(Vec::new())
                }
                Cell::Null if column.primary_key => {
                    return Err(ClickHouseError::NullInNonNullable {
                        table: table.schema.name.clone(),
                        column: column.column_name.clone(),
                    })
                }
                cell => cell,
            };
            cells.push(cell);
        }
        table.rows.push(cells);
        Ok(())
    }

    /// Names of all created tables, sorted.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }

    /// Schema of a created table.
    pub fn schema(&self, table: &str) -> Option<TableSchema> {
        self.tables.read().get(table).map(|t| t.schema.clone())
    }

    /// Number of rows stored in `table`, zero if it does not exist.
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, |t| t.rows.len())
    }

    /// Number of rows across all tables.
    pub fn total_rows(&self) -> usize {
        self.tables.read().values().map(|t| t.rows.len()).sum()
    }

    /// Raw stored cells of `table`, in insertion order.
    pub fn rows(&self, table: &str) -> ClickHouseResult<Vec<Vec<Cell>>> {
        self.tables
            .read()
            .get(table)
            .map(|t| t.rows.clone())
            .ok_or_else(|| ClickHouseError::UnknownTable(table.to_string()))
    }

    /// Reads one column back as logical values, in insertion order.
    pub fn read_column(&self, table: &str, column: &str) -> ClickHouseResult<Vec<Option<Value>>> {
        let tables = self.tables.read();
        let table_ref = tables
            .get(table)
            .ok_or_else(|| ClickHouseError::UnknownTable(table.to_string()))?;
        let index = table_ref
            .schema
            .columns
            .iter()
            .position(|c| c.column_name == column)
            .ok_or_else(|| ClickHouseError::UnknownColumn {
                table: table.to_string(),
                column: column.to_string(),
            })?;
        let logical = &table_ref.schema.columns[index].logical_type;
        table_ref
            .rows
            .iter()
            .map(|cells| from_cell(&cells[index], logical))
            .collect()
    }
}

#[async_trait]
impl SchemaSink for MemoryDestination {
    async fn create_table(&self, schema: &TableSchema) -> Result<(), BoxError> {
        self.apply_schema(schema);
        Ok(())
    }
}

#[async_trait]
impl RowSink for MemoryDestination {
    async fn write_row(&self, row: Row) -> Result<(), BoxError> {
        self.insert(&row).map_err(BoxError::from)
    }
}

impl Destination for MemoryDestination {
    fn normalizer(&self) -> &dyn TypeNormalizer {
        &self.normalizer
    }
}
