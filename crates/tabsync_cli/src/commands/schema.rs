//! Schema command implementation.

use super::{sample_engine, CliResult};
use std::sync::Arc;
use tabsync_clickhouse::{create_table_sql, ClickHouseNormalizer};
use tabsync_engine::SyncConfig;
use tabsync_testkit::DynamoDbStub;

/// Runs the schema command.
pub fn run(config: &SyncConfig, format: &str) -> CliResult<()> {
    let engine = sample_engine(config.clone(), Arc::new(DynamoDbStub::new()))?;
    let schemas = engine.schemas(&ClickHouseNormalizer::new());

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&schemas)?),
        "sql" => {
            for schema in &schemas {
                println!("{};\n", create_table_sql(schema));
            }
        }
        "text" => {
            for schema in &schemas {
                match &schema.parent {
                    Some(parent) => println!("{} (child of {parent})", schema.name),
                    None => println!("{}", schema.name),
                }
                for column in &schema.columns {
                    let key = if column.primary_key { " [pk]" } else { "" };
                    println!(
                        "  {:<32} {:<24} {}{key}",
                        column.column_name, column.physical_type, column.logical_type
                    );
                }
                println!();
            }
        }
        other => return Err(format!("unknown format {other}, expected text, json or sql").into()),
    }
    Ok(())
}
