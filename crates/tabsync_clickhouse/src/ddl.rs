//! `CREATE TABLE` statements for materialized schemas.

use tabsync_types::TableSchema;

/// Renders the `CREATE TABLE` statement for `schema`.
///
/// Tables use the `MergeTree` engine ordered by the primary key, or by
/// `tuple()` when the table has none.
pub fn create_table_sql(schema: &TableSchema) -> String {
    let columns: Vec<String> = schema
        .columns
        .iter()
        .map(|c| format!("  {} {}", quote_ident(&c.column_name), c.physical_type))
        .collect();

    let key = schema.primary_key();
    let order_by = if key.is_empty() {
        "tuple()".to_string()
    } else {
        let key: Vec<String> = key.into_iter().map(quote_ident).collect();
        format!("({})", key.join(", "))
    };

    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n) ENGINE = MergeTree ORDER BY {}",
        quote_ident(&schema.name),
        columns.join(",\n"),
        order_by
    );
    if let Some(description) = &schema.description {
        sql.push_str(&format!(" COMMENT '{}'", description.replace('\\', "\\\\").replace('\'', "\\'")));
    }
    sql
}

fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabsync_types::{LogicalType, SchemaColumn};

    fn column(name: &str, physical: &str, primary_key: bool) -> SchemaColumn {
        SchemaColumn {
            table_name: "aws_dynamodb_tables".into(),
            column_name: name.into(),
            physical_type: physical.into(),
            logical_type: LogicalType::String,
            primary_key,
        }
    }

    #[test]
    fn renders_ordered_table() {
        let schema = TableSchema {
            name: "aws_dynamodb_tables".into(),
            description: Some("DynamoDB tables, it's detailed".into()),
            parent: None,
            columns: vec![
                column("account_id", "String", true),
                column("arn", "String", true),
                column("tags", "Nullable(String)", false),
            ],
        };
        assert_eq!(
            create_table_sql(&schema),
            "CREATE TABLE IF NOT EXISTS `aws_dynamodb_tables` (\n  \
             `account_id` String,\n  `arn` String,\n  `tags` Nullable(String)\n\
             ) ENGINE = MergeTree ORDER BY (`account_id`, `arn`) \
             COMMENT 'DynamoDB tables, it\\'s detailed'"
        );
    }

    #[test]
    fn keyless_table() {
        let schema = TableSchema {
            name: "events".into(),
            description: None,
            parent: Some("parent".into()),
            columns: vec![column("body", "Nullable(String)", false)],
        };
        assert!(create_table_sql(&schema).ends_with("ORDER BY tuple()"));
    }
}
