//! Detail resolution and column extraction for a single item.

use crate::error::{BoxError, SyncError, SyncResult};
use crate::fetch::FetchContext;
use crate::row::{Row, RowKey};
use crate::table::{ColumnDescriptor, ColumnResolver, TableDescriptor};
use tabsync_types::{Item, Value};

/// Result of resolving one raw item.
#[derive(Debug)]
pub enum Resolution {
    /// The row was extracted. `item` is the detailed item, passed on to
    /// child tables.
    Row {
        /// Extracted row.
        row: Row,
        /// Detailed item.
        item: Item,
    },
    /// The item disappeared between listing and detail resolution.
    Absent,
}

/// Runs detail resolution (if the table has one) and then extracts every
/// column in declared order.
///
/// Any failure belongs to this item alone. Cancellation interrupts a detail
/// call or a custom resolver in flight, so a cancelled run never produces a
/// partially extracted row.
pub async fn resolve_item(
    table: &TableDescriptor,
    ctx: &FetchContext,
    raw: Item,
    parent: Option<&RowKey>,
) -> SyncResult<Resolution> {
    let item = match table.detail() {
        Some(detail) => {
            let resolved = tokio::select! {
                biased;
                _ = ctx.cancel_signal().cancelled() => return Err(SyncError::Cancelled),
                resolved = detail.resolve(ctx, raw) => resolved,
            };
            match resolved {
                Ok(item) => item,
                Err(err) if ctx.is_not_found(&err) => return Ok(Resolution::Absent),
                Err(err) => return Err(SyncError::Detail(err)),
            }
        }
        None => raw,
    };

    let mut cells = Vec::with_capacity(table.columns().len());
    let mut key = Vec::new();
    for column in table.columns() {
        if ctx.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        let value = extract_column(column, ctx, &item).await?;
        if column.is_primary_key() {
            match &value {
                Some(value) => key.push(value.key_repr()),
                None => {
                    return Err(SyncError::MissingPrimaryKey {
                        column: column.name().to_string(),
                    })
                }
            }
        }
        cells.push((column.name().to_string(), value));
    }

    let key = RowKey::new(table.name(), ctx.scope().clone(), key);
    Ok(Resolution::Row {
        row: Row::new(key, cells, parent.cloned()),
        item,
    })
}

/// Evaluates one column's resolver against `item`.
pub async fn extract_column(
    column: &ColumnDescriptor,
    ctx: &FetchContext,
    item: &Item,
) -> SyncResult<Option<Value>> {
    let ty = column.logical_type();
    let convert = |raw: Option<&serde_json::Value>| match raw {
        Some(raw) => Value::from_json(raw, ty).map_err(|source| SyncError::Conversion {
            column: column.name().to_string(),
            source,
        }),
        None => Ok(None),
    };

    let produced = match column.resolver() {
        ColumnResolver::Path(path) => return convert(item.path(path)),
        ColumnResolver::ParentPath(path) => {
            return convert(ctx.parent().and_then(|parent| parent.path(path)))
        }
        ColumnResolver::ScopeAccount => ctx.scope().account_id().map(Value::from),
        ColumnResolver::ScopeRegion => ctx.scope().region_id().map(Value::from),
        ColumnResolver::Compute(f) => absorb(column, ctx, f(ctx, item))?,
        ColumnResolver::Custom(resolver) => {
            let resolved = tokio::select! {
                biased;
                _ = ctx.cancel_signal().cancelled() => return Err(SyncError::Cancelled),
                resolved = resolver.resolve(ctx, item) => resolved,
            };
            absorb(column, ctx, resolved)?
        }
    };

    match produced {
        Some(value) if !value.conforms_to(ty) => Err(SyncError::TypeMismatch {
            column: column.name().to_string(),
            expected: ty.clone(),
            found: value.kind_name(),
        }),
        other => Ok(other),
    }
}

/// Not-found from a resolver means the value is absent.
fn absorb(
    column: &ColumnDescriptor,
    ctx: &FetchContext,
    result: Result<Option<Value>, BoxError>,
) -> SyncResult<Option<Value>> {
    match result {
        Ok(value) => Ok(value),
        Err(err) if ctx.is_not_found(&err) => Ok(None),
        Err(source) => Err(SyncError::Column {
            column: column.name().to_string(),
            source,
        }),
    }
}
