//! Table and column descriptors.
//!
//! Descriptors are built once at startup and are read-only for the whole
//! run. Children are owned by their parent, so a descriptor tree is always
//! finite and acyclic.

use crate::config::SyncConfig;
use crate::error::{BoxError, SyncError, SyncResult};
use crate::fetch::{ColumnResolve, DetailFetcher, FetchContext, TableFetcher};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tabsync_types::{
    Item, LogicalType, SchemaColumn, ScopePolicy, TableSchema, TypeNormalizer, Value,
};

/// Synchronous value computation over the context and the resolved item.
pub type ComputeFn =
    Arc<dyn Fn(&FetchContext, &Item) -> Result<Option<Value>, BoxError> + Send + Sync>;

/// Predicate over a parent item deciding whether a child table applies.
pub type ParentPredicate = Arc<dyn Fn(&Item) -> bool + Send + Sync>;

/// How a column derives its value. Chosen once, when the descriptor is
/// built.
#[derive(Clone)]
pub enum ColumnResolver {
    /// Dotted path into the resolved item, converted to the column type.
    Path(String),
    /// Dotted path into the parent item, converted to the column type.
    ParentPath(String),
    /// The scope's account identifier.
    ScopeAccount,
    /// The scope's region identifier.
    ScopeRegion,
    /// A synchronous computation.
    Compute(ComputeFn),
    /// An asynchronous resolver that may perform bounded sub-fetches.
    Custom(Arc<dyn ColumnResolve>),
}

impl fmt::Debug for ColumnResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::ParentPath(path) => f.debug_tuple("ParentPath").field(path).finish(),
            Self::ScopeAccount => f.write_str("ScopeAccount"),
            Self::ScopeRegion => f.write_str("ScopeRegion"),
            Self::Compute(_) => f.write_str("Compute(..)"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A named, typed output column.
#[derive(Debug, Clone)]
pub struct ColumnDescriptor {
    name: String,
    logical_type: LogicalType,
    resolver: ColumnResolver,
    primary_key: bool,
    description: Option<String>,
}

impl ColumnDescriptor {
    /// Creates a column.
    pub fn new(name: impl Into<String>, logical_type: LogicalType, resolver: ColumnResolver) -> Self {
        Self {
            name: name.into(),
            logical_type,
            resolver,
            primary_key: false,
            description: None,
        }
    }

    /// Creates a column read from a path of the resolved item.
    pub fn path(name: impl Into<String>, logical_type: LogicalType, path: impl Into<String>) -> Self {
        Self::new(name, logical_type, ColumnResolver::Path(path.into()))
    }

    /// Creates a column computed synchronously.
    pub fn compute<F>(name: impl Into<String>, logical_type: LogicalType, f: F) -> Self
    where
        F: Fn(&FetchContext, &Item) -> Result<Option<Value>, BoxError> + Send + Sync + 'static,
    {
        Self::new(name, logical_type, ColumnResolver::Compute(Arc::new(f)))
    }

    /// Creates a column backed by an asynchronous resolver.
    pub fn custom(
        name: impl Into<String>,
        logical_type: LogicalType,
        resolver: impl ColumnResolve + 'static,
    ) -> Self {
        Self::new(name, logical_type, ColumnResolver::Custom(Arc::new(resolver)))
    }

    /// The conventional `account_id` column filled from the scope.
    pub fn account_id(primary_key: bool) -> Self {
        let column = Self::new("account_id", LogicalType::String, ColumnResolver::ScopeAccount);
        if primary_key {
            column.primary_key()
        } else {
            column
        }
    }

    /// The conventional `region` column filled from the scope.
    pub fn region(primary_key: bool) -> Self {
        let column = Self::new("region", LogicalType::String, ColumnResolver::ScopeRegion);
        if primary_key {
            column.primary_key()
        } else {
            column
        }
    }

    /// Marks the column as part of the primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Logical type.
    pub fn logical_type(&self) -> &LogicalType {
        &self.logical_type
    }

    /// Value resolver.
    pub fn resolver(&self) -> &ColumnResolver {
        &self.resolver
    }

    /// Whether the column belongs to the primary key.
    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    /// Description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// A named table: columns, fetch steps, children and scope policy.
#[derive(Clone)]
pub struct TableDescriptor {
    name: String,
    description: Option<String>,
    columns: Vec<ColumnDescriptor>,
    children: Vec<Arc<TableDescriptor>>,
    fetcher: Arc<dyn TableFetcher>,
    detail: Option<Arc<dyn DetailFetcher>>,
    scope_policy: ScopePolicy,
    condition: Option<ParentPredicate>,
}

impl TableDescriptor {
    /// Creates a table fetched by `fetcher`.
    pub fn new(name: impl Into<String>, fetcher: impl TableFetcher + 'static) -> Self {
        Self::with_fetcher(name, Arc::new(fetcher))
    }

    /// Creates a table from a shared fetcher.
    pub fn with_fetcher(name: impl Into<String>, fetcher: Arc<dyn TableFetcher>) -> Self {
        Self {
            name: name.into(),
            description: None,
            columns: Vec::new(),
            children: Vec::new(),
            fetcher,
            detail: None,
            scope_policy: ScopePolicy::Inherit,
            condition: None,
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Appends a column.
    pub fn with_column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    /// Appends several columns.
    pub fn with_columns(mut self, columns: impl IntoIterator<Item = ColumnDescriptor>) -> Self {
        self.columns.extend(columns);
        self
    }

    /// Appends a child table.
    pub fn with_child(mut self, child: TableDescriptor) -> Self {
        self.children.push(Arc::new(child));
        self
    }

    /// Sets the detail-resolution step.
    pub fn with_detail(mut self, detail: impl DetailFetcher + 'static) -> Self {
        self.detail = Some(Arc::new(detail));
        self
    }

    /// Sets the scope policy.
    pub fn with_scope(mut self, policy: ScopePolicy) -> Self {
        self.scope_policy = policy;
        self
    }

    /// Only fetch this table for parent items satisfying `predicate`.
    pub fn only_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Item) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(predicate));
        self
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Columns in declared order.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Child tables in declared order.
    pub fn children(&self) -> &[Arc<TableDescriptor>] {
        &self.children
    }

    /// Root fetch step.
    pub fn fetcher(&self) -> &Arc<dyn TableFetcher> {
        &self.fetcher
    }

    /// Detail-resolution step, if any.
    pub fn detail(&self) -> Option<&Arc<dyn DetailFetcher>> {
        self.detail.as_ref()
    }

    /// Scope policy.
    pub fn scope_policy(&self) -> &ScopePolicy {
        &self.scope_policy
    }

    /// Returns true if this table applies to children of `parent`.
    pub fn applies_to(&self, parent: &Item) -> bool {
        self.condition.as_ref().map_or(true, |predicate| predicate(parent))
    }

    /// Primary-key columns in declared order.
    pub fn primary_key(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|c| c.primary_key)
    }

    /// Depth of the subtree rooted here; a leaf has depth 1.
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(|c| c.depth()).max().unwrap_or(0)
    }

    /// Checks names in the whole subtree.
    ///
    /// `seen` collects table names across several trees so duplicates
    /// between roots are caught too.
    pub fn validate(&self, seen: &mut HashSet<String>) -> SyncResult<()> {
        if self.name.is_empty() {
            return Err(SyncError::invalid_table("<unnamed>", "table name is empty"));
        }
        if !seen.insert(self.name.clone()) {
            return Err(SyncError::invalid_table(&self.name, "table name is not unique"));
        }
        if self.columns.is_empty() {
            return Err(SyncError::invalid_table(&self.name, "table has no columns"));
        }

        let mut columns = HashSet::new();
        for column in &self.columns {
            if column.name.is_empty() {
                return Err(SyncError::invalid_table(&self.name, "column name is empty"));
            }
            if !columns.insert(column.name.as_str()) {
                return Err(SyncError::invalid_table(
                    &self.name,
                    format!("duplicate column {}", column.name),
                ));
            }
        }

        for child in &self.children {
            child.validate(seen)?;
        }
        Ok(())
    }

    /// Materializes the schema of this table and its descendants, parents
    /// first.
    pub fn materialize(&self, normalizer: &dyn TypeNormalizer) -> Vec<TableSchema> {
        let mut schemas = Vec::new();
        self.materialize_into(normalizer, None, &mut schemas);
        schemas
    }

    fn materialize_into(
        &self,
        normalizer: &dyn TypeNormalizer,
        parent: Option<&str>,
        out: &mut Vec<TableSchema>,
    ) {
        out.push(TableSchema {
            name: self.name.clone(),
            description: self.description.clone(),
            parent: parent.map(str::to_string),
            columns: self
                .columns
                .iter()
                .map(|c| SchemaColumn {
                    table_name: self.name.clone(),
                    column_name: c.name.clone(),
                    physical_type: normalizer.column_type(&c.logical_type, c.primary_key),
                    logical_type: c.logical_type.clone(),
                    primary_key: c.primary_key,
                })
                .collect(),
        });
        for child in &self.children {
            child.materialize_into(normalizer, Some(&self.name), out);
        }
    }

    /// Applies the configured table selection to this subtree.
    ///
    /// Skipped tables are dropped with their descendants. A table is kept if
    /// it or an ancestor is included, or if it leads to an included
    /// descendant.
    pub fn select(&self, config: &SyncConfig) -> Option<TableDescriptor> {
        self.select_inner(config, false)
    }

    fn select_inner(&self, config: &SyncConfig, ancestor_included: bool) -> Option<TableDescriptor> {
        if config.skips(&self.name) {
            return None;
        }
        let included = ancestor_included || config.includes(&self.name);
        let children: Vec<Arc<TableDescriptor>> = self
            .children
            .iter()
            .filter_map(|c| c.select_inner(config, included))
            .map(Arc::new)
            .collect();

        if !included && children.is_empty() {
            return None;
        }
        let mut selected = self.clone();
        selected.children = children;
        Some(selected)
    }
}

impl fmt::Debug for TableDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableDescriptor")
            .field("name", &self.name)
            .field("columns", &self.columns)
            .field("children", &self.children)
            .field("scope_policy", &self.scope_policy)
            .field("has_detail", &self.detail.is_some())
            .field("conditional", &self.condition.is_some())
            .finish_non_exhaustive()
    }
}
