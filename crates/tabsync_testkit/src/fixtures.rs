//! A DynamoDB-like sample provider and table tree.
//!
//! `aws_dynamodb_tables` lists table names page by page, describes each one
//! and gathers its tags through a paginated sub-fetch. It has two children:
//! replica auto-scaling settings, which only exist for version 2019.11.21
//! global tables, and continuous-backup settings, which every table has.

use crate::provider::ProviderError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tabsync_engine::{
    paginate_all, BoxError, ColumnDescriptor, ColumnResolve, ColumnResolver, DetailFetcher,
    FetchContext, Page, TableDescriptor, TableFetcher,
};
use tabsync_types::{Item, LogicalType, ScopeCatalog, ScopeContext, ScopePolicy, Value};

/// Name of the root sample table.
pub const TABLES: &str = "aws_dynamodb_tables";
/// Name of the replica auto-scaling child table.
pub const REPLICA_AUTO_SCALINGS: &str = "aws_dynamodb_table_replica_auto_scalings";
/// Name of the continuous-backups child table.
pub const CONTINUOUS_BACKUPS: &str = "aws_dynamodb_table_continuous_backups";

/// One table held by the fake service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamoTable {
    /// Table name.
    pub name: String,
    /// Global table version, empty for regional tables.
    pub global_table_version: String,
    /// Tags in listing order.
    pub tags: Vec<(String, String)>,
    /// Regions holding replicas.
    pub replicas: Vec<String>,
    /// Whether point-in-time recovery is on.
    pub point_in_time_recovery: bool,
}

impl DynamoTable {
    /// A regional table without tags.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            global_table_version: String::new(),
            tags: Vec::new(),
            replicas: Vec::new(),
            point_in_time_recovery: false,
        }
    }

    /// Makes the table a 2019.11.21 global table replicated to `regions`.
    pub fn global<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.global_table_version = "2019.11.21".into();
        self.replicas = regions.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a tag.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    /// Turns on point-in-time recovery.
    pub fn with_pitr(mut self) -> Self {
        self.point_in_time_recovery = true;
        self
    }
}

/// Fake DynamoDB service, one table list per scope.
#[derive(Debug)]
pub struct DynamoDbStub {
    tables: BTreeMap<ScopeContext, Vec<DynamoTable>>,
    page_size: usize,
    tag_page_size: usize,
    /// Tables that are listed but gone by the time they are described.
    vanished: HashSet<String>,
    /// Tables whose describe call is denied.
    denied: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl DynamoDbStub {
    /// Creates an empty service paging two names and two tags at a time.
    pub fn new() -> Self {
        Self {
            tables: BTreeMap::new(),
            page_size: 2,
            tag_page_size: 2,
            vanished: HashSet::new(),
            denied: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Adds tables to one account/region.
    pub fn with_tables(
        mut self,
        account: &str,
        region: &str,
        tables: impl IntoIterator<Item = DynamoTable>,
    ) -> Self {
        self.tables
            .entry(ScopeContext::account_region(account, region))
            .or_default()
            .extend(tables);
        self
    }

    /// Sets the `ListTables` page size.
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size.max(1);
        self
    }

    /// Makes `name` disappear between listing and describing.
    pub fn with_vanished(mut self, name: impl Into<String>) -> Self {
        self.vanished.insert(name.into());
        self
    }

    /// Denies describing `name`.
    pub fn with_denied(mut self, name: impl Into<String>) -> Self {
        self.denied.insert(name.into());
        self
    }

    /// API calls made so far, as `Operation:target`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Number of calls of one operation.
    pub fn count(&self, operation: &str) -> usize {
        let prefix = format!("{operation}:");
        self.calls.lock().iter().filter(|c| c.starts_with(&prefix)).count()
    }

    /// Total tables across all scopes.
    pub fn table_count(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }

    fn record(&self, operation: &str, target: &str) {
        self.calls.lock().push(format!("{operation}:{target}"));
    }

    fn tables_in(&self, scope: &ScopeContext) -> &[DynamoTable] {
        self.tables.get(scope).map(Vec::as_slice).unwrap_or(&[])
    }

    fn find(&self, scope: &ScopeContext, name: &str) -> Result<&DynamoTable, BoxError> {
        self.tables_in(scope)
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| ProviderError::NotFound(name.to_string()).boxed())
    }

    fn arn(scope: &ScopeContext, name: &str) -> String {
        format!(
            "arn:aws:dynamodb:{}:{}:table/{name}",
            scope.region_id().unwrap_or_default(),
            scope.account_id().unwrap_or_default()
        )
    }

    /// `ListTables`: names after `start`, one page.
    fn list_tables(&self, scope: &ScopeContext, start: Option<&str>) -> (Vec<String>, String) {
        self.record("ListTables", start.unwrap_or(""));
        let names: Vec<&str> = self.tables_in(scope).iter().map(|t| t.name.as_str()).collect();
        let from = match start {
            Some(start) => names.iter().position(|n| *n == start).map_or(names.len(), |i| i + 1),
            None => 0,
        };
        let page: Vec<String> = names
            .iter()
            .skip(from)
            .take(self.page_size)
            .map(|n| n.to_string())
            .collect();
        let last = if from + page.len() < names.len() {
            page.last().cloned().unwrap_or_default()
        } else {
            String::new()
        };
        (page, last)
    }

    fn describe_table(&self, scope: &ScopeContext, name: &str) -> Result<Item, BoxError> {
        self.record("DescribeTable", name);
        if self.vanished.contains(name) {
            return Err(ProviderError::NotFound(name.to_string()).boxed());
        }
        if self.denied.contains(name) {
            return Err(ProviderError::AccessDenied(format!("dynamodb:DescribeTable on {name}")).boxed());
        }
        let table = self.find(scope, name)?;
        Ok(Item::new(json!({
            "TableName": table.name,
            "TableArn": Self::arn(scope, &table.name),
            "TableStatus": "ACTIVE",
            "GlobalTableVersion": table.global_table_version,
            "ArchivalSummary": null,
            "Replicas": table.replicas.iter().map(|r| json!({"RegionName": r})).collect::<Vec<_>>(),
        })))
    }

    fn list_tags(
        &self,
        scope: &ScopeContext,
        arn: &str,
        token: Option<String>,
    ) -> Result<(Vec<(String, String)>, Option<String>), BoxError> {
        self.record("ListTagsOfResource", arn);
        let table = self
            .tables_in(scope)
            .iter()
            .find(|t| Self::arn(scope, &t.name) == arn)
            .ok_or_else(|| ProviderError::NotFound(arn.to_string()).boxed())?;
        let from: usize = match token {
            Some(token) => token.parse().map_err(|_| format!("bad tag token {token}"))?,
            None => 0,
        };
        let page: Vec<(String, String)> = table.tags.iter().skip(from).take(self.tag_page_size).cloned().collect();
        let next = from + page.len();
        let next = (next < table.tags.len()).then(|| next.to_string());
        Ok((page, next))
    }
}

impl Default for DynamoDbStub {
    fn default() -> Self {
        Self::new()
    }
}

struct ListTables(Arc<DynamoDbStub>);

#[async_trait]
impl TableFetcher for ListTables {
    async fn fetch_page(&self, ctx: &FetchContext, token: Option<&str>) -> Result<Page, BoxError> {
        let (names, last) = self.0.list_tables(ctx.scope(), token);
        let items = names.into_iter().map(|n| Item::new(json!(n))).collect();
        Ok(Page::new(items, last))
    }
}

struct DescribeTable(Arc<DynamoDbStub>);

#[async_trait]
impl DetailFetcher for DescribeTable {
    async fn resolve(&self, ctx: &FetchContext, item: Item) -> Result<Item, BoxError> {
        let name = item.as_str().ok_or("table listing is not a name")?;
        self.0.describe_table(ctx.scope(), name)
    }
}

struct TableTags(Arc<DynamoDbStub>);

#[async_trait]
impl ColumnResolve for TableTags {
    async fn resolve(&self, ctx: &FetchContext, item: &Item) -> Result<Option<Value>, BoxError> {
        let Some(arn) = item.str_at("TableArn") else {
            return Ok(None);
        };
        let stub = &self.0;
        let tags = paginate_all(ctx, |token| async move { stub.list_tags(ctx.scope(), arn, token) }).await?;
        let map: Map<String, serde_json::Value> = tags
            .into_iter()
            .map(|(k, v)| (k, serde_json::Value::String(v)))
            .collect();
        Ok(Some(Value::Json(serde_json::Value::Object(map))))
    }
}

struct ReplicaAutoScalings(Arc<DynamoDbStub>);

#[async_trait]
impl TableFetcher for ReplicaAutoScalings {
    async fn fetch_page(&self, ctx: &FetchContext, _: Option<&str>) -> Result<Page, BoxError> {
        let parent = ctx.parent().ok_or("replica auto scalings need a parent table")?;
        let name = parent.str_at("TableName").unwrap_or_default();
        self.0.record("DescribeTableReplicaAutoScaling", name);
        let table = self.0.find(ctx.scope(), name)?;
        let replicas = table
            .replicas
            .iter()
            .map(|region| {
                Item::new(json!({
                    "RegionName": region,
                    "ReplicaStatus": "ACTIVE",
                }))
            })
            .collect();
        Ok(Page::last(replicas))
    }
}

struct ContinuousBackups(Arc<DynamoDbStub>);

#[async_trait]
impl TableFetcher for ContinuousBackups {
    async fn fetch_page(&self, ctx: &FetchContext, _: Option<&str>) -> Result<Page, BoxError> {
        let parent = ctx.parent().ok_or("continuous backups need a parent table")?;
        let name = parent.str_at("TableName").unwrap_or_default();
        self.0.record("DescribeContinuousBackups", name);
        let table = self.0.find(ctx.scope(), name)?;
        let pitr = if table.point_in_time_recovery { "ENABLED" } else { "DISABLED" };
        Ok(Page::last(vec![Item::new(json!({
            "ContinuousBackupsStatus": "ENABLED",
            "PointInTimeRecoveryDescription": { "PointInTimeRecoveryStatus": pitr },
        }))]))
    }
}

fn replica_regions(table: &Item) -> Option<Value> {
    let replicas = table.path("Replicas")?.as_array()?;
    Some(Value::List(
        replicas
            .iter()
            .filter_map(|r| r.get("RegionName").and_then(|v| v.as_str()))
            .map(Value::from)
            .collect(),
    ))
}

fn parent_arn() -> ColumnDescriptor {
    ColumnDescriptor::new(
        "table_arn",
        LogicalType::String,
        ColumnResolver::ParentPath("TableArn".into()),
    )
    .primary_key()
}

/// The sample table tree backed by `stub`.
pub fn dynamodb_tables(stub: Arc<DynamoDbStub>) -> TableDescriptor {
    let replica_auto_scalings = TableDescriptor::new(REPLICA_AUTO_SCALINGS, ReplicaAutoScalings(stub.clone()))
        .with_description("https://docs.aws.amazon.com/amazondynamodb/latest/APIReference/API_ReplicaAutoScalingDescription.html")
        .only_when(|table| table.str_at("GlobalTableVersion").is_some_and(|v| !v.is_empty()))
        .with_columns([
            ColumnDescriptor::account_id(false),
            ColumnDescriptor::region(false),
            parent_arn(),
            ColumnDescriptor::path("region_name", LogicalType::String, "RegionName").primary_key(),
            ColumnDescriptor::path("replica_status", LogicalType::String, "ReplicaStatus"),
        ]);

    let continuous_backups = TableDescriptor::new(CONTINUOUS_BACKUPS, ContinuousBackups(stub.clone()))
        .with_description("https://docs.aws.amazon.com/amazondynamodb/latest/APIReference/API_ContinuousBackupsDescription.html")
        .with_columns([
            ColumnDescriptor::account_id(false),
            ColumnDescriptor::region(false),
            parent_arn(),
            ColumnDescriptor::path("continuous_backups_status", LogicalType::String, "ContinuousBackupsStatus"),
            ColumnDescriptor::path(
                "point_in_time_recovery_status",
                LogicalType::String,
                "PointInTimeRecoveryDescription.PointInTimeRecoveryStatus",
            ),
        ]);

    TableDescriptor::new(TABLES, ListTables(stub.clone()))
        .with_description("https://docs.aws.amazon.com/amazondynamodb/latest/APIReference/API_TableDescription.html")
        .with_scope(ScopePolicy::per_account_region("dynamodb"))
        .with_detail(DescribeTable(stub.clone()))
        .with_columns([
            ColumnDescriptor::account_id(false),
            ColumnDescriptor::region(false),
            ColumnDescriptor::custom("tags", LogicalType::Json, TableTags(stub)),
            ColumnDescriptor::path("arn", LogicalType::String, "TableArn").primary_key(),
            ColumnDescriptor::path("table_name", LogicalType::String, "TableName"),
            ColumnDescriptor::path("global_table_version", LogicalType::String, "GlobalTableVersion"),
            ColumnDescriptor::path("archival_summary", LogicalType::Json, "ArchivalSummary"),
            ColumnDescriptor::compute(
                "replica_regions",
                LogicalType::list_of(LogicalType::String),
                |_, table| Ok(replica_regions(table)),
            ),
        ])
        .with_child(replica_auto_scalings)
        .with_child(continuous_backups)
}

/// Two accounts over three regions; DynamoDB is not offered in `ap-east-1`.
pub fn sample_catalog() -> ScopeCatalog {
    ScopeCatalog::new()
        .with_account("111111111111", ["us-east-1", "eu-west-1"])
        .with_account("222222222222", ["us-east-1", "ap-east-1"])
        .with_service("dynamodb", ["us-east-1", "eu-west-1"])
}

/// A populated service matching [`sample_catalog`].
pub fn sample_stub() -> DynamoDbStub {
    DynamoDbStub::new()
        .with_tables(
            "111111111111",
            "us-east-1",
            [
                DynamoTable::new("orders").tag("env", "prod").tag("team", "checkout").tag("cost", "a1"),
                DynamoTable::new("sessions").global(["us-east-1", "eu-west-1"]).with_pitr(),
                DynamoTable::new("carts"),
            ],
        )
        .with_tables(
            "111111111111",
            "eu-west-1",
            [DynamoTable::new("sessions").global(["us-east-1", "eu-west-1"]).with_pitr()],
        )
        .with_tables("222222222222", "us-east-1", [DynamoTable::new("audit").tag("env", "dev")])
}
