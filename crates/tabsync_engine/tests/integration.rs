//! Integration tests for the sync engine against scripted sources.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tabsync_clickhouse::{ClickHouseNormalizer, MemoryDestination};
use tabsync_engine::{
    BoxError, ColumnDescriptor, DetailFetcher, FailureKind, FetchContext, Page, ScopeCatalog, ScopeContext,
    ScopePolicy, SyncConfig, SyncEngine, SyncError, SyncState, TableDescriptor, Value,
};
use tabsync_testkit::prelude::*;
use tabsync_types::{Item, LogicalType};

fn id_table(name: &str, fetcher: ScriptedFetcher) -> TableDescriptor {
    TableDescriptor::new(name, fetcher)
        .with_column(ColumnDescriptor::path("id", LogicalType::String, "id").primary_key())
}

fn sample_engine(stub: Arc<DynamoDbStub>, config: SyncConfig) -> SyncEngine {
    SyncEngine::new(config, vec![dynamodb_tables(stub)])
        .unwrap()
        .with_classifier(provider_not_found)
}

#[tokio::test]
async fn paginated_listing_yields_every_row_once() {
    let fetcher = Arc::new(ScriptedFetcher::pages_of_ids(&[&["a", "b"], &["c"]]));
    let table = TableDescriptor::with_fetcher("ids", fetcher.clone())
        .with_column(ColumnDescriptor::path("id", LogicalType::String, "id").primary_key());
    let engine = SyncEngine::new(SyncConfig::new(), vec![table]).unwrap();
    let dest = Arc::new(RecordingDestination::new());

    let summary = engine.run(&ScopeCatalog::new(), dest.clone()).await.unwrap();

    assert!(summary.is_clean(), "{:?}", summary.failures);
    assert_eq!(dest.text_column("ids", "id"), vec!["a", "b", "c"]);
    assert_eq!(
        fetcher.tokens_for(&ScopeContext::global()),
        vec![None, Some("T1".to_string())]
    );
    assert_eq!(summary.stats.rows, 3);
    assert_eq!(summary.stats.invocations, 1);
    assert_eq!(engine.state(), SyncState::Completed);
}

#[tokio::test]
async fn not_found_mid_pagination_keeps_first_page() {
    let fetcher = ScriptedFetcher::new(vec![
        Ok(Page::new(id_items(&["a", "b"]), "T1")),
        Err(ProviderError::NotFound("listing".into())),
        Ok(Page::last(id_items(&["c"]))),
    ]);
    let engine = SyncEngine::new(SyncConfig::new(), vec![id_table("ids", fetcher)])
        .unwrap()
        .with_classifier(provider_not_found);
    let dest = Arc::new(RecordingDestination::new());

    let summary = engine.run(&ScopeCatalog::new(), dest.clone()).await.unwrap();

    assert!(summary.is_clean());
    assert_eq!(dest.text_column("ids", "id"), vec!["a", "b"]);
    assert_eq!(summary.stats.benign_absences, 1);
}

#[tokio::test]
async fn sample_tree_end_to_end() {
    let stub = Arc::new(sample_stub());
    let engine = sample_engine(stub.clone(), SyncConfig::new());
    let dest = Arc::new(RecordingDestination::new());

    let summary = engine.run(&sample_catalog(), dest.clone()).await.unwrap();
    assert!(summary.is_clean(), "{:?}", summary.failures);

    let schemas: Vec<String> = dest.schemas().into_iter().map(|s| s.name).collect();
    assert_eq!(schemas, vec![TABLES, REPLICA_AUTO_SCALINGS, CONTINUOUS_BACKUPS]);

    // ap-east-1 has no DynamoDB, so three scopes.
    assert_eq!(dest.rows_for(TABLES).len(), 5);
    assert_eq!(stub.count("ListTables"), 4);
    assert_eq!(stub.count("DescribeTable"), 5);

    // Only the two global "sessions" tables have replica settings.
    assert_eq!(dest.rows_for(REPLICA_AUTO_SCALINGS).len(), 4);
    assert_eq!(stub.count("DescribeTableReplicaAutoScaling"), 2);
    assert_eq!(summary.stats.skipped_children, 3);
    assert_eq!(dest.rows_for(CONTINUOUS_BACKUPS).len(), 5);

    let orders = dest
        .rows_for(TABLES)
        .into_iter()
        .find(|r| r.get("table_name") == Some(&Value::from("orders")))
        .unwrap();
    assert_eq!(
        orders.get("tags"),
        Some(&Value::Json(json!({"env": "prod", "team": "checkout", "cost": "a1"})))
    );
    assert_eq!(orders.get("archival_summary"), None);
    assert_eq!(orders.get("account_id"), Some(&Value::from("111111111111")));
    assert_eq!(stub.count("ListTagsOfResource"), 2 + 4);

    let backups = dest.rows_for(CONTINUOUS_BACKUPS);
    let sessions_backup = backups
        .iter()
        .find(|r| {
            r.scope() == &ScopeContext::account_region("111111111111", "eu-west-1")
        })
        .unwrap();
    assert_eq!(
        sessions_backup.get("point_in_time_recovery_status"),
        Some(&Value::from("ENABLED"))
    );
    let parent = sessions_backup.parent().unwrap();
    assert_eq!(parent.table(), TABLES);
    assert_eq!(parent.scope(), sessions_backup.scope());
}

#[tokio::test]
async fn vanished_item_is_benign_and_has_no_children() {
    let stub = Arc::new(sample_stub().with_vanished("carts"));
    let engine = sample_engine(stub, SyncConfig::new());
    let dest = Arc::new(RecordingDestination::new());

    let summary = engine.run(&sample_catalog(), dest.clone()).await.unwrap();

    assert!(summary.is_clean());
    assert_eq!(dest.rows_for(TABLES).len(), 4);
    assert_eq!(dest.rows_for(CONTINUOUS_BACKUPS).len(), 4);
    assert_eq!(summary.stats.benign_absences, 1);
}

#[tokio::test]
async fn denied_detail_is_row_local() {
    let stub = Arc::new(sample_stub().with_denied("orders"));
    let engine = sample_engine(stub, SyncConfig::new());
    let dest = Arc::new(RecordingDestination::new());

    let summary = engine.run(&sample_catalog(), dest.clone()).await.unwrap();

    let failures: Vec<_> = summary.failures_of(FailureKind::RowLocal).collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].table, TABLES);
    assert_eq!(failures[0].item.as_deref(), Some("orders"));
    assert!(matches!(failures[0].error, SyncError::Detail(_)));
    assert_eq!(summary.failures.len(), 1);

    // Siblings on the same page and in other scopes still land.
    assert_eq!(dest.rows_for(TABLES).len(), 4);
}

#[tokio::test]
async fn scope_failure_does_not_stop_other_scopes() {
    let broken = ScopeContext::account("2");
    let fetcher = ScriptedFetcher::pages_of_ids(&[&["a"], &["b"]]).for_scope(
        broken.clone(),
        vec![
            Ok(Page::new(id_items(&["x"]), "T1")),
            Err(ProviderError::Throttled),
        ],
    );
    let table = id_table("ids", fetcher).with_scope(ScopePolicy::PerAccount);
    let catalog = ScopeCatalog::new()
        .with_account("1", ["us-east-1"])
        .with_account("2", ["us-east-1"])
        .with_account("3", ["us-east-1"]);
    let engine = SyncEngine::new(SyncConfig::new(), vec![table])
        .unwrap()
        .with_classifier(provider_not_found);
    let dest = Arc::new(RecordingDestination::new());

    let summary = engine.run(&catalog, dest.clone()).await.unwrap();

    let fatal: Vec<_> = summary.failures_of(FailureKind::ScopeFatal).collect();
    assert_eq!(fatal.len(), 1);
    assert_eq!(fatal[0].scope.as_ref(), Some(&broken));
    assert!(matches!(fatal[0].error, SyncError::Fetch(_)));

    // Rows of the failing scope's first page were already valid.
    assert_eq!(dest.text_column("ids", "id"), vec!["a", "a", "b", "b", "x"]);
}

#[tokio::test]
async fn duplicate_keys_are_rejected() {
    let fetcher = ScriptedFetcher::pages_of_ids(&[&["a", "b"], &["b", "c"]]);
    let engine = SyncEngine::new(SyncConfig::new(), vec![id_table("ids", fetcher)]).unwrap();
    let dest = Arc::new(RecordingDestination::new());

    let summary = engine.run(&ScopeCatalog::new(), dest.clone()).await.unwrap();

    assert_eq!(dest.text_column("ids", "id"), vec!["a", "b", "c"]);
    let failures: Vec<_> = summary.failures_of(FailureKind::RowLocal).collect();
    assert_eq!(failures.len(), 1);
    assert!(matches!(failures[0].error, SyncError::DuplicatePrimaryKey { .. }));
}

#[tokio::test]
async fn missing_primary_key_rejects_row() {
    let fetcher = ScriptedFetcher::new(vec![Ok(Page::last(vec![
        Item::new(json!({"id": "a"})),
        Item::new(json!({"name": "no id"})),
    ]))]);
    let engine = SyncEngine::new(SyncConfig::new(), vec![id_table("ids", fetcher)]).unwrap();
    let dest = Arc::new(RecordingDestination::new());

    let summary = engine.run(&ScopeCatalog::new(), dest.clone()).await.unwrap();

    assert_eq!(dest.rows_for("ids").len(), 1);
    assert!(matches!(
        summary.failures[0].error,
        SyncError::MissingPrimaryKey { ref column } if column == "id"
    ));
}

#[tokio::test]
async fn failing_child_leaves_parent_and_sibling_intact() {
    let failing = FnFetcher::new(|ctx: &FetchContext, _: Option<&str>| -> Result<Page, BoxError> {
        match ctx.parent().and_then(|p| p.str_at("id")) {
            Some("b") => Err(ProviderError::Throttled.boxed()),
            _ => Ok(Page::last(id_items(&["x"]))),
        }
    });
    let parent = id_table("parents", ScriptedFetcher::pages_of_ids(&[&["a", "b"]]))
        .with_child(
            TableDescriptor::new("flaky", failing)
                .with_column(ColumnDescriptor::path("id", LogicalType::String, "id")),
        )
        .with_child(
            TableDescriptor::new("steady", ScriptedFetcher::pages_of_ids(&[&["s"]]))
                .with_column(ColumnDescriptor::path("id", LogicalType::String, "id")),
        );
    let engine = SyncEngine::new(SyncConfig::new(), vec![parent])
        .unwrap()
        .with_classifier(provider_not_found);
    let dest = Arc::new(RecordingDestination::new());

    let summary = engine.run(&ScopeCatalog::new(), dest.clone()).await.unwrap();

    let fanout: Vec<_> = summary.failures_of(FailureKind::Fanout).collect();
    assert_eq!(fanout.len(), 1);
    assert_eq!(fanout[0].table, "flaky");
    assert_eq!(fanout[0].parent.as_deref(), Some("parents"));
    assert_eq!(summary.failures.len(), 1);

    assert_eq!(dest.rows_for("parents").len(), 2);
    assert_eq!(dest.rows_for("flaky").len(), 1);
    assert_eq!(dest.rows_for("steady").len(), 2);
}

#[tokio::test]
async fn rejected_schema_skips_table_and_descendants() {
    let stub = Arc::new(sample_stub());
    let engine = sample_engine(stub.clone(), SyncConfig::new());
    let dest = Arc::new(RecordingDestination::new().with_rejected_table(CONTINUOUS_BACKUPS));

    let summary = engine.run(&sample_catalog(), dest.clone()).await.unwrap();

    let sink: Vec<_> = summary.failures_of(FailureKind::Sink).collect();
    assert_eq!(sink.len(), 1);
    assert_eq!(sink[0].table, CONTINUOUS_BACKUPS);
    assert!(dest.rows_for(CONTINUOUS_BACKUPS).is_empty());
    assert_eq!(stub.count("DescribeContinuousBackups"), 0);
    assert_eq!(dest.rows_for(TABLES).len(), 5);
    assert_eq!(dest.rows_for(REPLICA_AUTO_SCALINGS).len(), 4);
}

#[tokio::test]
async fn rejected_row_is_not_fanned_out() {
    let stub = Arc::new(sample_stub());
    let engine = sample_engine(stub.clone(), SyncConfig::new());
    let dest = Arc::new(
        RecordingDestination::new()
            .with_rejected_rows(|row| row.get("table_name") == Some(&Value::from("carts"))),
    );

    let summary = engine.run(&sample_catalog(), dest.clone()).await.unwrap();

    assert_eq!(summary.failures_of(FailureKind::Sink).count(), 1);
    assert_eq!(dest.rows_for(TABLES).len(), 4);
    assert_eq!(dest.rows_for(CONTINUOUS_BACKUPS).len(), 4);
    assert!(!stub.calls().contains(&"DescribeContinuousBackups:carts".to_string()));
}

#[tokio::test]
async fn selection_filters_tables() {
    let stub = Arc::new(sample_stub());
    let config = SyncConfig::new().with_skip_tables(["*_replica_auto_scalings"]);
    let engine = sample_engine(stub.clone(), config);
    let dest = Arc::new(RecordingDestination::new());

    let summary = engine.run(&sample_catalog(), dest.clone()).await.unwrap();

    assert!(summary.is_clean());
    let schemas: Vec<String> = dest.schemas().into_iter().map(|s| s.name).collect();
    assert_eq!(schemas, vec![TABLES, CONTINUOUS_BACKUPS]);
    assert_eq!(stub.count("DescribeTableReplicaAutoScaling"), 0);
    assert_eq!(summary.stats.skipped_children, 0);
}

#[tokio::test]
async fn nested_fanout_with_single_permits_completes() {
    let leaf = id_table("leaf", ScriptedFetcher::pages_of_ids(&[&["l1", "l2"], &["l3"]]));
    let middle = id_table("middle", ScriptedFetcher::pages_of_ids(&[&["m1", "m2", "m3"]])).with_child(leaf);
    let root = id_table("root", ScriptedFetcher::pages_of_ids(&[&["r1", "r2"], &["r3"]]))
        .with_child(middle)
        .with_scope(ScopePolicy::PerAccount);
    let catalog = ScopeCatalog::new()
        .with_account("1", ["us-east-1"])
        .with_account("2", ["us-east-1"]);
    let config = SyncConfig::new()
        .with_scope_concurrency(1)
        .with_fanout_concurrency(1)
        .with_item_concurrency(1)
        .with_page_buffer(1);
    let engine = SyncEngine::new(config, vec![root]).unwrap();
    let dest = Arc::new(RecordingDestination::new());

    let summary = tokio::time::timeout(Duration::from_secs(10), engine.run(&catalog, dest.clone()))
        .await
        .expect("nested fan-out deadlocked")
        .unwrap();

    // Child keys are scoped by table and scope, not by parent, so the same
    // child ids under three parents of one scope collide.
    assert_eq!(dest.rows_for("root").len(), 6);
    assert_eq!(dest.rows_for("middle").len(), 6);
    assert_eq!(dest.rows_for("leaf").len(), 6);
    assert_eq!(summary.stats.invocations, 2 + 6 + 6);
    assert_eq!(
        summary.failures_of(FailureKind::RowLocal).count(),
        (18 - 6) + (18 - 6)
    );
}

#[tokio::test]
async fn cancellation_stops_paging() {
    let fetcher = Arc::new(
        ScriptedFetcher::pages_of_ids(&[&["a"], &["b"], &["c"], &["d"], &["e"], &["f"]])
            .with_delay(Duration::from_millis(50)),
    );
    let table = TableDescriptor::with_fetcher("slow", fetcher.clone())
        .with_column(ColumnDescriptor::path("id", LogicalType::String, "id").primary_key());
    let engine = Arc::new(SyncEngine::new(SyncConfig::new(), vec![table]).unwrap());
    let dest = Arc::new(RecordingDestination::new());

    let cancel = engine.cancel_signal();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(120)).await;
        cancel.cancel();
    });
    let summary = engine.run(&ScopeCatalog::new(), dest.clone()).await.unwrap();

    assert!(summary.cancelled);
    assert!(summary.failures.is_empty());
    assert!(fetcher.call_count() < 6);
    assert!(dest.rows_for("slow").len() < 6);
    assert_eq!(engine.state(), SyncState::Cancelled);

    // The next run starts fresh.
    let summary = engine.run(&ScopeCatalog::new(), dest.clone()).await.unwrap();
    assert!(!summary.cancelled);
}

/// A detail step that takes far longer than any test waits.
struct StalledDetail;

#[async_trait]
impl DetailFetcher for StalledDetail {
    async fn resolve(&self, _: &FetchContext, item: Item) -> Result<Item, BoxError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(item)
    }
}

#[tokio::test]
async fn cancellation_interrupts_detail_in_flight() {
    let table = id_table("described", ScriptedFetcher::pages_of_ids(&[&["a"]])).with_detail(StalledDetail);
    let engine = SyncEngine::new(SyncConfig::new(), vec![table]).unwrap();
    let dest = Arc::new(RecordingDestination::new());

    let cancel = engine.cancel_signal();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
    });
    let start = Instant::now();
    let summary = engine.run(&ScopeCatalog::new(), dest.clone()).await.unwrap();

    assert!(start.elapsed() < Duration::from_secs(1));
    assert!(summary.cancelled);
    assert!(summary.failures.is_empty());
    assert!(dest.rows_for("described").is_empty());
}

#[tokio::test]
async fn cancel_before_run_applies_to_next_run() {
    let fetcher = Arc::new(ScriptedFetcher::pages_of_ids(&[&["a", "b"]]));
    let table = TableDescriptor::with_fetcher("ids", fetcher.clone())
        .with_column(ColumnDescriptor::path("id", LogicalType::String, "id").primary_key());
    let engine = SyncEngine::new(SyncConfig::new(), vec![table]).unwrap();
    let dest = Arc::new(RecordingDestination::new());

    engine.cancel();
    let summary = engine.run(&ScopeCatalog::new(), dest.clone()).await.unwrap();
    assert!(summary.cancelled);
    assert_eq!(fetcher.call_count(), 0);
    assert_eq!(engine.state(), SyncState::Cancelled);

    // The request was consumed by the cancelled run.
    let summary = engine.run(&ScopeCatalog::new(), dest.clone()).await.unwrap();
    assert!(!summary.cancelled);
    assert_eq!(dest.text_column("ids", "id"), vec!["a", "b"]);
}

#[tokio::test]
async fn dropped_run_releases_engine() {
    let slow = Arc::new(
        ScriptedFetcher::pages_of_ids(&[&["a"], &["b"]]).with_delay(Duration::from_millis(200)),
    );
    let table = TableDescriptor::with_fetcher("slow", slow.clone())
        .with_column(ColumnDescriptor::path("id", LogicalType::String, "id").primary_key());
    let engine = SyncEngine::new(SyncConfig::new(), vec![table]).unwrap();
    let abandoned = Arc::new(RecordingDestination::new());

    let timed_out = tokio::time::timeout(
        Duration::from_millis(50),
        engine.run(&ScopeCatalog::new(), abandoned.clone()),
    )
    .await;
    assert!(timed_out.is_err());
    assert_eq!(engine.state(), SyncState::Cancelled);

    // The orphaned driver stops instead of finishing in the background.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(abandoned.rows_for("slow").is_empty());
    assert_eq!(slow.call_count(), 1);

    let dest = Arc::new(RecordingDestination::new());
    let summary = engine.run(&ScopeCatalog::new(), dest.clone()).await.unwrap();
    assert!(summary.is_clean());
    assert_eq!(dest.text_column("slow", "id"), vec!["a", "b"]);
    assert_eq!(engine.state(), SyncState::Completed);
}

#[tokio::test]
async fn concurrent_run_is_refused() {
    let fetcher = ScriptedFetcher::pages_of_ids(&[&["a"], &["b"]]).with_delay(Duration::from_millis(100));
    let engine = Arc::new(SyncEngine::new(SyncConfig::new(), vec![id_table("slow", fetcher)]).unwrap());

    let first = {
        let engine = engine.clone();
        tokio::spawn(async move {
            let dest = Arc::new(RecordingDestination::new());
            engine.run(&ScopeCatalog::new(), dest).await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = engine
        .run(&ScopeCatalog::new(), Arc::new(RecordingDestination::new()))
        .await;
    assert!(matches!(second, Err(SyncError::AlreadyRunning)));
    assert!(first.await.unwrap().unwrap().is_clean());
}

#[tokio::test]
async fn invalid_trees_are_refused() {
    let dup = id_table("t", ScriptedFetcher::default())
        .with_child(id_table("t", ScriptedFetcher::default()));
    assert!(matches!(
        SyncEngine::new(SyncConfig::new(), vec![dup]),
        Err(SyncError::InvalidTable { .. })
    ));
    assert!(matches!(
        SyncEngine::new(SyncConfig::new().with_page_buffer(0), Vec::new()),
        Err(SyncError::Config(_))
    ));
    assert!(matches!(
        SyncEngine::new(SyncConfig::new().with_scope_concurrency(usize::MAX), Vec::new()),
        Err(SyncError::Config(_))
    ));
}

#[tokio::test]
async fn clickhouse_destination_round_trip() {
    let stub = Arc::new(sample_stub());
    let engine = sample_engine(stub, SyncConfig::new());

    let schemas = engine.schemas(&ClickHouseNormalizer::new());
    let tables = &schemas[0];
    assert_eq!(tables.column("arn").unwrap().physical_type, "String");
    assert_eq!(tables.column("tags").unwrap().physical_type, "Nullable(String)");
    assert_eq!(
        tables.column("replica_regions").unwrap().physical_type,
        "Array(Nullable(String))"
    );

    let dest = Arc::new(MemoryDestination::new());
    let summary = engine.run(&sample_catalog(), dest.clone()).await.unwrap();
    assert!(summary.is_clean(), "{:?}", summary.failures);
    assert_eq!(dest.total_rows(), 5 + 4 + 5);

    let tags = dest.read_column(TABLES, "tags").unwrap();
    assert!(tags.contains(&Some(Value::Json(json!({"env": "dev"})))));
}
