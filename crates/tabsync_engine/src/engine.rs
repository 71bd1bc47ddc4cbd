//! Run orchestration.

use crate::cancel::CancelSignal;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::extract::{resolve_item, Resolution};
use crate::fanout::{child_scopes, DepthPools, WaitGroup};
use crate::fetch::{Destination, FetchContext, NeverNotFound, NotFoundClassifier, RowSink};
use crate::paginate::PaginationDriver;
use crate::report::{FailureKind, Recorder, SyncFailure, SyncSummary};
use crate::row::RowKey;
use crate::table::TableDescriptor;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tabsync_types::{Item, ScopeCatalog, ScopeContext, ScopePolicy, TableSchema, TypeNormalizer};
use tracing::{debug, info, info_span, warn, Instrument};

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No run has started, or the last one was collected.
    Idle,
    /// Table schemas are being handed to the destination.
    Materializing,
    /// Rows are flowing.
    Syncing,
    /// The last run finished.
    Completed,
    /// The last run was cancelled.
    Cancelled,
}

impl SyncState {
    /// Returns true while a run is in progress.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Materializing | SyncState::Syncing)
    }
}

/// Drives table trees from their sources into a destination.
pub struct SyncEngine {
    config: SyncConfig,
    tables: Vec<Arc<TableDescriptor>>,
    classifier: Arc<dyn NotFoundClassifier>,
    state: RwLock<SyncState>,
    cancel: CancelSignal,
}

impl SyncEngine {
    /// Creates an engine for the given root tables.
    ///
    /// Fails if the configuration is invalid or a table tree is malformed.
    pub fn new(config: SyncConfig, tables: Vec<TableDescriptor>) -> SyncResult<Self> {
        config.validate()?;
        let mut seen = HashSet::new();
        for table in &tables {
            table.validate(&mut seen)?;
        }
        Ok(Self {
            config,
            tables: tables.into_iter().map(Arc::new).collect(),
            classifier: Arc::new(NeverNotFound),
            state: RwLock::new(SyncState::Idle),
            cancel: CancelSignal::new(),
        })
    }

    /// Sets the classifier that separates not-found races from failures.
    pub fn with_classifier(mut self, classifier: impl NotFoundClassifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    /// The engine's configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Root tables, unfiltered.
    pub fn tables(&self) -> &[Arc<TableDescriptor>] {
        &self.tables
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Cancels the run in progress.
    ///
    /// A cancel issued while no run is active applies to the next run, which
    /// then stops before fetching anything. Every run consumes the request
    /// when it ends.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A handle that cancels this engine's runs.
    pub fn cancel_signal(&self) -> CancelSignal {
        self.cancel.clone()
    }

    /// Root tables after applying the configured selection.
    pub fn selected_tables(&self) -> Vec<Arc<TableDescriptor>> {
        self.tables
            .iter()
            .filter_map(|table| table.select(&self.config))
            .map(Arc::new)
            .collect()
    }

    /// Materialized schemas of every selected table, parents first.
    pub fn schemas(&self, normalizer: &dyn TypeNormalizer) -> Vec<TableSchema> {
        self.selected_tables()
            .iter()
            .flat_map(|table| table.materialize(normalizer))
            .collect()
    }

    /// Runs every selected table against `catalog`, writing into
    /// `destination`.
    ///
    /// Schemas are created before any row flows. Individual failures do not
    /// fail the run; they are collected in the returned summary. The only
    /// errors returned directly are a concurrent run on the same engine.
    ///
    /// Dropping the returned future cancels the tasks it spawned and leaves
    /// the engine in [`SyncState::Cancelled`].
    pub async fn run<D>(&self, catalog: &ScopeCatalog, destination: Arc<D>) -> SyncResult<SyncSummary>
    where
        D: Destination + 'static,
    {
        {
            let mut state = self.state.write();
            if state.is_active() {
                return Err(SyncError::AlreadyRunning);
            }
            *state = SyncState::Materializing;
        }
        let mut guard = RunGuard {
            engine: self,
            cancel: self.cancel.child(),
            finished: false,
        };
        let cancel = guard.cancel.clone();
        let start = Instant::now();

        let tables = self.selected_tables();
        let recorder = Recorder::default();
        let mut blocked = HashSet::new();
        for table in &tables {
            for schema in table.materialize(destination.normalizer()) {
                if blocked.contains(schema.parent.as_deref().unwrap_or_default()) {
                    blocked.insert(schema.name.clone());
                    continue;
                }
                if let Err(err) = destination.create_table(&schema).await {
                    recorder.fail(SyncFailure::new(FailureKind::Sink, &schema.name, SyncError::Sink(err)));
                    blocked.insert(schema.name.clone());
                }
            }
        }
        info!(tables = tables.len(), blocked = blocked.len(), "schemas materialized");

        *self.state.write() = SyncState::Syncing;
        let depth = tables.iter().map(|t| t.depth()).max().unwrap_or(1);
        let run = Arc::new(Run {
            config: self.config.clone(),
            catalog: catalog.clone(),
            sink: destination,
            classifier: self.classifier.clone(),
            cancel: cancel.clone(),
            recorder,
            pools: DepthPools::new(&self.config, depth),
            wait: WaitGroup::default(),
            blocked,
        });
        debug!(levels = run.pools.depth(), "worker pools ready");

        for table in tables {
            if run.blocked.contains(table.name()) {
                continue;
            }
            let scopes = catalog.scopes_for(table.scope_policy());
            debug!(table = table.name(), scopes = scopes.len(), "multiplexed root table");
            for scope in scopes {
                let invocation = Invocation {
                    table: table.clone(),
                    scope,
                    parent: None,
                    depth: 0,
                };
                if !run.schedule(invocation).await {
                    break;
                }
            }
        }
        run.wait.wait().await;

        let cancelled = cancel.is_cancelled();
        let summary = run.recorder.finish(cancelled, start.elapsed());
        guard.finish(if cancelled {
            SyncState::Cancelled
        } else {
            SyncState::Completed
        });
        info!(
            rows = summary.stats.rows,
            failures = summary.stats.failures,
            cancelled,
            elapsed_ms = summary.duration.as_millis() as u64,
            "sync finished"
        );
        Ok(summary)
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("config", &self.config)
            .field("tables", &self.tables.iter().map(|t| t.name()).collect::<Vec<_>>())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Restores the engine when a run ends, including when its future is
/// dropped part way through.
struct RunGuard<'a> {
    engine: &'a SyncEngine,
    cancel: CancelSignal,
    finished: bool,
}

impl RunGuard<'_> {
    fn finish(&mut self, state: SyncState) {
        *self.engine.state.write() = state;
        self.finished = true;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("sync run dropped before completion, cancelling its tasks");
            self.cancel.cancel();
            *self.engine.state.write() = SyncState::Cancelled;
        }
        self.engine.cancel.reset();
    }
}

/// State shared by every task of one run.
struct Run {
    config: SyncConfig,
    catalog: ScopeCatalog,
    sink: Arc<dyn RowSink>,
    classifier: Arc<dyn NotFoundClassifier>,
    cancel: CancelSignal,
    recorder: Recorder,
    pools: DepthPools,
    wait: WaitGroup,
    /// Tables whose schema the destination rejected.
    blocked: HashSet<String>,
}

/// The resolved parent handed to a child invocation.
struct Parent {
    table: String,
    item: Item,
    key: RowKey,
}

/// One (table, scope) invocation.
struct Invocation {
    table: Arc<TableDescriptor>,
    scope: ScopeContext,
    parent: Option<Arc<Parent>>,
    depth: usize,
}

impl Run {
    /// Waits for a worker slot at the invocation's depth and spawns it.
    ///
    /// Returns false if the run was cancelled before a slot was free. Boxed
    /// because child invocations schedule their own children.
    fn schedule(self: &Arc<Self>, invocation: Invocation) -> BoxFuture<'_, bool> {
        async move {
            let Some(permit) = self.pools.acquire(invocation.depth, &self.cancel).await else {
                return false;
            };
            let guard = self.wait.enter();
            let span = info_span!(
                "table",
                table = invocation.table.name(),
                scope = %invocation.scope,
                depth = invocation.depth,
            );

            let run = self.clone();
            tokio::spawn(
                async move {
                    let _permit = permit;
                    let _guard = guard;
                    let table = invocation.table.clone();
                    let scope = invocation.scope.clone();
                    let parent = invocation.parent.as_ref().map(|p| p.table.clone());
                    let result = AssertUnwindSafe(run.clone().invoke(invocation))
                        .catch_unwind()
                        .await;
                    if let Err(panic) = result {
                        let message = panic
                            .downcast_ref::<&str>()
                            .map(|s| s.to_string())
                            .or_else(|| panic.downcast_ref::<String>().cloned())
                            .unwrap_or_else(|| "unknown panic".to_string());
                        let kind = if parent.is_some() {
                            FailureKind::Fanout
                        } else {
                            FailureKind::ScopeFatal
                        };
                        run.recorder.fail(
                            SyncFailure::new(
                                kind,
                                table.name(),
                                SyncError::Panicked(message),
                            )
                            .in_scope(&scope)
                            .under(parent.as_deref()),
                        );
                    }
                }
                .instrument(span),
            );
            true
        }
        .boxed()
    }

    /// Paginates one invocation and pushes every item through extraction,
    /// emission and fan-out.
    async fn invoke(self: Arc<Self>, invocation: Invocation) {
        self.recorder.invocation();
        let table = &invocation.table;
        let mut ctx = FetchContext::new(table.name(), invocation.scope.clone())
            .with_cancel(self.cancel.clone())
            .with_classifier(self.classifier.clone());
        if let Some(parent) = &invocation.parent {
            ctx = ctx.with_parent(parent.item.clone());
        }

        let driver = PaginationDriver::new(table.fetcher().clone(), ctx.clone());
        let (mut pages, handle) = driver.spawn(self.config.page_buffer);

        while let Some(items) = pages.recv().await {
            self.recorder.pages(1, items.len() as u64);
            futures::stream::iter(items)
                .map(|raw| self.process_item(&invocation, &ctx, raw))
                .buffer_unordered(self.config.item_concurrency)
                .for_each(|()| async {})
                .await;
        }

        let failure = match handle.await {
            Ok(Ok(outcome)) => {
                if outcome.ended_by_absence {
                    self.recorder.absence();
                }
                None
            }
            Ok(Err(SyncError::Cancelled)) => None,
            Ok(Err(err)) => Some(err),
            Err(join) => Some(SyncError::Panicked(join.to_string())),
        };
        if let Some(err) = failure {
            let kind = if invocation.parent.is_some() {
                FailureKind::Fanout
            } else {
                FailureKind::ScopeFatal
            };
            self.recorder.fail(
                SyncFailure::new(kind, table.name(), err)
                    .in_scope(&invocation.scope)
                    .under(invocation.parent.as_ref().map(|p| p.table.as_str())),
            );
        }
    }

    async fn process_item(self: &Arc<Self>, invocation: &Invocation, ctx: &FetchContext, raw: Item) {
        let table = &invocation.table;
        let label = raw.label();
        let parent_key = invocation.parent.as_ref().map(|p| &p.key);

        let (row, item) = match resolve_item(table, ctx, raw, parent_key).await {
            Ok(Resolution::Row { row, item }) => (row, item),
            Ok(Resolution::Absent) => {
                self.recorder.absence();
                return;
            }
            Err(SyncError::Cancelled) => return,
            Err(err) => {
                self.recorder.fail(
                    SyncFailure::new(FailureKind::RowLocal, table.name(), err)
                        .in_scope(&invocation.scope)
                        .for_item(label),
                );
                return;
            }
        };
        if self.cancel.is_cancelled() {
            return;
        }

        let key = row.key().clone();
        if !self.recorder.claim(&key) {
            self.recorder.fail(
                SyncFailure::new(
                    FailureKind::RowLocal,
                    table.name(),
                    SyncError::DuplicatePrimaryKey { key: key.to_string() },
                )
                .in_scope(&invocation.scope)
                .for_item(label),
            );
            return;
        }
        if let Err(err) = self.sink.write_row(row).await {
            self.recorder.release(&key);
            self.recorder.fail(
                SyncFailure::new(FailureKind::Sink, table.name(), SyncError::Sink(err))
                    .in_scope(&invocation.scope)
                    .for_item(label),
            );
            return;
        }
        self.recorder.row();

        self.fan_out(invocation, item, key).await;
    }

    /// Schedules every applicable child table for one emitted row.
    async fn fan_out(self: &Arc<Self>, invocation: &Invocation, item: Item, key: RowKey) {
        let table = &invocation.table;
        if table.children().is_empty() {
            return;
        }
        let parent = Arc::new(Parent {
            table: table.name().to_string(),
            item,
            key,
        });

        for child in table.children() {
            if self.blocked.contains(child.name()) {
                continue;
            }
            if !child.applies_to(&parent.item) {
                debug!(child = child.name(), parent = %parent.key, "child skipped by predicate");
                self.recorder.skipped_child();
                continue;
            }

            let policy = child.scope_policy();
            let inherit = matches!(policy, ScopePolicy::Inherit);
            let catalog_scopes = if inherit {
                Vec::new()
            } else {
                self.catalog.scopes_for(policy)
            };
            for scope in child_scopes(&invocation.scope, inherit, catalog_scopes) {
                let child_invocation = Invocation {
                    table: child.clone(),
                    scope,
                    parent: Some(parent.clone()),
                    depth: invocation.depth + 1,
                };
                if !self.schedule(child_invocation).await {
                    return;
                }
            }
        }
    }
}
