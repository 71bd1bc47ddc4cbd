//! Run-level failure aggregation and statistics.

use crate::error::SyncError;
use crate::row::RowKey;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tabsync_types::ScopeContext;

/// The smallest unit a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// A fetch failure that ended one scope's pagination.
    ScopeFatal,
    /// A single item's detail resolution or column extraction failed.
    RowLocal,
    /// A child table invocation failed as a whole.
    Fanout,
    /// The destination rejected a schema or a row.
    Sink,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ScopeFatal => "scope",
            Self::RowLocal => "row",
            Self::Fanout => "fan-out",
            Self::Sink => "sink",
        })
    }
}

/// One attributed failure.
#[derive(Debug)]
pub struct SyncFailure {
    /// Failure category.
    pub kind: FailureKind,
    /// Table the failure belongs to.
    pub table: String,
    /// Scope of the failing invocation, if it had one.
    pub scope: Option<ScopeContext>,
    /// Label of the failing item, for row-local failures.
    pub item: Option<String>,
    /// Parent table name, for fan-out failures.
    pub parent: Option<String>,
    /// The underlying error.
    pub error: SyncError,
}

impl SyncFailure {
    pub(crate) fn new(kind: FailureKind, table: impl Into<String>, error: SyncError) -> Self {
        Self {
            kind,
            table: table.into(),
            scope: None,
            item: None,
            parent: None,
            error,
        }
    }

    pub(crate) fn in_scope(mut self, scope: &ScopeContext) -> Self {
        self.scope = Some(scope.clone());
        self
    }

    pub(crate) fn for_item(mut self, item: impl Into<String>) -> Self {
        self.item = Some(item.into());
        self
    }

    pub(crate) fn under(mut self, parent: Option<&str>) -> Self {
        self.parent = parent.map(str::to_string);
        self
    }
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.table)?;
        if let Some(scope) = &self.scope {
            write!(f, " ({scope})")?;
        }
        if let Some(item) = &self.item {
            write!(f, " item {item}")?;
        }
        write!(f, ": {}", self.error)
    }
}

/// Counters collected over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Table invocations started, roots and children.
    pub invocations: u64,
    /// Pages fetched.
    pub pages: u64,
    /// Items delivered by pagination.
    pub items: u64,
    /// Rows written to the row sink.
    pub rows: u64,
    /// Child invocations skipped by a parent predicate.
    pub skipped_children: u64,
    /// Not-found conditions absorbed as benign.
    pub benign_absences: u64,
    /// Failures recorded.
    pub failures: u64,
}

/// Final report of a run.
#[derive(Debug)]
pub struct SyncSummary {
    /// Counters.
    pub stats: SyncStats,
    /// Every attributed failure, in the order recorded.
    pub failures: Vec<SyncFailure>,
    /// True if the run was cancelled.
    pub cancelled: bool,
    /// Wall-clock duration.
    pub duration: Duration,
}

impl SyncSummary {
    /// Returns true if the run finished without failures or cancellation.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    /// Failures of one kind.
    pub fn failures_of(&self, kind: FailureKind) -> impl Iterator<Item = &SyncFailure> {
        self.failures.iter().filter(move |f| f.kind == kind)
    }

    /// Failures attributed to one table.
    pub fn failures_for<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a SyncFailure> {
        self.failures.iter().filter(move |f| f.table == table)
    }
}

/// Shared collector used by every task of a run.
#[derive(Debug, Default)]
pub(crate) struct Recorder {
    invocations: AtomicU64,
    pages: AtomicU64,
    items: AtomicU64,
    rows: AtomicU64,
    skipped_children: AtomicU64,
    benign_absences: AtomicU64,
    failures: Mutex<Vec<SyncFailure>>,
    seen: Mutex<HashSet<RowKey>>,
}

impl Recorder {
    pub(crate) fn invocation(&self) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn pages(&self, pages: u64, items: u64) {
        self.pages.fetch_add(pages, Ordering::Relaxed);
        self.items.fetch_add(items, Ordering::Relaxed);
    }

    pub(crate) fn row(&self) {
        self.rows.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn skipped_child(&self) {
        self.skipped_children.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn absence(&self) {
        self.benign_absences.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn fail(&self, failure: SyncFailure) {
        tracing::warn!(
            kind = %failure.kind,
            table = %failure.table,
            scope = ?failure.scope.as_ref().map(ToString::to_string),
            item = ?failure.item,
            error = %failure.error,
            "sync failure"
        );
        self.failures.lock().push(failure);
    }

    /// Claims `key` for this run. Returns false if it was already emitted.
    ///
    /// Keyless rows are never deduplicated.
    pub(crate) fn claim(&self, key: &RowKey) -> bool {
        key.is_keyless() || self.seen.lock().insert(key.clone())
    }

    /// Gives back a claimed key after its row could not be stored.
    pub(crate) fn release(&self, key: &RowKey) {
        if !key.is_keyless() {
            self.seen.lock().remove(key);
        }
    }

    pub(crate) fn finish(&self, cancelled: bool, duration: Duration) -> SyncSummary {
        let failures = std::mem::take(&mut *self.failures.lock());
        self.seen.lock().clear();
        SyncSummary {
            stats: SyncStats {
                invocations: self.invocations.load(Ordering::Relaxed),
                pages: self.pages.load(Ordering::Relaxed),
                items: self.items.load(Ordering::Relaxed),
                rows: self.rows.load(Ordering::Relaxed),
                skipped_children: self.skipped_children.load(Ordering::Relaxed),
                benign_absences: self.benign_absences.load(Ordering::Relaxed),
                failures: failures.len() as u64,
            },
            failures,
            cancelled,
            duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_rejects_duplicates() {
        let recorder = Recorder::default();
        let key = RowKey::new("t", ScopeContext::global(), vec!["a".into()]);
        assert!(recorder.claim(&key));
        assert!(!recorder.claim(&key));

        recorder.release(&key);
        assert!(recorder.claim(&key));

        let other_scope = RowKey::new("t", ScopeContext::account("1"), vec!["a".into()]);
        assert!(recorder.claim(&other_scope));
    }

    #[test]
    fn keyless_rows_always_claim() {
        let recorder = Recorder::default();
        let key = RowKey::new("t", ScopeContext::global(), Vec::new());
        assert!(recorder.claim(&key));
        assert!(recorder.claim(&key));
    }

    #[test]
    fn finish_collects() {
        let recorder = Recorder::default();
        recorder.invocation();
        recorder.pages(2, 3);
        recorder.row();
        recorder.fail(
            SyncFailure::new(FailureKind::RowLocal, "t", SyncError::Cancelled)
                .in_scope(&ScopeContext::global())
                .for_item("id=a"),
        );

        let summary = recorder.finish(false, Duration::ZERO);
        assert_eq!(summary.stats.pages, 2);
        assert_eq!(summary.stats.items, 3);
        assert_eq!(summary.stats.failures, 1);
        assert!(!summary.is_clean());
        assert_eq!(summary.failures_of(FailureKind::RowLocal).count(), 1);
        assert_eq!(summary.failures_for("t").count(), 1);
        assert_eq!(
            summary.failures[0].to_string(),
            "[row] t (global) item id=a: sync cancelled"
        );
    }
}
