//! Fan-out primitives: the run-wide wait group and per-depth worker pools.
//!
//! Every table invocation holds a permit of the pool for its depth in the
//! table tree. A task at depth `d` only ever waits for permits of depth
//! `d + 1`, and the deepest level never waits for anything, so nested
//! fan-out cannot deadlock however small the pools are.

use crate::cancel::CancelSignal;
use crate::config::SyncConfig;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tabsync_types::ScopeContext;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};

/// Counts in-flight invocations across the whole run.
#[derive(Debug, Clone, Default)]
pub(crate) struct WaitGroup {
    inner: Arc<WaitInner>,
}

#[derive(Debug, Default)]
struct WaitInner {
    pending: AtomicUsize,
    idle: Notify,
}

/// Released when the invocation it tracks finishes, even by panic.
#[derive(Debug)]
pub(crate) struct WaitGuard {
    inner: Arc<WaitInner>,
}

impl WaitGroup {
    pub(crate) fn enter(&self) -> WaitGuard {
        self.inner.pending.fetch_add(1, Ordering::SeqCst);
        WaitGuard {
            inner: self.inner.clone(),
        }
    }

    pub(crate) fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    /// Completes once no invocation is pending.
    pub(crate) async fn wait(&self) {
        loop {
            let idle = self.inner.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            idle.await;
        }
    }
}

impl Drop for WaitGuard {
    fn drop(&mut self) {
        if self.inner.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

/// One semaphore per depth of the table tree.
#[derive(Debug)]
pub(crate) struct DepthPools {
    pools: Vec<Arc<Semaphore>>,
}

impl DepthPools {
    /// Depth 0 holds root scope workers; deeper levels hold child
    /// invocations.
    pub(crate) fn new(config: &SyncConfig, depth: usize) -> Self {
        let pools = (0..depth.max(1))
            .map(|d| {
                let permits = if d == 0 {
                    config.scope_concurrency
                } else {
                    config.fanout_concurrency
                };
                Arc::new(Semaphore::new(permits))
            })
            .collect();
        Self { pools }
    }

    /// Number of levels.
    pub(crate) fn depth(&self) -> usize {
        self.pools.len()
    }

    /// Waits for a permit at `depth`. Returns `None` if the run is cancelled
    /// first or the depth exceeds the tree.
    pub(crate) async fn acquire(
        &self,
        depth: usize,
        cancel: &CancelSignal,
    ) -> Option<OwnedSemaphorePermit> {
        let pool = self.pools.get(depth)?.clone();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = pool.acquire_owned() => permit.ok(),
        }
    }
}

/// Scopes a child invocation runs in.
///
/// `Inherit` keeps the parent's scope. Any other policy is multiplexed from
/// the catalog's `scopes` and restricted to the coordinates the parent
/// already fixed, so a child never leaves its parent's account or region.
pub(crate) fn child_scopes(
    parent: &ScopeContext,
    inherit: bool,
    scopes: Vec<ScopeContext>,
) -> Vec<ScopeContext> {
    if inherit {
        return vec![parent.clone()];
    }
    scopes
        .into_iter()
        .filter(|scope| {
            agrees(parent.account_id(), scope.account_id())
                && agrees(parent.region_id(), scope.region_id())
        })
        .collect()
}

fn agrees(parent: Option<&str>, child: Option<&str>) -> bool {
    match (parent, child) {
        (Some(p), Some(c)) => p == c,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn wait_group_completes_when_all_guards_drop() {
        let group = WaitGroup::default();
        group.wait().await;

        let first = group.enter();
        let second = group.enter();
        assert_eq!(group.pending(), 2);

        let waiter = {
            let group = group.clone();
            tokio::spawn(async move { group.wait().await })
        };
        drop(first);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        drop(second);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn guard_released_on_panic() {
        let group = WaitGroup::default();
        let guard = group.enter();
        let task = tokio::spawn(async move {
            let _guard = guard;
            panic!("boom");
        });
        assert!(task.await.is_err());
        assert_eq!(group.pending(), 0);
    }

    #[tokio::test]
    async fn pools_per_depth() {
        let config = SyncConfig::new()
            .with_scope_concurrency(1)
            .with_fanout_concurrency(2);
        let pools = DepthPools::new(&config, 3);
        let cancel = CancelSignal::new();
        assert_eq!(pools.depth(), 3);

        let root = pools.acquire(0, &cancel).await.unwrap();
        // Depth 1 is independent of depth 0.
        let a = pools.acquire(1, &cancel).await.unwrap();
        let _b = pools.acquire(1, &cancel).await.unwrap();
        assert!(pools.acquire(3, &cancel).await.is_none());

        let blocked = tokio::time::timeout(Duration::from_millis(10), pools.acquire(1, &cancel)).await;
        assert!(blocked.is_err());

        drop(a);
        assert!(pools.acquire(1, &cancel).await.is_some());
        drop(root);
    }

    #[tokio::test]
    async fn acquire_gives_up_on_cancel() {
        let pools = DepthPools::new(&SyncConfig::new().with_scope_concurrency(1), 1);
        let cancel = CancelSignal::new();
        let _held = pools.acquire(0, &cancel).await.unwrap();
        cancel.cancel();
        assert!(pools.acquire(0, &cancel).await.is_none());
    }

    #[test]
    fn child_scope_selection() {
        let parent = ScopeContext::account_region("1", "us-east-1");
        assert_eq!(child_scopes(&parent, true, Vec::new()), vec![parent.clone()]);

        let catalog_scopes = vec![
            ScopeContext::account_region("1", "eu-west-1"),
            ScopeContext::account_region("1", "us-east-1"),
            ScopeContext::account_region("2", "us-east-1"),
        ];
        assert_eq!(
            child_scopes(&parent, false, catalog_scopes),
            vec![ScopeContext::account_region("1", "us-east-1")]
        );

        let global = ScopeContext::global();
        let accounts = vec![ScopeContext::account("1"), ScopeContext::account("2")];
        assert_eq!(child_scopes(&global, false, accounts.clone()), accounts);
    }
}
