//! Pagination driver.
//!
//! One driver runs per (table, scope) invocation. It calls the table's fetch
//! step sequentially, feeding back the continuation token, and pushes every
//! page onto a bounded channel. The driver awaits each send before it asks
//! for the next page, so at most `capacity + 1` pages are in memory.

use crate::error::{SyncError, SyncResult};
use crate::fetch::{FetchContext, TableFetcher};
use std::sync::Arc;
use tabsync_types::Item;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Token plus exhaustion flag, private to one driver.
#[derive(Debug, Default)]
struct ContinuationState {
    token: Option<String>,
    exhausted: bool,
}

impl ContinuationState {
    /// Records the token returned by the page just fetched.
    fn advance(&mut self, next: Option<&str>) -> SyncResult<()> {
        match next.filter(|t| !t.is_empty()) {
            None => {
                self.token = None;
                self.exhausted = true;
            }
            Some(next) if self.token.as_deref() == Some(next) => {
                return Err(SyncError::CursorRepeated {
                    token: next.to_string(),
                });
            }
            Some(next) => self.token = Some(next.to_string()),
        }
        Ok(())
    }
}

/// How a driver finished without a hard failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaginationOutcome {
    /// Number of fetch calls that returned a page.
    pub pages: u64,
    /// Number of items delivered.
    pub items: u64,
    /// True if a not-found error ended pagination early.
    pub ended_by_absence: bool,
    /// True if the consumer went away before the source was exhausted.
    pub abandoned: bool,
}

/// Drives a table's fetch step for one scope.
pub struct PaginationDriver {
    fetcher: Arc<dyn TableFetcher>,
    ctx: FetchContext,
}

impl PaginationDriver {
    /// Creates a driver for the invocation described by `ctx`.
    pub fn new(fetcher: Arc<dyn TableFetcher>, ctx: FetchContext) -> Self {
        Self { fetcher, ctx }
    }

    /// Spawns the driver and returns the receiving end of its page channel.
    pub fn spawn(
        self,
        capacity: usize,
    ) -> (mpsc::Receiver<Vec<Item>>, JoinHandle<SyncResult<PaginationOutcome>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(async move { self.run(tx).await });
        (rx, handle)
    }

    /// Runs to exhaustion, pushing every page to `tx`.
    ///
    /// Returns an error for fetch failures that are not classified as
    /// not-found, for an inconsistent cursor and for cancellation. Empty
    /// pages are not delivered.
    pub async fn run(self, tx: mpsc::Sender<Vec<Item>>) -> SyncResult<PaginationOutcome> {
        let ctx = &self.ctx;
        let mut state = ContinuationState::default();
        let mut outcome = PaginationOutcome::default();

        while !state.exhausted {
            if ctx.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            let fetched = tokio::select! {
                biased;
                _ = ctx.cancel_signal().cancelled() => return Err(SyncError::Cancelled),
                page = self.fetcher.fetch_page(ctx, state.token.as_deref()) => page,
            };
            let page = match fetched {
                Ok(page) => page,
                Err(err) if ctx.is_not_found(&err) => {
                    debug!(table = ctx.table(), scope = %ctx.scope(), error = %err, "source disappeared, ending scope");
                    outcome.ended_by_absence = true;
                    break;
                }
                Err(err) => return Err(SyncError::Fetch(err)),
            };

            outcome.pages += 1;
            state.advance(page.continuation())?;
            trace!(
                table = ctx.table(),
                scope = %ctx.scope(),
                page = outcome.pages,
                items = page.items.len(),
                more = !state.exhausted,
                "fetched page"
            );

            if page.items.is_empty() {
                continue;
            }
            let count = page.items.len() as u64;
            let sent = tokio::select! {
                biased;
                _ = ctx.cancel_signal().cancelled() => return Err(SyncError::Cancelled),
                sent = tx.send(page.items) => sent,
            };
            if sent.is_err() {
                outcome.abandoned = true;
                break;
            }
            outcome.items += count;
        }

        Ok(outcome)
    }
}
