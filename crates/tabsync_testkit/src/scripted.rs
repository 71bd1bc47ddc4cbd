//! Scripted collaborators.
//!
//! [`ScriptedFetcher`] serves a fixed list of pages per scope and records
//! every call. The `Fn*` adapters turn closures into collaborators.

use crate::provider::ProviderError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tabsync_engine::{BoxError, DetailFetcher, FetchContext, Page, TableFetcher};
use tabsync_types::{Item, ScopeContext};

/// One recorded fetch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCall {
    /// Scope of the call.
    pub scope: ScopeContext,
    /// Continuation token passed in.
    pub token: Option<String>,
    /// Label of the parent item, for child tables.
    pub parent: Option<String>,
}

/// One scripted step: a page or a provider error.
pub type Step = Result<Page, ProviderError>;

/// Serves scripted pages.
///
/// The first call of a scope gets the first step. Later calls are matched
/// by token: the step after the page whose continuation equals the token.
/// Scopes without their own script share the default script.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    default: Vec<Step>,
    scopes: HashMap<ScopeContext, Vec<Step>>,
    delay: Option<Duration>,
    calls: Mutex<Vec<FetchCall>>,
}

impl ScriptedFetcher {
    /// Creates a fetcher serving `steps` in every scope.
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            default: steps,
            ..Self::default()
        }
    }

    /// Creates a fetcher that pages through `pages` of ids, with tokens
    /// `T1`, `T2`, ... and an empty token on the last page.
    pub fn pages_of_ids(pages: &[&[&str]]) -> Self {
        Self::new(paged_ids(pages))
    }

    /// Overrides the script for one scope.
    pub fn for_scope(mut self, scope: ScopeContext, steps: Vec<Step>) -> Self {
        self.scopes.insert(scope, steps);
        self
    }

    /// Sleeps before answering every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.lock().clone()
    }

    /// Number of calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Tokens passed in for one scope, in order.
    pub fn tokens_for(&self, scope: &ScopeContext) -> Vec<Option<String>> {
        self.calls
            .lock()
            .iter()
            .filter(|c| &c.scope == scope)
            .map(|c| c.token.clone())
            .collect()
    }

    fn step(&self, scope: &ScopeContext, token: Option<&str>) -> Result<Page, BoxError> {
        let steps = self.scopes.get(scope).unwrap_or(&self.default);
        let index = match token {
            None => 0,
            Some(token) => {
                let previous = steps.iter().position(|step| {
                    matches!(step, Ok(page) if page.continuation() == Some(token))
                });
                match previous {
                    Some(i) => i + 1,
                    None => return Err(format!("unknown continuation token {token}").into()),
                }
            }
        };
        match steps.get(index) {
            Some(Ok(page)) => Ok(page.clone()),
            Some(Err(err)) => Err(err.clone().boxed()),
            None => Ok(Page::last(Vec::new())),
        }
    }
}

#[async_trait]
impl TableFetcher for ScriptedFetcher {
    async fn fetch_page(&self, ctx: &FetchContext, token: Option<&str>) -> Result<Page, BoxError> {
        self.calls.lock().push(FetchCall {
            scope: ctx.scope().clone(),
            token: token.map(str::to_string),
            parent: ctx.parent().map(Item::label),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.step(ctx.scope(), token)
    }
}

/// Items of the form `{"id": ..}`.
pub fn id_items(ids: &[&str]) -> Vec<Item> {
    ids.iter().map(|id| Item::new(json!({ "id": id }))).collect()
}

/// Pages of id items chained with tokens `T1`, `T2`, ...
pub fn paged_ids(pages: &[&[&str]]) -> Vec<Step> {
    let last = pages.len().saturating_sub(1);
    pages
        .iter()
        .enumerate()
        .map(|(i, ids)| {
            let items = id_items(ids);
            Ok(if i == last {
                Page::new(items, "")
            } else {
                Page::new(items, format!("T{}", i + 1))
            })
        })
        .collect()
}

/// A fetcher backed by a closure.
pub struct FnFetcher<F>(F);

impl<F> FnFetcher<F>
where
    F: Fn(&FetchContext, Option<&str>) -> Result<Page, BoxError> + Send + Sync,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> TableFetcher for FnFetcher<F>
where
    F: Fn(&FetchContext, Option<&str>) -> Result<Page, BoxError> + Send + Sync,
{
    async fn fetch_page(&self, ctx: &FetchContext, token: Option<&str>) -> Result<Page, BoxError> {
        (self.0)(ctx, token)
    }
}

/// A detail resolver backed by a closure.
pub struct FnDetail<F>(F);

impl<F> FnDetail<F>
where
    F: Fn(&FetchContext, Item) -> Result<Item, BoxError> + Send + Sync,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> DetailFetcher for FnDetail<F>
where
    F: Fn(&FetchContext, Item) -> Result<Item, BoxError> + Send + Sync,
{
    async fn resolve(&self, ctx: &FetchContext, item: Item) -> Result<Item, BoxError> {
        (self.0)(ctx, item)
    }
}
