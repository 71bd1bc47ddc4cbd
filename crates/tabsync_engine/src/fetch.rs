//! Collaborator interfaces.
//!
//! The engine never talks to a provider or a destination directly. It calls
//! the traits in this module, which integrators implement per table (fetch,
//! detail, column resolvers) and per destination (schema and row sinks).

use crate::cancel::CancelSignal;
use crate::error::{BoxError, SyncError};
use crate::row::Row;
use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tabsync_types::{Item, ScopeContext, TableSchema, TypeNormalizer, Value};

/// Decides whether an error means "the resource no longer exists".
///
/// Not-found errors are benign races between listing and describing and are
/// never reported. Everything else is a hard failure.
pub trait NotFoundClassifier: Send + Sync {
    /// Returns true if `err` is a not-found condition.
    fn is_not_found(&self, err: &(dyn Error + Send + Sync + 'static)) -> bool;
}

impl<F> NotFoundClassifier for F
where
    F: Fn(&(dyn Error + Send + Sync + 'static)) -> bool + Send + Sync,
{
    fn is_not_found(&self, err: &(dyn Error + Send + Sync + 'static)) -> bool {
        self(err)
    }
}

/// Classifier that treats every error as a hard failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverNotFound;

impl NotFoundClassifier for NeverNotFound {
    fn is_not_found(&self, _err: &(dyn Error + Send + Sync + 'static)) -> bool {
        false
    }
}

/// Everything a collaborator knows about the invocation it serves.
#[derive(Clone)]
pub struct FetchContext {
    table: String,
    scope: ScopeContext,
    parent: Option<Item>,
    cancel: CancelSignal,
    classifier: Arc<dyn NotFoundClassifier>,
}

impl FetchContext {
    /// Creates a context for a root invocation of `table` in `scope`.
    pub fn new(table: impl Into<String>, scope: ScopeContext) -> Self {
        Self {
            table: table.into(),
            scope,
            parent: None,
            cancel: CancelSignal::new(),
            classifier: Arc::new(NeverNotFound),
        }
    }

    /// Sets the parent item for child-table invocations.
    pub fn with_parent(mut self, parent: Item) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Sets the cancellation signal.
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Sets the not-found classifier.
    pub fn with_classifier(mut self, classifier: Arc<dyn NotFoundClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Name of the table being fetched.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Scope of this invocation.
    pub fn scope(&self) -> &ScopeContext {
        &self.scope
    }

    /// Parent item, for child tables.
    pub fn parent(&self) -> Option<&Item> {
        self.parent.as_ref()
    }

    /// The run's cancellation signal.
    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    /// Returns true once the run is cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Classifies an error with the run's not-found classifier.
    pub fn is_not_found(&self, err: &BoxError) -> bool {
        self.classifier.is_not_found(err.as_ref())
    }
}

impl fmt::Debug for FetchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchContext")
            .field("table", &self.table)
            .field("scope", &self.scope)
            .field("parent", &self.parent)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// One page returned by a fetch call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Items on this page.
    pub items: Vec<Item>,
    /// Continuation token. `None` or empty means this is the last page.
    pub next_token: Option<String>,
}

impl Page {
    /// Creates a page followed by more pages.
    pub fn new(items: Vec<Item>, next_token: impl Into<String>) -> Self {
        Self {
            items,
            next_token: Some(next_token.into()),
        }
    }

    /// Creates a final page. Single-shot calls return exactly one of these.
    pub fn last(items: Vec<Item>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }

    /// The continuation token, with an empty token treated as absent.
    pub fn continuation(&self) -> Option<&str> {
        self.next_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Root data-fetch step of a table.
#[async_trait]
pub trait TableFetcher: Send + Sync {
    /// Fetches the page identified by `token` (`None` for the first page).
    async fn fetch_page(&self, ctx: &FetchContext, token: Option<&str>) -> Result<Page, BoxError>;
}

/// Converts a summary item into a fully detailed item.
///
/// Called once per item, possibly concurrently for distinct items of the
/// same scope. Must not leave side effects behind when it fails.
#[async_trait]
pub trait DetailFetcher: Send + Sync {
    /// Resolves the detailed form of `item`.
    async fn resolve(&self, ctx: &FetchContext, item: Item) -> Result<Item, BoxError>;
}

/// A column resolver that needs I/O, for example a paginated tag lookup.
#[async_trait]
pub trait ColumnResolve: Send + Sync {
    /// Produces the column value for `item`, or `None` if absent.
    async fn resolve(&self, ctx: &FetchContext, item: &Item) -> Result<Option<Value>, BoxError>;
}

/// Receives materialized table schemas before any row flows.
#[async_trait]
pub trait SchemaSink: Send + Sync {
    /// Creates or migrates the destination table.
    async fn create_table(&self, schema: &TableSchema) -> Result<(), BoxError>;
}

/// Receives emitted rows.
#[async_trait]
pub trait RowSink: Send + Sync {
    /// Stores one row.
    async fn write_row(&self, row: Row) -> Result<(), BoxError>;
}

/// A destination: its type vocabulary plus schema and row sinks.
pub trait Destination: SchemaSink + RowSink {
    /// The destination's type normalizer.
    fn normalizer(&self) -> &dyn TypeNormalizer;
}

/// Drives a paginated sub-fetch to completion and collects its items.
///
/// Used by column resolvers that gather lists (tags, policies) for one item.
/// A not-found error ends the listing and keeps what was gathered so far;
/// other errors propagate. `fetch` receives the previous continuation token
/// and returns the page items with the next token.
pub async fn paginate_all<T, F, Fut>(ctx: &FetchContext, mut fetch: F) -> Result<Vec<T>, BoxError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<(Vec<T>, Option<String>), BoxError>>,
{
    let mut collected = Vec::new();
    let mut token: Option<String> = None;

    loop {
        if ctx.is_cancelled() {
            return Err(Box::new(SyncError::Cancelled));
        }

        let (items, next) = match fetch(token.clone()).await {
            Ok(page) => page,
            Err(err) if ctx.is_not_found(&err) => {
                tracing::trace!(table = ctx.table(), "sub-fetch target disappeared");
                return Ok(collected);
            }
            Err(err) => return Err(err),
        };
        collected.extend(items);

        let next = next.filter(|t| !t.is_empty());
        match next {
            None => return Ok(collected),
            Some(next) if token.as_deref() == Some(next.as_str()) => {
                return Err(Box::new(SyncError::CursorRepeated { token: next }));
            }
            Some(next) => token = Some(next),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Missing;

    impl fmt::Display for Missing {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("missing")
        }
    }

    impl Error for Missing {}

    fn ctx() -> FetchContext {
        let classifier = |err: &(dyn Error + Send + Sync + 'static)| err.is::<Missing>();
        FetchContext::new("t", ScopeContext::global()).with_classifier(Arc::new(classifier))
    }

    #[test]
    fn page_continuation() {
        assert_eq!(Page::new(vec![], "T1").continuation(), Some("T1"));
        assert_eq!(Page::new(vec![], "").continuation(), None);
        assert_eq!(Page::last(vec![]).continuation(), None);
    }

    #[test]
    fn classifier_from_closure() {
        let ctx = ctx();
        assert!(ctx.is_not_found(&(Box::new(Missing) as BoxError)));
        assert!(!ctx.is_not_found(&BoxError::from("other")));
    }

    #[tokio::test]
    async fn paginate_all_follows_tokens() {
        let ctx = ctx();
        let mut calls = Vec::new();
        let tags = paginate_all(&ctx, |token| {
            calls.push(token.clone());
            async move {
                Ok(match token.as_deref() {
                    None => (vec!["a", "b"], Some("p2".to_string())),
                    Some("p2") => (vec!["c"], Some(String::new())),
                    Some(_) => unreachable!(),
                })
            }
        })
        .await
        .unwrap();

        assert_eq!(tags, vec!["a", "b", "c"]);
        assert_eq!(calls, vec![None, Some("p2".to_string())]);
    }

    #[tokio::test]
    async fn paginate_all_not_found_keeps_prefix() {
        let ctx = ctx();
        let tags = paginate_all(&ctx, |token| async move {
            match token {
                None => Ok((vec![1, 2], Some("p2".to_string()))),
                Some(_) => Err(Box::new(Missing) as BoxError),
            }
        })
        .await
        .unwrap();
        assert_eq!(tags, vec![1, 2]);
    }

    #[tokio::test]
    async fn paginate_all_propagates_other_errors() {
        let ctx = ctx();
        let result: Result<Vec<u8>, _> =
            paginate_all(&ctx, |_| async { Err(BoxError::from("throttled")) }).await;
        assert_eq!(result.unwrap_err().to_string(), "throttled");
    }

    #[tokio::test]
    async fn paginate_all_detects_repeated_cursor() {
        let ctx = ctx();
        let result: Result<Vec<u8>, _> =
            paginate_all(&ctx, |_| async { Ok((vec![1], Some("same".to_string()))) }).await;
        assert!(result.unwrap_err().to_string().contains("repeated"));
    }
}
