//! Configuration for the sync engine.

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

/// Largest accepted pool or buffer size.
pub const MAX_POOL_SIZE: usize = Semaphore::MAX_PERMITS;

/// Configuration for a sync run.
///
/// Can be built in code with the `with_*` methods or deserialized from a
/// configuration file; missing fields take their default values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum number of root-table scopes fetched concurrently.
    pub scope_concurrency: usize,
    /// Maximum number of concurrent child-table invocations per tree depth.
    pub fanout_concurrency: usize,
    /// Maximum number of items of one page resolved concurrently.
    pub item_concurrency: usize,
    /// Capacity, in pages, of each scope's delivery channel.
    pub page_buffer: usize,
    /// Table name patterns to sync. `*` matches any run of characters.
    pub tables: Vec<String>,
    /// Table name patterns to skip, together with their descendants.
    pub skip_tables: Vec<String>,
}

impl SyncConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            scope_concurrency: 16,
            fanout_concurrency: 64,
            item_concurrency: 8,
            page_buffer: 2,
            tables: vec!["*".into()],
            skip_tables: Vec::new(),
        }
    }

    /// Sets the scope worker pool size.
    pub fn with_scope_concurrency(mut self, n: usize) -> Self {
        self.scope_concurrency = n;
        self
    }

    /// Sets the per-depth fan-out pool size.
    pub fn with_fanout_concurrency(mut self, n: usize) -> Self {
        self.fanout_concurrency = n;
        self
    }

    /// Sets the number of items resolved concurrently within a page.
    pub fn with_item_concurrency(mut self, n: usize) -> Self {
        self.item_concurrency = n;
        self
    }

    /// Sets the delivery channel capacity.
    pub fn with_page_buffer(mut self, pages: usize) -> Self {
        self.page_buffer = pages;
        self
    }

    /// Sets the table include patterns.
    pub fn with_tables<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the table skip patterns.
    pub fn with_skip_tables<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_tables = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Checks that every pool and buffer size is usable.
    ///
    /// Pools and channels are semaphore-backed, so sizes are capped at
    /// [`MAX_POOL_SIZE`].
    pub fn validate(&self) -> SyncResult<()> {
        for (name, value) in [
            ("scope_concurrency", self.scope_concurrency),
            ("fanout_concurrency", self.fanout_concurrency),
            ("item_concurrency", self.item_concurrency),
            ("page_buffer", self.page_buffer),
        ] {
            if value == 0 {
                return Err(SyncError::Config(format!("{name} must be at least 1")));
            }
            if value > MAX_POOL_SIZE {
                return Err(SyncError::Config(format!(
                    "{name} must be at most {MAX_POOL_SIZE}, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Returns true if `table` matches an include pattern.
    pub fn includes(&self, table: &str) -> bool {
        self.tables.iter().any(|p| glob_match(p, table))
    }

    /// Returns true if `table` matches a skip pattern.
    pub fn skips(&self, table: &str) -> bool {
        self.skip_tables.iter().any(|p| glob_match(p, table))
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Matches `name` against a pattern where `*` matches any run of characters.
pub(crate) fn glob_match(pattern: &str, name: &str) -> bool {
    let mut parts = pattern.split('*');
    let first = parts.next().unwrap_or_default();
    let Some(mut rest) = name.strip_prefix(first) else {
        return false;
    };

    let parts: Vec<&str> = parts.collect();
    let Some((last, middle)) = parts.split_last() else {
        // No wildcard at all.
        return rest.is_empty();
    };

    for part in middle {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}
