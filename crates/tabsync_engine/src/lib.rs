//! # tabsync Engine
//!
//! Resolution and synchronization engine for tabsync.
//!
//! This crate provides:
//! - Table and column descriptors (declarative, read-only during a run)
//! - Scope fan-out of root tables over an account/region catalog
//! - A pagination driver with a bounded page channel
//! - Per-item detail resolution and column extraction
//! - Recursive fan-out from emitted rows to child tables
//! - Run-level failure attribution and statistics
//!
//! ## Architecture
//!
//! A run flows as:
//! 1. Materialize every selected table's schema through the destination's
//!    type normalizer and hand it to the schema sink
//! 2. Multiplex each root table into scopes and start one invocation per
//!    scope on the depth-0 worker pool
//! 3. Paginate each invocation, resolve and extract every item, write the
//!    row, then schedule the row's child tables one depth further down
//! 4. Wait until no invocation is pending anywhere in the tree
//!
//! ## Key Invariants
//!
//! - Pagination within a scope is strictly sequential
//! - At most `page_buffer + 1` pages are in memory per invocation
//! - No two rows with the same `(table, scope, primary key)` are emitted
//! - A failure is attributed to its item, scope or child table and never
//!   stops siblings
//! - Not-found races are absorbed, everything else is reported
//! - No retries: one attempt per page, detail and column

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cancel;
mod config;
mod engine;
mod error;
mod extract;
mod fanout;
mod fetch;
mod paginate;
mod report;
mod row;
mod table;

pub use cancel::CancelSignal;
pub use config::{SyncConfig, MAX_POOL_SIZE};
pub use engine::{SyncEngine, SyncState};
pub use error::{BoxError, SyncError, SyncResult};
pub use extract::{extract_column, resolve_item, Resolution};
pub use fetch::{
    paginate_all, ColumnResolve, Destination, DetailFetcher, FetchContext, NeverNotFound,
    NotFoundClassifier, Page, RowSink, SchemaSink, TableFetcher,
};
pub use paginate::{PaginationDriver, PaginationOutcome};
pub use report::{FailureKind, SyncFailure, SyncStats, SyncSummary};
pub use row::{Row, RowKey};
pub use table::{
    ColumnDescriptor, ColumnResolver, ComputeFn, ParentPredicate, TableDescriptor,
};
pub use tabsync_types::{
    Item, LogicalType, ScopeCatalog, ScopeContext, ScopePolicy, TableSchema, TypeNormalizer, Value,
};
