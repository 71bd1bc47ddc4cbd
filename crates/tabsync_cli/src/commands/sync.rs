//! Sync command implementation.

use super::{sample_engine, CliResult};
use serde::Serialize;
use std::sync::Arc;
use tabsync_clickhouse::MemoryDestination;
use tabsync_engine::{SyncConfig, SyncStats, SyncSummary};
use tabsync_testkit::sample_stub;
use tabsync_types::ScopeCatalog;
use tracing::info;

/// Outcome of a sync run.
#[derive(Debug, Serialize)]
pub struct SyncReport {
    /// Rows stored per table.
    pub tables: Vec<TableCount>,
    /// Pages fetched.
    pub pages: u64,
    /// Items delivered.
    pub items: u64,
    /// Child invocations skipped by a predicate.
    pub skipped_children: u64,
    /// Not-found races absorbed.
    pub benign_absences: u64,
    /// Failures, rendered.
    pub failures: Vec<String>,
    /// Whether the run was cancelled.
    pub cancelled: bool,
    /// Duration in milliseconds.
    pub duration_ms: u64,
}

/// Row count of one table.
#[derive(Debug, Serialize)]
pub struct TableCount {
    /// Table name.
    pub table: String,
    /// Rows stored.
    pub rows: usize,
}

impl SyncReport {
    fn new(summary: &SyncSummary, destination: &MemoryDestination) -> Self {
        let SyncStats {
            pages,
            items,
            skipped_children,
            benign_absences,
            ..
        } = summary.stats;
        Self {
            tables: destination
                .table_names()
                .into_iter()
                .map(|table| TableCount {
                    rows: destination.row_count(&table),
                    table,
                })
                .collect(),
            pages,
            items,
            skipped_children,
            benign_absences,
            failures: summary.failures.iter().map(ToString::to_string).collect(),
            cancelled: summary.cancelled,
            duration_ms: summary.duration.as_millis() as u64,
        }
    }
}

/// Runs the sync command. Ctrl-C cancels the run.
pub async fn run(config: SyncConfig, catalog: ScopeCatalog, format: &str) -> CliResult<()> {
    if !matches!(format, "text" | "json") {
        return Err(format!("unknown format {format}, expected text or json").into());
    }

    let engine = sample_engine(config, Arc::new(sample_stub()))?;
    let destination = Arc::new(MemoryDestination::new());

    let cancel = engine.cancel_signal();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, cancelling sync");
            cancel.cancel();
        }
    });
    let summary = engine.run(&catalog, destination.clone()).await?;
    interrupt.abort();

    let report = SyncReport::new(&summary, &destination);
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for table in &report.tables {
        println!("{:<48} {:>6} rows", table.table, table.rows);
    }
    println!(
        "\n{} pages, {} items, {} children skipped, {} absences, {} ms",
        report.pages, report.items, report.skipped_children, report.benign_absences, report.duration_ms
    );
    if report.cancelled {
        println!("cancelled");
    }
    if !report.failures.is_empty() {
        println!("\n{} failures:", report.failures.len());
        for failure in &report.failures {
            println!("  {failure}");
        }
    }
    Ok(())
}
