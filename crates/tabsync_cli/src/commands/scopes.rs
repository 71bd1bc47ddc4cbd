//! Scopes command implementation.

use super::{sample_engine, CliResult};
use std::sync::Arc;
use tabsync_engine::SyncConfig;
use tabsync_testkit::DynamoDbStub;
use tabsync_types::ScopeCatalog;

/// Runs the scopes command.
pub fn run(config: &SyncConfig, catalog: &ScopeCatalog) -> CliResult<()> {
    let engine = sample_engine(config.clone(), Arc::new(DynamoDbStub::new()))?;
    for table in engine.selected_tables() {
        let scopes = catalog.scopes_for(table.scope_policy());
        println!("{} ({} scopes)", table.name(), scopes.len());
        for scope in scopes {
            println!("  {scope}");
        }
    }
    Ok(())
}
