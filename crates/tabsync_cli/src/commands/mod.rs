//! CLI command implementations.

pub mod schema;
pub mod scopes;
pub mod sync;

use std::path::Path;
use std::sync::Arc;
use tabsync_engine::{SyncConfig, SyncEngine};
use tabsync_testkit::{dynamodb_tables, provider_not_found, sample_catalog, DynamoDbStub};
use tabsync_types::ScopeCatalog;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Reads a JSON sync configuration, or the defaults.
pub fn load_config(path: Option<&Path>) -> CliResult<SyncConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("cannot read config {}: {e}", path.display()))?;
            let config: SyncConfig = serde_json::from_str(&text)?;
            config.validate()?;
            Ok(config)
        }
        None => Ok(SyncConfig::default()),
    }
}

/// Reads a JSON scope catalog, or the built-in sample catalog.
pub fn load_catalog(path: Option<&Path>) -> CliResult<ScopeCatalog> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("cannot read catalog {}: {e}", path.display()))?;
            Ok(serde_json::from_str(&text)?)
        }
        None => Ok(sample_catalog()),
    }
}

/// The engine over the sample DynamoDB tables.
pub fn sample_engine(config: SyncConfig, stub: Arc<DynamoDbStub>) -> CliResult<SyncEngine> {
    let engine = SyncEngine::new(config, vec![dynamodb_tables(stub)])?;
    Ok(engine.with_classifier(provider_not_found))
}
