//! # tabsync Testkit
//!
//! Test utilities for tabsync.
//!
//! This crate provides:
//! - A fake provider error and its not-found classifier
//! - Scripted fetchers and closure-backed collaborators
//! - A recording destination with failure injection
//! - A DynamoDB-like sample provider and table tree
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tabsync_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn syncs_sample_tree() {
//!     let stub = Arc::new(sample_stub());
//!     let engine = SyncEngine::new(SyncConfig::new(), vec![dynamodb_tables(stub)])
//!         .unwrap()
//!         .with_classifier(provider_not_found);
//!     let dest = Arc::new(RecordingDestination::new());
//!     let summary = engine.run(&sample_catalog(), dest.clone()).await.unwrap();
//!     assert!(summary.is_clean());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod provider;
pub mod scripted;
pub mod sink;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::provider::*;
    pub use crate::scripted::*;
    pub use crate::sink::*;
}

pub use fixtures::*;
pub use generators::*;
pub use provider::*;
pub use scripted::*;
pub use sink::*;
