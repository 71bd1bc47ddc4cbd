//! # tabsync ClickHouse
//!
//! ClickHouse destination support for tabsync.
//!
//! This crate provides:
//! - The ClickHouse type normalizer (logical type → column type)
//! - Cell encoding and decoding for values stored under those types
//! - `CREATE TABLE` rendering for materialized schemas
//! - An in-memory destination implementing the schema and row sinks
//!
//! ## Lossy mappings
//!
//! Network addresses, hardware addresses, JSON documents and extension
//! types have no faithful ClickHouse type and are stored as `String`.
//! Their values survive a round trip through their canonical text; their
//! structure is not visible to ClickHouse.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cell;
mod ddl;
mod error;
mod memory;
mod normalizer;

pub use cell::{from_cell, to_cell, Cell};
pub use ddl::create_table_sql;
pub use error::{ClickHouseError, ClickHouseResult};
pub use memory::MemoryDestination;
pub use normalizer::ClickHouseNormalizer;
