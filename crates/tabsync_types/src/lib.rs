//! # tabsync types
//!
//! Core type definitions shared by every tabsync crate.
//!
//! This crate provides:
//! - `LogicalType`, the destination-independent column type vocabulary
//! - `Value`, a typed column value
//! - `Item`, an opaque provider item flowing through the engine
//! - The scope model (`ScopePolicy`, `ScopeContext`, `ScopeCatalog`) and the
//!   scope multiplexer
//! - The `TypeNormalizer` trait and materialized schema types
//!
//! This is a pure crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod item;
mod logical;
mod normalize;
mod scope;
mod value;

pub use error::{TypeError, TypeResult};
pub use item::Item;
pub use logical::LogicalType;
pub use normalize::{SchemaColumn, TableSchema, TypeNormalizer};
pub use scope::{AccountEntry, ScopeCatalog, ScopeContext, ScopePolicy};
pub use value::Value;
