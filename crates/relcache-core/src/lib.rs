//! Core types for the relcache table cache.
//!
//! This crate provides the foundational pieces shared by the engine driver
//! and the cache layer:
//!
//! - `Error`/`Result` for all cache and engine operations
//! - `Value` for typed parameter binding
//! - `Row`/`ColumnInfo` for materialized table rows
//! - `Progress` for bulk-operation progress reporting

pub mod error;
pub mod progress;
pub mod row;
pub mod value;

pub use error::{
    CacheError, CacheErrorKind, EngineError, EngineErrorKind, Error, ImportError, Result,
};
pub use progress::Progress;
pub use row::{ColumnInfo, Row};
pub use value::Value;
