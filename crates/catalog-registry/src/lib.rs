//! Registry layer for the index catalog.
//!
//! Provides the `RegistryStore` contract and a RocksDB implementation with:
//! - One row per logical index, keyed by its unique name
//! - A secondary id -> name mapping written in the same batch
//! - Row-level atomic writes; no transactions span an engine call

pub mod column_families;
pub mod db;
pub mod error;
pub mod store;

pub use db::RocksRegistry;
pub use error::RegistryError;
pub use store::RegistryStore;
