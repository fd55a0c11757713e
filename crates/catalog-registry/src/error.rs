//! Registry error types.

use thiserror::Error;

/// Errors that can occur in the registry layer
#[derive(Error, Debug)]
pub enum RegistryError {
    /// A row with this name already exists
    #[error("Duplicate index name: {0}")]
    DuplicateName(String),

    /// No row with this name or id
    #[error("Index record not found: {0}")]
    NotFound(String),

    /// RocksDB operation failed
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    /// Column family not found
    #[error("Column family not found: {0}")]
    ColumnFamilyNotFound(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Any other backend failure
    #[error("Registry backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Serialization(err.to_string())
    }
}
