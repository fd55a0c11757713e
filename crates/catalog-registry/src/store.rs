//! The registry contract.

use catalog_types::{IndexRecord, NewIndexRecord, RecordUpdate};

use crate::error::RegistryError;

/// CRUD over registry rows.
///
/// Every write is atomic at the row level. Nothing here spans a call to the
/// engine; callers order their cross-store steps themselves.
pub trait RegistryStore: Send + Sync {
    /// Insert a new row. Fails with `DuplicateName` if the name is taken.
    fn insert(&self, record: NewIndexRecord) -> Result<IndexRecord, RegistryError>;

    fn get_by_name(&self, name: &str) -> Result<IndexRecord, RegistryError>;

    /// All rows, ordered by name.
    fn list_all(&self) -> Result<Vec<IndexRecord>, RegistryError>;

    /// Apply a partial update and return the stored row.
    fn update_by_name(&self, name: &str, update: RecordUpdate)
        -> Result<IndexRecord, RegistryError>;

    fn delete_by_name(&self, name: &str) -> Result<(), RegistryError>;

    /// Rows whose `alias` field equals `alias`.
    fn find_by_alias(&self, alias: &str) -> Result<Vec<IndexRecord>, RegistryError> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|r| r.alias.as_deref() == Some(alias))
            .collect())
    }
}
