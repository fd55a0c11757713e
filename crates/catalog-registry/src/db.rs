//! RocksDB wrapper for the registry.
//!
//! Provides:
//! - Database open with column family setup
//! - Unique-name inserts (check and write under one lock)
//! - Atomic write batches covering a row and its id mapping

use rocksdb::{IteratorMode, Options, WriteBatch, DB};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use catalog_types::{IndexRecord, NewIndexRecord, RecordUpdate};

use crate::column_families::{build_cf_descriptors, CF_INDEX_IDS, CF_INDICES};
use crate::error::RegistryError;
use crate::store::RegistryStore;

/// RocksDB-backed registry
pub struct RocksRegistry {
    db: DB,
    /// Serializes read-check-write sequences so name uniqueness holds
    write_lock: Mutex<()>,
}

impl RocksRegistry {
    /// Open the registry at the given path, creating it if necessary
    pub fn open(path: &Path) -> Result<Self, RegistryError> {
        info!("Opening registry at {:?}", path);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let db = DB::open_cf_descriptors(&db_opts, path, build_cf_descriptors())?;

        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, RegistryError> {
        self.write_lock
            .lock()
            .map_err(|_| RegistryError::Backend("registry write lock poisoned".to_string()))
    }

    fn read_record(&self, name: &str) -> Result<Option<IndexRecord>, RegistryError> {
        let cf = self
            .db
            .cf_handle(CF_INDICES)
            .ok_or_else(|| RegistryError::ColumnFamilyNotFound(CF_INDICES.to_string()))?;

        match self.db.get_cf(&cf, name.as_bytes())? {
            Some(bytes) => Ok(Some(IndexRecord::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write_record(&self, record: &IndexRecord) -> Result<(), RegistryError> {
        let indices_cf = self
            .db
            .cf_handle(CF_INDICES)
            .ok_or_else(|| RegistryError::ColumnFamilyNotFound(CF_INDICES.to_string()))?;
        let ids_cf = self
            .db
            .cf_handle(CF_INDEX_IDS)
            .ok_or_else(|| RegistryError::ColumnFamilyNotFound(CF_INDEX_IDS.to_string()))?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&indices_cf, record.name.as_bytes(), record.to_bytes()?);
        batch.put_cf(&ids_cf, record.id.to_string().as_bytes(), record.name.as_bytes());
        self.db.write(batch)?;
        Ok(())
    }

    /// Look a row up by its registry id.
    pub fn get_by_id(&self, id: &ulid::Ulid) -> Result<IndexRecord, RegistryError> {
        let cf = self
            .db
            .cf_handle(CF_INDEX_IDS)
            .ok_or_else(|| RegistryError::ColumnFamilyNotFound(CF_INDEX_IDS.to_string()))?;

        let name = self
            .db
            .get_cf(&cf, id.to_string().as_bytes())?
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        let name = String::from_utf8(name)
            .map_err(|e| RegistryError::Serialization(e.to_string()))?;
        self.get_by_name(&name)
    }
}

impl RegistryStore for RocksRegistry {
    fn insert(&self, record: NewIndexRecord) -> Result<IndexRecord, RegistryError> {
        let _guard = self.lock()?;

        if self.read_record(&record.name)?.is_some() {
            return Err(RegistryError::DuplicateName(record.name));
        }

        let record = IndexRecord::from_new(record);
        self.write_record(&record)?;
        debug!(index = %record.name, id = %record.id, "Inserted registry row");
        Ok(record)
    }

    fn get_by_name(&self, name: &str) -> Result<IndexRecord, RegistryError> {
        self.read_record(name)?
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    fn list_all(&self) -> Result<Vec<IndexRecord>, RegistryError> {
        let cf = self
            .db
            .cf_handle(CF_INDICES)
            .ok_or_else(|| RegistryError::ColumnFamilyNotFound(CF_INDICES.to_string()))?;

        let mut records = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item?;
            records.push(IndexRecord::from_bytes(&value)?);
        }
        Ok(records)
    }

    fn update_by_name(
        &self,
        name: &str,
        update: RecordUpdate,
    ) -> Result<IndexRecord, RegistryError> {
        let _guard = self.lock()?;

        let mut record = self
            .read_record(name)?
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        record.apply(&update);
        self.write_record(&record)?;
        debug!(index = %name, "Updated registry row");
        Ok(record)
    }

    fn delete_by_name(&self, name: &str) -> Result<(), RegistryError> {
        let _guard = self.lock()?;

        let record = self
            .read_record(name)?
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;

        let indices_cf = self
            .db
            .cf_handle(CF_INDICES)
            .ok_or_else(|| RegistryError::ColumnFamilyNotFound(CF_INDICES.to_string()))?;
        let ids_cf = self
            .db
            .cf_handle(CF_INDEX_IDS)
            .ok_or_else(|| RegistryError::ColumnFamilyNotFound(CF_INDEX_IDS.to_string()))?;

        let mut batch = WriteBatch::default();
        batch.delete_cf(&indices_cf, name.as_bytes());
        batch.delete_cf(&ids_cf, record.id.to_string().as_bytes());
        self.db.write(batch)?;
        debug!(index = %name, "Deleted registry row");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_registry() -> (RocksRegistry, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let registry = RocksRegistry::open(temp_dir.path()).unwrap();
        (registry, temp_dir)
    }

    #[test]
    fn test_insert_and_get() {
        let (registry, _temp) = create_test_registry();

        let inserted = registry
            .insert(NewIndexRecord::new("plants", "Plant taxonomy").with_engine_id("uuid-1"))
            .unwrap();
        let fetched = registry.get_by_name("plants").unwrap();

        assert_eq!(inserted, fetched);
        assert_eq!(fetched.engine_id.as_deref(), Some("uuid-1"));
        assert_eq!(fetched.description, "Plant taxonomy");
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let (registry, _temp) = create_test_registry();

        registry.insert(NewIndexRecord::new("plants", "first")).unwrap();
        let result = registry.insert(NewIndexRecord::new("plants", "second"));

        assert!(matches!(result, Err(RegistryError::DuplicateName(name)) if name == "plants"));
        assert_eq!(registry.get_by_name("plants").unwrap().description, "first");
    }

    #[test]
    fn test_get_missing() {
        let (registry, _temp) = create_test_registry();
        assert!(matches!(
            registry.get_by_name("ghost"),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_all_sorted_by_name() {
        let (registry, _temp) = create_test_registry();

        for name in ["tulsi", "ashwagandha", "neem"] {
            registry.insert(NewIndexRecord::new(name, "herb")).unwrap();
        }

        let names: Vec<String> = registry
            .list_all()
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["ashwagandha", "neem", "tulsi"]);
    }

    #[test]
    fn test_update_by_name() {
        let (registry, _temp) = create_test_registry();
        let original = registry.insert(NewIndexRecord::new("neem", "old")).unwrap();

        let updated = registry
            .update_by_name("neem", RecordUpdate::new().description("new").alias("margosa"))
            .unwrap();

        assert_eq!(updated.id, original.id);
        assert_eq!(updated.description, "new");
        assert_eq!(updated.alias.as_deref(), Some("margosa"));
        assert_eq!(registry.get_by_name("neem").unwrap(), updated);
    }

    #[test]
    fn test_update_missing() {
        let (registry, _temp) = create_test_registry();
        let result = registry.update_by_name("ghost", RecordUpdate::new().description("x"));
        assert!(matches!(result, Err(RegistryError::NotFound(_))));
    }

    #[test]
    fn test_delete_by_name() {
        let (registry, _temp) = create_test_registry();
        let record = registry.insert(NewIndexRecord::new("brahmi", "herb")).unwrap();

        registry.delete_by_name("brahmi").unwrap();

        assert!(matches!(
            registry.get_by_name("brahmi"),
            Err(RegistryError::NotFound(_))
        ));
        assert!(matches!(
            registry.get_by_id(&record.id),
            Err(RegistryError::NotFound(_))
        ));
        assert!(matches!(
            registry.delete_by_name("brahmi"),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_get_by_id() {
        let (registry, _temp) = create_test_registry();
        let record = registry.insert(NewIndexRecord::new("amla", "herb")).unwrap();
        assert_eq!(registry.get_by_id(&record.id).unwrap().name, "amla");
    }

    #[test]
    fn test_find_by_alias() {
        let (registry, _temp) = create_test_registry();
        registry.insert(NewIndexRecord::new("a", "x")).unwrap();
        registry.insert(NewIndexRecord::new("b", "x")).unwrap();
        registry
            .update_by_name("b", RecordUpdate::new().alias("current"))
            .unwrap();

        let holders = registry.find_by_alias("current").unwrap();
        assert_eq!(holders.len(), 1);
        assert_eq!(holders[0].name, "b");
    }

    #[test]
    fn test_reopen_persists_rows() {
        let temp_dir = TempDir::new().unwrap();
        {
            let registry = RocksRegistry::open(temp_dir.path()).unwrap();
            registry.insert(NewIndexRecord::new("plants", "persisted")).unwrap();
        }

        let registry = RocksRegistry::open(temp_dir.path()).unwrap();
        assert_eq!(registry.get_by_name("plants").unwrap().description, "persisted");
    }
}
