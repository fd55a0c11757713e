//! End-to-end test infrastructure for the index catalog.
//!
//! Provides a shared TestHarness wiring the catalog to an in-memory engine
//! and a RocksDB registry that can be told to fail writes.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use catalog_core::Catalog;
use catalog_engine::InMemoryEngine;
use catalog_registry::{RegistryError, RegistryStore, RocksRegistry};
use catalog_types::{IndexRecord, NewIndexRecord, RecordUpdate};

/// Registry wrapper with switchable write failures.
pub struct FlakyRegistry {
    inner: RocksRegistry,
    fail_insert: AtomicBool,
    fail_update: AtomicBool,
    fail_delete: AtomicBool,
}

impl FlakyRegistry {
    pub fn new(inner: RocksRegistry) -> Self {
        Self {
            inner,
            fail_insert: AtomicBool::new(false),
            fail_update: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        }
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_insert.store(fail, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_update.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool) -> Result<(), RegistryError> {
        if flag.load(Ordering::SeqCst) {
            Err(RegistryError::Backend("injected write failure".to_string()))
        } else {
            Ok(())
        }
    }
}

impl RegistryStore for FlakyRegistry {
    fn insert(&self, record: NewIndexRecord) -> Result<IndexRecord, RegistryError> {
        Self::check(&self.fail_insert)?;
        self.inner.insert(record)
    }

    fn get_by_name(&self, name: &str) -> Result<IndexRecord, RegistryError> {
        self.inner.get_by_name(name)
    }

    fn list_all(&self) -> Result<Vec<IndexRecord>, RegistryError> {
        self.inner.list_all()
    }

    fn update_by_name(
        &self,
        name: &str,
        update: RecordUpdate,
    ) -> Result<IndexRecord, RegistryError> {
        Self::check(&self.fail_update)?;
        self.inner.update_by_name(name, update)
    }

    fn delete_by_name(&self, name: &str) -> Result<(), RegistryError> {
        Self::check(&self.fail_delete)?;
        self.inner.delete_by_name(name)
    }
}

/// Shared test harness for E2E tests.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    pub engine: Arc<InMemoryEngine>,
    pub registry: Arc<FlakyRegistry>,
    pub catalog: Catalog,
}

impl TestHarness {
    /// Create a harness with an empty engine and an empty registry.
    pub fn new() -> Self {
        Self::with_engine(InMemoryEngine::new())
    }

    /// Create a harness whose engine already holds `names`.
    pub fn with_engine_indices(names: &[&str]) -> Self {
        Self::with_engine(InMemoryEngine::with_indices(names))
    }

    fn with_engine(engine: InMemoryEngine) -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let registry = RocksRegistry::open(temp_dir.path()).expect("Failed to open test registry");
        let registry = Arc::new(FlakyRegistry::new(registry));
        let engine = Arc::new(engine);
        let catalog = Catalog::new(engine.clone(), registry.clone());

        Self {
            _temp_dir: temp_dir,
            engine,
            registry,
            catalog,
        }
    }

    /// Names of all registry rows.
    pub fn registry_names(&self) -> Vec<String> {
        self.registry
            .list_all()
            .expect("Failed to list registry")
            .into_iter()
            .map(|r| r.name)
            .collect()
    }

    /// Registry row for `name`, panicking if absent.
    pub fn record(&self, name: &str) -> IndexRecord {
        self.registry
            .get_by_name(name)
            .expect("Expected registry row")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Collect a set of strings into a sorted vec for readable assertions.
pub fn sorted(set: BTreeSet<String>) -> Vec<String> {
    set.into_iter().collect()
}
