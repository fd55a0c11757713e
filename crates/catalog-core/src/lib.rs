//! # catalog-core
//!
//! Keeps the registry and the search engine consistent.
//!
//! - `IndexLifecycleCoordinator`: create, delete, update and search indices
//!   with engine-first ordering and explicit partial-failure reporting
//! - `ReconciliationEngine`: registers engine indices the registry misses and
//!   repairs stale engine ids; run before serving traffic
//! - `IdentityResolver`: read-only comparison of engine and registry ids
//! - `DocumentAccess`: document CRUD and search inside a live index
//!
//! Both stores are injected as trait objects, so tests substitute
//! `InMemoryEngine` for the real engine.

pub mod coordinator;
pub mod documents;
pub mod error;
pub mod reconcile;
pub mod resolver;

use std::sync::Arc;

use catalog_engine::EngineGateway;
use catalog_registry::RegistryStore;

pub use coordinator::IndexLifecycleCoordinator;
pub use documents::{DocumentAccess, MIN_SEARCH_CHARS};
pub use error::{CatalogError, LifecycleStep};
pub use reconcile::{ReconcileFailure, ReconcileReport, ReconciliationEngine};
pub use resolver::{IdentityResolver, Resolved};

/// The catalog components wired to one engine and one registry.
pub struct Catalog {
    pub coordinator: Arc<IndexLifecycleCoordinator>,
    pub documents: DocumentAccess,
    pub reconciler: ReconciliationEngine,
}

impl Catalog {
    pub fn new(engine: Arc<dyn EngineGateway>, registry: Arc<dyn RegistryStore>) -> Self {
        let coordinator = Arc::new(IndexLifecycleCoordinator::new(
            engine.clone(),
            registry.clone(),
        ));
        Self {
            documents: DocumentAccess::new(coordinator.clone()),
            reconciler: ReconciliationEngine::new(engine, registry),
            coordinator,
        }
    }
}
