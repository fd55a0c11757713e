//! Maps registry rows to the engine's own index identity.

use std::sync::Arc;

use serde::Serialize;

use catalog_engine::EngineGateway;
use catalog_registry::{RegistryError, RegistryStore};

use crate::error::CatalogError;

/// The engine's live identity for an index, compared with the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolved {
    pub engine_id: String,
    /// True when the registry has no value or a different one
    pub needs_registry_update: bool,
}

impl Resolved {
    /// Compare a live engine id with the value the registry holds.
    pub fn compare(engine_id: String, stored: Option<&str>) -> Self {
        let needs_registry_update = stored != Some(engine_id.as_str());
        Self {
            engine_id,
            needs_registry_update,
        }
    }
}

/// Reads both stores and never writes to either.
#[derive(Clone)]
pub struct IdentityResolver {
    engine: Arc<dyn EngineGateway>,
    registry: Arc<dyn RegistryStore>,
}

impl IdentityResolver {
    pub fn new(engine: Arc<dyn EngineGateway>, registry: Arc<dyn RegistryStore>) -> Self {
        Self { engine, registry }
    }

    /// Resolve `name` against the registry row of the same name, if any.
    pub async fn resolve(&self, name: &str) -> Result<Resolved, CatalogError> {
        let stored = match self.registry.get_by_name(name) {
            Ok(record) => record.engine_id,
            Err(RegistryError::NotFound(_)) => None,
            Err(e) => return Err(CatalogError::registry_read(e)),
        };
        self.resolve_against(name, stored.as_deref()).await
    }

    /// Resolve `name` against an already-loaded registry value.
    pub async fn resolve_against(
        &self,
        name: &str,
        stored: Option<&str>,
    ) -> Result<Resolved, CatalogError> {
        let engine_id = self.engine.get_engine_id(name).await?;
        Ok(Resolved::compare(engine_id, stored))
    }
}
