//! Startup reconciliation between the engine and the registry.
//!
//! The engine decides which indices exist; the registry holds their
//! metadata. A pass inserts rows for engine indices the registry does not
//! know and repairs stale engine ids. Rows whose index is gone from the
//! engine are reported and left alone.
//!
//! Failures on one index are recorded and the pass moves on. Only failing
//! to list either store aborts a pass.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use catalog_engine::EngineGateway;
use catalog_registry::RegistryStore;
use catalog_types::{IndexRecord, NewIndexRecord, RecordUpdate};

use crate::error::CatalogError;
use crate::resolver::IdentityResolver;

/// One index that could not be reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileFailure {
    pub name: String,
    pub error: String,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Indices the engine reported
    pub engine_indices: usize,
    /// Rows the registry held when the pass started
    pub registry_records: usize,
    /// Names of rows created for untracked engine indices
    pub inserted: Vec<String>,
    /// Names of rows whose engine id was repaired
    pub repaired: Vec<String>,
    pub unchanged: usize,
    /// Registry rows with no engine index
    pub orphaned: Vec<String>,
    pub failures: Vec<ReconcileFailure>,
}

impl ReconcileReport {
    /// Registry writes made by the pass.
    pub fn writes(&self) -> usize {
        self.inserted.len() + self.repaired.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Brings the registry in line with the engine.
pub struct ReconciliationEngine {
    engine: Arc<dyn EngineGateway>,
    registry: Arc<dyn RegistryStore>,
    resolver: IdentityResolver,
}

impl ReconciliationEngine {
    pub fn new(engine: Arc<dyn EngineGateway>, registry: Arc<dyn RegistryStore>) -> Self {
        let resolver = IdentityResolver::new(engine.clone(), registry.clone());
        Self {
            engine,
            registry,
            resolver,
        }
    }

    /// Run one full pass. Safe to repeat.
    pub async fn run(&self) -> Result<ReconcileReport, CatalogError> {
        let engine_names = self.engine.list_index_names().await?;
        let records: BTreeMap<String, IndexRecord> = self
            .registry
            .list_all()
            .map_err(CatalogError::registry_read)?
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect();

        let mut report = ReconcileReport {
            engine_indices: engine_names.len(),
            registry_records: records.len(),
            ..Default::default()
        };

        for name in &engine_names {
            match records.get(name) {
                None => match self.insert_missing(name).await {
                    Ok(()) => report.inserted.push(name.clone()),
                    Err(e) => {
                        warn!(index = %name, error = %e, "Failed to register engine index");
                        report.failures.push(ReconcileFailure {
                            name: name.clone(),
                            error: e.to_string(),
                        });
                    }
                },
                Some(record) => match self.repair_if_stale(record).await {
                    Ok(true) => report.repaired.push(name.clone()),
                    Ok(false) => report.unchanged += 1,
                    Err(e) => {
                        warn!(index = %name, error = %e, "Failed to repair engine id");
                        report.failures.push(ReconcileFailure {
                            name: name.clone(),
                            error: e.to_string(),
                        });
                    }
                },
            }
        }

        for name in records.keys().filter(|n| !engine_names.contains(*n)) {
            warn!(index = %name, "Registry row has no engine index; leaving it in place");
            report.orphaned.push(name.clone());
        }

        info!(
            engine_indices = report.engine_indices,
            registry_records = report.registry_records,
            inserted = report.inserted.len(),
            repaired = report.repaired.len(),
            unchanged = report.unchanged,
            orphaned = report.orphaned.len(),
            failures = report.failures.len(),
            "Reconciliation pass complete"
        );
        Ok(report)
    }

    async fn insert_missing(&self, name: &str) -> Result<(), CatalogError> {
        let resolved = self.resolver.resolve_against(name, None).await?;
        self.registry
            .insert(NewIndexRecord::discovered(name, resolved.engine_id))
            .map_err(CatalogError::registry_write)?;
        info!(index = %name, "Registered untracked engine index");
        Ok(())
    }

    async fn repair_if_stale(&self, record: &IndexRecord) -> Result<bool, CatalogError> {
        let resolved = self
            .resolver
            .resolve_against(&record.name, record.engine_id.as_deref())
            .await?;
        if !resolved.needs_registry_update {
            debug!(index = %record.name, "Engine id up to date");
            return Ok(false);
        }

        self.registry
            .update_by_name(&record.name, RecordUpdate::new().engine_id(&resolved.engine_id))
            .map_err(CatalogError::registry_write)?;
        info!(
            index = %record.name,
            previous = ?record.engine_id,
            engine_id = %resolved.engine_id,
            "Repaired engine id"
        );
        Ok(true)
    }
}
