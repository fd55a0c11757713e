//! Index lifecycle across the engine and the registry.
//!
//! The two stores share no transaction. Every operation writes the engine
//! first and the registry second, so a failure between the steps leaves an
//! engine index that reconciliation can pick up, never a registry row
//! pointing at nothing. Failures after the first step are reported as
//! `PartialFailure` naming both steps.
//!
//! Alias changes are revoke-then-grant: there is a short window where the
//! alias points nowhere, never one where it points at two indices.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use catalog_engine::{EngineError, EngineGateway, SearchQuery, SearchRequest, SearchResults};
use catalog_registry::{RegistryError, RegistryStore};
use catalog_types::{
    validate_alias, validate_index_name, IndexRecord, IndexSummary, NewIndexRecord, Page,
    RecordUpdate,
};

use crate::error::{CatalogError, LifecycleStep};

/// Orchestrates create, delete, update and search of named indices.
pub struct IndexLifecycleCoordinator {
    engine: Arc<dyn EngineGateway>,
    registry: Arc<dyn RegistryStore>,
    /// Per index name and per alias string
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl IndexLifecycleCoordinator {
    pub fn new(engine: Arc<dyn EngineGateway>, registry: Arc<dyn RegistryStore>) -> Self {
        Self {
            engine,
            registry,
            locks: DashMap::new(),
        }
    }

    pub fn engine(&self) -> &Arc<dyn EngineGateway> {
        &self.engine
    }

    /// Lock keys in sorted order so overlapping callers cannot deadlock.
    async fn lock(&self, mut keys: Vec<String>) -> KeyLocks<'_> {
        keys.sort();
        keys.dedup();
        let mut held = KeyLocks {
            map: &self.locks,
            guards: Vec::with_capacity(keys.len()),
            keys,
        };
        for key in held.keys.clone() {
            let lock = self
                .locks
                .entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone();
            held.guards.push(lock.lock_owned().await);
        }
        held
    }

    /// Fail with `NotFound` unless `name` is a live index or alias.
    pub async fn require_live(&self, name: &str) -> Result<(), CatalogError> {
        validate_alias(name)?;
        if self.engine.alias_or_index_exists(name).await? {
            Ok(())
        } else {
            Err(CatalogError::NotFound(format!("index or alias '{}'", name)))
        }
    }

    /// Every engine index, joined with its registry row when there is one.
    pub async fn list_indices(&self) -> Result<Vec<IndexSummary>, CatalogError> {
        let names = self.engine.list_index_names().await?;
        let mut records: BTreeMap<String, IndexRecord> = self
            .registry
            .list_all()
            .map_err(CatalogError::registry_read)?
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect();

        Ok(names
            .into_iter()
            .map(|name| {
                let record = records.remove(&name);
                IndexSummary {
                    tracked: record.is_some(),
                    name,
                    record,
                }
            })
            .collect())
    }

    /// The registry row for `name`.
    pub fn get_index(&self, name: &str) -> Result<IndexRecord, CatalogError> {
        self.registry
            .get_by_name(name)
            .map_err(CatalogError::registry_read)
    }

    /// Create an index in the engine, then record it in the registry.
    ///
    /// If the registry insert fails the engine index is left in place and
    /// `RegistryWrite` is returned; the next reconciliation pass registers it.
    /// An index whose engine id cannot be read back is recorded without one.
    pub async fn create_index(
        &self,
        name: &str,
        description: &str,
    ) -> Result<IndexRecord, CatalogError> {
        validate_index_name(name)?;
        let _guards = self.lock(vec![index_key(name)]).await;

        match self.registry.get_by_name(name) {
            Ok(_) => {
                return Err(CatalogError::Conflict(format!(
                    "index '{}' is already tracked",
                    name
                )))
            }
            Err(RegistryError::NotFound(_)) => {}
            Err(e) => return Err(CatalogError::registry_read(e)),
        }

        let engine_id = match self.engine.create(name).await {
            Ok(engine_id) => Some(engine_id),
            Err(EngineError::CreatedWithoutId { reason, .. }) => {
                warn!(
                    index = %name,
                    error = %reason,
                    "Engine index created without a readable id; reconciliation will fill it in"
                );
                None
            }
            Err(e) => {
                debug!(index = %name, error = %e, "Engine create failed");
                return Err(e.into());
            }
        };

        let mut new_record = NewIndexRecord::new(name, description);
        if let Some(engine_id) = &engine_id {
            new_record = new_record.with_engine_id(engine_id);
        }
        let record = self.registry.insert(new_record).map_err(|e| {
            error!(
                index = %name,
                engine_id = ?engine_id,
                error = %e,
                "Registry insert failed after engine create; reconciliation will register the index"
            );
            CatalogError::RegistryWrite(e.to_string())
        })?;

        info!(index = %name, id = %record.id, engine_id = ?record.engine_id, "Created index");
        Ok(record)
    }

    /// Delete the engine index, then its registry row.
    pub async fn delete_index(&self, name: &str) -> Result<(), CatalogError> {
        validate_index_name(name)?;
        let _guards = self.lock(vec![index_key(name)]).await;

        if !self.engine.exists(name).await? {
            return Err(CatalogError::NotFound(format!("index '{}'", name)));
        }
        self.engine.delete(name).await?;

        match self.registry.delete_by_name(name) {
            Ok(()) => {}
            Err(RegistryError::NotFound(_)) => {
                warn!(index = %name, "Deleted engine index had no registry row");
            }
            Err(e) => {
                error!(index = %name, error = %e, "Registry delete failed after engine delete");
                return Err(CatalogError::partial(
                    LifecycleStep::EngineDelete,
                    LifecycleStep::RegistryDelete,
                    e,
                ));
            }
        }

        info!(index = %name, "Deleted index");
        Ok(())
    }

    /// Update the description and/or move an alias onto this index.
    ///
    /// An alias already held elsewhere is revoked from its holders first.
    pub async fn update_index(
        &self,
        name: &str,
        description: Option<&str>,
        alias: Option<&str>,
    ) -> Result<IndexRecord, CatalogError> {
        if description.is_none() && alias.is_none() {
            return Err(CatalogError::Validation(
                "at least one of description or alias is required".to_string(),
            ));
        }
        validate_index_name(name)?;
        if let Some(alias) = alias {
            validate_alias(alias)?;
        }

        let mut keys = vec![index_key(name)];
        if let Some(alias) = alias {
            keys.push(alias_key(alias));
        }
        let _guards = self.lock(keys).await;

        if !self.engine.exists(name).await? {
            return Err(CatalogError::NotFound(format!("index '{}'", name)));
        }
        match self.registry.get_by_name(name) {
            Ok(_) => {}
            Err(RegistryError::NotFound(_)) => {
                return Err(CatalogError::Conflict(format!(
                    "index '{}' exists in the engine but is not tracked; reconcile first",
                    name
                )))
            }
            Err(e) => return Err(CatalogError::registry_read(e)),
        }

        let mut update = RecordUpdate::new();
        if let Some(description) = description {
            update = update.description(description);
        }

        let Some(alias) = alias else {
            let record = self
                .registry
                .update_by_name(name, update)
                .map_err(CatalogError::registry_write)?;
            info!(index = %name, "Updated index description");
            return Ok(record);
        };

        let engine_changed = self.move_alias(name, alias).await?;

        let record = self
            .registry
            .update_by_name(name, update.alias(alias))
            .map_err(|e| {
                if engine_changed {
                    error!(index = %name, alias = %alias, error = %e, "Registry update failed after alias change");
                    CatalogError::partial(LifecycleStep::AliasGrant, LifecycleStep::RegistryUpdate, e)
                } else {
                    CatalogError::registry_write(e)
                }
            })?;

        info!(index = %name, alias = %alias, "Updated index alias");
        Ok(record)
    }

    /// Engine side of an alias move. Returns whether the engine changed.
    async fn move_alias(&self, name: &str, alias: &str) -> Result<bool, CatalogError> {
        if self.engine.exists(alias).await? {
            return Err(CatalogError::Conflict(format!(
                "alias '{}' is the name of an existing index",
                alias
            )));
        }

        let holders = self.engine.indices_for_alias(alias).await?;
        let current = self.engine.list_aliases_for(name).await?;
        let mut changed = false;

        // Revoke from previous holders.
        for holder in holders.iter().filter(|h| h.as_str() != name) {
            self.engine
                .delete_alias(holder, alias)
                .await
                .map_err(|e| step_failure(changed, LifecycleStep::AliasRevoke, e))?;
            changed = true;
            info!(alias = %alias, previous = %holder, "Revoked alias");
        }
        for record in self
            .registry
            .find_by_alias(alias)
            .map_err(|e| registry_step_failure(changed, e))?
        {
            if record.name != name {
                self.registry
                    .update_by_name(&record.name, RecordUpdate::new().clear_alias())
                    .map_err(|e| registry_step_failure(changed, e))?;
                debug!(index = %record.name, alias = %alias, "Cleared alias on registry row");
            }
        }

        // Drop this index's other aliases.
        for old in current.iter().filter(|a| a.as_str() != alias) {
            self.engine
                .delete_alias(name, old)
                .await
                .map_err(|e| step_failure(changed, LifecycleStep::AliasRevoke, e))?;
            changed = true;
            debug!(index = %name, alias = %old, "Removed previous alias");
        }

        if !current.contains(alias) {
            self.engine
                .create_alias(name, alias)
                .await
                .map_err(|e| step_failure(changed, LifecycleStep::AliasGrant, e))?;
            changed = true;
        }

        Ok(changed)
    }

    /// Single-field match against a live index or alias.
    pub async fn search_index(
        &self,
        name: &str,
        field: &str,
        query: &str,
        page: Option<Page>,
    ) -> Result<SearchResults, CatalogError> {
        if field.trim().is_empty() {
            return Err(CatalogError::Validation("field must not be empty".to_string()));
        }
        if query.trim().is_empty() {
            return Err(CatalogError::Validation("query must not be empty".to_string()));
        }
        let page = page.unwrap_or_default();
        page.validate()?;

        self.require_live(name).await?;

        let request = SearchRequest::new(SearchQuery::single_field(field, query)).with_page(page);
        Ok(self.engine.search(name, &request).await?)
    }

    /// Remove a registry row whose engine index no longer exists.
    pub async fn forget_index(&self, name: &str) -> Result<(), CatalogError> {
        validate_index_name(name)?;
        let _guards = self.lock(vec![index_key(name)]).await;

        if self.engine.exists(name).await? {
            return Err(CatalogError::Conflict(format!(
                "index '{}' still exists in the engine; delete it instead",
                name
            )));
        }
        self.registry
            .delete_by_name(name)
            .map_err(CatalogError::registry_write)?;

        info!(index = %name, "Forgot orphaned registry row");
        Ok(())
    }
}

/// Guards held for one operation. Lock entries nobody else holds or awaits
/// are removed on release.
struct KeyLocks<'a> {
    map: &'a DashMap<String, Arc<Mutex<()>>>,
    keys: Vec<String>,
    guards: Vec<OwnedMutexGuard<()>>,
}

impl Drop for KeyLocks<'_> {
    fn drop(&mut self) {
        self.guards.clear();
        for key in &self.keys {
            self.map.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
        }
    }
}

fn index_key(name: &str) -> String {
    format!("index:{}", name)
}

fn alias_key(alias: &str) -> String {
    format!("alias:{}", alias)
}

/// An engine step failed, possibly after earlier steps changed the engine.
fn step_failure(
    changed: bool,
    failed: LifecycleStep,
    err: EngineError,
) -> CatalogError {
    if changed {
        CatalogError::partial(LifecycleStep::AliasRevoke, failed, err)
    } else {
        CatalogError::from(err)
    }
}

fn registry_step_failure(changed: bool, err: RegistryError) -> CatalogError {
    if changed {
        CatalogError::partial(LifecycleStep::AliasRevoke, LifecycleStep::RegistryUpdate, err)
    } else {
        CatalogError::registry_write(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_engine::InMemoryEngine;
    use catalog_registry::RocksRegistry;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        engine: Arc<InMemoryEngine>,
        registry: Arc<RocksRegistry>,
        coordinator: IndexLifecycleCoordinator,
        _temp: TempDir,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let engine = Arc::new(InMemoryEngine::new());
        let registry = Arc::new(RocksRegistry::open(temp.path()).unwrap());
        let coordinator = IndexLifecycleCoordinator::new(engine.clone(), registry.clone());
        Fixture {
            engine,
            registry,
            coordinator,
            _temp: temp,
        }
    }

    #[tokio::test]
    async fn test_create_records_engine_id() {
        let f = fixture();
        let record = f.coordinator.create_index("plants", "Plant taxonomy").await.unwrap();

        assert_eq!(record.name, "plants");
        assert_eq!(record.description, "Plant taxonomy");
        assert_eq!(
            record.engine_id,
            Some(f.engine.get_engine_id("plants").await.unwrap())
        );
        assert_eq!(f.registry.get_by_name("plants").unwrap(), record);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_name_without_io() {
        let f = fixture();
        let err = f.coordinator.create_index("Bad Name", "x").await.unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
        assert_eq!(f.engine.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_create_conflicts_with_untracked_engine_index() {
        let f = fixture();
        f.engine.seed_index("plants");
        let err = f.coordinator.create_index("plants", "x").await.unwrap_err();
        assert!(matches!(err, CatalogError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_delete_removes_both_sides() {
        let f = fixture();
        f.coordinator.create_index("neem", "x").await.unwrap();
        f.coordinator.delete_index("neem").await.unwrap();

        assert!(!f.engine.exists("neem").await.unwrap());
        assert!(matches!(
            f.registry.get_by_name("neem"),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let f = fixture();
        let err = f.coordinator.delete_index("ghost").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(f.engine.call_count("delete"), 0);
    }

    #[tokio::test]
    async fn test_delete_untracked_engine_index() {
        let f = fixture();
        f.engine.seed_index("stray");
        f.coordinator.delete_index("stray").await.unwrap();
        assert!(!f.engine.exists("stray").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_description_only() {
        let f = fixture();
        f.coordinator.create_index("amla", "old").await.unwrap();

        let record = f
            .coordinator
            .update_index("amla", Some("Indian gooseberry"), None)
            .await
            .unwrap();
        assert_eq!(record.description, "Indian gooseberry");
        assert_eq!(f.engine.call_count("create_alias"), 0);
    }

    #[tokio::test]
    async fn test_update_requires_a_field() {
        let f = fixture();
        let err = f.coordinator.update_index("amla", None, None).await.unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
        assert_eq!(f.engine.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_alias_replaces_previous_alias() {
        let f = fixture();
        f.coordinator.create_index("tulsi", "x").await.unwrap();
        f.coordinator.update_index("tulsi", None, Some("basil")).await.unwrap();
        f.coordinator
            .update_index("tulsi", None, Some("holy-basil"))
            .await
            .unwrap();

        let aliases = f.engine.list_aliases_for("tulsi").await.unwrap();
        assert_eq!(aliases.into_iter().collect::<Vec<_>>(), vec!["holy-basil"]);
        assert_eq!(
            f.registry.get_by_name("tulsi").unwrap().alias.as_deref(),
            Some("holy-basil")
        );
    }

    #[tokio::test]
    async fn test_alias_moves_between_indices() {
        let f = fixture();
        f.coordinator.create_index("a", "x").await.unwrap();
        f.coordinator.create_index("b", "x").await.unwrap();

        f.coordinator.update_index("a", None, Some("x")).await.unwrap();
        f.coordinator.update_index("b", None, Some("x")).await.unwrap();

        let holders = f.engine.indices_for_alias("x").await.unwrap();
        assert_eq!(holders.into_iter().collect::<Vec<_>>(), vec!["b"]);
        assert!(f.engine.list_aliases_for("a").await.unwrap().is_empty());
        assert_eq!(f.registry.get_by_name("a").unwrap().alias, None);
        assert_eq!(f.registry.get_by_name("b").unwrap().alias.as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn test_alias_equal_to_index_name_conflicts() {
        let f = fixture();
        f.coordinator.create_index("a", "x").await.unwrap();
        f.coordinator.create_index("b", "x").await.unwrap();

        let err = f.coordinator.update_index("a", None, Some("b")).await.unwrap_err();
        assert!(matches!(err, CatalogError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_reapplying_alias_changes_nothing_in_engine() {
        let f = fixture();
        f.coordinator.create_index("a", "x").await.unwrap();
        f.coordinator.update_index("a", None, Some("x")).await.unwrap();
        f.engine.reset_calls();

        f.coordinator.update_index("a", Some("new"), Some("x")).await.unwrap();
        assert_eq!(f.engine.call_count("create_alias"), 0);
        assert_eq!(f.engine.call_count("delete_alias"), 0);
    }

    #[tokio::test]
    async fn test_grant_failure_after_revoke_is_partial() {
        let f = fixture();
        f.coordinator.create_index("a", "x").await.unwrap();
        f.coordinator.create_index("b", "x").await.unwrap();
        f.coordinator.update_index("a", None, Some("x")).await.unwrap();

        f.engine.fail_operation("create_alias");
        let err = f.coordinator.update_index("b", None, Some("x")).await.unwrap_err();
        assert!(matches!(
            err,
            CatalogError::PartialFailure {
                completed: LifecycleStep::AliasRevoke,
                failed: LifecycleStep::AliasGrant,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_search_missing_issues_no_search() {
        let f = fixture();
        let err = f
            .coordinator
            .search_index("missing", "field", "query", None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(f.engine.call_count("search"), 0);
    }

    #[tokio::test]
    async fn test_search_through_alias() {
        let f = fixture();
        f.coordinator.create_index("plants", "x").await.unwrap();
        f.coordinator.update_index("plants", None, Some("herbs")).await.unwrap();
        f.engine
            .index_document(
                "plants",
                Some("1"),
                &serde_json::json!({ "generic_name": "Holy Basil" }),
            )
            .await
            .unwrap();

        let results = f
            .coordinator
            .search_index("herbs", "generic_name", "basil", None)
            .await
            .unwrap();
        assert_eq!(results.total, 1);
        assert_eq!(results.hits[0].index, "plants");
    }

    #[tokio::test]
    async fn test_list_marks_untracked() {
        let f = fixture();
        f.coordinator.create_index("tracked", "x").await.unwrap();
        f.engine.seed_index("drifted");

        let summaries = f.coordinator.list_indices().await.unwrap();
        let view: Vec<(&str, bool)> = summaries
            .iter()
            .map(|s| (s.name.as_str(), s.tracked))
            .collect();
        assert_eq!(view, vec![("drifted", false), ("tracked", true)]);
    }

    #[tokio::test]
    async fn test_forget_index() {
        let f = fixture();
        f.registry.insert(NewIndexRecord::new("ghost", "gone")).unwrap();
        f.coordinator.create_index("live", "x").await.unwrap();

        let err = f.coordinator.forget_index("live").await.unwrap_err();
        assert!(matches!(err, CatalogError::Conflict(_)));

        f.coordinator.forget_index("ghost").await.unwrap();
        assert!(f.coordinator.get_index("ghost").unwrap_err().is_not_found());
        assert!(f.coordinator.forget_index("ghost").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_wildcard_and_multi_target_names_rejected_without_io() {
        let f = fixture();
        f.engine.seed_index("plants");

        for name in ["*", "_all", "plants,herbs", "pl*"] {
            let err = f.coordinator.delete_index(name).await.unwrap_err();
            assert!(matches!(err, CatalogError::Validation(_)), "{}: {:?}", name, err);
            let err = f.coordinator.forget_index(name).await.unwrap_err();
            assert!(matches!(err, CatalogError::Validation(_)), "{}: {:?}", name, err);
            let err = f
                .coordinator
                .update_index(name, Some("x"), None)
                .await
                .unwrap_err();
            assert!(matches!(err, CatalogError::Validation(_)), "{}: {:?}", name, err);
            let err = f
                .coordinator
                .search_index(name, "field", "query", None)
                .await
                .unwrap_err();
            assert!(matches!(err, CatalogError::Validation(_)), "{}: {:?}", name, err);
        }

        assert_eq!(f.engine.total_calls(), 0);
        assert!(f.engine.exists("plants").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_without_readable_id_records_row_without_id() {
        let f = fixture();
        f.engine.fail_operation("create_id");

        let record = f.coordinator.create_index("plants", "x").await.unwrap();
        assert_eq!(record.engine_id, None);
        assert_eq!(f.registry.get_by_name("plants").unwrap(), record);
        assert!(f.engine.exists("plants").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_untracked_engine_index_conflicts_before_engine_writes() {
        let f = fixture();
        f.engine.seed_index("drifted");

        let err = f
            .coordinator
            .update_index("drifted", Some("x"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Conflict(_)), "got {:?}", err);

        let err = f
            .coordinator
            .update_index("drifted", None, Some("herbs"))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Conflict(_)), "got {:?}", err);
        assert_eq!(f.engine.call_count("create_alias"), 0);
        assert_eq!(f.engine.call_count("delete_alias"), 0);
        assert!(f.engine.list_aliases_for("drifted").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lock_entries_released_after_operations() {
        let f = fixture();
        f.coordinator.create_index("a", "x").await.unwrap();
        f.coordinator.update_index("a", None, Some("herbs")).await.unwrap();
        f.coordinator.delete_index("a").await.unwrap();
        let _ = f.coordinator.delete_index("never-created").await;

        assert!(f.coordinator.locks.is_empty());
    }

    #[tokio::test]
    async fn test_contended_lock_entry_survives_until_last_release() {
        let f = fixture();
        let first = f.coordinator.lock(vec![index_key("a")]).await;

        let coordinator = &f.coordinator;
        let second = async move {
            let _held = coordinator.lock(vec![index_key("a")]).await;
        };
        tokio::pin!(second);
        let waited = tokio::time::timeout(Duration::from_millis(20), second.as_mut()).await;
        assert!(waited.is_err());

        drop(first);
        assert_eq!(f.coordinator.locks.len(), 1);
        second.await;
        assert!(f.coordinator.locks.is_empty());
    }
}
