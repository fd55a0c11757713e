//! In-process engine for tests.
//!
//! Keeps indices, aliases and documents in memory, assigns fresh ULIDs as
//! engine identities, counts every gateway call by operation name, and can
//! be told to fail specific operations or to appear unreachable.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use ulid::Ulid;

use crate::error::EngineError;
use crate::gateway::EngineGateway;
use crate::query::{SearchHit, SearchQuery, SearchRequest, SearchResults, StoredDocument};

#[derive(Debug, Default)]
struct MemoryIndex {
    engine_id: String,
    documents: BTreeMap<String, Value>,
}

#[derive(Debug, Default)]
struct MemoryState {
    indices: BTreeMap<String, MemoryIndex>,
    /// alias -> indices holding it
    aliases: BTreeMap<String, BTreeSet<String>>,
}

impl MemoryState {
    /// Resolve a name or alias to concrete index names.
    fn resolve(&self, name: &str) -> Result<Vec<String>, EngineError> {
        if self.indices.contains_key(name) {
            return Ok(vec![name.to_string()]);
        }
        match self.aliases.get(name) {
            Some(targets) if !targets.is_empty() => Ok(targets.iter().cloned().collect()),
            _ => Err(EngineError::NotFound(format!("index '{}'", name))),
        }
    }

    /// Resolve to exactly one index for writes.
    fn resolve_write(&self, name: &str, operation: &str) -> Result<String, EngineError> {
        let mut targets = self.resolve(name)?;
        if targets.len() > 1 {
            return Err(EngineError::operation(
                operation,
                format!("alias '{}' points to more than one index", name),
            ));
        }
        Ok(targets.remove(0))
    }

    fn index_mut(&mut self, name: &str) -> Result<&mut MemoryIndex, EngineError> {
        self.indices
            .get_mut(name)
            .ok_or_else(|| EngineError::NotFound(format!("index '{}'", name)))
    }
}

/// In-memory `EngineGateway`.
#[derive(Debug, Default)]
pub struct InMemoryEngine {
    state: Mutex<MemoryState>,
    calls: Mutex<BTreeMap<&'static str, usize>>,
    failing: Mutex<BTreeSet<&'static str>>,
    unavailable: AtomicBool,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine that already holds the given indices.
    pub fn with_indices(names: &[&str]) -> Self {
        let engine = Self::new();
        for name in names {
            engine.seed_index(name);
        }
        engine
    }

    /// Create an index directly, bypassing call counting. Returns its id.
    pub fn seed_index(&self, name: &str) -> String {
        let engine_id = Ulid::new().to_string();
        if let Ok(mut state) = self.state.lock() {
            state.indices.insert(
                name.to_string(),
                MemoryIndex {
                    engine_id: engine_id.clone(),
                    documents: BTreeMap::new(),
                },
            );
        }
        engine_id
    }

    /// Number of calls made to `operation` (e.g. "search", "create").
    pub fn call_count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.get(operation).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Total number of gateway calls made.
    pub fn total_calls(&self) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.values().sum())
            .unwrap_or(0)
    }

    pub fn reset_calls(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    /// Make every call to `operation` fail with an `Operation` error.
    ///
    /// `"create_id"` instead makes `create` succeed but report that the new
    /// index's id could not be read.
    pub fn fail_operation(&self, operation: &'static str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(operation);
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.clear();
        }
    }

    /// Make every call fail with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn is_failing(&self, operation: &str) -> bool {
        self.failing
            .lock()
            .map(|f| f.contains(operation))
            .unwrap_or(false)
    }

    fn enter(&self, operation: &'static str) -> Result<MutexGuard<'_, MemoryState>, EngineError> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(operation).or_insert(0) += 1;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(EngineError::Unavailable("connection refused".to_string()));
        }
        if self.is_failing(operation) {
            return Err(EngineError::operation(operation, "injected failure"));
        }
        self.state
            .lock()
            .map_err(|_| EngineError::Unavailable("engine state poisoned".to_string()))
    }
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Collect the text of a (possibly dotted) field path.
fn field_text(source: &Value, field: &str) -> String {
    let mut current = source;
    for part in field.split('.') {
        match current.get(part) {
            Some(next) => current = next,
            None => return String::new(),
        }
    }
    match current {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Count of query tokens found in the field; zero means no match.
fn match_score(source: &Value, field: &str, query: &str) -> usize {
    let field_tokens: BTreeSet<String> = tokens(&field_text(source, field)).into_iter().collect();
    tokens(query)
        .iter()
        .filter(|t| field_tokens.contains(*t))
        .count()
}

fn score(source: &Value, query: &SearchQuery) -> Option<f64> {
    let matched = match query {
        SearchQuery::MatchAll => return Some(1.0),
        SearchQuery::Match { field, query } => match_score(source, field, query),
        SearchQuery::MultiMatch { query, fields } => fields
            .iter()
            .map(|field| match_score(source, field, query))
            .sum(),
    };
    (matched > 0).then_some(matched as f64)
}

/// Recursive object merge, matching partial-update semantics.
fn merge(target: &mut Value, partial: &Value) {
    match (target, partial) {
        (Value::Object(target), Value::Object(partial)) => {
            for (key, value) in partial {
                merge(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (target, partial) => *target = partial.clone(),
    }
}

#[async_trait]
impl EngineGateway for InMemoryEngine {
    async fn exists(&self, name: &str) -> Result<bool, EngineError> {
        let state = self.enter("exists")?;
        Ok(state.indices.contains_key(name))
    }

    async fn create(&self, name: &str) -> Result<String, EngineError> {
        let mut state = self.enter("create")?;
        if state.indices.contains_key(name) || state.aliases.contains_key(name) {
            return Err(EngineError::AlreadyExists(format!("index '{}'", name)));
        }
        let engine_id = Ulid::new().to_string();
        state.indices.insert(
            name.to_string(),
            MemoryIndex {
                engine_id: engine_id.clone(),
                documents: BTreeMap::new(),
            },
        );
        if self.is_failing("create_id") {
            return Err(EngineError::CreatedWithoutId {
                index: name.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        Ok(engine_id)
    }

    async fn delete(&self, name: &str) -> Result<(), EngineError> {
        let mut state = self.enter("delete")?;
        if state.indices.remove(name).is_none() {
            return Err(EngineError::NotFound(format!("index '{}'", name)));
        }
        for holders in state.aliases.values_mut() {
            holders.remove(name);
        }
        state.aliases.retain(|_, holders| !holders.is_empty());
        Ok(())
    }

    async fn get_engine_id(&self, name: &str) -> Result<String, EngineError> {
        let state = self.enter("get_engine_id")?;
        state
            .indices
            .get(name)
            .map(|index| index.engine_id.clone())
            .ok_or_else(|| EngineError::NotFound(format!("index '{}'", name)))
    }

    async fn list_index_names(&self) -> Result<BTreeSet<String>, EngineError> {
        let state = self.enter("list_index_names")?;
        Ok(state.indices.keys().cloned().collect())
    }

    async fn create_alias(&self, name: &str, alias: &str) -> Result<(), EngineError> {
        let mut state = self.enter("create_alias")?;
        if !state.indices.contains_key(name) {
            return Err(EngineError::NotFound(format!("index '{}'", name)));
        }
        if state.indices.contains_key(alias) {
            return Err(EngineError::operation(
                "create_alias",
                format!("an index named '{}' exists", alias),
            ));
        }
        state
            .aliases
            .entry(alias.to_string())
            .or_default()
            .insert(name.to_string());
        Ok(())
    }

    async fn list_aliases_for(&self, name: &str) -> Result<BTreeSet<String>, EngineError> {
        let state = self.enter("list_aliases_for")?;
        if !state.indices.contains_key(name) {
            return Err(EngineError::NotFound(format!("index '{}'", name)));
        }
        Ok(state
            .aliases
            .iter()
            .filter(|(_, holders)| holders.contains(name))
            .map(|(alias, _)| alias.clone())
            .collect())
    }

    async fn delete_alias(&self, name: &str, alias: &str) -> Result<(), EngineError> {
        let mut state = self.enter("delete_alias")?;
        let removed = state
            .aliases
            .get_mut(alias)
            .map(|holders| holders.remove(name))
            .unwrap_or(false);
        if !removed {
            return Err(EngineError::NotFound(format!(
                "alias '{}' on '{}'",
                alias, name
            )));
        }
        state.aliases.retain(|_, holders| !holders.is_empty());
        Ok(())
    }

    async fn indices_for_alias(&self, alias: &str) -> Result<BTreeSet<String>, EngineError> {
        let state = self.enter("indices_for_alias")?;
        Ok(state.aliases.get(alias).cloned().unwrap_or_default())
    }

    async fn index_document(
        &self,
        name: &str,
        id: Option<&str>,
        document: &Value,
    ) -> Result<String, EngineError> {
        let mut state = self.enter("index_document")?;
        let target = state.resolve_write(name, "index_document")?;
        let id = id
            .map(str::to_string)
            .unwrap_or_else(|| Ulid::new().to_string());
        state
            .index_mut(&target)?
            .documents
            .insert(id.clone(), document.clone());
        Ok(id)
    }

    async fn get_document(&self, name: &str, id: &str) -> Result<StoredDocument, EngineError> {
        let state = self.enter("get_document")?;
        for target in state.resolve(name)? {
            if let Some(source) = state
                .indices
                .get(&target)
                .and_then(|index| index.documents.get(id))
            {
                return Ok(StoredDocument {
                    index: target,
                    id: id.to_string(),
                    source: source.clone(),
                });
            }
        }
        Err(EngineError::NotFound(format!(
            "document '{}' in '{}'",
            id, name
        )))
    }

    async fn update_document(
        &self,
        name: &str,
        id: &str,
        partial: &Value,
    ) -> Result<(), EngineError> {
        let mut state = self.enter("update_document")?;
        let target = state.resolve_write(name, "update_document")?;
        let document = state
            .index_mut(&target)?
            .documents
            .get_mut(id)
            .ok_or_else(|| EngineError::NotFound(format!("document '{}' in '{}'", id, name)))?;
        merge(document, partial);
        Ok(())
    }

    async fn delete_document_by_id(&self, name: &str, id: &str) -> Result<(), EngineError> {
        let mut state = self.enter("delete_document_by_id")?;
        let target = state.resolve_write(name, "delete_document")?;
        state
            .index_mut(&target)?
            .documents
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| EngineError::NotFound(format!("document '{}' in '{}'", id, name)))
    }

    async fn delete_documents_by_query(
        &self,
        name: &str,
        query: &SearchQuery,
    ) -> Result<u64, EngineError> {
        let mut state = self.enter("delete_documents_by_query")?;
        let mut deleted = 0;
        for target in state.resolve(name)? {
            let index = state.index_mut(&target)?;
            let before = index.documents.len();
            index
                .documents
                .retain(|_, source| score(source, query).is_none());
            deleted += (before - index.documents.len()) as u64;
        }
        Ok(deleted)
    }

    async fn search(
        &self,
        name: &str,
        request: &SearchRequest,
    ) -> Result<SearchResults, EngineError> {
        let state = self.enter("search")?;
        let mut hits = Vec::new();
        for target in state.resolve(name)? {
            if let Some(index) = state.indices.get(&target) {
                for (id, source) in &index.documents {
                    if let Some(score) = score(source, &request.query) {
                        hits.push(SearchHit {
                            index: target.clone(),
                            id: id.clone(),
                            score: Some(score),
                            source: source.clone(),
                        });
                    }
                }
            }
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        let total = hits.len() as u64;
        let hits = hits
            .into_iter()
            .skip(request.from as usize)
            .take(request.size as usize)
            .collect();

        Ok(SearchResults { total, hits })
    }
}
