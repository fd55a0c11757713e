//! The engine capability set.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::EngineError;
use crate::query::{SearchQuery, SearchRequest, SearchResults, StoredDocument};

/// Everything the catalog may ask of the search engine.
///
/// Operations touching a nonexistent index fail with `EngineError::NotFound`.
/// Transport failures surface as `Unavailable`, other rejections as
/// `Operation`. Implementations never retry.
#[async_trait]
pub trait EngineGateway: Send + Sync {
    /// True if a concrete index (not an alias) has this name.
    async fn exists(&self, name: &str) -> Result<bool, EngineError>;

    /// Create an index and return the identity the engine assigned to it.
    ///
    /// Fails with `AlreadyExists` when the name is taken, and with
    /// `CreatedWithoutId` when the index now exists but its id could not be read.
    async fn create(&self, name: &str) -> Result<String, EngineError>;

    async fn delete(&self, name: &str) -> Result<(), EngineError>;

    /// The engine's own identity for a concrete index.
    async fn get_engine_id(&self, name: &str) -> Result<String, EngineError>;

    /// Names of all user-visible indices.
    async fn list_index_names(&self) -> Result<BTreeSet<String>, EngineError>;

    async fn create_alias(&self, name: &str, alias: &str) -> Result<(), EngineError>;

    async fn list_aliases_for(&self, name: &str) -> Result<BTreeSet<String>, EngineError>;

    async fn delete_alias(&self, name: &str, alias: &str) -> Result<(), EngineError>;

    /// Indices currently holding `alias`; empty if the alias does not exist.
    async fn indices_for_alias(&self, alias: &str) -> Result<BTreeSet<String>, EngineError>;

    async fn alias_exists(&self, alias: &str) -> Result<bool, EngineError> {
        Ok(!self.indices_for_alias(alias).await?.is_empty())
    }

    async fn alias_or_index_exists(&self, name_or_alias: &str) -> Result<bool, EngineError> {
        Ok(self.exists(name_or_alias).await? || self.alias_exists(name_or_alias).await?)
    }

    /// Index a document, returning its id (generated when `id` is `None`).
    async fn index_document(
        &self,
        name: &str,
        id: Option<&str>,
        document: &Value,
    ) -> Result<String, EngineError>;

    async fn get_document(&self, name: &str, id: &str) -> Result<StoredDocument, EngineError>;

    /// Merge `partial` into an existing document.
    async fn update_document(&self, name: &str, id: &str, partial: &Value)
        -> Result<(), EngineError>;

    async fn delete_document_by_id(&self, name: &str, id: &str) -> Result<(), EngineError>;

    /// Delete every matching document and return how many were removed.
    async fn delete_documents_by_query(
        &self,
        name: &str,
        query: &SearchQuery,
    ) -> Result<u64, EngineError>;

    async fn search(&self, name: &str, request: &SearchRequest)
        -> Result<SearchResults, EngineError>;
}
