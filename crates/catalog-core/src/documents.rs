//! Document operations scoped to one index or alias.
//!
//! Documents live only in the engine. Each call confirms the target is live
//! through the coordinator so a missing index surfaces as `NotFound`.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use catalog_engine::{EngineGateway, SearchQuery, SearchRequest, SearchResults, StoredDocument};
use catalog_types::Page;

use crate::coordinator::IndexLifecycleCoordinator;
use crate::error::CatalogError;

/// Shortest free-text query accepted by `search_documents`.
pub const MIN_SEARCH_CHARS: usize = 3;

pub struct DocumentAccess {
    coordinator: Arc<IndexLifecycleCoordinator>,
}

impl DocumentAccess {
    pub fn new(coordinator: Arc<IndexLifecycleCoordinator>) -> Self {
        Self { coordinator }
    }

    fn engine(&self) -> &Arc<dyn EngineGateway> {
        self.coordinator.engine()
    }

    /// Index a document, returning its id. Generates one when `id` is `None`.
    pub async fn add_document(
        &self,
        index: &str,
        id: Option<&str>,
        body: &Value,
    ) -> Result<String, CatalogError> {
        require_object(body)?;
        if let Some(id) = id {
            require_id(id)?;
        }
        self.coordinator.require_live(index).await?;

        let id = self.engine().index_document(index, id, body).await?;
        debug!(index = %index, id = %id, "Indexed document");
        Ok(id)
    }

    pub async fn get_document(&self, index: &str, id: &str) -> Result<StoredDocument, CatalogError> {
        require_id(id)?;
        self.coordinator.require_live(index).await?;
        Ok(self.engine().get_document(index, id).await?)
    }

    /// Merge `partial` into an existing document.
    pub async fn update_document(
        &self,
        index: &str,
        id: &str,
        partial: &Value,
    ) -> Result<(), CatalogError> {
        require_id(id)?;
        require_object(partial)?;
        self.coordinator.require_live(index).await?;

        self.engine().update_document(index, id, partial).await?;
        debug!(index = %index, id = %id, "Updated document");
        Ok(())
    }

    pub async fn delete_document(&self, index: &str, id: &str) -> Result<(), CatalogError> {
        require_id(id)?;
        self.coordinator.require_live(index).await?;

        self.engine().delete_document_by_id(index, id).await?;
        debug!(index = %index, id = %id, "Deleted document");
        Ok(())
    }

    /// Delete every matching document; returns the count removed.
    pub async fn delete_documents_by_query(
        &self,
        index: &str,
        query: &SearchQuery,
    ) -> Result<u64, CatalogError> {
        self.coordinator.require_live(index).await?;

        let deleted = self.engine().delete_documents_by_query(index, query).await?;
        debug!(index = %index, deleted, "Deleted documents by query");
        Ok(deleted)
    }

    /// One page of all documents.
    pub async fn list_documents(&self, index: &str, page: Page) -> Result<SearchResults, CatalogError> {
        page.validate()?;
        self.coordinator.require_live(index).await?;

        let request = SearchRequest::new(SearchQuery::MatchAll).with_page(page);
        Ok(self.engine().search(index, &request).await?)
    }

    /// Free-text search over one or more fields.
    pub async fn search_documents(
        &self,
        index: &str,
        text: &str,
        fields: &[String],
        page: Page,
    ) -> Result<SearchResults, CatalogError> {
        let text = text.trim();
        if text.chars().count() < MIN_SEARCH_CHARS {
            return Err(CatalogError::Validation(format!(
                "search text must be at least {} characters",
                MIN_SEARCH_CHARS
            )));
        }
        if fields.is_empty() || fields.iter().any(|f| f.trim().is_empty()) {
            return Err(CatalogError::Validation(
                "at least one non-empty field is required".to_string(),
            ));
        }
        page.validate()?;
        self.coordinator.require_live(index).await?;

        let query = match fields {
            [field] => SearchQuery::single_field(field.as_str(), text),
            _ => SearchQuery::MultiMatch {
                query: text.to_string(),
                fields: fields.to_vec(),
            },
        };
        let request = SearchRequest::new(query).with_page(page);
        Ok(self.engine().search(index, &request).await?)
    }
}

fn require_object(body: &Value) -> Result<(), CatalogError> {
    if body.is_object() {
        Ok(())
    } else {
        Err(CatalogError::Validation(
            "document body must be a JSON object".to_string(),
        ))
    }
}

fn require_id(id: &str) -> Result<(), CatalogError> {
    if id.trim().is_empty() {
        Err(CatalogError::Validation("document id must not be empty".to_string()))
    } else {
        Ok(())
    }
}
