//! Query and result types shared by gateway implementations.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use catalog_types::Page;

/// Queries the catalog issues against the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SearchQuery {
    MatchAll,
    /// Full-text match on a single field
    Match { field: String, query: String },
    /// Full-text match across several fields
    MultiMatch { query: String, fields: Vec<String> },
}

impl SearchQuery {
    pub fn single_field(field: impl Into<String>, query: impl Into<String>) -> Self {
        SearchQuery::Match {
            field: field.into(),
            query: query.into(),
        }
    }

    /// Query DSL body for the `query` key of an engine request.
    pub fn to_dsl(&self) -> Value {
        match self {
            SearchQuery::MatchAll => json!({ "match_all": {} }),
            SearchQuery::Match { field, query } => json!({ "match": { field.as_str(): query } }),
            SearchQuery::MultiMatch { query, fields } => json!({
                "multi_match": { "query": query, "fields": fields }
            }),
        }
    }
}

/// A query plus its result window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: SearchQuery,
    pub from: u64,
    pub size: u32,
}

impl SearchRequest {
    pub fn new(query: SearchQuery) -> Self {
        Self {
            query,
            from: 0,
            size: 10,
        }
    }

    pub fn with_page(mut self, page: Page) -> Self {
        self.from = page.offset();
        self.size = page.size;
        self
    }

    pub fn to_body(&self) -> Value {
        json!({
            "query": self.query.to_dsl(),
            "from": self.from,
            "size": self.size,
        })
    }
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub index: String,
    pub id: String,
    pub score: Option<f64>,
    pub source: Value,
}

/// Hits for one result window plus the total match count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub total: u64,
    pub hits: Vec<SearchHit>,
}

/// A document as stored in the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub index: String,
    pub id: String,
    pub source: Value,
}
