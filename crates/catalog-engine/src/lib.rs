//! # catalog-engine
//!
//! Capability-bounded access to the search engine.
//!
//! The `EngineGateway` trait is the only way the rest of the catalog talks
//! to the engine. It is constructed once per process and injected.
//!
//! ## Implementations
//! - `ElasticsearchGateway`: REST client for an Elasticsearch-compatible engine
//! - `InMemoryEngine`: in-process engine with call counting and fault
//!   injection, used by tests
//!
//! No implementation retries. Retry policy belongs to the caller.

pub mod elasticsearch;
pub mod error;
pub mod gateway;
pub mod memory;
pub mod query;

pub use elasticsearch::{ElasticsearchConfig, ElasticsearchGateway};
pub use error::EngineError;
pub use gateway::EngineGateway;
pub use memory::InMemoryEngine;
pub use query::{SearchHit, SearchQuery, SearchRequest, SearchResults, StoredDocument};
