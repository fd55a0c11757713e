//! # catalog-types
//!
//! Shared domain types for the index catalog.
//!
//! - Records: one registry row per logical search index
//! - Names: engine naming rules shared by index names and aliases
//! - Paging: page/size windows for document listing and search
//! - Settings: layered configuration for the daemon

pub mod config;
pub mod error;
pub mod name;
pub mod paging;
pub mod record;

pub use config::{EngineSettings, Settings, StartupSettings};
pub use error::TypesError;
pub use name::{validate_alias, validate_index_name, MAX_NAME_BYTES};
pub use paging::{Page, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use record::{initialized_description, IndexRecord, IndexSummary, NewIndexRecord, RecordUpdate};
