//! Registry record types.
//!
//! An `IndexRecord` is the registry's view of one logical index. The registry
//! owns `id`, `created_at` and `updated_at`; the engine owns `engine_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Description written for rows created by reconciliation.
pub fn initialized_description(name: &str) -> String {
    format!("Initialized '{}'", name)
}

/// A registry row describing one logical index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Registry-assigned identity, generated at insert
    pub id: Ulid,

    /// Identity assigned by the engine when the index was created.
    /// `None` until resolved.
    pub engine_id: Option<String>,

    /// Unique, immutable index name
    pub name: String,

    /// Free text description
    pub description: String,

    /// Current alias, if any
    pub alias: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IndexRecord {
    /// Materialize a new row with a fresh identity and timestamps.
    pub fn from_new(new: NewIndexRecord) -> Self {
        let now = Utc::now();
        Self {
            id: Ulid::new(),
            engine_id: new.engine_id,
            name: new.name,
            description: new.description,
            alias: new.alias,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply an update in place, bumping `updated_at`.
    ///
    /// The name and registry identity never change.
    pub fn apply(&mut self, update: &RecordUpdate) {
        if let Some(description) = &update.description {
            self.description = description.clone();
        }
        if let Some(alias) = &update.alias {
            self.alias = alias.clone();
        }
        if let Some(engine_id) = &update.engine_id {
            self.engine_id = Some(engine_id.clone());
        }
        self.updated_at = Utc::now();
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Fields supplied by the caller when inserting a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIndexRecord {
    pub name: String,
    pub description: String,
    pub engine_id: Option<String>,
    pub alias: Option<String>,
}

impl NewIndexRecord {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            engine_id: None,
            alias: None,
        }
    }

    /// Row for an engine index discovered without a registry counterpart.
    pub fn discovered(name: impl Into<String>, engine_id: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            description: initialized_description(&name),
            name,
            engine_id: Some(engine_id.into()),
            alias: None,
        }
    }

    pub fn with_engine_id(mut self, engine_id: impl Into<String>) -> Self {
        self.engine_id = Some(engine_id.into());
        self
    }
}

/// Partial update of a registry row.
///
/// `alias: Some(None)` clears the alias; `alias: None` leaves it alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordUpdate {
    pub description: Option<String>,
    pub alias: Option<Option<String>>,
    pub engine_id: Option<String>,
}

impl RecordUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(Some(alias.into()));
        self
    }

    pub fn clear_alias(mut self) -> Self {
        self.alias = Some(None);
        self
    }

    /// Only reconciliation repairs identity mappings.
    pub fn engine_id(mut self, engine_id: impl Into<String>) -> Self {
        self.engine_id = Some(engine_id.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.alias.is_none() && self.engine_id.is_none()
    }
}

/// One engine index joined with its registry metadata, if tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSummary {
    pub name: String,
    pub tracked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<IndexRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialized_description() {
        assert_eq!(initialized_description("ashwagandha"), "Initialized 'ashwagandha'");
    }

    #[test]
    fn test_discovered_record() {
        let record = IndexRecord::from_new(NewIndexRecord::discovered("tulsi", "uuid-1"));
        assert_eq!(record.name, "tulsi");
        assert_eq!(record.engine_id.as_deref(), Some("uuid-1"));
        assert_eq!(record.description, "Initialized 'tulsi'");
        assert!(record.alias.is_none());
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn test_apply_update() {
        let mut record = IndexRecord::from_new(NewIndexRecord::new("neem", "bitter leaves"));
        let id = record.id;

        record.apply(&RecordUpdate::new().description("azadirachta").alias("margosa"));
        assert_eq!(record.description, "azadirachta");
        assert_eq!(record.alias.as_deref(), Some("margosa"));

        record.apply(&RecordUpdate::new().clear_alias());
        assert!(record.alias.is_none());
        assert_eq!(record.description, "azadirachta");
        assert_eq!(record.id, id);
        assert!(record.updated_at >= record.created_at);
    }

    #[test]
    fn test_empty_update() {
        assert!(RecordUpdate::new().is_empty());
        assert!(!RecordUpdate::new().clear_alias().is_empty());
    }

    #[test]
    fn test_record_bytes() {
        let record = IndexRecord::from_new(NewIndexRecord::new("brahmi", "memory herb"));
        let decoded = IndexRecord::from_bytes(&record.to_bytes().unwrap()).unwrap();
        assert_eq!(record, decoded);
    }
}
