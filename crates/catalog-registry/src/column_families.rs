//! Column family definitions for RocksDB.
//!
//! - indices: index name -> JSON `IndexRecord`
//! - index_ids: registry id (ULID string) -> index name

use rocksdb::{ColumnFamilyDescriptor, Options};

/// Column family holding registry rows keyed by name
pub const CF_INDICES: &str = "indices";

/// Column family mapping registry ids to names
pub const CF_INDEX_IDS: &str = "index_ids";

/// All column family names
pub const ALL_CF_NAMES: &[&str] = &[CF_INDICES, CF_INDEX_IDS];

/// Build all column family descriptors
pub fn build_cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
    ALL_CF_NAMES
        .iter()
        .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
        .collect()
}
