//! Persisted form of a retention component.
//!
//! Owners serialize into a JSON object record (the host's equivalent of a
//! compound tag). The component contributes a single field, [`CHUNK_SET_FIELD`],
//! holding packed region keys; the field is omitted when the set is empty.

use chunkhold_core::{RegionKey, RegionSet};
use serde_json::{Map, Value};

use crate::RecordError;

/// Field name carrying the packed retained set.
pub const CHUNK_SET_FIELD: &str = "chunk_set";

/// Object record an owner persists its components into.
pub type TileRecord = Map<String, Value>;

/// Retained set as it appears on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionRecord {
    /// Packed [`RegionKey`]s.
    pub chunk_set: Vec<i64>,
}

impl RetentionRecord {
    /// Capture a region set.
    pub fn from_regions(regions: &RegionSet) -> Self {
        Self {
            chunk_set: regions.to_packed(),
        }
    }

    /// Decoded regions (duplicates collapse).
    pub fn regions(&self) -> RegionSet {
        RegionSet::from_packed(&self.chunk_set)
    }

    /// Write the field into `record`, removing it when the set is empty.
    pub fn write_into(&self, record: &mut TileRecord) {
        if self.chunk_set.is_empty() {
            record.remove(CHUNK_SET_FIELD);
        } else {
            let values = self.chunk_set.iter().copied().map(Value::from).collect();
            record.insert(CHUNK_SET_FIELD.to_string(), Value::Array(values));
        }
    }

    /// Read the field from `record`. A missing field is an empty set.
    pub fn read_from(record: &TileRecord) -> Result<Self, RecordError> {
        let Some(value) = record.get(CHUNK_SET_FIELD) else {
            return Ok(Self::default());
        };
        let entries = value.as_array().ok_or(RecordError::NotAnArray)?;
        let chunk_set = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| entry.as_i64().ok_or(RecordError::NotAnInteger { index }))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { chunk_set })
    }
}

impl FromIterator<RegionKey> for RetentionRecord {
    fn from_iter<I: IntoIterator<Item = RegionKey>>(iter: I) -> Self {
        Self {
            chunk_set: iter.into_iter().map(RegionKey::pack).collect(),
        }
    }
}
