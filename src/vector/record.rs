//! Records stored in the collection and the shapes returned from it

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};

/// Scalar metadata value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl MetadataValue {
    /// Borrow as a string, if this is a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Read as an integer, if this is an integer value
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetadataValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::String(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Int(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

/// String-keyed metadata attached to a record
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Payload field names written by the HTTP layer
pub mod metadata_fields {
    /// Original upload filename
    pub const FILENAME: &str = "filename";
    /// Upload timestamp (RFC 3339)
    pub const UPLOAD_TIME: &str = "upload_time";
    /// MIME type of the upload
    pub const CONTENT_TYPE: &str = "content_type";
    /// Size of the original bytes
    pub const SIZE_BYTES: &str = "size_bytes";
}

/// One entry of the collection; never mutated after insertion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub id: String,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Outcome of an insert under the skip-on-duplicate policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record was persisted; `total` includes it
    Inserted { total: usize },
    /// A record with this id already exists and was left untouched
    AlreadyExists { total: usize },
}

impl InsertOutcome {
    /// Record count after the call
    pub fn total(&self) -> usize {
        match self {
            InsertOutcome::Inserted { total } | InsertOutcome::AlreadyExists { total } => *total,
        }
    }

    /// Whether a new record was added
    pub fn was_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted { .. })
    }
}

/// A single nearest-neighbor hit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryMatch {
    pub id: String,
    pub distance: f32,
    pub metadata: Metadata,
}

/// Neighbors ordered by ascending distance, earlier insertions first on ties
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct QueryResult {
    matches: Vec<QueryMatch>,
}

impl QueryResult {
    pub(crate) fn new(matches: Vec<QueryMatch>) -> Self {
        Self { matches }
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QueryMatch> {
        self.matches.iter()
    }

    pub fn first(&self) -> Option<&QueryMatch> {
        self.matches.first()
    }

    /// Ids in result order
    pub fn ids(&self) -> Vec<&str> {
        self.matches.iter().map(|m| m.id.as_str()).collect()
    }

    pub fn into_matches(self) -> Vec<QueryMatch> {
        self.matches
    }
}

impl IntoIterator for QueryResult {
    type Item = QueryMatch;
    type IntoIter = std::vec::IntoIter<QueryMatch>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches.into_iter()
    }
}

impl<'a> IntoIterator for &'a QueryResult {
    type Item = &'a QueryMatch;
    type IntoIter = std::slice::Iter<'a, QueryMatch>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches.iter()
    }
}
