//! Vector index module
//!
//! Durable storage of (id, vector, metadata) records with exact k-nearest-neighbor
//! retrieval. Records are kept in memory for scanning and persisted to an
//! append-only, checksummed log so they survive crashes and restarts.

mod config;
mod error;
mod record;
mod store;
mod wal;


pub use self::config::{Distance, VectorStoreConfig};
pub use error::VectorError;
pub use record::{
    metadata_fields, AssetRecord, InsertOutcome, Metadata, MetadataValue, QueryMatch, QueryResult,
};
pub use store::{VectorResult, VectorStore};
