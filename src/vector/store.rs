//! VectorStore: durable collection with exact nearest-neighbor search
//!
//! Records live in memory for querying and in an append-only log for
//! durability. Inserts are serialized by the collection write lock and are
//! synced to disk before they become visible.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::config::{Distance, VectorStoreConfig};
use super::error::VectorError;
use super::record::{AssetRecord, InsertOutcome, Metadata, MetadataValue, QueryMatch, QueryResult};
use super::wal::{self, Manifest, WalWriter, MANIFEST_FILE, WAL_FILE};

/// Result type for vector operations
pub type VectorResult<T> = Result<T, VectorError>;

struct IndexedRecord {
    record: AssetRecord,
    norm: f32,
}

#[derive(Default)]
struct Collection {
    /// Insertion order
    records: Vec<IndexedRecord>,
    positions: HashMap<String, usize>,
}

impl Collection {
    fn push(&mut self, record: AssetRecord) {
        let norm = l2_norm(&record.vector);
        self.positions.insert(record.id.clone(), self.records.len());
        self.records.push(IndexedRecord { record, norm });
    }

    fn get(&self, id: &str) -> Option<&IndexedRecord> {
        self.positions.get(id).map(|&pos| &self.records[pos])
    }
}

/// Durable vector index over asset images
pub struct VectorStore {
    config: VectorStoreConfig,
    storage_path: PathBuf,
    collection: RwLock<Collection>,
    wal: Arc<Mutex<WalWriter>>,
}

impl VectorStore {
    /// Open the collection at `config.storage_path`, creating it if absent
    ///
    /// Existing records are replayed from the log; nothing is re-embedded.
    pub async fn open(config: VectorStoreConfig) -> VectorResult<Self> {
        if config.vector_size == 0 {
            return Err(VectorError::InvalidArgument {
                reason: "vector size must be positive".to_string(),
            });
        }

        let storage_path = config.storage_path.clone();
        info!(
            "Opening VectorStore at {:?} with collection '{}'",
            storage_path, config.collection_name
        );

        let blocking_config = config.clone();
        let (collection, writer) =
            tokio::task::spawn_blocking(move || Self::open_blocking(&blocking_config))
                .await
                .map_err(|e| VectorError::storage(format!("Task join error: {}", e)))??;

        info!(
            "VectorStore ready: {} record(s), dimension {}, {} distance",
            collection.records.len(),
            config.vector_size,
            config.distance
        );

        Ok(Self {
            config,
            storage_path,
            collection: RwLock::new(collection),
            wal: Arc::new(Mutex::new(writer)),
        })
    }

    fn open_blocking(config: &VectorStoreConfig) -> VectorResult<(Collection, WalWriter)> {
        let storage_path = &config.storage_path;
        std::fs::create_dir_all(storage_path).map_err(|e| {
            VectorError::storage(format!(
                "cannot create storage directory {}: {}",
                storage_path.display(),
                e
            ))
        })?;

        let manifest_path = storage_path.join(MANIFEST_FILE);
        let wal_path = storage_path.join(WAL_FILE);

        match Manifest::load(&manifest_path)? {
            Some(manifest) => manifest.check_compatible(config)?,
            None => {
                let has_records = std::fs::metadata(&wal_path)
                    .map(|m| m.len() > 0)
                    .unwrap_or(false);
                if has_records {
                    return Err(VectorError::storage(format!(
                        "{} exists without {}",
                        wal_path.display(),
                        MANIFEST_FILE
                    )));
                }
                Manifest::for_config(config).save(&manifest_path)?;
                debug!("Created collection manifest at {:?}", manifest_path);
            }
        }

        let max_payload = wal::max_payload_len(config.vector_size);
        let replay = wal::replay(&wal_path, max_payload)?;
        if replay.truncated_bytes > 0 {
            warn!(
                "Recovered collection after unclean shutdown ({} byte(s) discarded)",
                replay.truncated_bytes
            );
        }

        let mut collection = Collection::default();
        for (index, payload) in replay.payloads.iter().enumerate() {
            let record: AssetRecord = serde_json::from_slice(payload).map_err(|e| {
                VectorError::storage(format!("corrupt record #{} in log: {}", index, e))
            })?;

            if record.vector.len() != config.vector_size {
                return Err(VectorError::storage(format!(
                    "record '{}' has {} dimensions, collection has {}",
                    record.id,
                    record.vector.len(),
                    config.vector_size
                )));
            }

            if collection.positions.contains_key(&record.id) {
                warn!("Ignoring repeated id '{}' in log", record.id);
                continue;
            }
            collection.push(record);
        }

        let writer = WalWriter::open(&wal_path, replay.valid_len, max_payload)?;
        debug!("Write-ahead log at {} bytes", writer.len());
        Ok((collection, writer))
    }

    /// Get the configuration
    pub fn config(&self) -> &VectorStoreConfig {
        &self.config
    }

    /// Get the storage path
    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    /// Vector dimension accepted by this collection
    pub fn dimension(&self) -> usize {
        self.config.vector_size
    }

    /// Distance metric used for every query
    pub fn distance(&self) -> Distance {
        self.config.distance
    }

    /// Number of distinct ids in the collection
    pub async fn count(&self) -> usize {
        self.collection.read().await.records.len()
    }

    /// Check if an id exists
    pub async fn contains(&self, id: &str) -> bool {
        self.collection.read().await.positions.contains_key(id)
    }

    /// Get a stored record by id
    pub async fn get(&self, id: &str) -> Option<AssetRecord> {
        self.collection.read().await.get(id).map(|r| r.record.clone())
    }
}

// ============================================================================
// Insert and query
// ============================================================================

impl VectorStore {
    /// Insert a record, skipping ids that already exist
    ///
    /// A new record is synced to the log before it becomes visible and before
    /// this returns. An existing id is left untouched and reported as
    /// `InsertOutcome::AlreadyExists` with the unchanged count.
    pub async fn insert(
        &self,
        id: impl Into<String>,
        vector: Vec<f32>,
        metadata: Metadata,
    ) -> VectorResult<InsertOutcome> {
        let id = id.into();
        self.validate_vector(&vector)?;
        validate_metadata(&metadata)?;
        if id.is_empty() {
            return Err(VectorError::InvalidArgument {
                reason: "id must not be empty".to_string(),
            });
        }

        let mut collection = self.collection.write().await;
        if collection.positions.contains_key(&id) {
            debug!("Skipping insert of existing id '{}'", id);
            return Ok(InsertOutcome::AlreadyExists {
                total: collection.records.len(),
            });
        }

        let record = AssetRecord {
            id,
            vector,
            metadata,
        };
        let payload = serde_json::to_vec(&record).map_err(|e| VectorError::SerializationError {
            reason: e.to_string(),
        })?;

        let wal = self.wal.clone();
        tokio::task::spawn_blocking(move || wal.lock().append(&payload))
            .await
            .map_err(|e| VectorError::storage(format!("Task join error: {}", e)))??;

        debug!("Inserted record '{}'", record.id);
        collection.push(record);
        Ok(InsertOutcome::Inserted {
            total: collection.records.len(),
        })
    }

    /// Return the `k` records nearest to `vector`
    ///
    /// Ordered by ascending distance; equal distances keep insertion order.
    pub async fn query(&self, vector: &[f32], k: usize) -> VectorResult<QueryResult> {
        self.validate_vector(vector)?;
        if k == 0 {
            return Err(VectorError::InvalidArgument {
                reason: "k must be positive".to_string(),
            });
        }

        let collection = self.collection.read().await;
        if collection.records.is_empty() {
            return Ok(QueryResult::default());
        }

        let query_norm = l2_norm(vector);
        let distance = self.config.distance;

        let mut scored: Vec<(usize, f32)> = collection
            .records
            .iter()
            .enumerate()
            .map(|(pos, stored)| {
                let d = distance.between(vector, query_norm, &stored.record.vector, stored.norm);
                (pos, d)
            })
            .collect();

        let by_distance = |a: &(usize, f32), b: &(usize, f32)| -> Ordering {
            a.1.total_cmp(&b.1).then(a.0.cmp(&b.0))
        };

        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, by_distance);
            scored.truncate(k);
        }
        scored.sort_unstable_by(by_distance);

        let matches = scored
            .into_iter()
            .map(|(pos, d)| {
                let record = &collection.records[pos].record;
                QueryMatch {
                    id: record.id.clone(),
                    distance: d,
                    metadata: record.metadata.clone(),
                }
            })
            .collect::<Vec<_>>();

        debug!("Query returned {} result(s) (k: {})", matches.len(), k);
        Ok(QueryResult::new(matches))
    }
}

// ============================================================================
// Helper Methods
// ============================================================================

impl VectorStore {
    /// Validate that a vector has the collection dimension and finite components
    fn validate_vector(&self, vector: &[f32]) -> VectorResult<()> {
        let expected = self.config.vector_size;
        if vector.len() != expected {
            return Err(VectorError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }

        if vector.iter().any(|x| !x.is_finite()) {
            return Err(VectorError::InvalidArgument {
                reason: "vector contains non-finite values".to_string(),
            });
        }

        Ok(())
    }
}

/// JSON has no encoding for NaN or infinity; such a value would not replay
fn validate_metadata(metadata: &Metadata) -> VectorResult<()> {
    for (key, value) in metadata {
        if let MetadataValue::Float(f) = value {
            if !f.is_finite() {
                return Err(VectorError::InvalidArgument {
                    reason: format!("metadata '{}' is not a finite number", key),
                });
            }
        }
    }
    Ok(())
}

fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|x| x * x).sum::<f32>().sqrt()
}
