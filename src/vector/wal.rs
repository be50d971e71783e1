//! On-disk layout of a collection
//!
//! `collection.json` holds the manifest and is replaced atomically (temp file
//! + rename). `records.wal` is append-only; each frame is
//! `[u32 LE payload length][32-byte BLAKE3 of payload][payload]`.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::config::{Distance, VectorStoreConfig};
use super::error::VectorError;

pub(crate) const MANIFEST_FILE: &str = "collection.json";
pub(crate) const WAL_FILE: &str = "records.wal";

const FORMAT_VERSION: u32 = 1;
const LEN_BYTES: usize = 4;
const HASH_BYTES: usize = 32;
const HEADER_BYTES: usize = LEN_BYTES + HASH_BYTES;

/// Upper bound on the JSON text of one vector component
const MAX_COMPONENT_BYTES: usize = 32;
/// Bytes allowed for a record's id and metadata on top of its vector
pub(crate) const MAX_RECORD_OVERHEAD: usize = 256 * 1024;

/// Largest payload a collection of `dimension` will ever write
pub(crate) fn max_payload_len(dimension: usize) -> usize {
    dimension
        .saturating_mul(MAX_COMPONENT_BYTES)
        .saturating_add(MAX_RECORD_OVERHEAD)
}

type WalResult<T> = Result<T, VectorError>;

/// Collection manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Manifest {
    pub format_version: u32,
    pub collection_name: String,
    pub dimension: usize,
    pub distance: Distance,
    pub created_at: String,
}

impl Manifest {
    pub fn for_config(config: &VectorStoreConfig) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            collection_name: config.collection_name.clone(),
            dimension: config.vector_size,
            distance: config.distance,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Read the manifest, `None` if it does not exist
    pub fn load(path: &Path) -> WalResult<Option<Self>> {
        let content = match fs::read(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(VectorError::storage(format!(
                    "cannot read manifest {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let manifest: Manifest = serde_json::from_slice(&content).map_err(|e| {
            VectorError::storage(format!("corrupt manifest {}: {}", path.display(), e))
        })?;

        if manifest.format_version != FORMAT_VERSION {
            return Err(VectorError::storage(format!(
                "unsupported collection format version {}",
                manifest.format_version
            )));
        }

        Ok(Some(manifest))
    }

    /// Write the manifest with an atomic rename
    pub fn save(&self, path: &Path) -> WalResult<()> {
        let content = serde_json::to_vec_pretty(self).map_err(|e| VectorError::SerializationError {
            reason: e.to_string(),
        })?;

        let temp_path = path.with_extension("json.tmp");
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(&content)?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, path)?;
        sync_parent(path);
        Ok(())
    }

    /// Check that this collection can be served with `config`
    pub fn check_compatible(&self, config: &VectorStoreConfig) -> WalResult<()> {
        if self.dimension != config.vector_size {
            return Err(VectorError::storage(format!(
                "collection '{}' stores {}-dimensional vectors, configured for {}",
                self.collection_name, self.dimension, config.vector_size
            )));
        }
        if self.distance != config.distance {
            return Err(VectorError::storage(format!(
                "collection '{}' was built with {} distance, configured for {}",
                self.collection_name, self.distance, config.distance
            )));
        }
        Ok(())
    }
}

/// Payloads recovered from the log
pub(crate) struct Replay {
    pub payloads: Vec<Vec<u8>>,
    /// Length of the log after dropping a torn tail
    pub valid_len: u64,
    pub truncated_bytes: u64,
}

/// Read every complete frame; a torn final frame is cut off
///
/// Frame lengths are bounded by `max_payload`, so a torn tail is never longer
/// than one frame. A bad frame with a valid frame anywhere behind it is
/// corruption, not a torn write, and the log is left as it is.
pub(crate) fn replay(path: &Path, max_payload: usize) -> WalResult<Replay> {
    let mut bytes = Vec::new();
    match File::open(path) {
        Ok(mut file) => {
            file.read_to_end(&mut bytes)?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Replay {
                payloads: Vec::new(),
                valid_len: 0,
                truncated_bytes: 0,
            })
        }
        Err(e) => return Err(VectorError::storage(format!("cannot read {}: {}", path.display(), e))),
    }

    let total = bytes.len();
    let mut offset = 0usize;
    let mut payloads = Vec::new();

    while offset < total {
        let remaining = total - offset;
        if remaining < HEADER_BYTES {
            break;
        }

        let payload_len = frame_len(&bytes[offset..]);
        if payload_len > max_payload {
            return Err(VectorError::storage(format!(
                "invalid frame length {} in {} at offset {} (limit {})",
                payload_len,
                path.display(),
                offset,
                max_payload
            )));
        }

        let frame_end = offset + HEADER_BYTES + payload_len;
        if frame_end > total {
            break;
        }

        let expected_hash = &bytes[offset + LEN_BYTES..offset + HEADER_BYTES];
        let payload = &bytes[offset + HEADER_BYTES..frame_end];
        if blake3::hash(payload).as_bytes() != expected_hash {
            if frame_end == total {
                // Last frame only partially reached the disk.
                break;
            }
            return Err(VectorError::storage(format!(
                "checksum mismatch in {} at offset {}",
                path.display(),
                offset
            )));
        }

        payloads.push(payload.to_vec());
        offset = frame_end;
    }

    let truncated_bytes = (total - offset) as u64;
    if truncated_bytes > 0 {
        if contains_valid_frame(&bytes[offset + 1..], max_payload) {
            return Err(VectorError::storage(format!(
                "unreadable frame in {} at offset {} is followed by further records",
                path.display(),
                offset
            )));
        }

        warn!(
            "Dropping {} byte(s) of torn write at the end of {}",
            truncated_bytes,
            path.display()
        );
        let file = OpenOptions::new().write(true).open(path)?;
        file.set_len(offset as u64)?;
        file.sync_all()?;
    }

    debug!("Replayed {} frame(s) from {}", payloads.len(), path.display());
    Ok(Replay {
        payloads,
        valid_len: offset as u64,
        truncated_bytes,
    })
}

fn frame_len(frame: &[u8]) -> usize {
    let mut len_buf = [0u8; LEN_BYTES];
    len_buf.copy_from_slice(&frame[..LEN_BYTES]);
    u32::from_le_bytes(len_buf) as usize
}

/// Whether a complete, checksummed frame starts anywhere in `bytes`
fn contains_valid_frame(bytes: &[u8], max_payload: usize) -> bool {
    (0..bytes.len()).any(|start| {
        let rest = &bytes[start..];
        if rest.len() < HEADER_BYTES {
            return false;
        }
        let payload_len = frame_len(rest);
        if payload_len > max_payload || HEADER_BYTES + payload_len > rest.len() {
            return false;
        }
        let payload = &rest[HEADER_BYTES..HEADER_BYTES + payload_len];
        blake3::hash(payload).as_bytes() == &rest[LEN_BYTES..HEADER_BYTES]
    })
}

/// Encode one payload as a log frame
pub(crate) fn encode_frame(payload: &[u8], max_payload: usize) -> WalResult<Vec<u8>> {
    let too_large = || VectorError::InvalidArgument {
        reason: format!(
            "record of {} bytes exceeds the {} byte limit",
            payload.len(),
            max_payload
        ),
    };
    if payload.len() > max_payload {
        return Err(too_large());
    }
    let len = u32::try_from(payload.len()).map_err(|_| too_large())?;

    let mut frame = Vec::with_capacity(HEADER_BYTES + payload.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(blake3::hash(payload).as_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Append-only writer; every append is synced before returning
pub(crate) struct WalWriter {
    file: File,
    path: PathBuf,
    len: u64,
    max_payload: usize,
}

impl WalWriter {
    pub fn open(path: &Path, valid_len: u64, max_payload: usize) -> WalResult<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let len = file.metadata()?.len();
        if len != valid_len {
            return Err(VectorError::storage(format!(
                "{} changed while opening ({} bytes, expected {})",
                path.display(),
                len,
                valid_len
            )));
        }
        sync_parent(path);
        Ok(Self {
            file,
            path: path.to_path_buf(),
            len,
            max_payload,
        })
    }

    /// Append a frame and make it durable
    pub fn append(&mut self, payload: &[u8]) -> WalResult<()> {
        let frame = encode_frame(payload, self.max_payload)?;

        let written = self
            .file
            .write_all(&frame)
            .and_then(|_| self.file.sync_data());

        if let Err(e) = written {
            // Never leave a partial frame in front of later appends.
            if let Err(rollback) = self.file.set_len(self.len) {
                warn!("Failed to roll back {}: {}", self.path.display(), rollback);
            }
            return Err(VectorError::storage(format!(
                "failed to persist record to {}: {}",
                self.path.display(),
                e
            )));
        }

        self.len += frame.len() as u64;
        Ok(())
    }

    pub fn len(&self) -> u64 {
        self.len
    }
}

fn sync_parent(path: &Path) {
    #[cfg(unix)]
    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}
