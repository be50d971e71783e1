//! On-disk pool of original asset images
//!
//! Files are named by asset id and written atomically (temp file + rename), so
//! a reader never sees a partially written image. A name that is already
//! present on disk is left untouched.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::error::AssetError;

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Result of saving an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    AlreadyPresent,
}

/// Directory of uploaded images keyed by asset id
#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    /// Open the pool, creating the directory if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, AssetError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check that `name` is a single, plain path component
    pub fn validate_name(name: &str) -> Result<&str, AssetError> {
        let invalid = name.is_empty()
            || name == "."
            || name == ".."
            || name.starts_with(".ip-lens-")
            || name.chars().any(|c| c == '/' || c == '\\' || c == '\0' || c.is_control());

        if invalid {
            return Err(AssetError::InvalidName {
                name: name.to_string(),
            });
        }
        Ok(name)
    }

    /// Path of the asset called `name`
    pub fn path_for(&self, name: &str) -> Result<PathBuf, AssetError> {
        Ok(self.root.join(Self::validate_name(name)?))
    }

    /// Whether an asset file exists
    pub async fn exists(&self, name: &str) -> Result<bool, AssetError> {
        let path = self.path_for(name)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    /// Read the stored bytes of an asset
    pub async fn read(&self, name: &str) -> Result<Vec<u8>, AssetError> {
        let path = self.path_for(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AssetError::NotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(AssetError::Io(e)),
        }
    }

    /// Write `bytes` as `name` unless a file of that name is already present
    pub async fn save(&self, name: &str, bytes: &[u8]) -> Result<SaveOutcome, AssetError> {
        let path = self.path_for(name)?;
        if tokio::fs::try_exists(&path).await? {
            debug!("Asset file {:?} already present", path);
            return Ok(SaveOutcome::AlreadyPresent);
        }

        let temp_path = self.root.join(format!(
            ".ip-lens-{}-{}.tmp",
            std::process::id(),
            TEMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));

        let written = async {
            let mut file = tokio::fs::File::create(&temp_path).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
            tokio::fs::rename(&temp_path, &path).await
        }
        .await;

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(AssetError::Io(e));
        }

        debug!("Saved asset {:?} ({} bytes)", path, bytes.len());
        Ok(SaveOutcome::Saved)
    }
}

/// MIME type for a file name, by extension
pub fn content_type_for(name: &str) -> Option<&'static str> {
    let extension = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}
