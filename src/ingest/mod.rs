//! Batch ingestion client
//!
//! Walks a folder of images and uploads each one to a running server's
//! `/add-vector` endpoint. The server decides whether a file is new, so a
//! rerun over the same folder only reports skips.

mod config;
mod error;

pub use self::config::IngestConfig;
pub use error::{IngestError, IngestResult};

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use crate::asset::{content_type_for, AddResponse, UPLOAD_FIELD};

/// File extensions picked up from the ingest folder
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Totals for one ingestion run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub attempted: usize,
    pub added: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} attempted, {} added, {} skipped, {} failed",
            self.attempted, self.added, self.skipped, self.failed
        )
    }
}

enum FileOutcome {
    Added,
    Skipped,
    Failed,
}

/// HTTP client that feeds a folder to the server
pub struct Ingestor {
    client: Client,
    config: IngestConfig,
}

impl Ingestor {
    pub fn new(config: IngestConfig) -> IngestResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Image files directly inside `folder`, sorted by name
    pub async fn list_images(folder: &Path) -> IngestResult<Vec<PathBuf>> {
        let is_dir = tokio::fs::metadata(folder)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(IngestError::FolderNotFound {
                path: folder.to_path_buf(),
            });
        }

        let mut images = Vec::new();
        let mut entries = tokio::fs::read_dir(folder).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_file = tokio::fs::metadata(&path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false);
            if is_file && has_image_extension(&path) {
                images.push(path);
            }
        }

        images.sort();
        Ok(images)
    }

    /// Upload every image in `folder`
    ///
    /// Stops at the first connection failure; any other per-file failure is
    /// logged and counted.
    pub async fn run(&self, folder: &Path) -> IngestResult<IngestReport> {
        let files = Self::list_images(folder).await?;
        let url = self.config.add_vector_url();
        info!(
            "Ingesting {} images from {:?} into {}",
            files.len(),
            folder,
            url
        );

        let mut report = IngestReport::default();
        let mut uploads = stream::iter(&files)
            .map(|path| self.upload(&url, path))
            .buffered(self.config.concurrency.max(1));

        while let Some(outcome) = uploads.next().await {
            report.attempted += 1;
            match outcome? {
                FileOutcome::Added => report.added += 1,
                FileOutcome::Skipped => report.skipped += 1,
                FileOutcome::Failed => report.failed += 1,
            }
        }

        info!("Ingestion complete: {}", report);
        Ok(report)
    }

    async fn upload(&self, url: &str, path: &Path) -> IngestResult<FileOutcome> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to read {:?}: {}", path, e);
                return Ok(FileOutcome::Failed);
            }
        };

        let content_type = content_type_for(&filename).unwrap_or("application/octet-stream");
        let part = Part::bytes(bytes)
            .file_name(filename.clone())
            .mime_str(content_type)?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        let response = match self.client.post(url).multipart(form).send().await {
            Ok(response) => response,
            Err(e) if e.is_connect() => {
                return Err(IngestError::ServerUnreachable {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(e) => {
                warn!("{} failed: {}", filename, e);
                return Ok(FileOutcome::Failed);
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            let detail = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|body| body.get("detail").and_then(|d| d.as_str()).map(String::from))
                .unwrap_or_else(|| "No details provided.".to_string());
            warn!("{} failed with status {}: {}", filename, status, detail);
            return Ok(FileOutcome::Failed);
        }

        let body: AddResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!("{} returned an unreadable response: {}", filename, e);
                return Ok(FileOutcome::Failed);
            }
        };

        let outcome = match body.status.as_str() {
            "added" => {
                debug!("{} added, collection now holds {}", filename, body.new_total_count);
                FileOutcome::Added
            }
            "already_exists" => {
                debug!("{} already indexed", filename);
                FileOutcome::Skipped
            }
            other => {
                warn!("{} returned unexpected status '{}'", filename, other);
                FileOutcome::Failed
            }
        };
        Ok(outcome)
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}
