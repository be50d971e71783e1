//! HTTP handlers
//!
//! Every upload endpoint takes a multipart body with a single image in the
//! `file` field.

use axum::{
    body::Bytes,
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, warn};

use super::error::AssetError;
use super::server::AppState;
use super::store::{content_type_for, AssetStore, SaveOutcome};
use crate::core::error::{ErrorKind, LensError};
use crate::embeddings::decode_image;
use crate::vector::{metadata_fields, InsertOutcome, Metadata, MetadataValue, QueryMatch};

/// Accepted upload MIME types
pub const ALLOWED_CONTENT_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// Multipart field holding the image
pub const UPLOAD_FIELD: &str = "file";

type ApiResult<T> = Result<T, LensError>;

/// Response body of `/generate-vector`
#[derive(Debug, Serialize, Deserialize)]
pub struct VectorResponse {
    pub vector: Vec<f32>,
    pub status: String,
}

/// Response body of `/add-vector`
#[derive(Debug, Serialize, Deserialize)]
pub struct AddResponse {
    pub id: String,
    pub new_total_count: usize,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One search hit
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponseItem {
    pub id: String,
    pub distance: f32,
    pub metadata: Metadata,
}

impl From<QueryMatch> for SearchResponseItem {
    fn from(m: QueryMatch) -> Self {
        Self {
            id: m.id,
            distance: m.distance,
            metadata: m.metadata,
        }
    }
}

/// Response body of `/search-vector`
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query_filename: String,
    pub results: Vec<SearchResponseItem>,
    pub status: String,
}

/// Query string of `/search-vector`
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub n_results: Option<usize>,
}

/// An image read from a multipart body
struct Upload {
    filename: String,
    content_type: String,
    bytes: Bytes,
}

impl IntoResponse for LensError {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Rejected request: {}", self);
        }

        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

/// Route: GET /
pub async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "IP Lens API is running and ready to process images." }))
}

/// Route: GET /health
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let model = state.service.model_state();
    Json(json!({
        "status": if model.is_ready() { "ok" } else { "degraded" },
        "model": model.to_string(),
        "records": state.service.count().await,
    }))
}

/// Route: POST /generate-vector
pub async fn generate_vector(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<VectorResponse>> {
    let upload = read_upload(multipart).await?;
    let image = decode(upload.bytes.clone()).await?;

    let vector = state.service.generate_vector(&image).await?;
    Ok(Json(VectorResponse {
        vector: vector.into_inner(),
        status: "success".to_string(),
    }))
}

/// Route: POST /add-vector
///
/// The uploaded filename is the asset id. The original bytes are kept in the
/// asset pool so they can be served from `/assets/{id}`. When the pool
/// already holds a file of that name, that file is what gets indexed.
pub async fn add_vector(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<AddResponse>> {
    let upload = read_upload(multipart).await?;
    let id = AssetStore::validate_name(&upload.filename)?.to_string();

    if state.service.contains(&id).await {
        return Ok(Json(already_exists(id, state.service.count().await)));
    }

    let mut image = decode(upload.bytes.clone()).await?;
    let mut content_type = upload.content_type.clone();
    let mut size_bytes = upload.bytes.len();

    // The pool is first-wins; index whatever bytes it actually serves
    if state.assets.save(&id, &upload.bytes).await? == SaveOutcome::AlreadyPresent {
        debug!("Indexing '{}' from the existing pool file", id);
        let stored = Bytes::from(state.assets.read(&id).await?);
        if stored != upload.bytes {
            image = decode(stored.clone()).await?;
            size_bytes = stored.len();
            if let Some(pool_type) = content_type_for(&id) {
                content_type = pool_type.to_string();
            }
        }
    }

    let mut metadata = Metadata::new();
    metadata.insert(metadata_fields::FILENAME.to_string(), id.clone().into());
    metadata.insert(
        metadata_fields::UPLOAD_TIME.to_string(),
        chrono::Utc::now().to_rfc3339().into(),
    );
    metadata.insert(metadata_fields::CONTENT_TYPE.to_string(), content_type.into());
    metadata.insert(
        metadata_fields::SIZE_BYTES.to_string(),
        MetadataValue::Int(size_bytes as i64),
    );

    let response = match state.service.add_vector(&id, &image, metadata).await? {
        InsertOutcome::Inserted { total } => AddResponse {
            id,
            new_total_count: total,
            status: "added".to_string(),
            message: None,
        },
        InsertOutcome::AlreadyExists { total } => already_exists(id, total),
    };
    Ok(Json(response))
}

/// Route: POST /search-vector?n_results=N
pub async fn search_vector(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
    multipart: Multipart,
) -> ApiResult<Json<SearchResponse>> {
    let k = params.n_results.unwrap_or(state.config.default_results);
    let upload = read_upload(multipart).await?;
    let image = decode(upload.bytes.clone()).await?;

    let results = state.service.search_vector(&image, k).await?;
    Ok(Json(SearchResponse {
        query_filename: upload.filename,
        results: results.into_iter().map(SearchResponseItem::from).collect(),
        status: "success".to_string(),
    }))
}

fn already_exists(id: String, total: usize) -> AddResponse {
    AddResponse {
        message: Some(format!("File {} already exists. Skipping.", id)),
        id,
        new_total_count: total,
        status: "already_exists".to_string(),
    }
}

/// Pull the `file` field out of a multipart body and check its type
async fn read_upload(mut multipart: Multipart) -> ApiResult<Upload> {
    while let Some(field) = multipart.next_field().await.map_err(invalid_multipart)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
            return Err(AssetError::InvalidContentType { content_type }.into());
        }

        let bytes = field.bytes().await.map_err(invalid_multipart)?;
        return Ok(Upload {
            filename,
            content_type,
            bytes,
        });
    }

    Err(AssetError::MissingField {
        field: UPLOAD_FIELD.to_string(),
    }
    .into())
}

fn invalid_multipart(e: axum::extract::multipart::MultipartError) -> LensError {
    AssetError::InvalidMultipart {
        reason: e.body_text(),
    }
    .into()
}

/// Decode on a blocking thread
async fn decode(bytes: Bytes) -> ApiResult<DynamicImage> {
    let image = tokio::task::spawn_blocking(move || decode_image(&bytes))
        .await
        .map_err(|e| LensError::Internal(format!("Task join error: {}", e)))??;
    Ok(image)
}
