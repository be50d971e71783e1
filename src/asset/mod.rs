//! HTTP surface and asset pool
//!
//! Exposes the lens service over HTTP:
//! - `POST /generate-vector`, `/add-vector`, `/search-vector` (multipart `file`)
//! - `GET /assets/{name}` serving the original uploads
//! - `GET /` and `/health`

mod error;
mod routes;
mod server;
mod store;

pub use error::AssetError;
pub use routes::{
    AddResponse, SearchParams, SearchResponse, SearchResponseItem, VectorResponse,
    ALLOWED_CONTENT_TYPES, UPLOAD_FIELD,
};
pub use server::{AppState, AssetServerConfig, LensServer, DEFAULT_SERVER_PORT};
pub use store::{content_type_for, AssetStore, SaveOutcome};
