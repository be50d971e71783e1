//! HTTP server for the lens service
//!
//! Builds the axum router (vector endpoints plus the static asset pool) and
//! runs it until Ctrl-C.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::error::AssetError;
use super::routes::{add_vector, generate_vector, health, root, search_vector};
use super::store::AssetStore;
use crate::service::LensService;

/// Default port for the HTTP server
pub const DEFAULT_SERVER_PORT: u16 = 8000;

/// HTTP server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetServerConfig {
    /// Interface to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// Allowed CORS origins; `*` allows any origin
    pub cors_origins: Vec<String>,
    /// Largest accepted request body
    pub max_body_bytes: usize,
    /// `n_results` used when a search does not specify one
    pub default_results: usize,
    /// Directory holding the original uploaded images
    pub assets_dir: PathBuf,
}

impl Default for AssetServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_SERVER_PORT,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "http://127.0.0.1:5173".to_string(),
                "*".to_string(),
            ],
            max_body_bytes: 20 * 1024 * 1024, // 20 MiB
            default_results: 5,
            assets_dir: default_assets_dir(),
        }
    }
}

impl AssetServerConfig {
    /// Create a new configuration with a custom port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Create a new configuration with a custom asset directory
    pub fn with_assets_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.assets_dir = dir.into();
        self
    }

    /// Create a new configuration with a custom body limit
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Create a new configuration with explicit CORS origins
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = origins;
        self
    }

    /// Whether any origin may call the API
    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }

    /// Socket address to bind
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_assets_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("ip-lens").join("assets"))
        .unwrap_or_else(|| PathBuf::from("data/assets"))
}

/// Shared state for the handlers
#[derive(Clone)]
pub struct AppState {
    pub service: LensService,
    pub assets: Arc<AssetStore>,
    pub config: Arc<AssetServerConfig>,
}

/// HTTP front end for a `LensService`
pub struct LensServer {
    state: AppState,
}

impl LensServer {
    /// Create a server; the asset directory is created if missing
    pub fn new(service: LensService, config: AssetServerConfig) -> Result<Self, AssetError> {
        let assets = AssetStore::open(&config.assets_dir)?;
        Ok(Self {
            state: AppState {
                service,
                assets: Arc::new(assets),
                config: Arc::new(config),
            },
        })
    }

    /// Get a reference to the server state
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router with all routes and middleware
    pub fn build_router(&self) -> Router {
        let config = &self.state.config;

        let origins = if config.allows_any_origin() {
            AllowOrigin::any()
        } else {
            AllowOrigin::list(
                config
                    .cors_origins
                    .iter()
                    .filter_map(|o| o.parse::<HeaderValue>().ok()),
            )
        };
        let cors = CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/", get(root))
            .route("/health", get(health))
            .route("/generate-vector", post(generate_vector))
            .route("/add-vector", post(add_vector))
            .route("/search-vector", post(search_vector))
            .nest_service("/assets", ServeDir::new(self.state.assets.root()))
            .layer(DefaultBodyLimit::max(config.max_body_bytes))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(self.state.clone())
    }

    /// Bind the configured address and serve until Ctrl-C
    pub async fn start(&self) -> Result<(), AssetError> {
        let address = self.state.config.bind_address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|e| AssetError::BindFailed {
                reason: format!("{}: {}", address, e),
            })?;

        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` completes
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), AssetError>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let local: SocketAddr = listener.local_addr()?;
        info!(
            "IP Lens API listening on http://{} (assets in {:?})",
            local,
            self.state.assets.root()
        );

        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| AssetError::Internal {
                reason: e.to_string(),
            })?;

        info!("IP Lens API stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
