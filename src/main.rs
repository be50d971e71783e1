//! IP Lens command line
//!
//! ```text
//! ip-lens serve [--config FILE] [--port N]
//! ip-lens ingest <FOLDER> [--server URL] [--concurrency N]
//! ```

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use ip_lens::logging::{init_fallback_logging, LogLevel, LoggingSystem};
use ip_lens::{AppConfig, ImageEmbedder, Ingestor, LensServer, LensService, VectorStore};

#[derive(Parser)]
#[command(name = "ip-lens")]
#[command(about = "IP Lens - image similarity lookup for IP asset catalogues", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path (TOML or JSON)
    #[arg(short, long, global = true, env = "IP_LENS_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the model and the index, then serve the HTTP API
    Serve {
        /// Interface to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to bind
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Upload every image in a folder to a running server
    Ingest {
        /// Folder holding .jpg, .jpeg, .png or .webp files
        folder: PathBuf,

        /// Base URL of the server
        #[arg(short, long)]
        server: Option<String>,

        /// Uploads in flight at once
        #[arg(long)]
        concurrency: Option<usize>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if cli.verbose {
        config.logging = config.logging.with_level(LogLevel::Debug);
    }

    // Held for the whole run so the file writer keeps flushing
    let _logging = match LoggingSystem::init(config.logging.clone()) {
        Ok(system) => Some(system),
        Err(e) => {
            eprintln!("Failed to initialize logging: {}. Using basic logging.", e);
            init_fallback_logging();
            None
        }
    };

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config).await
        }
        Commands::Ingest {
            folder,
            server,
            concurrency,
        } => {
            if let Some(url) = server {
                config.ingest.server_url = url;
            }
            if let Some(n) = concurrency {
                config.ingest.concurrency = n;
            }
            ingest(config, folder).await
        }
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    info!("Starting IP Lens {}", env!("CARGO_PKG_VERSION"));

    let store = VectorStore::open(config.index.clone())
        .await
        .context("Failed to open the vector index")?;
    info!(
        "Vector index at {:?} holds {} records",
        store.storage_path(),
        store.count().await
    );

    let embedder = ImageEmbedder::new(config.embedding.clone());
    embedder
        .load()
        .await
        .context("Failed to load the embedding model")?;

    let service = LensService::new(Arc::new(embedder), Arc::new(store))?;
    let server = LensServer::new(service, config.server)?;
    server.start().await?;
    Ok(())
}

async fn ingest(config: AppConfig, folder: PathBuf) -> Result<()> {
    let ingestor = Ingestor::new(config.ingest)?;
    let report = ingestor
        .run(&folder)
        .await
        .with_context(|| format!("Ingestion of {:?} failed", folder))?;

    println!("Total files attempted: {}", report.attempted);
    println!("Total files added: {}", report.added);
    println!("Total files already indexed: {}", report.skipped);
    println!("Total files failed: {}", report.failed);
    Ok(())
}
