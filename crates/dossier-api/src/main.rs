//! # dossier-api: Binary Entry Point
//!
//! Reads configuration from the environment, connects the optional
//! database, hydrates the engine and serves the router.

use std::sync::Arc;

use anyhow::Context;
use dossier_api::state::{AppConfig, AppState};
use dossier_engine::{BlobStore, DossierEngine, FsBlobStore, MemoryBlobStore};
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(?config, "starting dossier-api");
    if config.auth_token.is_none() {
        tracing::warn!("AUTH_TOKEN not set, bearer secrets are not verified");
    }

    let blobs: Arc<dyn BlobStore> = match &config.blob_dir {
        Some(dir) => {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("failed to create blob directory {}", dir.display()))?;
            tracing::info!(root = %dir.display(), "using filesystem blob store");
            Arc::new(FsBlobStore::new(dir.clone()))
        }
        None => {
            tracing::warn!("BLOB_DIR not set, uploaded files are kept in memory");
            Arc::new(MemoryBlobStore::new())
        }
    };

    let database_url = std::env::var("DATABASE_URL").ok();
    let db_pool = dossier_api::db::connect(database_url.as_deref())
        .await
        .context("database initialization failed")?;

    let port = config.port;
    let state = AppState::with_engine(Arc::new(DossierEngine::new(blobs)), db_pool, config);

    state
        .hydrate_from_db()
        .await
        .map_err(anyhow::Error::msg)
        .context("database hydration failed")?;

    let app = dossier_api::app(state).layer(CorsLayer::permissive());

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Dossier API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
