//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! The in-memory [`DossierEngine`] is authoritative while the process runs.
//! When a Postgres pool is configured every successful mutation is written
//! through, and [`AppState::hydrate_from_db`] reloads the engine at startup.

use std::path::PathBuf;
use std::sync::Arc;

use dossier_engine::{CaseRecord, DocumentRecord, DossierEngine};
use sqlx::PgPool;

use crate::db;
use crate::error::AppError;

/// Default upload limit: 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Runtime configuration, read from the environment.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Shared bearer secret. `None` disables secret verification.
    pub auth_token: Option<String>,
    /// Filesystem root for document blobs. `None` keeps blobs in memory.
    pub blob_dir: Option<PathBuf>,
    /// Largest accepted upload body.
    pub max_upload_bytes: usize,
    /// Whether `/metrics` and the metrics middleware are mounted.
    pub metrics_enabled: bool,
    /// Emit JSON log lines.
    pub json_logs: bool,
}

impl AppConfig {
    /// Build the configuration from `PORT`, `AUTH_TOKEN`, `BLOB_DIR`,
    /// `MAX_UPLOAD_BYTES`, `METRICS_ENABLED` and `LOG_FORMAT`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            auth_token: lookup("AUTH_TOKEN").filter(|t| !t.is_empty()),
            blob_dir: lookup("BLOB_DIR").filter(|d| !d.is_empty()).map(PathBuf::from),
            max_upload_bytes: lookup("MAX_UPLOAD_BYTES")
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.max_upload_bytes),
            metrics_enabled: lookup("METRICS_ENABLED")
                .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "off" | "no"))
                .unwrap_or(defaults.metrics_enabled),
            json_logs: lookup("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("blob_dir", &self.blob_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("metrics_enabled", &self.metrics_enabled)
            .field("json_logs", &self.json_logs)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
            blob_dir: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            metrics_enabled: true,
            json_logs: false,
        }
    }
}

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: Arc<DossierEngine>,
    /// Optional write-through persistence.
    pub db_pool: Option<PgPool>,
    pub config: AppConfig,
}

impl AppState {
    /// In-memory state with the default configuration.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// In-memory engine, no database.
    pub fn with_config(config: AppConfig) -> Self {
        Self {
            engine: Arc::new(DossierEngine::in_memory()),
            db_pool: None,
            config,
        }
    }

    pub fn with_engine(engine: Arc<DossierEngine>, db_pool: Option<PgPool>, config: AppConfig) -> Self {
        Self {
            engine,
            db_pool,
            config,
        }
    }

    /// Write a case (with products and history) through to the database.
    pub async fn persist_case(&self, case: &CaseRecord) -> Result<(), AppError> {
        if let Some(pool) = &self.db_pool {
            db::cases::save_case(pool, case).await.map_err(|e| {
                tracing::error!(error = %e, case_id = %case.id, "failed to persist case");
                AppError::Internal(format!("failed to persist case: {e}"))
            })?;
        }
        Ok(())
    }

    /// Write a document record through to the database.
    pub async fn persist_document(&self, document: &DocumentRecord) -> Result<(), AppError> {
        if let Some(pool) = &self.db_pool {
            db::documents::save_document(pool, document).await.map_err(|e| {
                tracing::error!(error = %e, document_id = %document.id, "failed to persist document");
                AppError::Internal(format!("failed to persist document: {e}"))
            })?;
        }
        Ok(())
    }

    /// Remove dropped documents from the database.
    pub async fn forget_documents(&self, documents: &[DocumentRecord]) -> Result<(), AppError> {
        if let Some(pool) = &self.db_pool {
            for document in documents {
                db::documents::delete_document(pool, document.id).await.map_err(|e| {
                    tracing::error!(error = %e, document_id = %document.id, "failed to delete document");
                    AppError::Internal(format!("failed to delete document: {e}"))
                })?;
            }
        }
        Ok(())
    }

    /// Reload every case and document from the database into the engine.
    pub async fn hydrate_from_db(&self) -> Result<(), String> {
        let pool = match &self.db_pool {
            Some(pool) => pool,
            None => return Ok(()),
        };

        let cases = db::cases::load_all(pool)
            .await
            .map_err(|e| format!("failed to load cases: {e}"))?;
        let mut documents = db::documents::load_all(pool)
            .await
            .map_err(|e| format!("failed to load documents: {e}"))?;

        let case_count = cases.len();
        let document_count = documents.len();
        for case in cases {
            let (own, rest): (Vec<_>, Vec<_>) =
                documents.into_iter().partition(|d| d.case_id == case.id);
            documents = rest;
            self.engine.restore(case, own);
        }
        if !documents.is_empty() {
            tracing::warn!(orphans = documents.len(), "documents without a case were skipped");
        }

        tracing::info!(
            cases = case_count,
            documents = document_count,
            "Hydrated in-memory engine from database"
        );
        Ok(())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
