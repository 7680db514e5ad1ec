//! # Postgres write-through
//!
//! With `DATABASE_URL` set, each successful case or document mutation is
//! saved and the engine is rebuilt from the tables at startup. Without it
//! the service keeps dossiers in memory only. Blob bytes stay in the blob
//! store; the `documents` table only records their key.

pub mod cases;
pub mod documents;

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Open a pool on `url` and bring the schema up to date. An unset or
/// empty URL yields `Ok(None)`.
pub async fn connect(url: Option<&str>) -> Result<Option<PgPool>, sqlx::Error> {
    let Some(url) = url.filter(|u| !u.is_empty()) else {
        tracing::warn!("DATABASE_URL not set, dossiers are lost on restart");
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .connect(url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("dossier tables ready");

    Ok(Some(pool))
}

/// A stored row that no longer decodes into its domain type.
pub(crate) fn corrupt(what: &str, id: impl std::fmt::Display, err: impl std::fmt::Display) -> sqlx::Error {
    sqlx::Error::Protocol(format!("corrupt {what} in row {id}: {err}"))
}
