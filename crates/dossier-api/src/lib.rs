//! # dossier-api: HTTP Service for the Compliance Dossier Workflow
//!
//! Exposes the [`dossier_engine::DossierEngine`] over REST for exporters,
//! validators and the payment processor.
//!
//! ## API Surface
//!
//! | Prefix | Module | Audience |
//! |--------|--------|----------|
//! | `/exportateur/*` | [`routes::exporter`], [`routes::checklist`] | Exporter (and reviewers, read-only) |
//! | `/validation/*` | [`routes::validation`] | Validators and admins |
//! | `/paiement/*` | [`routes::payment`] | Payment processor (admin credential) |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → AuthMiddleware → Handler
//! ```
//!
//! Health probes, `/metrics` and `/openapi.json` are mounted outside auth.

pub mod auth;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::extract::{DefaultBodyLimit, Extension, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::middleware::metrics::ApiMetrics;
use crate::state::AppState;

/// JSON body limit for non-upload routes.
const JSON_BODY_LIMIT: usize = 256 * 1024;

/// Assemble the full application router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };
    let metrics = if state.config.metrics_enabled {
        match ApiMetrics::try_new() {
            Ok(m) => Some(m),
            Err(e) => {
                tracing::error!(error = %e, "failed to create metrics registry, metrics disabled");
                None
            }
        }
    } else {
        None
    };

    let mut api = Router::new()
        .merge(routes::exporter::router(state.config.max_upload_bytes))
        .merge(routes::checklist::router())
        .merge(routes::validation::router())
        .merge(routes::payment::router())
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
        .layer(from_fn(auth::auth_middleware));

    // Metrics sit outside auth so rejected requests are counted too.
    if let Some(m) = &metrics {
        api = api
            .layer(from_fn(middleware::metrics::metrics_middleware))
            .layer(Extension(m.clone()));
    }

    let api = api
        .layer(TraceLayer::new_for_http())
        .layer(Extension(auth_config))
        .with_state(state.clone());

    let mut unauthenticated = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .merge(openapi::router());

    if let Some(m) = metrics {
        unauthenticated = unauthenticated
            .route("/metrics", get(prometheus_metrics))
            .layer(Extension(m));
    }

    let unauthenticated = unauthenticated.with_state(state);

    Router::new().merge(unauthenticated).merge(api)
}

/// GET /metrics: refresh domain gauges, then encode the registry.
async fn prometheus_metrics(
    State(state): State<AppState>,
    Extension(metrics): Extension<ApiMetrics>,
) -> impl IntoResponse {
    metrics.refresh(&state.engine);

    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("{e:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response()
        }
    }
}

/// Liveness probe: the process is up.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: stores are reachable and the database answers.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let _ = state.engine.store().len();

    if let Some(pool) = &state.db_pool {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!("Database health check failed: {e}");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unreachable").into_response();
        }
    }

    (StatusCode::OK, "ready").into_response()
}
