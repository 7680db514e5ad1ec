//! # Checklist API
//!
//! `GET /exportateur/documents-requis?productType=FOOD&hasBrandLicense=true`
//! returns the document checklist evaluated for a product type and brand flag.

use axum::extract::rejection::QueryRejection;
use axum::extract::Query;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use dossier_core::{evaluate_checklist, ChecklistEntry, ProductType};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::auth::CallerIdentity;
use crate::error::{AppError, ErrorBody};
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct ChecklistQuery {
    /// `FOOD` or `INDUSTRIAL`.
    pub product_type: String,
    #[serde(default)]
    pub has_brand_license: bool,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/exportateur/documents-requis", get(required_documents))
}

/// GET /exportateur/documents-requis: evaluated checklist.
#[utoipa::path(
    get,
    path = "/exportateur/documents-requis",
    params(ChecklistQuery),
    responses(
        (status = 200, description = "Applicable checklist entries, in checklist order"),
        (status = 422, description = "Unknown product type", body = ErrorBody),
    ),
    tag = "exporter"
)]
pub(crate) async fn required_documents(
    _caller: CallerIdentity,
    query: Result<Query<ChecklistQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query.map_err(|e| AppError::validation(e.body_text()))?;
    let product_type: ProductType = query.product_type.trim().parse()?;
    let entries: Vec<&'static ChecklistEntry> =
        evaluate_checklist(product_type, query.has_brand_license).collect();
    Ok(Json(entries))
}
