//! # OpenAPI Specification Assembly
//!
//! Collects the utoipa-documented handlers into one OpenAPI document,
//! served unauthenticated at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Dossier API",
        version = "0.1.0",
        description = "Compliance dossier workflow: exporter dossiers, document checklist, review and payment.",
        license(name = "AGPL-3.0-or-later")
    ),
    paths(
        // Exporter
        crate::routes::exporter::create_case,
        crate::routes::exporter::case_status,
        crate::routes::exporter::get_case,
        crate::routes::exporter::add_product,
        crate::routes::exporter::update_product,
        crate::routes::exporter::upload_document,
        crate::routes::exporter::list_documents,
        crate::routes::exporter::completeness,
        crate::routes::exporter::history,
        crate::routes::exporter::submit_case,
        crate::routes::exporter::get_document,
        crate::routes::exporter::download_document,
        crate::routes::checklist::required_documents,
        // Validation
        crate::routes::validation::list_cases,
        crate::routes::validation::statistics,
        crate::routes::validation::assign,
        crate::routes::validation::require_payment,
        crate::routes::validation::begin_review,
        crate::routes::validation::approve,
        crate::routes::validation::reject,
        crate::routes::validation::review_document,
        // Payment
        crate::routes::payment::confirm_payment,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::routes::exporter::CreateCaseRequest,
        crate::routes::exporter::CompletenessResponse,
        crate::routes::validation::RequirePaymentRequest,
        crate::routes::validation::AssignRequest,
        crate::routes::validation::ApproveRequest,
        crate::routes::validation::RejectRequest,
        crate::routes::validation::DocumentDecisionRequest,
        crate::routes::payment::ConfirmPaymentRequest,
    )),
    tags(
        (name = "exporter", description = "Dossier preparation by the exporter"),
        (name = "validation", description = "Review and invoicing"),
        (name = "payment", description = "Payment processor callbacks"),
    )
)]
pub struct ApiDoc;

/// Router serving the OpenAPI document.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
