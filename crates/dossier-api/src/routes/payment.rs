//! # Payment API
//!
//! Callback used by the payment processor integration, which holds an
//! admin credential.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `POST` | `/paiement/dossiers/{demandeId}/confirmer` | `confirm_payment` |

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use dossier_core::CaseId;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::CallerIdentity;
use crate::error::{AppError, ErrorBody};
use crate::extractors::{extract_json, parse_id};
use crate::state::AppState;

/// Processor confirmation.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentRequest {
    /// Processor-side transaction reference.
    pub payment_reference: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/paiement/dossiers/{demandeId}/confirmer",
        post(confirm_payment),
    )
}

/// POST /paiement/dossiers/{demandeId}/confirmer: mark the invoice paid.
#[utoipa::path(
    post,
    path = "/paiement/dossiers/{demandeId}/confirmer",
    params(("demandeId" = String, Path, description = "Dossier UUID")),
    request_body = ConfirmPaymentRequest,
    responses(
        (status = 200, description = "Dossier paid"),
        (status = 403, description = "Admin role required", body = ErrorBody),
        (status = 409, description = "No invoice outstanding", body = ErrorBody),
    ),
    tag = "payment"
)]
pub(crate) async fn confirm_payment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(demande_id): Path<String>,
    body: Result<Json<ConfirmPaymentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let case_id: CaseId = parse_id(&demande_id, "dossier id")?;
    let req = extract_json(body)?;
    let case = state
        .engine
        .confirm_payment(&caller.actor, case_id, &req.payment_reference)?;
    tracing::info!(case_id = %case_id, "payment confirmed by processor");
    state.persist_case(&case).await?;
    Ok(Json(case))
}
