//! # Validation API
//!
//! Reviewer operations: the dossier queue, the fee invoice, the review
//! itself and per-document decisions. Role gates are enforced by the
//! engine (validator or admin).
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `GET` | `/validation/dossiers` | `list_cases` |
//! | `GET` | `/validation/statistiques` | `statistics` |
//! | `POST` | `/validation/dossiers/{demandeId}/assigner` | `assign` |
//! | `POST` | `/validation/dossiers/{demandeId}/paiement` | `require_payment` |
//! | `POST` | `/validation/dossiers/{demandeId}/examen` | `begin_review` |
//! | `POST` | `/validation/dossiers/{demandeId}/approuver` | `approve` |
//! | `POST` | `/validation/dossiers/{demandeId}/rejeter` | `reject` |
//! | `POST` | `/validation/documents/{documentId}/decision` | `review_document` |

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use dossier_core::{ActorId, CaseId, DocumentId};
use dossier_state::{CaseStatus, DocumentDecision};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::auth::CallerIdentity;
use crate::error::{AppError, ErrorBody};
use crate::extractors::{extract_json, parse_id};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListCasesQuery {
    /// Only dossiers in this status, e.g. `SUBMITTED`.
    pub status: Option<String>,
}

/// Fee invoice parameters.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequirePaymentRequest {
    /// Positive decimal string with at most two fraction digits.
    pub amount: String,
    /// ISO 4217 currency code.
    pub currency: String,
}

/// Assignment target. Without `assigneeId` the caller takes the dossier.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub assignee_id: Option<ActorId>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApproveRequest {
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RejectRequest {
    /// Mandatory, non-blank.
    pub reason: String,
}

/// Reviewer verdict on one document.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDecisionRequest {
    /// `VALIDATED` or `REJECTED`.
    #[schema(value_type = String)]
    pub decision: DocumentDecision,
    /// Required when rejecting.
    #[serde(default)]
    pub comment: Option<String>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/validation/dossiers", get(list_cases))
        .route("/validation/statistiques", get(statistics))
        .route("/validation/dossiers/{demandeId}/assigner", post(assign))
        .route("/validation/dossiers/{demandeId}/paiement", post(require_payment))
        .route("/validation/dossiers/{demandeId}/examen", post(begin_review))
        .route("/validation/dossiers/{demandeId}/approuver", post(approve))
        .route("/validation/dossiers/{demandeId}/rejeter", post(reject))
        .route(
            "/validation/documents/{documentId}/decision",
            post(review_document),
        )
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /validation/dossiers: dossiers newest first, optionally by status.
#[utoipa::path(
    get,
    path = "/validation/dossiers",
    params(ListCasesQuery),
    responses(
        (status = 200, description = "Dossier list"),
        (status = 403, description = "Reviewer role required", body = ErrorBody),
    ),
    tag = "validation"
)]
pub(crate) async fn list_cases(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<ListCasesQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query.map_err(|e| AppError::validation(e.body_text()))?;
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.trim().parse::<CaseStatus>())
        .transpose()?;
    Ok(Json(state.engine.list_cases(&caller.actor, status)?))
}

/// GET /validation/statistiques: dossier counts and the caller's workload.
#[utoipa::path(
    get,
    path = "/validation/statistiques",
    responses(
        (status = 200, description = "Counts per status, assigned and unassigned open dossiers"),
        (status = 403, description = "Reviewer role required", body = ErrorBody),
    ),
    tag = "validation"
)]
pub(crate) async fn statistics(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.engine.statistics(&caller.actor)?))
}

/// POST /validation/dossiers/{demandeId}/assigner: put a reviewer in charge.
#[utoipa::path(
    post,
    path = "/validation/dossiers/{demandeId}/assigner",
    params(("demandeId" = String, Path, description = "Dossier UUID")),
    request_body(content = AssignRequest, description = "Optional assignee, defaults to the caller"),
    responses(
        (status = 200, description = "Dossier with its assignee"),
        (status = 403, description = "Reviewer role required, or admin to assign someone else", body = ErrorBody),
        (status = 409, description = "Draft, decided, or held by another validator", body = ErrorBody),
    ),
    tag = "validation"
)]
pub(crate) async fn assign(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(demande_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let case_id: CaseId = parse_id(&demande_id, "dossier id")?;
    let req: AssignRequest = optional_json(&body, "assignment")?;
    let case = state.engine.assign(&caller.actor, case_id, req.assignee_id)?;
    state.persist_case(&case).await?;
    Ok(Json(case))
}

/// POST /validation/dossiers/{demandeId}/paiement: issue the fee invoice.
#[utoipa::path(
    post,
    path = "/validation/dossiers/{demandeId}/paiement",
    params(("demandeId" = String, Path, description = "Dossier UUID")),
    request_body = RequirePaymentRequest,
    responses(
        (status = 200, description = "Dossier awaiting payment"),
        (status = 409, description = "Out-of-order transition", body = ErrorBody),
    ),
    tag = "validation"
)]
pub(crate) async fn require_payment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(demande_id): Path<String>,
    body: Result<Json<RequirePaymentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let case_id: CaseId = parse_id(&demande_id, "dossier id")?;
    let req = extract_json(body)?;
    let case = state
        .engine
        .require_payment(&caller.actor, case_id, &req.amount, &req.currency)?;
    state.persist_case(&case).await?;
    Ok(Json(case))
}

/// POST /validation/dossiers/{demandeId}/examen: start the review.
#[utoipa::path(
    post,
    path = "/validation/dossiers/{demandeId}/examen",
    params(("demandeId" = String, Path, description = "Dossier UUID")),
    responses(
        (status = 200, description = "Dossier under review"),
        (status = 409, description = "Out-of-order transition", body = ErrorBody),
    ),
    tag = "validation"
)]
pub(crate) async fn begin_review(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(demande_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let case_id: CaseId = parse_id(&demande_id, "dossier id")?;
    let case = state.engine.begin_review(&caller.actor, case_id)?;
    state.persist_case(&case).await?;
    Ok(Json(case))
}

/// POST /validation/dossiers/{demandeId}/approuver: approve. Body is optional.
#[utoipa::path(
    post,
    path = "/validation/dossiers/{demandeId}/approuver",
    params(("demandeId" = String, Path, description = "Dossier UUID")),
    request_body(content = ApproveRequest, description = "Optional comment"),
    responses(
        (status = 200, description = "Dossier approved with an approval number"),
        (status = 409, description = "Out-of-order transition", body = ErrorBody),
    ),
    tag = "validation"
)]
pub(crate) async fn approve(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(demande_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let case_id: CaseId = parse_id(&demande_id, "dossier id")?;
    let req: ApproveRequest = optional_json(&body, "approval")?;
    let case = state.engine.approve(&caller.actor, case_id, req.comment)?;
    state.persist_case(&case).await?;
    Ok(Json(case))
}

/// POST /validation/dossiers/{demandeId}/rejeter: reject with a reason.
#[utoipa::path(
    post,
    path = "/validation/dossiers/{demandeId}/rejeter",
    params(("demandeId" = String, Path, description = "Dossier UUID")),
    request_body = RejectRequest,
    responses(
        (status = 200, description = "Dossier rejected"),
        (status = 409, description = "Out-of-order transition", body = ErrorBody),
        (status = 422, description = "Missing reason", body = ErrorBody),
    ),
    tag = "validation"
)]
pub(crate) async fn reject(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(demande_id): Path<String>,
    body: Result<Json<RejectRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let case_id: CaseId = parse_id(&demande_id, "dossier id")?;
    let req = extract_json(body)?;
    let case = state.engine.reject(&caller.actor, case_id, &req.reason)?;
    state.persist_case(&case).await?;
    Ok(Json(case))
}

/// POST /validation/documents/{documentId}/decision: validate or reject a document.
#[utoipa::path(
    post,
    path = "/validation/documents/{documentId}/decision",
    params(("documentId" = String, Path, description = "Document UUID")),
    request_body = DocumentDecisionRequest,
    responses(
        (status = 200, description = "Updated document record"),
        (status = 409, description = "Dossier already decided", body = ErrorBody),
        (status = 422, description = "Rejection without comment", body = ErrorBody),
    ),
    tag = "validation"
)]
pub(crate) async fn review_document(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(document_id): Path<String>,
    body: Result<Json<DocumentDecisionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let document_id: DocumentId = parse_id(&document_id, "document id")?;
    let req = extract_json(body)?;
    let document =
        state
            .engine
            .review_document(&caller.actor, document_id, req.decision, req.comment)?;
    state.persist_document(&document).await?;
    Ok(Json(document))
}

/// Decode a JSON body that may be left empty.
fn optional_json<T: Default + DeserializeOwned>(body: &Bytes, what: &str) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::validation(format!("invalid {what} body: {e}")))
}
