//! # Exporter API
//!
//! Dossier creation, product editing, document uploads and submission for
//! the owning exporter. Reads are also open to validators and admins; the
//! engine enforces ownership.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `POST` | `/exportateur/dossier/creer` | `create_case` |
//! | `GET` | `/exportateur/dossier/statut` | `case_status` |
//! | `GET` | `/exportateur/dossier/{demandeId}` | `get_case` |
//! | `POST` | `/exportateur/dossier/{demandeId}/produits` | `add_product` |
//! | `PATCH` | `/exportateur/dossier/{demandeId}/produits/{productId}` | `update_product` |
//! | `POST` | `/exportateur/dossier/{demandeId}/documents` | `upload_document` |
//! | `GET` | `/exportateur/dossier/{demandeId}/documents` | `list_documents` |
//! | `GET` | `/exportateur/dossier/{demandeId}/completude` | `completeness` |
//! | `GET` | `/exportateur/dossier/{demandeId}/historique` | `history` |
//! | `POST` | `/exportateur/dossier/{demandeId}/soumettre` | `submit_case` |
//! | `GET` | `/exportateur/documents/{documentId}` | `get_document` |
//! | `GET` | `/exportateur/documents/{documentId}/telecharger` | `download_document` |

use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use bytes::Bytes;
use dossier_core::{CaseId, DocumentId, DocumentType, NewProduct, ProductId, ProductPatch};
use dossier_engine::{CaseRecord, DocumentRecord, SlotView, UploadRequest};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::CallerIdentity;
use crate::error::{AppError, ErrorBody};
use crate::extractors::{extract_json, parse_id};
use crate::state::AppState;

/// Multipart framing allowance on top of the file size limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request to open a dossier.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCaseRequest {
    /// At least one product.
    #[serde(rename = "produits", alias = "products")]
    #[schema(value_type = Vec<Object>)]
    pub products: Vec<NewProduct>,
}

/// A dossier record with its id repeated as `demandeId`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseResponse {
    pub demande_id: CaseId,
    #[serde(flatten)]
    pub case: CaseRecord,
}

impl From<CaseRecord> for CaseResponse {
    fn from(case: CaseRecord) -> Self {
        Self {
            demande_id: case.id,
            case,
        }
    }
}

/// A committed document with its id repeated as `documentId`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub document_id: DocumentId,
    #[serde(flatten)]
    pub document: DocumentRecord,
}

impl From<DocumentRecord> for DocumentResponse {
    fn from(document: DocumentRecord) -> Self {
        Self {
            document_id: document.id,
            document,
        }
    }
}

/// Completeness check plus the per-slot view.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompletenessResponse {
    pub complete: bool,
    #[schema(value_type = Vec<Object>)]
    pub missing: Vec<dossier_core::MissingSlot>,
    #[schema(value_type = Vec<Object>)]
    pub slots: Vec<SlotView>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the exporter router. `max_upload_bytes` bounds the upload route body.
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/exportateur/dossier/creer", post(create_case))
        .route("/exportateur/dossier/statut", get(case_status))
        .route("/exportateur/dossier/{demandeId}", get(get_case))
        .route("/exportateur/dossier/{demandeId}/produits", post(add_product))
        .route(
            "/exportateur/dossier/{demandeId}/produits/{productId}",
            patch(update_product),
        )
        .route(
            "/exportateur/dossier/{demandeId}/documents",
            post(upload_document)
                .layer(DefaultBodyLimit::max(max_upload_bytes.saturating_add(MULTIPART_OVERHEAD)))
                .get(list_documents),
        )
        .route("/exportateur/dossier/{demandeId}/completude", get(completeness))
        .route("/exportateur/dossier/{demandeId}/historique", get(history))
        .route("/exportateur/dossier/{demandeId}/soumettre", post(submit_case))
        .route("/exportateur/documents/{documentId}", get(get_document))
        .route(
            "/exportateur/documents/{documentId}/telecharger",
            get(download_document),
        )
}

// ---------------------------------------------------------------------------
// Cases
// ---------------------------------------------------------------------------

/// POST /exportateur/dossier/creer: Open the caller's dossier.
#[utoipa::path(
    post,
    path = "/exportateur/dossier/creer",
    request_body = CreateCaseRequest,
    responses(
        (status = 201, description = "Dossier created in DRAFT"),
        (status = 409, description = "The exporter already holds a dossier", body = ErrorBody),
        (status = 422, description = "Invalid product list", body = ErrorBody),
    ),
    tag = "exporter"
)]
pub(crate) async fn create_case(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateCaseRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = extract_json(body)?;
    let case = state.engine.create_case(&caller.actor, req.products)?;
    state.persist_case(&case).await?;
    Ok((StatusCode::CREATED, Json(CaseResponse::from(case))))
}

/// GET /exportateur/dossier/statut: Status of the caller's dossier.
#[utoipa::path(
    get,
    path = "/exportateur/dossier/statut",
    responses(
        (status = 200, description = "Status, message and next steps; `hasDossier` is false for a first-time exporter"),
    ),
    tag = "exporter"
)]
pub(crate) async fn case_status(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.engine.dossier_status(&caller.actor)?))
}

/// GET /exportateur/dossier/{demandeId}: Full dossier record.
#[utoipa::path(
    get,
    path = "/exportateur/dossier/{demandeId}",
    params(("demandeId" = String, Path, description = "Dossier UUID")),
    responses(
        (status = 200, description = "Dossier record"),
        (status = 403, description = "Dossier belongs to another exporter", body = ErrorBody),
        (status = 404, description = "Dossier not found", body = ErrorBody),
    ),
    tag = "exporter"
)]
pub(crate) async fn get_case(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(demande_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let case_id: CaseId = parse_id(&demande_id, "dossier id")?;
    Ok(Json(CaseResponse::from(state.engine.get_case(&caller.actor, case_id)?)))
}

/// POST /exportateur/dossier/{demandeId}/produits: Add a product while in DRAFT.
#[utoipa::path(
    post,
    path = "/exportateur/dossier/{demandeId}/produits",
    params(("demandeId" = String, Path, description = "Dossier UUID")),
    request_body = Object,
    responses(
        (status = 201, description = "Product added"),
        (status = 409, description = "Dossier no longer editable", body = ErrorBody),
        (status = 422, description = "Invalid product", body = ErrorBody),
    ),
    tag = "exporter"
)]
pub(crate) async fn add_product(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(demande_id): Path<String>,
    body: Result<Json<NewProduct>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let case_id: CaseId = parse_id(&demande_id, "dossier id")?;
    let product = extract_json(body)?;
    let product = state.engine.add_product(&caller.actor, case_id, product)?;
    persist_case_by_id(&state, &caller, case_id).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// PATCH /exportateur/dossier/{demandeId}/produits/{productId}: Edit product attributes.
///
/// Documents filed under slots the edit removes are deleted.
#[utoipa::path(
    patch,
    path = "/exportateur/dossier/{demandeId}/produits/{productId}",
    params(
        ("demandeId" = String, Path, description = "Dossier UUID"),
        ("productId" = String, Path, description = "Product UUID"),
    ),
    request_body = Object,
    responses(
        (status = 200, description = "Updated product"),
        (status = 409, description = "Dossier no longer editable", body = ErrorBody),
        (status = 422, description = "Invalid attributes", body = ErrorBody),
    ),
    tag = "exporter"
)]
pub(crate) async fn update_product(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path((demande_id, product_id)): Path<(String, String)>,
    body: Result<Json<ProductPatch>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let case_id: CaseId = parse_id(&demande_id, "dossier id")?;
    let product_id: ProductId = parse_id(&product_id, "product id")?;
    let patch = extract_json(body)?;
    let update = state
        .engine
        .update_product(&caller.actor, case_id, product_id, &patch)
        .await?;
    persist_case_by_id(&state, &caller, case_id).await?;
    state.forget_documents(&update.dropped).await?;
    Ok(Json(update.product))
}

/// GET /exportateur/dossier/{demandeId}/historique: Applied transitions.
#[utoipa::path(
    get,
    path = "/exportateur/dossier/{demandeId}/historique",
    params(("demandeId" = String, Path, description = "Dossier UUID")),
    responses((status = 200, description = "Transition history, oldest first")),
    tag = "exporter"
)]
pub(crate) async fn history(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(demande_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let case_id: CaseId = parse_id(&demande_id, "dossier id")?;
    Ok(Json(state.engine.history(&caller.actor, case_id)?))
}

/// POST /exportateur/dossier/{demandeId}/soumettre: Submit the dossier.
///
/// A retry after the dossier already left DRAFT returns 200 unchanged.
#[utoipa::path(
    post,
    path = "/exportateur/dossier/{demandeId}/soumettre",
    params(("demandeId" = String, Path, description = "Dossier UUID")),
    responses(
        (status = 200, description = "Dossier submitted"),
        (status = 409, description = "Required documents missing", body = ErrorBody),
    ),
    tag = "exporter"
)]
pub(crate) async fn submit_case(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(demande_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let case_id: CaseId = parse_id(&demande_id, "dossier id")?;
    let case = state.engine.submit(&caller.actor, case_id)?;
    state.persist_case(&case).await?;
    Ok(Json(CaseResponse::from(case)))
}

async fn persist_case_by_id(
    state: &AppState,
    caller: &CallerIdentity,
    case_id: CaseId,
) -> Result<(), AppError> {
    if state.db_pool.is_some() {
        let case = state.engine.get_case(&caller.actor, case_id)?;
        state.persist_case(&case).await?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// POST /exportateur/dossier/{demandeId}/documents: Upload into a slot.
///
/// Multipart fields: `file`, `documentType`, and `productId` (optional
/// when the dossier has a single product).
#[utoipa::path(
    post,
    path = "/exportateur/dossier/{demandeId}/documents",
    params(("demandeId" = String, Path, description = "Dossier UUID")),
    responses(
        (status = 201, description = "Document committed; slot is UPLOADED"),
        (status = 409, description = "Dossier no longer editable", body = ErrorBody),
        (status = 413, description = "File above the upload limit", body = ErrorBody),
        (status = 422, description = "Empty file or slot not on the checklist", body = ErrorBody),
    ),
    tag = "exporter"
)]
pub(crate) async fn upload_document(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(demande_id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, AppError> {
    let case_id: CaseId = parse_id(&demande_id, "dossier id")?;
    let mut multipart = multipart.map_err(|e| AppError::validation(e.body_text()))?;
    let limit = state.config.max_upload_bytes;

    let mut document_type: Option<DocumentType> = None;
    let mut product_id: Option<ProductId> = None;
    let mut file: Option<(String, String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "documentType" => {
                let raw = field.text().await.map_err(multipart_error)?;
                document_type = Some(raw.trim().parse()?);
            }
            "productId" => {
                let raw = field.text().await.map_err(multipart_error)?;
                if !raw.trim().is_empty() {
                    product_id = Some(parse_id(&raw, "product id")?);
                }
            }
            "file" => {
                let file_name = field.file_name().unwrap_or("document").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                if bytes.len() > limit {
                    return Err(AppError::PayloadTooLarge(format!(
                        "file is {} bytes, limit is {limit}",
                        bytes.len()
                    )));
                }
                file = Some((file_name, content_type, bytes));
            }
            other => {
                tracing::debug!(field = other, "ignoring unknown multipart field");
            }
        }
    }

    let document_type =
        document_type.ok_or_else(|| AppError::validation("documentType field is required"))?;
    let (file_name, content_type, bytes) =
        file.ok_or_else(|| AppError::validation("file field is required"))?;
    let product_id = match product_id {
        Some(id) => id,
        None => sole_product(&state, &caller, case_id)?,
    };

    let document = state
        .engine
        .upload(
            &caller.actor,
            case_id,
            UploadRequest {
                product_id,
                document_type,
                file_name,
                content_type,
                bytes,
            },
        )
        .await?;
    state.persist_document(&document).await?;
    Ok((StatusCode::CREATED, Json(DocumentResponse::from(document))))
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::validation(err.body_text())
    }
}

fn sole_product(
    state: &AppState,
    caller: &CallerIdentity,
    case_id: CaseId,
) -> Result<ProductId, AppError> {
    let case = state.engine.get_case(&caller.actor, case_id)?;
    match case.products.as_slice() {
        [only] => Ok(only.id),
        _ => Err(AppError::validation(
            "productId field is required when the dossier has several products",
        )),
    }
}

/// GET /exportateur/dossier/{demandeId}/documents: Committed documents.
#[utoipa::path(
    get,
    path = "/exportateur/dossier/{demandeId}/documents",
    params(("demandeId" = String, Path, description = "Dossier UUID")),
    responses((status = 200, description = "Documents of the dossier")),
    tag = "exporter"
)]
pub(crate) async fn list_documents(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(demande_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let case_id: CaseId = parse_id(&demande_id, "dossier id")?;
    Ok(Json(state.engine.list_documents(&caller.actor, case_id)?))
}

/// GET /exportateur/dossier/{demandeId}/completude: Missing slots and slot view.
#[utoipa::path(
    get,
    path = "/exportateur/dossier/{demandeId}/completude",
    params(("demandeId" = String, Path, description = "Dossier UUID")),
    responses((status = 200, description = "Completeness", body = CompletenessResponse)),
    tag = "exporter"
)]
pub(crate) async fn completeness(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(demande_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let case_id: CaseId = parse_id(&demande_id, "dossier id")?;
    let check = state.engine.completeness_check(&caller.actor, case_id)?;
    let slots = state.engine.slots(&caller.actor, case_id)?;
    Ok(Json(CompletenessResponse {
        complete: check.complete,
        missing: check.missing,
        slots,
    }))
}

/// GET /exportateur/documents/{documentId}: Document metadata.
#[utoipa::path(
    get,
    path = "/exportateur/documents/{documentId}",
    params(("documentId" = String, Path, description = "Document UUID")),
    responses(
        (status = 200, description = "Document record"),
        (status = 404, description = "Unknown or replaced document", body = ErrorBody),
    ),
    tag = "exporter"
)]
pub(crate) async fn get_document(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let document_id: DocumentId = parse_id(&document_id, "document id")?;
    Ok(Json(state.engine.get_document(&caller.actor, document_id)?))
}

/// GET /exportateur/documents/{documentId}/telecharger: Document bytes.
#[utoipa::path(
    get,
    path = "/exportateur/documents/{documentId}/telecharger",
    params(("documentId" = String, Path, description = "Document UUID")),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 404, description = "Unknown or replaced document", body = ErrorBody),
    ),
    tag = "exporter"
)]
pub(crate) async fn download_document(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let document_id: DocumentId = parse_id(&document_id, "document id")?;
    let (record, bytes) = state.engine.download(&caller.actor, document_id).await?;

    let content_type = HeaderValue::from_str(&record.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let safe_name: String = record
        .file_name
        .chars()
        .filter(|c| (c.is_ascii_graphic() && *c != '"' && *c != '\\') || *c == ' ')
        .collect();
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{safe_name}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}
