//! # API Error Types
//!
//! [`AppError`] implements `IntoResponse` and renders the flat error
//! envelope shared with the client:
//!
//! ```json
//! {"error": "IncompleteDossierError", "message": "...", "missing": [...]}
//! ```
//!
//! Business errors from the engine keep their wire code. Server-side
//! failures are logged and answered with a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dossier_core::{DossierError, MissingSlot};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code, e.g. `ConflictError`.
    pub error: String,
    /// Human-readable message.
    pub message: String,
    /// Unmet required slots, present on `IncompleteDossierError` only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Vec<Object>>)]
    pub missing: Option<Vec<MissingSlot>>,
}

/// Application-level error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Business error raised by the engine.
    #[error(transparent)]
    Dossier(#[from] DossierError),

    /// Missing, malformed or unknown credentials (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Credentials past their expiry (401).
    #[error("session expired: {0}")]
    SessionExpired(String),

    /// Upload body above the configured limit (413).
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for a request-shape error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Dossier(DossierError::Validation(message.into()))
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Dossier(err) => {
                let status = match err {
                    DossierError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    DossierError::NotFound { .. } => StatusCode::NOT_FOUND,
                    DossierError::Authorization(_) => StatusCode::FORBIDDEN,
                    DossierError::Conflict(_)
                    | DossierError::IncompleteDossier { .. }
                    | DossierError::InvalidTransition { .. } => StatusCode::CONFLICT,
                    DossierError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.code())
            }
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            Self::SessionExpired(_) => (StatusCode::UNAUTHORIZED, "SessionExpired"),
            Self::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "PayloadTooLarge"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
        }
    }

    fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Internal(_) | Self::Dossier(DossierError::Storage(_))
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = if self.is_internal() {
            tracing::error!(error = %self, "internal server error");
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let missing = match self {
            Self::Dossier(DossierError::IncompleteDossier { missing }) => Some(missing),
            _ => None,
        };

        let body = ErrorBody {
            error: code.to_string(),
            message,
            missing,
        };
        (status, Json(body)).into_response()
    }
}
