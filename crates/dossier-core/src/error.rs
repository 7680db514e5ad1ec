//! # Error Taxonomy
//!
//! Business errors shared by the engine, the HTTP service, and the client.
//! Each variant maps to a stable wire code (see [`DossierError::code`]) so
//! the client can rebuild the same error from an HTTP error envelope.
//!
//! | Code | Retryable as-is |
//! |------|-----------------|
//! | `ValidationError` | no, caller must fix input |
//! | `NotFoundError` | no |
//! | `AuthorizationError` | no, needs other credentials |
//! | `ConflictError` | no, needs a status change |
//! | `IncompleteDossierError` | after the missing uploads |
//! | `InvalidTransitionError` | no |

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::checklist::DocumentType;
use crate::identity::ProductId;

/// A required document slot with no uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingSlot {
    /// Product the slot belongs to.
    pub product_id: ProductId,
    /// Document type of the slot.
    pub document_type: DocumentType,
    /// Human-readable label of the document type.
    pub label: String,
}

/// Business error raised by dossier operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DossierError {
    /// Bad input shape or values.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown case, product or document.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of record ("case", "product", "document").
        kind: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// The actor may not perform this operation on this record.
    #[error("not authorized: {0}")]
    Authorization(String),

    /// The operation is not legal in the case's current status.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Submission refused because required slots are empty.
    #[error("dossier incomplete: {} required document(s) missing", missing.len())]
    IncompleteDossier {
        /// Every unmet required slot.
        missing: Vec<MissingSlot>,
    },

    /// The state machine rejects an out-of-order transition.
    #[error("invalid transition {transition} from status {from}")]
    InvalidTransition {
        /// Current case status.
        from: String,
        /// Requested transition.
        transition: String,
    },

    /// Blob storage or persistence failure. Not a business error.
    #[error("storage error: {0}")]
    Storage(String),
}

impl DossierError {
    /// Shorthand for a missing record.
    pub fn not_found(kind: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Stable wire code of the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::NotFound { .. } => "NotFoundError",
            Self::Authorization(_) => "AuthorizationError",
            Self::Conflict(_) => "ConflictError",
            Self::IncompleteDossier { .. } => "IncompleteDossierError",
            Self::InvalidTransition { .. } => "InvalidTransitionError",
            Self::Storage(_) => "InternalError",
        }
    }

    /// Rebuild an error from its wire code, message and missing-slot list.
    ///
    /// Returns `None` for codes that are not business errors.
    pub fn from_wire(code: &str, message: Option<String>, missing: Vec<MissingSlot>) -> Option<Self> {
        let message = message.unwrap_or_default();
        Some(match code {
            "ValidationError" => Self::Validation(message),
            "NotFoundError" => Self::NotFound {
                kind: "record",
                id: message,
            },
            "AuthorizationError" => Self::Authorization(message),
            "ConflictError" => Self::Conflict(message),
            "IncompleteDossierError" => Self::IncompleteDossier { missing },
            "InvalidTransitionError" => Self::InvalidTransition {
                from: String::new(),
                transition: message,
            },
            _ => return None,
        })
    }
}
