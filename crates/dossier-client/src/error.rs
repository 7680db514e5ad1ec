//! Dossier client error types.

use dossier_core::{DossierError, MissingSlot};

/// Errors from dossier API calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The service answered 401: the token is missing, wrong or expired.
    ///
    /// Never retried. The caller must obtain a new token.
    #[error("session expired or not authenticated ({code}): {message}")]
    SessionExpired { code: String, message: String },

    /// The service rejected the call with a business error.
    #[error("{endpoint} returned {status}: {source}")]
    Api {
        endpoint: String,
        status: u16,
        source: DossierError,
    },

    /// Non-2xx response without a recognised error envelope.
    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// HTTP transport error, after retries.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },

    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),
}

impl ClientError {
    /// Whether the error means the caller has to re-authenticate.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired { .. })
    }

    /// Whether the same call may succeed later without changing its input.
    ///
    /// Transport failures and 5xx answers are transient. Business errors,
    /// session expiry and requests that could not be built are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { source, .. } => !source.is_builder(),
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// The business error carried by the response, if any.
    pub fn dossier_error(&self) -> Option<&DossierError> {
        match self {
            Self::Api { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Missing slots of an `IncompleteDossierError` answer.
    pub fn missing_slots(&self) -> Option<&[MissingSlot]> {
        match self.dossier_error() {
            Some(DossierError::IncompleteDossier { missing }) => Some(missing),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_errors_are_not_transient() {
        let err = ClientError::Api {
            endpoint: "POST /soumettre".into(),
            status: 409,
            source: DossierError::IncompleteDossier { missing: vec![] },
        };
        assert!(!err.is_transient());
        assert!(!err.is_session_expired());
        assert_eq!(err.missing_slots().map(<[_]>::len), Some(0));
    }

    #[test]
    fn server_errors_are_transient() {
        let err = ClientError::Status {
            endpoint: "GET /statut".into(),
            status: 503,
            body: "upstream unavailable".into(),
        };
        assert!(err.is_transient());
        let err = ClientError::Status {
            endpoint: "POST /documents".into(),
            status: 413,
            body: String::new(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn unbuildable_request_is_not_transient() {
        let source = reqwest::multipart::Part::bytes(b"%PDF".to_vec())
            .mime_str("not a mime type")
            .unwrap_err();
        assert!(source.is_builder());
        let err = ClientError::Http {
            endpoint: "POST /documents".into(),
            source,
        };
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn unreachable_service_is_transient() {
        let source = reqwest::Client::new()
            .get("http://127.0.0.1:1/exportateur/dossier/statut")
            .send()
            .await
            .unwrap_err();
        let err = ClientError::Http {
            endpoint: "GET /statut".into(),
            source,
        };
        assert!(err.is_transient());
    }

    #[test]
    fn session_expiry_is_distinct() {
        let err = ClientError::SessionExpired {
            code: "SessionExpired".into(),
            message: "token expired".into(),
        };
        assert!(err.is_session_expired());
        assert!(!err.is_transient());
        assert!(err.dossier_error().is_none());
    }
}
