//! Typed client for the dossier REST contract.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST | `/exportateur/dossier/creer` | [`DossierApi::create_case`] |
//! | GET | `/exportateur/dossier/statut` | [`DossierApi::case_status`] |
//! | GET | `/exportateur/dossier/{demandeId}` | [`DossierApi::get_case`] |
//! | POST | `/exportateur/dossier/{demandeId}/documents` | [`DossierApi::upload_document`] |
//! | GET | `/exportateur/dossier/{demandeId}/completude` | [`DossierApi::completeness`] |
//! | POST | `/exportateur/dossier/{demandeId}/soumettre` | [`DossierApi::submit`] |
//! | GET | `/exportateur/documents-requis` | [`DossierClient::required_documents`] |
//!
//! Every non-2xx answer is decoded from the error envelope
//! `{error, message, missing?}` back into a [`DossierError`]; 401 always
//! becomes [`ClientError::SessionExpired`].

use std::time::Duration;

use async_trait::async_trait;
use dossier_core::{CaseId, DocumentType, DossierError, MissingSlot, NewProduct, ProductType};
use dossier_engine::{CaseRecord, CaseSummary, DocumentRecord, SlotView, UploadRequest};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::{ClientConfig, ConfigError};
use crate::error::ClientError;
use crate::retry::retry_send;

// -- Wire types ---------------------------------------------------------------

/// Completeness answer with the per-slot view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletenessReport {
    pub complete: bool,
    #[serde(default)]
    pub missing: Vec<MissingSlot>,
    #[serde(default)]
    pub slots: Vec<SlotView>,
}

/// One line of the evaluated checklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredDocument {
    pub document_type: DocumentType,
    pub label: String,
    pub required: bool,
}

#[derive(Debug, Serialize)]
struct CreateCaseBody<'a> {
    produits: &'a [NewProduct],
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    missing: Vec<MissingSlot>,
}

// -- Abstraction used by the orchestrator -------------------------------------

/// The exporter-side operations of the dossier service.
///
/// Implemented by [`DossierClient`] over HTTP; tests implement it over an
/// in-process engine.
#[async_trait]
pub trait DossierApi: Send + Sync {
    /// Open the caller's dossier.
    async fn create_case(&self, products: &[NewProduct]) -> Result<CaseRecord, ClientError>;

    /// Status of the caller's dossier. `hasDossier` is false for a
    /// first-time user.
    async fn case_status(&self) -> Result<CaseSummary, ClientError>;

    async fn get_case(&self, case_id: CaseId) -> Result<CaseRecord, ClientError>;

    /// Upload one document into its slot.
    async fn upload_document(
        &self,
        case_id: CaseId,
        upload: UploadRequest,
    ) -> Result<DocumentRecord, ClientError>;

    async fn completeness(&self, case_id: CaseId) -> Result<CompletenessReport, ClientError>;

    /// Submit the dossier. Safe to retry.
    async fn submit(&self, case_id: CaseId) -> Result<CaseRecord, ClientError>;
}

// -- HTTP client --------------------------------------------------------------

/// reqwest-backed client for one dossier service.
#[derive(Debug, Clone)]
pub struct DossierClient {
    http: reqwest::Client,
    base_url: String,
}

impl DossierClient {
    /// Create a new client from configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                let mut value =
                    reqwest::header::HeaderValue::from_str(&format!("Bearer {}", config.api_token))
                        .map_err(|_| ClientError::Config(ConfigError::MissingToken))?;
                value.set_sensitive(true);
                headers.insert(reqwest::header::AUTHORIZATION, value);
                headers
            })
            .build()
            .map_err(|e| ClientError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Evaluated checklist for a product type.
    ///
    /// Calls `GET /exportateur/documents-requis?productType=..&hasBrandLicense=..`.
    pub async fn required_documents(
        &self,
        product_type: ProductType,
        has_brand_license: bool,
    ) -> Result<Vec<RequiredDocument>, ClientError> {
        let endpoint = "GET /exportateur/documents-requis";
        let url = self.url("/exportateur/documents-requis");
        let query = [
            ("productType", product_type.as_str().to_string()),
            ("hasBrandLicense", has_brand_license.to_string()),
        ];
        let resp = retry_send(|| self.http.get(&url).query(&query).send())
            .await
            .map_err(|e| http_error(endpoint, e))?;
        decode(endpoint, resp).await
    }
}

#[async_trait]
impl DossierApi for DossierClient {
    async fn create_case(&self, products: &[NewProduct]) -> Result<CaseRecord, ClientError> {
        let endpoint = "POST /exportateur/dossier/creer";
        let url = self.url("/exportateur/dossier/creer");
        let body = CreateCaseBody { produits: products };

        let resp = retry_send(|| self.http.post(&url).json(&body).send())
            .await
            .map_err(|e| http_error(endpoint, e))?;
        decode(endpoint, resp).await
    }

    async fn case_status(&self) -> Result<CaseSummary, ClientError> {
        let endpoint = "GET /exportateur/dossier/statut";
        let url = self.url("/exportateur/dossier/statut");

        let resp = retry_send(|| self.http.get(&url).send())
            .await
            .map_err(|e| http_error(endpoint, e))?;
        decode(endpoint, resp).await
    }

    async fn get_case(&self, case_id: CaseId) -> Result<CaseRecord, ClientError> {
        let endpoint = format!("GET /exportateur/dossier/{case_id}");
        let url = self.url(&format!("/exportateur/dossier/{case_id}"));

        let resp = retry_send(|| self.http.get(&url).send())
            .await
            .map_err(|e| http_error(&endpoint, e))?;
        decode(&endpoint, resp).await
    }

    async fn upload_document(
        &self,
        case_id: CaseId,
        upload: UploadRequest,
    ) -> Result<DocumentRecord, ClientError> {
        let endpoint = format!("POST /exportateur/dossier/{case_id}/documents");
        let url = self.url(&format!("/exportateur/dossier/{case_id}/documents"));

        // The form is consumed by `send`, so each attempt builds its own.
        let resp = retry_send(|| {
            let form = upload_form(&upload);
            let request = form.map(|form| self.http.post(&url).multipart(form));
            async move { request?.send().await }
        })
        .await
        .map_err(|e| http_error(&endpoint, e))?;
        decode(&endpoint, resp).await
    }

    async fn completeness(&self, case_id: CaseId) -> Result<CompletenessReport, ClientError> {
        let endpoint = format!("GET /exportateur/dossier/{case_id}/completude");
        let url = self.url(&format!("/exportateur/dossier/{case_id}/completude"));

        let resp = retry_send(|| self.http.get(&url).send())
            .await
            .map_err(|e| http_error(&endpoint, e))?;
        decode(&endpoint, resp).await
    }

    async fn submit(&self, case_id: CaseId) -> Result<CaseRecord, ClientError> {
        let endpoint = format!("POST /exportateur/dossier/{case_id}/soumettre");
        let url = self.url(&format!("/exportateur/dossier/{case_id}/soumettre"));

        let resp = retry_send(|| self.http.post(&url).send())
            .await
            .map_err(|e| http_error(&endpoint, e))?;
        decode(&endpoint, resp).await
    }
}

fn upload_form(upload: &UploadRequest) -> Result<Form, reqwest::Error> {
    let file = Part::bytes(upload.bytes.to_vec())
        .file_name(upload.file_name.clone())
        .mime_str(&upload.content_type)?;
    Ok(Form::new()
        .text("documentType", upload.document_type.as_str())
        .text("productId", upload.product_id.to_string())
        .part("file", file))
}

fn http_error(endpoint: &str, source: reqwest::Error) -> ClientError {
    ClientError::Http {
        endpoint: endpoint.to_string(),
        source,
    }
}

/// Decode a success body, or rebuild the error carried by the envelope.
async fn decode<T: DeserializeOwned>(
    endpoint: &str,
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return resp.json().await.map_err(|e| ClientError::Deserialization {
            endpoint: endpoint.to_string(),
            source: e,
        });
    }

    let body = resp.text().await.unwrap_or_default();
    let envelope = serde_json::from_str::<ErrorEnvelope>(&body).ok();

    if status == reqwest::StatusCode::UNAUTHORIZED {
        let (code, message) = match envelope {
            Some(env) => (env.error, env.message.unwrap_or_default()),
            None => ("Unauthorized".to_string(), body),
        };
        tracing::warn!(endpoint, code = %code, "dossier API rejected the credentials");
        return Err(ClientError::SessionExpired { code, message });
    }

    let business = envelope.and_then(|env| DossierError::from_wire(&env.error, env.message, env.missing));
    match business {
        Some(source) => Err(ClientError::Api {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            source,
        }),
        None => Err(ClientError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        }),
    }
}
