//! # Submission Orchestrator
//!
//! Drives the three-phase exporter operation against a [`DossierApi`]:
//!
//! 1. **Create.** The case is created at most once. The returned case id and
//!    the `{local product id -> server product id}` map are kept in
//!    [`OrchestratorState`], which serialises to JSON so a later process can
//!    resume. An owner who already holds a dossier adopts it.
//! 2. **Upload.** Every document not yet `Uploaded` is sent, several at a
//!    time. Each upload is independent: a failure marks that document
//!    `Failed` and leaves the others alone.
//! 3. **Submit.** The service's completeness check is authoritative. An
//!    incomplete answer comes back as the missing slots, keyed by local
//!    product id.
//!
//! A 401 from any call aborts the run with [`OrchestratorError::SessionExpired`].
//! Nothing is retried after it, and no document that was in flight is left
//! marked `Uploading`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dossier_core::{CaseId, DocumentId, DocumentType, DossierError, MissingSlot, NewProduct, ProductId};
use dossier_engine::{CaseRecord, DocumentRecord, UploadRequest};
use dossier_state::CaseStatus;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::client::DossierApi;
use crate::error::ClientError;

/// Uploads in flight at once unless configured otherwise.
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 4;

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// A product under a caller-chosen local id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedProduct {
    pub local_id: String,
    #[serde(flatten)]
    pub product: NewProduct,
}

/// A document to upload into the slot `(product, document_type)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedDocument {
    /// Local id of the product the document belongs to.
    pub product: String,
    pub document_type: DocumentType,
    /// Where the [`DocumentSource`] finds the bytes.
    pub location: String,
    /// Defaults to the last segment of `location`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Defaults to a guess from the file extension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl PlannedDocument {
    pub fn file_name(&self) -> String {
        self.file_name.clone().unwrap_or_else(|| {
            Path::new(&self.location)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("document")
                .to_string()
        })
    }

    pub fn content_type(&self) -> String {
        if let Some(ct) = &self.content_type {
            return ct.clone();
        }
        let ext = Path::new(&self.location)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("pdf") => "application/pdf",
            Some("png") => "image/png",
            Some("jpg" | "jpeg") => "image/jpeg",
            _ => "application/octet-stream",
        }
        .to_string()
    }

    fn key(&self) -> (&str, DocumentType) {
        (self.product.as_str(), self.document_type)
    }
}

/// Everything the caller wants in the dossier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPlan {
    pub products: Vec<PlannedProduct>,
    #[serde(default)]
    pub documents: Vec<PlannedDocument>,
}

impl SubmissionPlan {
    /// Check local ids are unique and every document targets a known product
    /// and a distinct slot.
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.products.is_empty() {
            return Err(OrchestratorError::Plan("at least one product is required".into()));
        }
        let mut local_ids = HashSet::new();
        for p in &self.products {
            if p.local_id.trim().is_empty() {
                return Err(OrchestratorError::Plan("product local ids must not be empty".into()));
            }
            if !local_ids.insert(p.local_id.as_str()) {
                return Err(OrchestratorError::Plan(format!(
                    "duplicate product local id \"{}\"",
                    p.local_id
                )));
            }
        }
        let mut slots = HashSet::new();
        for d in &self.documents {
            if !local_ids.contains(d.product.as_str()) {
                return Err(OrchestratorError::Plan(format!(
                    "document {} refers to unknown product \"{}\"",
                    d.document_type, d.product
                )));
            }
            if !slots.insert(d.key()) {
                return Err(OrchestratorError::Plan(format!(
                    "two documents target {} of product \"{}\"",
                    d.document_type, d.product
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Upload progress of one planned document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadProgress {
    NotAttempted,
    Uploading,
    #[serde(rename_all = "camelCase")]
    Uploaded { document_id: DocumentId },
    Failed { reason: String, retryable: bool },
}

/// A planned document and where its upload stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEntry {
    #[serde(flatten)]
    pub document: PlannedDocument,
    pub progress: UploadProgress,
}

/// Resumable orchestrator state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_id: Option<CaseId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Last case status seen from the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CaseStatus>,
    pub products: Vec<PlannedProduct>,
    /// Local product id to server product id.
    #[serde(default)]
    pub product_map: BTreeMap<String, ProductId>,
    #[serde(default)]
    pub documents: Vec<DocumentEntry>,
}

impl OrchestratorState {
    pub fn from_plan(plan: SubmissionPlan) -> Result<Self, OrchestratorError> {
        plan.validate()?;
        Ok(Self {
            products: plan.products,
            documents: plan
                .documents
                .into_iter()
                .map(|document| DocumentEntry {
                    document,
                    progress: UploadProgress::NotAttempted,
                })
                .collect(),
            ..Self::default()
        })
    }

    /// Progress of the document planned for a slot.
    pub fn progress(&self, product: &str, document_type: DocumentType) -> Option<&UploadProgress> {
        self.entry(product, document_type).map(|e| &e.progress)
    }

    fn entry(&self, product: &str, document_type: DocumentType) -> Option<&DocumentEntry> {
        self.documents
            .iter()
            .find(|e| e.document.key() == (product, document_type))
    }

    pub fn all_uploaded(&self) -> bool {
        self.documents
            .iter()
            .all(|e| matches!(e.progress, UploadProgress::Uploaded { .. }))
    }

    /// Entries currently marked `Failed`.
    pub fn failed(&self) -> Vec<FailedUpload> {
        self.documents
            .iter()
            .filter_map(|e| match &e.progress {
                UploadProgress::Failed { reason, retryable } => Some(FailedUpload {
                    product: e.document.product.clone(),
                    document_type: e.document.document_type,
                    reason: reason.clone(),
                    retryable: *retryable,
                }),
                _ => None,
            })
            .collect()
    }

    /// Put entries left `Uploading` by an interrupted run back to
    /// `NotAttempted`. Returns how many were reset.
    pub fn reset_interrupted(&mut self) -> usize {
        let mut reset = 0;
        for entry in &mut self.documents {
            if entry.progress == UploadProgress::Uploading {
                entry.progress = UploadProgress::NotAttempted;
                reset += 1;
            }
        }
        reset
    }

    /// Merge an edited plan into a saved state.
    ///
    /// New documents are added. A document whose location, file name or
    /// content type changed is uploaded again. Products cannot change once
    /// the case exists.
    pub fn reconcile(&mut self, plan: SubmissionPlan) -> Result<(), OrchestratorError> {
        plan.validate()?;
        if self.case_id.is_some() && plan.products != self.products {
            return Err(OrchestratorError::Plan(
                "products cannot change after the dossier was created".into(),
            ));
        }
        self.products = plan.products;

        for document in plan.documents {
            match self
                .documents
                .iter_mut()
                .find(|e| e.document.key() == document.key())
            {
                Some(entry) if entry.document != document => {
                    entry.document = document;
                    entry.progress = UploadProgress::NotAttempted;
                }
                Some(_) => {}
                None => self.documents.push(DocumentEntry {
                    document,
                    progress: UploadProgress::NotAttempted,
                }),
            }
        }
        Ok(())
    }

    fn localize(&mut self, missing: Vec<MissingSlot>) -> Vec<LocalMissingSlot> {
        let by_server: HashMap<ProductId, String> = self
            .product_map
            .iter()
            .map(|(local, server)| (*server, local.clone()))
            .collect();

        missing
            .into_iter()
            .map(|slot| {
                let product = by_server.get(&slot.product_id).cloned();
                if let Some(local) = &product {
                    // The service does not hold this slot even if we thought so.
                    if let Some(entry) = self
                        .documents
                        .iter_mut()
                        .find(|e| e.document.key() == (local.as_str(), slot.document_type))
                    {
                        if matches!(entry.progress, UploadProgress::Uploaded { .. }) {
                            entry.progress = UploadProgress::Failed {
                                reason: "the service reports this slot as missing".into(),
                                retryable: true,
                            };
                        }
                    }
                }
                LocalMissingSlot {
                    product,
                    product_id: slot.product_id,
                    document_type: slot.document_type,
                    label: slot.label,
                }
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Outcomes and errors
// ---------------------------------------------------------------------------

/// A document whose upload did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedUpload {
    pub product: String,
    pub document_type: DocumentType,
    pub reason: String,
    /// Whether the same upload may succeed later (network, 5xx).
    pub retryable: bool,
}

/// A missing slot reported by the service, with its local product id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalMissingSlot {
    /// `None` when the product is not part of the plan.
    pub product: Option<String>,
    pub product_id: ProductId,
    pub document_type: DocumentType,
    pub label: String,
}

/// Result of one upload pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    /// Documents uploaded during this pass.
    pub uploaded: usize,
    pub failed: Vec<FailedUpload>,
}

/// How a run or a submit attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The service accepted the submission (or had already).
    Submitted {
        case_id: CaseId,
        reference: String,
        status: CaseStatus,
    },
    /// The service's completeness check refused the submission.
    Incomplete { missing: Vec<LocalMissingSlot> },
    /// Some uploads failed, so submission was not attempted.
    UploadsFailed { failed: Vec<FailedUpload> },
}

/// Errors that stop the orchestrator.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// 401 from the service. Re-authenticate, then resume from the saved state.
    #[error("session expired, re-authenticate and resume: {0}")]
    SessionExpired(String),

    #[error("invalid submission plan: {0}")]
    Plan(String),

    #[error("no dossier yet, create the case first")]
    NoCase,

    /// The owner's existing dossier cannot be matched to the plan.
    #[error("existing dossier {case_id} does not match the plan: {reason}")]
    AdoptionMismatch { case_id: CaseId, reason: String },

    #[error(transparent)]
    Client(ClientError),
}

impl From<ClientError> for OrchestratorError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::SessionExpired { code, message } => {
                Self::SessionExpired(format!("{code}: {message}"))
            }
            other => Self::Client(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Document bytes
// ---------------------------------------------------------------------------

/// Where the orchestrator reads document bytes from.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn read(&self, document: &PlannedDocument) -> std::io::Result<Bytes>;
}

/// Reads `location` as a path relative to a root directory.
#[derive(Debug, Clone)]
pub struct FsDocumentSource {
    root: PathBuf,
}

impl FsDocumentSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl DocumentSource for FsDocumentSource {
    async fn read(&self, document: &PlannedDocument) -> std::io::Result<Bytes> {
        let path = self.root.join(&document.location);
        tokio::fs::read(&path).await.map(Bytes::from)
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Resumable create, upload, submit driver.
pub struct SubmissionOrchestrator {
    api: Arc<dyn DossierApi>,
    source: Arc<dyn DocumentSource>,
    state: OrchestratorState,
    concurrency: usize,
}

impl std::fmt::Debug for SubmissionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionOrchestrator")
            .field("case_id", &self.state.case_id)
            .field("documents", &self.state.documents.len())
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

enum UploadFailure {
    Session(String),
    Failed { reason: String, retryable: bool },
}

impl SubmissionOrchestrator {
    /// Start from a fresh plan.
    pub fn new(
        api: Arc<dyn DossierApi>,
        source: Arc<dyn DocumentSource>,
        plan: SubmissionPlan,
    ) -> Result<Self, OrchestratorError> {
        Ok(Self::resume(api, source, OrchestratorState::from_plan(plan)?))
    }

    /// Continue from a saved state.
    pub fn resume(
        api: Arc<dyn DossierApi>,
        source: Arc<dyn DocumentSource>,
        mut state: OrchestratorState,
    ) -> Self {
        let reset = state.reset_interrupted();
        if reset > 0 {
            tracing::info!(reset, "interrupted uploads will be retried");
        }
        Self {
            api,
            source,
            state,
            concurrency: DEFAULT_UPLOAD_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn state(&self) -> &OrchestratorState {
        &self.state
    }

    pub fn into_state(self) -> OrchestratorState {
        self.state
    }

    /// Create the case unless one is already held.
    pub async fn ensure_case(&mut self) -> Result<CaseId, OrchestratorError> {
        if let Some(case_id) = self.state.case_id {
            return Ok(case_id);
        }

        let products: Vec<NewProduct> = self.state.products.iter().map(|p| p.product.clone()).collect();
        let case = match self.api.create_case(&products).await {
            Ok(case) => {
                tracing::info!(case_id = %case.id, reference = %case.reference, "dossier created");
                case
            }
            Err(
                conflict @ ClientError::Api {
                    source: DossierError::Conflict(_),
                    ..
                },
            ) => {
                tracing::info!(error = %conflict, "exporter already holds a dossier, adopting it");
                let summary = self.api.case_status().await?;
                let Some(case_id) = summary.case_id.filter(|_| summary.has_dossier) else {
                    return Err(conflict.into());
                };
                self.api.get_case(case_id).await?
            }
            Err(e) => return Err(e.into()),
        };
        self.adopt(case)
    }

    fn adopt(&mut self, case: CaseRecord) -> Result<CaseId, OrchestratorError> {
        let mismatch = |reason: String| OrchestratorError::AdoptionMismatch {
            case_id: case.id,
            reason,
        };
        if case.products.len() != self.state.products.len() {
            return Err(mismatch(format!(
                "it has {} product(s), the plan has {}",
                case.products.len(),
                self.state.products.len()
            )));
        }
        // The service keeps products in creation order.
        let mut map = BTreeMap::new();
        for (planned, server) in self.state.products.iter().zip(&case.products) {
            if planned.product.product_type != server.product_type {
                return Err(mismatch(format!(
                    "product \"{}\" is {} in the plan but {} on the service",
                    planned.local_id, planned.product.product_type, server.product_type
                )));
            }
            map.insert(planned.local_id.clone(), server.id);
        }

        self.state.product_map = map;
        self.state.case_id = Some(case.id);
        self.state.reference = Some(case.reference);
        self.state.status = Some(case.status);
        Ok(case.id)
    }

    /// Upload every document that is not `Uploaded` yet.
    pub async fn upload_pending(&mut self) -> Result<UploadReport, OrchestratorError> {
        let case_id = self.state.case_id.ok_or(OrchestratorError::NoCase)?;

        let mut jobs = Vec::new();
        for (index, entry) in self.state.documents.iter().enumerate() {
            if matches!(entry.progress, UploadProgress::Uploaded { .. }) {
                continue;
            }
            let product_id = *self.state.product_map.get(&entry.document.product).ok_or_else(|| {
                OrchestratorError::Plan(format!("product \"{}\" has no server id", entry.document.product))
            })?;
            jobs.push((index, product_id, entry.document.clone()));
        }
        if jobs.is_empty() {
            return Ok(UploadReport::default());
        }
        for (index, _, _) in &jobs {
            self.state.documents[*index].progress = UploadProgress::Uploading;
        }
        tracing::info!(case_id = %case_id, pending = jobs.len(), "uploading documents");

        let api = Arc::clone(&self.api);
        let source = Arc::clone(&self.source);
        let mut results = stream::iter(jobs)
            .map(|(index, product_id, document)| {
                let api = Arc::clone(&api);
                let source = Arc::clone(&source);
                async move {
                    let result =
                        upload_one(api.as_ref(), source.as_ref(), case_id, product_id, &document).await;
                    (index, result)
                }
            })
            .buffer_unordered(self.concurrency);

        let mut report = UploadReport::default();
        let mut expired = None;
        while let Some((index, result)) = results.next().await {
            let entry = &mut self.state.documents[index];
            match result {
                Ok(record) => {
                    tracing::info!(
                        case_id = %case_id,
                        document_type = %record.document_type,
                        document_id = %record.id,
                        "document uploaded"
                    );
                    entry.progress = UploadProgress::Uploaded {
                        document_id: record.id,
                    };
                    report.uploaded += 1;
                }
                Err(UploadFailure::Session(message)) => {
                    expired = Some(message);
                    break;
                }
                Err(UploadFailure::Failed { reason, retryable }) => {
                    tracing::warn!(
                        case_id = %case_id,
                        product = %entry.document.product,
                        document_type = %entry.document.document_type,
                        retryable,
                        "upload failed: {reason}"
                    );
                    report.failed.push(FailedUpload {
                        product: entry.document.product.clone(),
                        document_type: entry.document.document_type,
                        reason: reason.clone(),
                        retryable,
                    });
                    entry.progress = UploadProgress::Failed { reason, retryable };
                }
            }
        }
        // Dropping the stream cancels uploads still in flight.
        drop(results);

        if let Some(message) = expired {
            let reset = self.state.reset_interrupted();
            tracing::warn!(case_id = %case_id, reset, "session expired during uploads, run aborted");
            return Err(OrchestratorError::SessionExpired(message));
        }
        Ok(report)
    }

    /// Ask the service to submit the dossier.
    pub async fn submit(&mut self) -> Result<SubmissionOutcome, OrchestratorError> {
        let case_id = self.state.case_id.ok_or(OrchestratorError::NoCase)?;
        match self.api.submit(case_id).await {
            Ok(case) => {
                tracing::info!(case_id = %case_id, status = %case.status, "dossier submitted");
                self.state.status = Some(case.status);
                Ok(SubmissionOutcome::Submitted {
                    case_id,
                    reference: case.reference,
                    status: case.status,
                })
            }
            Err(ClientError::Api {
                source: DossierError::IncompleteDossier { missing },
                ..
            }) => {
                tracing::warn!(case_id = %case_id, missing = missing.len(), "submission refused, dossier incomplete");
                Ok(SubmissionOutcome::Incomplete {
                    missing: self.state.localize(missing),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Create if needed, upload what is pending, then submit when every
    /// upload went through.
    pub async fn run(&mut self) -> Result<SubmissionOutcome, OrchestratorError> {
        self.ensure_case().await?;

        if self.state.status.is_some_and(|s| s != CaseStatus::Draft) {
            return self.submit().await;
        }

        let report = self.upload_pending().await?;
        if !report.failed.is_empty() {
            return Ok(SubmissionOutcome::UploadsFailed {
                failed: report.failed,
            });
        }
        self.submit().await
    }
}

async fn upload_one(
    api: &dyn DossierApi,
    source: &dyn DocumentSource,
    case_id: CaseId,
    product_id: ProductId,
    document: &PlannedDocument,
) -> Result<DocumentRecord, UploadFailure> {
    let bytes = source.read(document).await.map_err(|e| UploadFailure::Failed {
        reason: format!("cannot read {}: {e}", document.location),
        retryable: false,
    })?;

    let request = UploadRequest {
        product_id,
        document_type: document.document_type,
        file_name: document.file_name(),
        content_type: document.content_type(),
        bytes,
    };
    api.upload_document(case_id, request)
        .await
        .map_err(|e| match e {
            ClientError::SessionExpired { code, message } => {
                UploadFailure::Session(format!("{code}: {message}"))
            }
            other => UploadFailure::Failed {
                retryable: other.is_transient(),
                reason: other.to_string(),
            },
        })
}
