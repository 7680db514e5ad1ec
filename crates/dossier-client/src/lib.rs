//! # dossier-client: Typed Client for the Dossier Service
//!
//! Two layers:
//!
//! - [`DossierClient`]: reqwest calls for the exporter side of the REST
//!   contract. Transport failures are retried with backoff; every error
//!   envelope is decoded back into a [`dossier_core::DossierError`], and 401
//!   is always [`ClientError::SessionExpired`].
//! - [`SubmissionOrchestrator`]: the resumable create, upload, submit
//!   sequence on top of any [`DossierApi`].

pub mod client;
pub mod config;
pub mod error;
pub mod orchestrator;
pub(crate) mod retry;

// Record types shared with the service.
pub use dossier_engine::{CaseRecord, CaseSummary, DocumentRecord, SlotView, UploadRequest};

pub use client::{CompletenessReport, DossierApi, DossierClient, RequiredDocument};
pub use config::{ClientConfig, ConfigError};
pub use error::ClientError;
pub use orchestrator::{
    DocumentEntry, DocumentSource, FailedUpload, FsDocumentSource, LocalMissingSlot,
    OrchestratorError, OrchestratorState, PlannedDocument, PlannedProduct, SubmissionOrchestrator,
    SubmissionOutcome, SubmissionPlan, UploadProgress, UploadReport,
};
