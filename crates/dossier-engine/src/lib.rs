//! # dossier-engine: Compliance Dossier Workflow Engine
//!
//! In-memory engine behind the dossier service. Three parts:
//!
//! - [`CaseStore`]: cases, their product line items and lifecycle status.
//! - [`DocumentRegistry`]: document slots keyed by `(product, document type)`,
//!   with the file bytes held by a [`BlobStore`].
//! - Lifecycle operations on [`DossierEngine`] that apply the
//!   [`dossier_state`] transition table under the case lock.
//!
//! ## Locking
//!
//! Cases and document slots live in separate `DashMap`s. Every path that
//! touches both takes the case entry first, then the slot map, so uploads
//! and submission never deadlock. Uploads hold the case entry shared while
//! committing a slot; `submit` holds it exclusively across the completeness
//! check and the status write, so no upload can land between the two.
//!
//! Blob I/O happens before any lock is taken. An upload future dropped
//! mid-transfer never reaches the commit step and leaves its slot as it was.

pub mod blob;
pub mod engine;
mod lifecycle;
pub mod records;
pub mod registry;
pub mod store;

pub use blob::{BlobError, BlobStore, FsBlobStore, MemoryBlobStore};
pub use engine::DossierEngine;
pub use records::{
    CaseRecord, CaseStatistics, CaseSummary, Completeness, DocumentRecord, PaymentInvoice,
    ProductUpdate, ReviewDecision, SlotView, StatusCount, UploadRequest,
};
pub use registry::DocumentRegistry;
pub use store::CaseStore;

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, dossier_core::DossierError>;
