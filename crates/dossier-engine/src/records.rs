//! Record types held by the engine and returned to callers.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dossier_core::{
    legal_slots, Actor, ActorId, CaseId, DocumentId, DocumentType, DossierError, MissingSlot,
    Product, ProductId,
};
use dossier_state::{CaseStatus, DocumentStatus, TransitionRecord};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Result;

// ---------------------------------------------------------------------------
// Case
// ---------------------------------------------------------------------------

/// Fee invoice issued when payment is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInvoice {
    pub invoice_id: Uuid,
    /// Decimal string, e.g. "250.00".
    pub amount: String,
    /// ISO 4217 code.
    pub currency: String,
    pub issued_at: DateTime<Utc>,
    /// Reference reported by the payment processor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
}

/// Final review outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDecision {
    /// `APPROVED` or `REJECTED`.
    pub outcome: CaseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Issued on approval only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_number: Option<String>,
    pub decided_by: ActorId,
    pub decided_at: DateTime<Utc>,
}

/// A compliance dossier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseRecord {
    pub id: CaseId,
    /// Human-readable tracking code, unique, `DOS-YYYYMMDD-XXXXXXXX`.
    pub reference: String,
    pub owner_id: ActorId,
    pub status: CaseStatus,
    /// Insertion order is preserved.
    pub products: Vec<Product>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentInvoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<ReviewDecision>,
    /// Validator in charge of the review.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<ActorId>,
    #[serde(default)]
    pub history: Vec<TransitionRecord>,
}

impl CaseRecord {
    /// Owner-only mutations: exporters other than the owner, and every
    /// reviewer, are refused.
    pub fn ensure_owner(&self, actor: &Actor) -> Result<()> {
        if actor.id != self.owner_id {
            return Err(DossierError::Authorization(format!(
                "case {} belongs to another exporter",
                self.id
            )));
        }
        Ok(())
    }

    /// Reads: the owner, validators and admins.
    pub fn ensure_readable(&self, actor: &Actor) -> Result<()> {
        if !actor.can_read(self.owner_id) {
            return Err(DossierError::Authorization(format!(
                "case {} belongs to another exporter",
                self.id
            )));
        }
        Ok(())
    }

    /// Refuse product and document changes outside `DRAFT`.
    pub fn ensure_editable(&self) -> Result<()> {
        if !self.status.is_editable() {
            return Err(DossierError::Conflict(format!(
                "case {} is {} and can no longer be modified",
                self.id, self.status
            )));
        }
        Ok(())
    }

    pub fn product(&self, product_id: ProductId) -> Result<&Product> {
        self.products
            .iter()
            .find(|p| p.id == product_id)
            .ok_or_else(|| DossierError::not_found("product", product_id))
    }

    pub fn product_mut(&mut self, product_id: ProductId) -> Result<&mut Product> {
        self.products
            .iter_mut()
            .find(|p| p.id == product_id)
            .ok_or_else(|| DossierError::not_found("product", product_id))
    }

    pub fn summary(&self) -> CaseSummary {
        CaseSummary {
            has_dossier: true,
            case_id: Some(self.id),
            reference: Some(self.reference.clone()),
            status: Some(self.status),
            message: self.status.message().to_string(),
            next_steps: self.status.next_steps().iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Status view of the owner's dossier, as served by `GET /exportateur/dossier/statut`.
///
/// A first-time exporter gets `hasDossier: false` and no id, reference or
/// status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseSummary {
    pub has_dossier: bool,
    #[serde(rename = "demandeId", default, skip_serializing_if = "Option::is_none")]
    pub case_id: Option<CaseId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CaseStatus>,
    pub message: String,
    #[serde(default)]
    pub next_steps: Vec<String>,
}

impl CaseSummary {
    /// Answer for an exporter who never opened a dossier.
    pub fn no_dossier() -> Self {
        Self {
            has_dossier: false,
            case_id: None,
            reference: None,
            status: None,
            message: "Welcome! Open your compliance dossier to get started.".into(),
            next_steps: vec![
                "Declare the products you export".into(),
                "Upload the required documents".into(),
                "Submit the dossier for validation".into(),
            ],
        }
    }
}

/// Dossier count for one status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    pub status: CaseStatus,
    pub count: usize,
}

/// Reviewer dashboard figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseStatistics {
    pub total: usize,
    /// Every status in lifecycle order, zeros included.
    pub by_status: Vec<StatusCount>,
    /// Open dossiers assigned to the caller.
    pub assigned_to_caller: usize,
    /// Open dossiers past `DRAFT` that nobody has picked up.
    pub unassigned: usize,
}

/// Outcome of a product edit.
#[derive(Debug, Clone)]
pub struct ProductUpdate {
    pub product: Product,
    /// Documents whose slot the edit removed from the checklist.
    pub dropped: Vec<DocumentRecord>,
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// A committed document occupying one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub case_id: CaseId,
    pub product_id: ProductId,
    pub document_type: DocumentType,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    /// Lowercase hex SHA-256 of the file.
    pub sha256: String,
    /// Opaque key in the blob store.
    #[serde(skip_serializing, default)]
    pub blob_key: String,
    pub status: DocumentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_comment: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<ActorId>,
}

/// An upload as received from the caller.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub product_id: ProductId,
    pub document_type: DocumentType,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// One checklist slot of one product, with its current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotView {
    pub product_id: ProductId,
    pub document_type: DocumentType,
    pub label: String,
    pub required: bool,
    pub status: DocumentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<DocumentId>,
}

/// Result of a completeness check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completeness {
    pub complete: bool,
    pub missing: Vec<MissingSlot>,
}

/// Slot key within a case.
pub(crate) type SlotKey = (ProductId, DocumentType);

/// Evaluate every legal slot of every product against the committed documents.
///
/// The checklist is evaluated from the products' current flags.
pub(crate) fn slot_views<'a>(
    case: &CaseRecord,
    lookup: impl Fn(&SlotKey) -> Option<&'a DocumentRecord>,
) -> Vec<SlotView> {
    case.products
        .iter()
        .flat_map(|product| {
            legal_slots(product).into_iter().map(|entry| {
                let doc = lookup(&(product.id, entry.document_type));
                SlotView {
                    product_id: product.id,
                    document_type: entry.document_type,
                    label: entry.label.to_string(),
                    required: entry.required,
                    status: doc.map_or(DocumentStatus::Pending, |d| d.status),
                    document_id: doc.map(|d| d.id),
                }
            })
        })
        .collect()
}

/// Completeness derived from a slot view.
pub(crate) fn completeness_of(slots: &[SlotView]) -> Completeness {
    let missing: Vec<MissingSlot> = slots
        .iter()
        .filter(|s| s.required && !s.status.satisfies_requirement())
        .map(|s| MissingSlot {
            product_id: s.product_id,
            document_type: s.document_type,
            label: s.label.clone(),
        })
        .collect();
    Completeness {
        complete: missing.is_empty(),
        missing,
    }
}
