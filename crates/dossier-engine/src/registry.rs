//! # Document Registry
//!
//! One slot per `(product, document type)`. A slot holds at most one
//! current document; a new upload replaces it (last write wins) and resets
//! its status to `UPLOADED`. The replaced file is deleted from the blob
//! store once the new one is committed.
//!
//! Uploads are staged: bytes go to the blob store first, then the slot is
//! committed under the case entry lock after re-checking that the case is
//! still a draft.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Duration, DurationRound, Utc};
use dashmap::DashMap;
use dossier_core::{
    is_legal_slot, Actor, CaseId, ContentDigest, DocumentId, DocumentType, DossierError,
    ProductId, Role,
};
use dossier_state::{DocumentDecision, DocumentStatus};

use crate::blob::BlobStore;
use crate::records::{
    completeness_of, slot_views, CaseRecord, Completeness, DocumentRecord, SlotKey, SlotView,
    UploadRequest,
};
use crate::store::CaseStore;
use crate::Result;

type CaseDocuments = BTreeMap<SlotKey, DocumentRecord>;

/// Document slots of every case, plus the blob store holding their bytes.
pub struct DocumentRegistry {
    slots: DashMap<CaseId, CaseDocuments>,
    index: DashMap<DocumentId, CaseId>,
    blobs: Arc<dyn BlobStore>,
}

impl DocumentRegistry {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            slots: DashMap::new(),
            index: DashMap::new(),
            blobs,
        }
    }

    pub fn blob_store(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Upload a document into its slot.
    pub async fn upload(
        &self,
        store: &CaseStore,
        actor: &Actor,
        case_id: CaseId,
        request: UploadRequest,
    ) -> Result<DocumentRecord> {
        if request.bytes.is_empty() {
            return Err(DossierError::Validation("the uploaded file is empty".into()));
        }
        if request.file_name.trim().is_empty() {
            return Err(DossierError::Validation("the uploaded file has no name".into()));
        }
        {
            let case = store.read(case_id)?;
            check_slot(&case, actor, request.product_id, request.document_type)?;
        }

        let document_id = DocumentId::new();
        let blob_key = format!("{case_id}/{}/{document_id}", request.product_id);
        let digest = ContentDigest::of(&request.bytes);
        let size_bytes = request.bytes.len() as u64;
        self.blobs.put(&blob_key, request.bytes.clone()).await?;

        let record = DocumentRecord {
            id: document_id,
            case_id,
            product_id: request.product_id,
            document_type: request.document_type,
            file_name: request.file_name.trim().to_string(),
            content_type: request.content_type,
            size_bytes,
            sha256: digest.to_hex(),
            blob_key: blob_key.clone(),
            status: DocumentStatus::Uploaded,
            review_comment: None,
            uploaded_at: Utc::now(),
            reviewed_at: None,
            reviewed_by: None,
        };

        // The case may have been submitted while the bytes were in flight.
        let committed = self.commit(store, actor, record);
        let (record, replaced) = match committed {
            Ok(committed) => committed,
            Err(e) => {
                self.discard_blob(&blob_key).await;
                return Err(e);
            }
        };
        if let Some(old) = replaced {
            self.discard_blob(&old.blob_key).await;
        }

        tracing::info!(
            case_id = %case_id,
            product_id = %record.product_id,
            document_type = %record.document_type,
            document_id = %record.id,
            size_bytes,
            "document uploaded"
        );
        Ok(record)
    }

    /// Commit a staged document, returning it along with the record it
    /// replaced.
    ///
    /// `uploaded_at` is stamped here, so the record that wins a slot always
    /// carries the latest timestamp of that slot.
    fn commit(
        &self,
        store: &CaseStore,
        actor: &Actor,
        mut record: DocumentRecord,
    ) -> Result<(DocumentRecord, Option<DocumentRecord>)> {
        let case = store.read(record.case_id)?;
        check_slot(&case, actor, record.product_id, record.document_type)?;

        let mut docs = self.slots.entry(record.case_id).or_default();
        let key = (record.product_id, record.document_type);
        record.uploaded_at = commit_time(docs.get(&key).map(|d| d.uploaded_at), Utc::now());
        let replaced = docs.insert(key, record.clone());
        self.index.insert(record.id, case.id);
        if let Some(old) = &replaced {
            self.index.remove(&old.id);
        }
        Ok((record, replaced))
    }

    /// Drop the documents of slots the case's products no longer call for,
    /// such as a brand license once the flag is cleared.
    pub(crate) async fn drop_unrequired(
        &self,
        store: &CaseStore,
        case_id: CaseId,
    ) -> Result<Vec<DocumentRecord>> {
        let dropped: Vec<DocumentRecord> = {
            let case = store.read(case_id)?;
            let Some(mut docs) = self.slots.get_mut(&case_id) else {
                return Ok(Vec::new());
            };
            let stale: Vec<SlotKey> = docs
                .keys()
                .filter(|(product_id, document_type)| {
                    case.product(*product_id)
                        .map_or(true, |p| !is_legal_slot(p, *document_type))
                })
                .copied()
                .collect();
            let dropped = stale.iter().filter_map(|key| docs.remove(key)).collect();
            dropped
        };

        for doc in &dropped {
            self.index.remove(&doc.id);
            self.discard_blob(&doc.blob_key).await;
            tracing::info!(
                case_id = %case_id,
                product_id = %doc.product_id,
                document_type = %doc.document_type,
                document_id = %doc.id,
                "document no longer required, dropped"
            );
        }
        Ok(dropped)
    }

    async fn discard_blob(&self, key: &str) {
        if let Err(e) = self.blobs.delete(key).await {
            tracing::warn!(blob_key = %key, error = %e, "failed to delete blob");
        }
    }

    /// Every document committed for a case, ordered by slot.
    pub fn list_by_case(
        &self,
        store: &CaseStore,
        actor: &Actor,
        case_id: CaseId,
    ) -> Result<Vec<DocumentRecord>> {
        let case = store.read(case_id)?;
        case.ensure_readable(actor)?;
        Ok(self
            .slots
            .get(&case_id)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    /// Every legal slot of every product with its current status.
    pub fn slots(&self, store: &CaseStore, actor: &Actor, case_id: CaseId) -> Result<Vec<SlotView>> {
        let case = store.read(case_id)?;
        case.ensure_readable(actor)?;
        Ok(self.slot_views_locked(&case))
    }

    /// Which required slots are still unmet.
    pub fn completeness_check(
        &self,
        store: &CaseStore,
        actor: &Actor,
        case_id: CaseId,
    ) -> Result<Completeness> {
        let case = store.read(case_id)?;
        case.ensure_readable(actor)?;
        Ok(completeness_of(&self.slot_views_locked(&case)))
    }

    /// Slot views for a case whose entry the caller already holds.
    pub(crate) fn slot_views_locked(&self, case: &CaseRecord) -> Vec<SlotView> {
        match self.slots.get(&case.id) {
            Some(docs) => slot_views(case, |key| docs.get(key)),
            None => slot_views(case, |_| None),
        }
    }

    pub fn get_document(
        &self,
        store: &CaseStore,
        actor: &Actor,
        document_id: DocumentId,
    ) -> Result<DocumentRecord> {
        let case_id = self.case_of(document_id)?;
        let case = store.read(case_id)?;
        case.ensure_readable(actor)?;
        self.find(case_id, document_id)
    }

    /// Metadata and bytes of a document.
    pub async fn download(
        &self,
        store: &CaseStore,
        actor: &Actor,
        document_id: DocumentId,
    ) -> Result<(DocumentRecord, Bytes)> {
        let record = self.get_document(store, actor, document_id)?;
        let bytes = self.blobs.get(&record.blob_key).await?;
        Ok((record, bytes))
    }

    /// Record a reviewer's verdict on a document.
    pub fn review(
        &self,
        store: &CaseStore,
        actor: &Actor,
        document_id: DocumentId,
        decision: DocumentDecision,
        comment: Option<String>,
    ) -> Result<DocumentRecord> {
        if !actor.has_role(Role::Validator) {
            return Err(DossierError::Authorization(
                "document review requires the validator role".into(),
            ));
        }
        decision.check_comment(comment.as_deref())?;

        let case_id = self.case_of(document_id)?;
        let case = store.read(case_id)?;
        if case.status.is_terminal() {
            return Err(DossierError::Conflict(format!(
                "case {case_id} is {} and its documents can no longer be reviewed",
                case.status
            )));
        }

        let mut docs = self
            .slots
            .get_mut(&case_id)
            .ok_or_else(|| DossierError::not_found("document", document_id))?;
        let doc = docs
            .values_mut()
            .find(|d| d.id == document_id)
            .ok_or_else(|| DossierError::not_found("document", document_id))?;
        doc.status = decision.status();
        doc.review_comment = comment;
        doc.reviewed_at = Some(Utc::now());
        doc.reviewed_by = Some(actor.id);

        tracing::info!(
            case_id = %case_id,
            document_id = %document_id,
            status = %doc.status,
            "document reviewed"
        );
        Ok(doc.clone())
    }

    /// Insert a record loaded from persistent storage.
    pub fn restore(&self, record: DocumentRecord) {
        self.index.insert(record.id, record.case_id);
        self.slots
            .entry(record.case_id)
            .or_default()
            .insert((record.product_id, record.document_type), record);
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn case_of(&self, document_id: DocumentId) -> Result<CaseId> {
        self.index
            .get(&document_id)
            .map(|r| *r.value())
            .ok_or_else(|| DossierError::not_found("document", document_id))
    }

    fn find(&self, case_id: CaseId, document_id: DocumentId) -> Result<DocumentRecord> {
        self.slots
            .get(&case_id)
            .and_then(|docs| docs.values().find(|d| d.id == document_id).cloned())
            .ok_or_else(|| DossierError::not_found("document", document_id))
    }
}

impl std::fmt::Debug for DocumentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentRegistry")
            .field("documents_count", &self.index.len())
            .field("blob_store", &self.blobs.kind())
            .finish()
    }
}

/// Upload time of a committed document: the clock in whole microseconds,
/// the precision Postgres keeps, and always after the slot's previous
/// occupant.
fn commit_time(previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    let now = now.duration_trunc(Duration::microseconds(1)).unwrap_or(now);
    match previous {
        Some(previous) if now <= previous => previous + Duration::microseconds(1),
        _ => now,
    }
}

/// Upload checks, run before the transfer and again at commit time.
fn check_slot(
    case: &CaseRecord,
    actor: &Actor,
    product_id: ProductId,
    document_type: DocumentType,
) -> Result<()> {
    case.ensure_owner(actor)?;
    let product = case.product(product_id)?;
    if !is_legal_slot(product, document_type) {
        return Err(DossierError::Validation(format!(
            "{document_type} is not a document slot for {} products",
            product.product_type
        )));
    }
    case.ensure_editable()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn commit_time_is_truncated_to_microseconds() {
        let now = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let stamped = commit_time(None, now);
        assert_eq!(stamped.timestamp_subsec_nanos(), 123_456_000);
    }

    #[test]
    fn replacement_is_always_stamped_after_its_predecessor() {
        let previous = Utc.timestamp_opt(1_700_000_000, 500_000_000).unwrap();

        // Same microsecond, and a clock that stepped backwards.
        let same = Utc.timestamp_opt(1_700_000_000, 500_000_400).unwrap();
        let earlier = Utc.timestamp_opt(1_699_999_999, 0).unwrap();
        for now in [same, earlier] {
            assert_eq!(commit_time(Some(previous), now), previous + Duration::microseconds(1));
        }

        let later = Utc.timestamp_opt(1_700_000_001, 0).unwrap();
        assert_eq!(commit_time(Some(previous), later), later);
    }
}
