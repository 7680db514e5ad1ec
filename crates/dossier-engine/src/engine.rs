//! # Dossier Engine
//!
//! Facade over the [`CaseStore`] and the [`DocumentRegistry`]. Every
//! operation takes the calling [`Actor`] explicitly. Lifecycle transitions
//! are implemented in the private `lifecycle` module.

use std::sync::Arc;

use bytes::Bytes;
use dossier_core::{
    Actor, ActorId, CaseId, DocumentId, DossierError, NewProduct, Product, ProductId, ProductPatch,
};
use dossier_state::{CaseStatus, DocumentDecision, TransitionRecord};

use crate::blob::{BlobStore, MemoryBlobStore};
use crate::records::{
    CaseRecord, CaseStatistics, CaseSummary, Completeness, DocumentRecord, ProductUpdate, SlotView,
    UploadRequest,
};
use crate::registry::DocumentRegistry;
use crate::store::CaseStore;
use crate::Result;

/// The compliance dossier workflow engine.
pub struct DossierEngine {
    pub(crate) store: CaseStore,
    pub(crate) registry: DocumentRegistry,
}

impl DossierEngine {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            store: CaseStore::new(),
            registry: DocumentRegistry::new(blobs),
        }
    }

    /// Engine with an in-memory blob store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBlobStore::new()))
    }

    pub fn store(&self) -> &CaseStore {
        &self.store
    }

    pub fn registry(&self) -> &DocumentRegistry {
        &self.registry
    }

    // -- Cases ---------------------------------------------------------------

    pub fn create_case(&self, actor: &Actor, products: Vec<NewProduct>) -> Result<CaseRecord> {
        self.store.create_case(actor, products)
    }

    pub fn case_status(&self, actor: &Actor) -> Result<CaseSummary> {
        self.store.case_status(actor)
    }

    /// Status for the `statut` view: a missing dossier is a normal answer
    /// here, not an error.
    pub fn dossier_status(&self, actor: &Actor) -> Result<CaseSummary> {
        match self.store.case_status(actor) {
            Err(DossierError::NotFound { .. }) => Ok(CaseSummary::no_dossier()),
            other => other,
        }
    }

    pub fn get_case(&self, actor: &Actor, case_id: CaseId) -> Result<CaseRecord> {
        self.store.get_case(actor, case_id)
    }

    pub fn list_cases(&self, actor: &Actor, status: Option<CaseStatus>) -> Result<Vec<CaseRecord>> {
        self.store.list_cases(actor, status)
    }

    pub fn assign(
        &self,
        actor: &Actor,
        case_id: CaseId,
        assignee: Option<ActorId>,
    ) -> Result<CaseRecord> {
        self.store.assign(actor, case_id, assignee)
    }

    pub fn statistics(&self, actor: &Actor) -> Result<CaseStatistics> {
        self.store.statistics(actor)
    }

    pub fn add_product(&self, actor: &Actor, case_id: CaseId, product: NewProduct) -> Result<Product> {
        self.store.add_product(actor, case_id, product)
    }

    /// Edit a product. Documents filed under slots the edit makes
    /// unnecessary are dropped along with their bytes.
    pub async fn update_product(
        &self,
        actor: &Actor,
        case_id: CaseId,
        product_id: ProductId,
        patch: &ProductPatch,
    ) -> Result<ProductUpdate> {
        let product = self
            .store
            .update_product(actor, case_id, product_id, patch)?;
        let dropped = self.registry.drop_unrequired(&self.store, case_id).await?;
        Ok(ProductUpdate { product, dropped })
    }

    pub fn history(&self, actor: &Actor, case_id: CaseId) -> Result<Vec<TransitionRecord>> {
        Ok(self.store.get_case(actor, case_id)?.history)
    }

    // -- Documents -----------------------------------------------------------

    pub async fn upload(
        &self,
        actor: &Actor,
        case_id: CaseId,
        request: UploadRequest,
    ) -> Result<DocumentRecord> {
        self.registry.upload(&self.store, actor, case_id, request).await
    }

    pub fn list_documents(&self, actor: &Actor, case_id: CaseId) -> Result<Vec<DocumentRecord>> {
        self.registry.list_by_case(&self.store, actor, case_id)
    }

    pub fn slots(&self, actor: &Actor, case_id: CaseId) -> Result<Vec<SlotView>> {
        self.registry.slots(&self.store, actor, case_id)
    }

    pub fn completeness_check(&self, actor: &Actor, case_id: CaseId) -> Result<Completeness> {
        self.registry.completeness_check(&self.store, actor, case_id)
    }

    pub fn get_document(&self, actor: &Actor, document_id: DocumentId) -> Result<DocumentRecord> {
        self.registry.get_document(&self.store, actor, document_id)
    }

    pub async fn download(
        &self,
        actor: &Actor,
        document_id: DocumentId,
    ) -> Result<(DocumentRecord, Bytes)> {
        self.registry.download(&self.store, actor, document_id).await
    }

    pub fn review_document(
        &self,
        actor: &Actor,
        document_id: DocumentId,
        decision: DocumentDecision,
        comment: Option<String>,
    ) -> Result<DocumentRecord> {
        self.registry
            .review(&self.store, actor, document_id, decision, comment)
    }

    // -- Hydration -----------------------------------------------------------

    /// Load a case and its documents from persistent storage.
    pub fn restore(&self, case: CaseRecord, documents: Vec<DocumentRecord>) {
        self.store.restore(case);
        for doc in documents {
            self.registry.restore(doc);
        }
    }
}

impl std::fmt::Debug for DossierEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DossierEngine")
            .field("store", &self.store)
            .field("registry", &self.registry)
            .finish()
    }
}
