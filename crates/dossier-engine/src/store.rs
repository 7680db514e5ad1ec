//! # Case Store
//!
//! Creation and retrieval of cases and their products. One dossier per
//! exporter: the owner index refuses a second `create_case`.

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::{Ref, RefMut};
use dashmap::DashMap;
use dossier_core::{
    Actor, ActorId, CaseId, DossierError, NewProduct, Product, ProductId, ProductPatch, Role,
};
use dossier_state::CaseStatus;
use uuid::Uuid;

use crate::records::{CaseRecord, CaseStatistics, CaseSummary, StatusCount};
use crate::Result;

/// In-memory case store.
pub struct CaseStore {
    cases: DashMap<CaseId, CaseRecord>,
    owners: DashMap<ActorId, CaseId>,
    references: DashMap<String, CaseId>,
}

impl CaseStore {
    pub fn new() -> Self {
        Self {
            cases: DashMap::new(),
            owners: DashMap::new(),
            references: DashMap::new(),
        }
    }

    /// Create a `DRAFT` case owned by `actor` with the given products.
    ///
    /// Products keep the order in which they were supplied.
    pub fn create_case(&self, actor: &Actor, products: Vec<NewProduct>) -> Result<CaseRecord> {
        if actor.role != Role::Exporter {
            return Err(DossierError::Authorization(
                "only exporters can create a dossier".into(),
            ));
        }
        if products.is_empty() {
            return Err(DossierError::Validation(
                "a dossier needs at least one product".into(),
            ));
        }
        for (index, product) in products.iter().enumerate() {
            product.validate().map_err(|e| match e {
                DossierError::Validation(msg) => {
                    DossierError::Validation(format!("product {index}: {msg}"))
                }
                other => other,
            })?;
        }

        let owner_slot = match self.owners.entry(actor.id) {
            Entry::Occupied(existing) => {
                return Err(DossierError::Conflict(format!(
                    "exporter already has dossier {}",
                    existing.get()
                )))
            }
            Entry::Vacant(slot) => slot,
        };

        let now = Utc::now();
        let id = CaseId::new();
        let reference = self.reserve_reference(id, now);
        let record = CaseRecord {
            id,
            reference,
            owner_id: actor.id,
            status: CaseStatus::Draft,
            products: products.into_iter().map(NewProduct::into_product).collect(),
            created_at: now,
            updated_at: now,
            submitted_at: None,
            payment: None,
            decision: None,
            assigned_to: None,
            history: Vec::new(),
        };
        self.cases.insert(id, record.clone());
        owner_slot.insert(id);

        tracing::info!(
            case_id = %id,
            reference = %record.reference,
            products = record.products.len(),
            "dossier created"
        );
        Ok(record)
    }

    /// Status of the actor's own dossier.
    ///
    /// `NotFound` means the exporter has never created one.
    pub fn case_status(&self, actor: &Actor) -> Result<CaseSummary> {
        let case_id = self
            .owners
            .get(&actor.id)
            .map(|r| *r.value())
            .ok_or_else(|| DossierError::not_found("case", format!("owner {}", actor.id)))?;
        let case = self.read(case_id)?;
        Ok(case.summary())
    }

    pub fn get_case(&self, actor: &Actor, case_id: CaseId) -> Result<CaseRecord> {
        let case = self.read(case_id)?;
        case.ensure_readable(actor)?;
        Ok(case.clone())
    }

    /// Cases visible to reviewers, newest first.
    pub fn list_cases(&self, actor: &Actor, status: Option<CaseStatus>) -> Result<Vec<CaseRecord>> {
        if !actor.has_role(Role::Validator) {
            return Err(DossierError::Authorization(
                "listing dossiers requires the validator role".into(),
            ));
        }
        let mut cases: Vec<CaseRecord> = self
            .cases
            .iter()
            .filter(|r| status.map_or(true, |s| r.value().status == s))
            .map(|r| r.value().clone())
            .collect();
        cases.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(cases)
    }

    /// Put a reviewer in charge of a case.
    ///
    /// `assignee` defaults to the caller. Validators may only take cases
    /// for themselves, and only while nobody else holds them; admins may
    /// assign or reassign anyone. Drafts and decided cases are refused.
    pub fn assign(
        &self,
        actor: &Actor,
        case_id: CaseId,
        assignee: Option<ActorId>,
    ) -> Result<CaseRecord> {
        if !actor.has_role(Role::Validator) {
            return Err(DossierError::Authorization(
                "assigning dossiers requires the validator role".into(),
            ));
        }
        let assignee = assignee.unwrap_or(actor.id);
        let is_admin = actor.has_role(Role::Admin);
        if assignee != actor.id && !is_admin {
            return Err(DossierError::Authorization(
                "only admins assign dossiers to someone else".into(),
            ));
        }

        let mut case = self.write(case_id)?;
        if case.status == CaseStatus::Draft || case.status.is_terminal() {
            return Err(DossierError::Conflict(format!(
                "case {case_id} is {} and cannot be assigned",
                case.status
            )));
        }
        match case.assigned_to {
            Some(current) if current == assignee => return Ok(case.clone()),
            Some(current) if !is_admin => {
                return Err(DossierError::Conflict(format!(
                    "case {case_id} is already assigned to {current}"
                )))
            }
            _ => {}
        }

        let previous = case.assigned_to.replace(assignee);
        case.updated_at = Utc::now();
        tracing::info!(
            case_id = %case_id,
            assignee = %assignee,
            previous = ?previous,
            "dossier assigned"
        );
        Ok(case.clone())
    }

    /// Counts per status plus the caller's workload.
    pub fn statistics(&self, actor: &Actor) -> Result<CaseStatistics> {
        if !actor.has_role(Role::Validator) {
            return Err(DossierError::Authorization(
                "statistics require the validator role".into(),
            ));
        }
        let mut assigned_to_caller = 0;
        let mut unassigned = 0;
        for entry in self.cases.iter() {
            let case = entry.value();
            if case.status == CaseStatus::Draft || case.status.is_terminal() {
                continue;
            }
            match case.assigned_to {
                Some(id) if id == actor.id => assigned_to_caller += 1,
                Some(_) => {}
                None => unassigned += 1,
            }
        }
        Ok(CaseStatistics {
            total: self.len(),
            by_status: self
                .status_counts()
                .into_iter()
                .map(|(status, count)| StatusCount { status, count })
                .collect(),
            assigned_to_caller,
            unassigned,
        })
    }

    /// Append a product to a draft case.
    pub fn add_product(&self, actor: &Actor, case_id: CaseId, product: NewProduct) -> Result<Product> {
        let mut case = self.write(case_id)?;
        case.ensure_owner(actor)?;
        case.ensure_editable()?;
        product.validate()?;

        let product = product.into_product();
        case.products.push(product.clone());
        case.updated_at = Utc::now();
        tracing::info!(case_id = %case_id, product_id = %product.id, "product added");
        Ok(product)
    }

    /// Change the attributes of a draft product.
    pub fn update_product(
        &self,
        actor: &Actor,
        case_id: CaseId,
        product_id: ProductId,
        patch: &ProductPatch,
    ) -> Result<Product> {
        let mut case = self.write(case_id)?;
        case.ensure_owner(actor)?;
        case.ensure_editable()?;

        let product = case.product_mut(product_id)?;
        patch.apply(product)?;
        let updated = product.clone();
        case.updated_at = Utc::now();
        tracing::info!(
            case_id = %case_id,
            product_id = %product_id,
            has_brand_license = updated.has_brand_license,
            "product updated"
        );
        Ok(updated)
    }

    /// Insert a record loaded from persistent storage.
    pub fn restore(&self, record: CaseRecord) {
        self.owners.insert(record.owner_id, record.id);
        self.references.insert(record.reference.clone(), record.id);
        self.cases.insert(record.id, record);
    }

    /// Number of cases per status, in lifecycle order.
    pub fn status_counts(&self) -> Vec<(CaseStatus, usize)> {
        CaseStatus::ALL
            .iter()
            .map(|s| (*s, self.cases.iter().filter(|r| r.value().status == *s).count()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Shared lock on a case entry.
    pub(crate) fn read(&self, case_id: CaseId) -> Result<Ref<'_, CaseId, CaseRecord>> {
        self.cases
            .get(&case_id)
            .ok_or_else(|| DossierError::not_found("case", case_id))
    }

    /// Exclusive lock on a case entry.
    pub(crate) fn write(&self, case_id: CaseId) -> Result<RefMut<'_, CaseId, CaseRecord>> {
        self.cases
            .get_mut(&case_id)
            .ok_or_else(|| DossierError::not_found("case", case_id))
    }

    fn reserve_reference(&self, case_id: CaseId, now: chrono::DateTime<Utc>) -> String {
        let date = now.format("%Y%m%d");
        loop {
            let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
            let reference = format!("DOS-{date}-{suffix}");
            if let Entry::Vacant(slot) = self.references.entry(reference.clone()) {
                slot.insert(case_id);
                return reference;
            }
        }
    }
}

impl Default for CaseStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CaseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaseStore")
            .field("cases_count", &self.cases.len())
            .finish()
    }
}
