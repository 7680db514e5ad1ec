#![deny(missing_docs)]

//! # dossier-core: Foundational Types for the Compliance Dossier Engine
//!
//! Every other crate in the workspace depends on this one. It performs no
//! I/O and has no internal crate dependencies.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** A [`CaseId`] cannot be passed
//!    where a [`ProductId`] is expected.
//!
//! 2. **One checklist.** The document checklist per [`ProductType`] lives in
//!    [`checklist`] and the requirement set of a product is always computed
//!    by [`required_slots`] from the product's current flags. Nothing caches it.
//!
//! 3. **One error taxonomy.** [`DossierError`] carries the business error
//!    kinds shared by the engine, the HTTP service, and the client. Each kind
//!    has a stable wire code.

pub mod actor;
pub mod checklist;
pub mod digest;
pub mod error;
pub mod identity;
pub mod product;

pub use actor::{Actor, Role};
pub use checklist::{
    checklist_for, evaluate_checklist, is_legal_slot, label_of, legal_slots, required_slots,
    ChecklistEntry, DocumentType,
};
pub use digest::ContentDigest;
pub use error::{DossierError, MissingSlot};
pub use identity::{ActorId, CaseId, DocumentId, ProductId};
pub use product::{NewProduct, Product, ProductPatch, ProductType};
