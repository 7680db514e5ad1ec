//! # dossier-state: Case and Document State Machines
//!
//! Pure transition logic, no I/O. The engine applies these rules under the
//! case lock; this crate only decides whether a transition is legal and what
//! it leads to.
//!
//! ```text
//! DRAFT --submit--> SUBMITTED --requirePayment--> AWAITING_PAYMENT
//!   --confirmPayment--> PAID --beginReview--> UNDER_REVIEW
//!   --approve--> APPROVED | --reject--> REJECTED
//! ```

pub mod case;
pub mod document;
pub mod history;

pub use case::{validate_transition, CaseStatus, CaseTransition, TransitionError, TransitionOutcome};
pub use document::{DocumentDecision, DocumentStatus};
pub use history::TransitionRecord;
