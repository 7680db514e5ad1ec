//! # Case State Machine
//!
//! Strictly forward lifecycle with two terminal states. Completeness of the
//! dossier is a precondition of `Submit` checked by the engine; this module
//! only encodes ordering.

use dossier_core::DossierError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// States and transitions
// ---------------------------------------------------------------------------

/// Case lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    /// Being assembled by the exporter. Products and documents are mutable.
    Draft,
    /// Submitted with every required document present.
    Submitted,
    /// Fees invoiced, waiting for payment.
    AwaitingPayment,
    /// Fees paid, waiting for a reviewer.
    Paid,
    /// A reviewer is examining the dossier.
    UnderReview,
    /// Terminal: dossier approved.
    Approved,
    /// Terminal: dossier rejected.
    Rejected,
}

impl CaseStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [CaseStatus; 7] = [
        Self::Draft,
        Self::Submitted,
        Self::AwaitingPayment,
        Self::Paid,
        Self::UnderReview,
        Self::Approved,
        Self::Rejected,
    ];

    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Submitted => "SUBMITTED",
            Self::AwaitingPayment => "AWAITING_PAYMENT",
            Self::Paid => "PAID",
            Self::UnderReview => "UNDER_REVIEW",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    /// Whether products and documents may still change.
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Draft)
    }

    /// Message shown to the exporter for this status.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Draft => "Your dossier is a draft. Upload the required documents, then submit it.",
            Self::Submitted => "Your dossier has been submitted and is waiting for the fee invoice.",
            Self::AwaitingPayment => "Your dossier is complete. Pay the registration fee to continue.",
            Self::Paid => "Payment received. Your dossier is queued for review.",
            Self::UnderReview => "Your dossier is being reviewed by a validator.",
            Self::Approved => "Your dossier has been approved.",
            Self::Rejected => "Your dossier has been rejected.",
        }
    }

    /// What the exporter should do next.
    pub fn next_steps(&self) -> &'static [&'static str] {
        match self {
            Self::Draft => &[
                "Upload every required document for each product",
                "Submit the dossier",
            ],
            Self::Submitted => &["Wait for the registration fee invoice"],
            Self::AwaitingPayment => &["Pay the registration fee"],
            Self::Paid => &["Wait for a validator to start the review"],
            Self::UnderReview => &["Wait for the review decision"],
            Self::Approved => &["Download your approval certificate"],
            Self::Rejected => &["Read the rejection reason", "Contact the validation office"],
        }
    }
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CaseStatus {
    type Err = DossierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| DossierError::Validation(format!("unknown case status \"{s}\"")))
    }
}

/// A requested lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseTransition {
    /// Exporter submits a complete dossier.
    Submit,
    /// Fees are invoiced.
    RequirePayment,
    /// The payment processor confirms the fee payment.
    ConfirmPayment,
    /// A reviewer picks up the dossier.
    BeginReview,
    /// The reviewer approves.
    Approve,
    /// The reviewer rejects.
    Reject,
}

impl CaseTransition {
    /// Wire name of the transition.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submit => "SUBMIT",
            Self::RequirePayment => "REQUIRE_PAYMENT",
            Self::ConfirmPayment => "CONFIRM_PAYMENT",
            Self::BeginReview => "BEGIN_REVIEW",
            Self::Approve => "APPROVE",
            Self::Reject => "REJECT",
        }
    }

    /// The status this transition leads to.
    pub fn target(&self) -> CaseStatus {
        match self {
            Self::Submit => CaseStatus::Submitted,
            Self::RequirePayment => CaseStatus::AwaitingPayment,
            Self::ConfirmPayment => CaseStatus::Paid,
            Self::BeginReview => CaseStatus::UnderReview,
            Self::Approve => CaseStatus::Approved,
            Self::Reject => CaseStatus::Rejected,
        }
    }
}

impl std::fmt::Display for CaseTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Result of validating a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The transition is legal and moves the case to the given status.
    Advanced(CaseStatus),
    /// The transition was already applied; the case stays where it is.
    AlreadyApplied(CaseStatus),
}

impl TransitionOutcome {
    /// Status after the transition.
    pub fn status(&self) -> CaseStatus {
        match self {
            Self::Advanced(s) | Self::AlreadyApplied(s) => *s,
        }
    }

    /// Whether the transition changes anything.
    pub fn is_advance(&self) -> bool {
        matches!(self, Self::Advanced(_))
    }
}

/// Errors from the case state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The transition is not legal from the current status.
    #[error("invalid transition: cannot apply {transition} in status {from}")]
    InvalidTransition {
        /// Current status.
        from: CaseStatus,
        /// Requested transition.
        transition: CaseTransition,
    },
}

impl From<TransitionError> for DossierError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::InvalidTransition { from, transition } => {
                DossierError::InvalidTransition {
                    from: from.to_string(),
                    transition: transition.to_string(),
                }
            }
        }
    }
}

/// Validate a transition from `current`.
///
/// Retries are tolerated: a transition whose target is the current status
/// is [`TransitionOutcome::AlreadyApplied`]. A `Submit` that arrives after
/// the case moved past `SUBMITTED` is treated the same way, since a dropped
/// submit response can be retried after payment was requested.
pub fn validate_transition(
    current: CaseStatus,
    transition: CaseTransition,
) -> Result<TransitionOutcome, TransitionError> {
    use CaseStatus as S;
    use CaseTransition as T;

    let next = match (current, transition) {
        (S::Draft, T::Submit) => S::Submitted,
        (S::Submitted, T::RequirePayment) => S::AwaitingPayment,
        (S::AwaitingPayment, T::ConfirmPayment) => S::Paid,
        (S::Paid, T::BeginReview) => S::UnderReview,
        (S::UnderReview, T::Approve) => S::Approved,
        (S::UnderReview, T::Reject) => S::Rejected,
        (s, T::Submit) if s != S::Draft => return Ok(TransitionOutcome::AlreadyApplied(s)),
        (s, t) if t.target() == s => return Ok(TransitionOutcome::AlreadyApplied(s)),
        _ => {
            return Err(TransitionError::InvalidTransition {
                from: current,
                transition,
            })
        }
    };
    Ok(TransitionOutcome::Advanced(next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL_TRANSITIONS: [CaseTransition; 6] = [
        CaseTransition::Submit,
        CaseTransition::RequirePayment,
        CaseTransition::ConfirmPayment,
        CaseTransition::BeginReview,
        CaseTransition::Approve,
        CaseTransition::Reject,
    ];

    #[test]
    fn happy_path_to_approval() {
        let mut status = CaseStatus::Draft;
        for t in [
            CaseTransition::Submit,
            CaseTransition::RequirePayment,
            CaseTransition::ConfirmPayment,
            CaseTransition::BeginReview,
            CaseTransition::Approve,
        ] {
            let outcome = validate_transition(status, t).unwrap();
            assert!(outcome.is_advance(), "{t} from {status}");
            status = outcome.status();
        }
        assert_eq!(status, CaseStatus::Approved);
        assert!(status.is_terminal());
    }

    #[test]
    fn review_can_reject() {
        assert_eq!(
            validate_transition(CaseStatus::UnderReview, CaseTransition::Reject).unwrap(),
            TransitionOutcome::Advanced(CaseStatus::Rejected)
        );
    }

    #[test]
    fn payment_cannot_be_skipped() {
        let err = validate_transition(CaseStatus::Submitted, CaseTransition::BeginReview).unwrap_err();
        assert_eq!(
            err,
            TransitionError::InvalidTransition {
                from: CaseStatus::Submitted,
                transition: CaseTransition::BeginReview,
            }
        );
    }

    #[test]
    fn draft_cannot_be_approved() {
        assert!(validate_transition(CaseStatus::Draft, CaseTransition::Approve).is_err());
        assert!(validate_transition(CaseStatus::Draft, CaseTransition::ConfirmPayment).is_err());
    }

    #[test]
    fn submit_retry_is_already_applied() {
        for s in [CaseStatus::Submitted, CaseStatus::AwaitingPayment, CaseStatus::Approved] {
            assert_eq!(
                validate_transition(s, CaseTransition::Submit).unwrap(),
                TransitionOutcome::AlreadyApplied(s)
            );
        }
    }

    #[test]
    fn confirm_payment_retry_is_already_applied() {
        assert_eq!(
            validate_transition(CaseStatus::Paid, CaseTransition::ConfirmPayment).unwrap(),
            TransitionOutcome::AlreadyApplied(CaseStatus::Paid)
        );
    }

    #[test]
    fn approve_after_reject_is_invalid() {
        assert!(validate_transition(CaseStatus::Rejected, CaseTransition::Approve).is_err());
    }

    #[test]
    fn transition_error_maps_to_dossier_error() {
        let err: DossierError =
            validate_transition(CaseStatus::Draft, CaseTransition::BeginReview)
                .unwrap_err()
                .into();
        assert_eq!(err.code(), "InvalidTransitionError");
        assert!(err.to_string().contains("BEGIN_REVIEW"));
    }

    #[test]
    fn status_wire_names_round_trip() {
        for s in CaseStatus::ALL {
            assert_eq!(s.as_str().parse::<CaseStatus>().unwrap(), s);
            assert_eq!(serde_json::to_string(&s).unwrap(), format!("\"{s}\""));
        }
        assert!("PAYEE".parse::<CaseStatus>().is_err());
    }

    #[test]
    fn every_status_has_guidance() {
        for s in CaseStatus::ALL {
            assert!(!s.message().is_empty());
            assert!(!s.next_steps().is_empty());
        }
    }

    fn rank(s: CaseStatus) -> usize {
        match s {
            CaseStatus::Draft => 0,
            CaseStatus::Submitted => 1,
            CaseStatus::AwaitingPayment => 2,
            CaseStatus::Paid => 3,
            CaseStatus::UnderReview => 4,
            CaseStatus::Approved | CaseStatus::Rejected => 5,
        }
    }

    proptest! {
        #[test]
        fn transitions_only_move_forward(
            s in proptest::sample::select(CaseStatus::ALL.to_vec()),
            t in proptest::sample::select(ALL_TRANSITIONS.to_vec()),
        ) {
            match validate_transition(s, t) {
                Ok(TransitionOutcome::Advanced(next)) => prop_assert!(rank(next) == rank(s) + 1),
                Ok(TransitionOutcome::AlreadyApplied(next)) => prop_assert_eq!(next, s),
                Err(_) => {}
            }
        }

        #[test]
        fn terminal_states_never_advance(
            t in proptest::sample::select(ALL_TRANSITIONS.to_vec()),
        ) {
            for s in [CaseStatus::Approved, CaseStatus::Rejected] {
                let advanced = matches!(validate_transition(s, t), Ok(TransitionOutcome::Advanced(_)));
                prop_assert!(!advanced);
            }
        }
    }
}
