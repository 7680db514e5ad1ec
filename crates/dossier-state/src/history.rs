//! Append-only record of applied case transitions.

use chrono::{DateTime, Utc};
use dossier_core::ActorId;
use serde::{Deserialize, Serialize};

use crate::case::{CaseStatus, CaseTransition};

/// One applied transition. Retries that were already applied leave no record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRecord {
    /// Status before the transition.
    pub from: CaseStatus,
    /// Status after the transition.
    pub to: CaseStatus,
    /// The transition applied.
    pub transition: CaseTransition,
    /// Who applied it.
    pub actor: ActorId,
    /// Optional free-text comment (review decisions, payment references).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// When it was applied.
    pub at: DateTime<Utc>,
}

impl TransitionRecord {
    /// Record a transition applied now.
    pub fn now(
        from: CaseStatus,
        to: CaseStatus,
        transition: CaseTransition,
        actor: ActorId,
        comment: Option<String>,
    ) -> Self {
        Self {
            from,
            to,
            transition,
            actor,
            comment,
            at: Utc::now(),
        }
    }
}
