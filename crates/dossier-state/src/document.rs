//! # Document Slot Status
//!
//! `PENDING` is the status of an empty slot. A committed upload is always
//! `UPLOADED`, whatever the slot held before; only a reviewer moves it on to
//! `VALIDATED` or `REJECTED`.

use dossier_core::DossierError;
use serde::{Deserialize, Serialize};

/// Status of a document slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    /// No document committed to the slot.
    Pending,
    /// A file was transferred and is waiting for review.
    Uploaded,
    /// A reviewer accepted the document.
    Validated,
    /// A reviewer refused the document.
    Rejected,
}

impl DocumentStatus {
    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Uploaded => "UPLOADED",
            Self::Validated => "VALIDATED",
            Self::Rejected => "REJECTED",
        }
    }

    /// Whether the slot counts towards completeness.
    ///
    /// `UPLOADED` or better. A rejected document must be replaced.
    pub fn satisfies_requirement(&self) -> bool {
        matches!(self, Self::Uploaded | Self::Validated)
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocumentStatus {
    type Err = DossierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Pending, Self::Uploaded, Self::Validated, Self::Rejected]
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| DossierError::Validation(format!("unknown document status \"{s}\"")))
    }
}

/// A reviewer's verdict on a single document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentDecision {
    /// Accept the document.
    Validated,
    /// Refuse the document. Requires a comment.
    Rejected,
}

impl DocumentDecision {
    /// Status the slot takes after the decision.
    pub fn status(&self) -> DocumentStatus {
        match self {
            Self::Validated => DocumentStatus::Validated,
            Self::Rejected => DocumentStatus::Rejected,
        }
    }

    /// Check the comment requirement of the decision.
    pub fn check_comment(&self, comment: Option<&str>) -> Result<(), DossierError> {
        let blank = comment.map_or(true, |c| c.trim().is_empty());
        if matches!(self, Self::Rejected) && blank {
            return Err(DossierError::Validation(
                "a rejected document requires a comment".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_uploaded_or_validated_satisfy() {
        assert!(!DocumentStatus::Pending.satisfies_requirement());
        assert!(DocumentStatus::Uploaded.satisfies_requirement());
        assert!(DocumentStatus::Validated.satisfies_requirement());
        assert!(!DocumentStatus::Rejected.satisfies_requirement());
    }

    #[test]
    fn rejection_needs_a_comment() {
        assert!(DocumentDecision::Rejected.check_comment(None).is_err());
        assert!(DocumentDecision::Rejected.check_comment(Some("  ")).is_err());
        assert!(DocumentDecision::Rejected.check_comment(Some("blurred scan")).is_ok());
        assert!(DocumentDecision::Validated.check_comment(None).is_ok());
    }
}
