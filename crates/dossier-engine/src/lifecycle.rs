//! Lifecycle transitions applied under the exclusive case lock.

use chrono::Utc;
use dossier_core::{Actor, CaseId, DossierError, Role};
use dossier_state::{validate_transition, CaseStatus, CaseTransition, TransitionRecord};
use uuid::Uuid;

use crate::engine::DossierEngine;
use crate::records::{completeness_of, CaseRecord, PaymentInvoice, ReviewDecision};
use crate::Result;

impl DossierEngine {
    /// Submit a draft dossier.
    ///
    /// The completeness check and the status write happen under one
    /// exclusive lock on the case entry. A retry after success returns the
    /// case unchanged.
    pub fn submit(&self, actor: &Actor, case_id: CaseId) -> Result<CaseRecord> {
        let mut case = self.store.write(case_id)?;
        case.ensure_owner(actor)?;

        let outcome = validate_transition(case.status, CaseTransition::Submit)?;
        if !outcome.is_advance() {
            tracing::debug!(case_id = %case_id, status = %case.status, "submit already applied");
            return Ok(case.clone());
        }

        let completeness = completeness_of(&self.registry.slot_views_locked(&case));
        if !completeness.complete {
            tracing::warn!(
                case_id = %case_id,
                missing = completeness.missing.len(),
                "submission refused, dossier incomplete"
            );
            return Err(DossierError::IncompleteDossier {
                missing: completeness.missing,
            });
        }

        let now = Utc::now();
        case.submitted_at = Some(now);
        advance(&mut case, outcome.status(), CaseTransition::Submit, actor, None);
        Ok(case.clone())
    }

    /// Issue the fee invoice and wait for payment.
    pub fn require_payment(
        &self,
        actor: &Actor,
        case_id: CaseId,
        amount: &str,
        currency: &str,
    ) -> Result<CaseRecord> {
        require_role(actor, Role::Validator, CaseTransition::RequirePayment)?;
        validate_amount(amount)?;
        let currency = validate_currency(currency)?;

        self.transition(actor, case_id, CaseTransition::RequirePayment, None, |case| {
            case.payment = Some(PaymentInvoice {
                invoice_id: Uuid::new_v4(),
                amount: amount.trim().to_string(),
                currency,
                issued_at: Utc::now(),
                payment_reference: None,
                paid_at: None,
            });
            Ok(())
        })
    }

    /// Record the processor's payment confirmation.
    pub fn confirm_payment(
        &self,
        actor: &Actor,
        case_id: CaseId,
        payment_reference: &str,
    ) -> Result<CaseRecord> {
        require_role(actor, Role::Admin, CaseTransition::ConfirmPayment)?;
        let reference = non_blank(payment_reference, "payment reference")?;

        self.transition(
            actor,
            case_id,
            CaseTransition::ConfirmPayment,
            Some(reference.clone()),
            |case| {
                let case_id = case.id;
                let invoice = case.payment.as_mut().ok_or_else(|| {
                    DossierError::Conflict(format!("case {case_id} has no invoice"))
                })?;
                invoice.payment_reference = Some(reference);
                invoice.paid_at = Some(Utc::now());
                Ok(())
            },
        )
    }

    pub fn begin_review(&self, actor: &Actor, case_id: CaseId) -> Result<CaseRecord> {
        require_role(actor, Role::Validator, CaseTransition::BeginReview)?;
        self.transition(actor, case_id, CaseTransition::BeginReview, None, |_| Ok(()))
    }

    /// Approve the dossier and issue an approval number.
    pub fn approve(
        &self,
        actor: &Actor,
        case_id: CaseId,
        comment: Option<String>,
    ) -> Result<CaseRecord> {
        require_role(actor, Role::Validator, CaseTransition::Approve)?;
        let comment = comment.filter(|c| !c.trim().is_empty());

        self.transition(actor, case_id, CaseTransition::Approve, comment.clone(), |case| {
            let now = Utc::now();
            case.decision = Some(ReviewDecision {
                outcome: CaseStatus::Approved,
                comment,
                approval_number: Some(approval_number(now)),
                decided_by: actor.id,
                decided_at: now,
            });
            Ok(())
        })
    }

    /// Reject the dossier. A reason is mandatory.
    pub fn reject(&self, actor: &Actor, case_id: CaseId, reason: &str) -> Result<CaseRecord> {
        require_role(actor, Role::Validator, CaseTransition::Reject)?;
        let reason = non_blank(reason, "rejection reason")?;

        self.transition(actor, case_id, CaseTransition::Reject, Some(reason.clone()), |case| {
            case.decision = Some(ReviewDecision {
                outcome: CaseStatus::Rejected,
                comment: Some(reason),
                approval_number: None,
                decided_by: actor.id,
                decided_at: Utc::now(),
            });
            Ok(())
        })
    }

    /// Validate and apply an externally driven transition.
    ///
    /// `effect` runs only when the transition advances the case, so a retry
    /// produces no second invoice or decision.
    fn transition(
        &self,
        actor: &Actor,
        case_id: CaseId,
        transition: CaseTransition,
        comment: Option<String>,
        effect: impl FnOnce(&mut CaseRecord) -> Result<()>,
    ) -> Result<CaseRecord> {
        let mut case = self.store.write(case_id)?;
        let outcome = validate_transition(case.status, transition)?;
        if !outcome.is_advance() {
            tracing::debug!(case_id = %case_id, %transition, "transition already applied");
            return Ok(case.clone());
        }

        let mut updated = case.clone();
        effect(&mut updated)?;
        advance(&mut updated, outcome.status(), transition, actor, comment);
        *case = updated;
        Ok(case.clone())
    }
}

fn advance(
    case: &mut CaseRecord,
    to: CaseStatus,
    transition: CaseTransition,
    actor: &Actor,
    comment: Option<String>,
) {
    let from = case.status;
    let record = TransitionRecord::now(from, to, transition, actor.id, comment);
    case.status = to;
    case.updated_at = record.at;
    case.history.push(record);
    tracing::info!(case_id = %case.id, %from, %to, %transition, "case transitioned");
}

fn require_role(actor: &Actor, role: Role, transition: CaseTransition) -> Result<()> {
    if !actor.has_role(role) {
        return Err(DossierError::Authorization(format!(
            "{transition} requires the {role} role"
        )));
    }
    Ok(())
}

fn non_blank(value: &str, what: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DossierError::Validation(format!("{what} must not be empty")));
    }
    Ok(value.to_string())
}

/// Positive decimal string with at most two fractional digits.
fn validate_amount(amount: &str) -> Result<()> {
    let amount = amount.trim();
    let (whole, frac) = match amount.split_once('.') {
        Some((w, f)) => (w, Some(f)),
        None => (amount, None),
    };
    let digits_only = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    let well_formed = !whole.is_empty()
        && digits_only(whole)
        && frac.map_or(true, |f| !f.is_empty() && f.len() <= 2 && digits_only(f));
    let positive = amount.chars().any(|c| c.is_ascii_digit() && c != '0');
    if !well_formed || !positive {
        return Err(DossierError::Validation(format!(
            "invalid amount \"{amount}\" (expected a positive decimal such as 250.00)"
        )));
    }
    Ok(())
}

fn validate_currency(currency: &str) -> Result<String> {
    let currency = currency.trim().to_ascii_uppercase();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(DossierError::Validation(format!(
            "invalid currency \"{currency}\" (expected an ISO 4217 code)"
        )));
    }
    Ok(currency)
}

fn approval_number(now: chrono::DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..6].to_uppercase();
    format!("AGR-{}-{suffix}", now.format("%Y"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts() {
        for ok in ["250", "250.00", "0.50", "1.5"] {
            assert!(validate_amount(ok).is_ok(), "{ok}");
        }
        for bad in ["", "0", "0.00", "-5", "12.345", "1,000", "abc", ".5", "5."] {
            assert!(validate_amount(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn currencies() {
        assert_eq!(validate_currency("tnd").unwrap(), "TND");
        assert!(validate_currency("EURO").is_err());
        assert!(validate_currency("E1R").is_err());
    }

    #[test]
    fn approval_number_format() {
        let n = approval_number(Utc::now());
        assert!(n.starts_with("AGR-"));
        assert_eq!(n.len(), "AGR-2026-ABCDEF".len());
    }
}
