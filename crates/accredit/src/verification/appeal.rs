use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use super::audit::{AuditAction, AuditEntry, SYSTEM_ACTOR};
use super::decision::DecisionEngine;
use super::domain::{
    Appeal, AppealId, AppealState, AppealVerdict, DocumentId, EligibilityStatus, InstitutionId,
};
use super::events::{dispatch, EventKind, EventSink, OutboundEvent};
use super::grace;
use super::repository::{
    AppealFilter, AppealRepository, DecisionFilter, InstitutionRepository, RepositoryError,
};

/// Shortest justification accepted for an appeal, in characters.
pub const MIN_JUSTIFICATION_CHARS: usize = 50;

/// Error raised by the appeal workflow.
#[derive(Debug, thiserror::Error)]
pub enum AppealError {
    #[error("{0}")]
    Validation(String),
    #[error("cannot {action} an appeal in state {}", .state.label())]
    InvalidTransition {
        state: AppealState,
        action: &'static str,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// State machine over appeals: submit, assign, request info, resubmit,
/// decide. Transitions not listed on the current state fail without touching
/// it, and each accepted transition lands exactly one audit entry.
pub struct AppealService {
    institutions: Arc<dyn InstitutionRepository>,
    appeals: Arc<dyn AppealRepository>,
    events: Arc<dyn EventSink>,
    engine: DecisionEngine,
}

impl AppealService {
    pub fn new(
        institutions: Arc<dyn InstitutionRepository>,
        appeals: Arc<dyn AppealRepository>,
        events: Arc<dyn EventSink>,
        engine: DecisionEngine,
    ) -> Self {
        AppealService {
            institutions,
            appeals,
            events,
            engine,
        }
    }

    /// Open an appeal against the institution's standing rejection.
    ///
    /// The contested decision is resolved internally: the most recent
    /// rejection on record. At most one appeal may be open per institution;
    /// the check and the insert are one atomic repository step.
    pub fn submit(
        &self,
        institution_id: &InstitutionId,
        justification: &str,
        evidence: Vec<DocumentId>,
    ) -> Result<Appeal, AppealError> {
        let justification = justification.trim();
        if justification.chars().count() < MIN_JUSTIFICATION_CHARS {
            return Err(AppealError::Validation(format!(
                "appeal justification must be at least {MIN_JUSTIFICATION_CHARS} characters"
            )));
        }

        let institution = self
            .institutions
            .fetch_institution(institution_id)?
            .ok_or(RepositoryError::NotFound)?;
        if institution.status != EligibilityStatus::Rejected {
            return Err(AppealError::Validation(format!(
                "only rejected institutions may appeal (current status {})",
                institution.status.label()
            )));
        }

        let decisions = self.institutions.decisions(&DecisionFilter {
            institution_id: Some(institution_id.clone()),
            ..Default::default()
        })?;
        let contested = decisions
            .iter()
            .rev()
            .find(|decision| decision.status == EligibilityStatus::Rejected)
            .ok_or_else(|| {
                RepositoryError::Integrity(
                    "institution is rejected but no rejection decision is on record".to_string(),
                )
            })?;

        let appeal = Appeal {
            id: AppealId::next(),
            institution_id: institution_id.clone(),
            decision_id: contested.id.clone(),
            state: AppealState::Pending,
            justification: justification.to_string(),
            evidence,
            reviewer_id: None,
            reviewer_notes: None,
            requested_documents: Vec::new(),
            decision_reason: None,
            submitted_at: Utc::now(),
            reviewed_at: None,
            extended_deadline: None,
        };

        let audit = AuditEntry::by(
            institution_id.clone(),
            AuditAction::AppealSubmitted,
            json!({
                "appeal_id": appeal.id.0,
                "decision_id": appeal.decision_id.0,
                "evidence_count": appeal.evidence.len(),
            }),
            institution_id.0.clone(),
        );
        let appeal = match self.appeals.create_appeal(appeal, audit) {
            Ok(appeal) => appeal,
            Err(RepositoryError::OpenAppealExists) => {
                return Err(AppealError::Validation(
                    "an appeal is already open for this institution".to_string(),
                ));
            }
            Err(error) => return Err(error.into()),
        };

        dispatch(
            self.events.as_ref(),
            OutboundEvent::new(
                institution_id.clone(),
                EventKind::AppealSubmitted,
                json!({
                    "appeal_id": appeal.id.0,
                    "decision_id": appeal.decision_id.0,
                }),
            ),
        );
        Ok(appeal)
    }

    /// Hand a pending appeal to a reviewer.
    pub fn assign(&self, appeal_id: &AppealId, reviewer_id: &str) -> Result<Appeal, AppealError> {
        let mut appeal = self.fetch(appeal_id)?;
        if appeal.state != AppealState::Pending {
            return Err(AppealError::InvalidTransition {
                state: appeal.state,
                action: "assign",
            });
        }

        appeal.state = AppealState::UnderReview;
        appeal.reviewer_id = Some(reviewer_id.to_string());

        let audit = AuditEntry::by(
            appeal.institution_id.clone(),
            AuditAction::AppealAssigned,
            json!({ "appeal_id": appeal.id.0, "reviewer_id": reviewer_id }),
            reviewer_id,
        );
        self.appeals.update_appeal(appeal.clone(), audit)?;

        dispatch(
            self.events.as_ref(),
            OutboundEvent::new(
                appeal.institution_id.clone(),
                EventKind::AppealAssigned,
                json!({ "appeal_id": appeal.id.0, "reviewer_id": reviewer_id }),
            ),
        );
        Ok(appeal)
    }

    /// Park an appeal while the institution gathers requested documents.
    pub fn request_more_info(
        &self,
        appeal_id: &AppealId,
        requested_documents: Vec<String>,
        message: &str,
    ) -> Result<Appeal, AppealError> {
        let mut appeal = self.fetch(appeal_id)?;
        if appeal.state != AppealState::UnderReview {
            return Err(AppealError::InvalidTransition {
                state: appeal.state,
                action: "request more information for",
            });
        }

        appeal.state = AppealState::AdditionalInfo;
        appeal.requested_documents = requested_documents;
        appeal.reviewer_notes = Some(message.to_string());

        let actor = appeal
            .reviewer_id
            .clone()
            .unwrap_or_else(|| SYSTEM_ACTOR.to_string());
        let audit = AuditEntry::by(
            appeal.institution_id.clone(),
            AuditAction::AppealInfoRequested,
            json!({
                "appeal_id": appeal.id.0,
                "requested_documents": appeal.requested_documents,
                "message": message,
            }),
            actor,
        );
        self.appeals.update_appeal(appeal.clone(), audit)?;

        dispatch(
            self.events.as_ref(),
            OutboundEvent::new(
                appeal.institution_id.clone(),
                EventKind::AppealInfoRequested,
                json!({
                    "appeal_id": appeal.id.0,
                    "requested_documents": appeal.requested_documents,
                }),
            ),
        );
        Ok(appeal)
    }

    /// Institution response to an information request; review resumes.
    pub fn resubmit(
        &self,
        appeal_id: &AppealId,
        evidence: Vec<DocumentId>,
    ) -> Result<Appeal, AppealError> {
        let mut appeal = self.fetch(appeal_id)?;
        if appeal.state != AppealState::AdditionalInfo {
            return Err(AppealError::InvalidTransition {
                state: appeal.state,
                action: "resubmit",
            });
        }

        appeal.state = AppealState::UnderReview;
        appeal.evidence.extend(evidence.iter().cloned());

        let audit = AuditEntry::by(
            appeal.institution_id.clone(),
            AuditAction::AppealResubmitted,
            json!({
                "appeal_id": appeal.id.0,
                "added_evidence": evidence.iter().map(|id| id.0.clone()).collect::<Vec<_>>(),
            }),
            appeal.institution_id.0.clone(),
        );
        self.appeals.update_appeal(appeal.clone(), audit)?;

        dispatch(
            self.events.as_ref(),
            OutboundEvent::new(
                appeal.institution_id.clone(),
                EventKind::AppealResubmitted,
                json!({ "appeal_id": appeal.id.0 }),
            ),
        );
        Ok(appeal)
    }

    /// Terminal call on an appeal under review.
    ///
    /// Approval issues a fresh manual decision overriding the contested
    /// rejection and, when granted, pushes the verification deadline out by
    /// `extend_grace_period_days`.
    pub fn decide(
        &self,
        appeal_id: &AppealId,
        verdict: AppealVerdict,
        reason: &str,
        reviewer_id: &str,
        extend_grace_period_days: Option<i64>,
    ) -> Result<Appeal, AppealError> {
        let mut appeal = self.fetch(appeal_id)?;
        if appeal.state != AppealState::UnderReview {
            return Err(AppealError::InvalidTransition {
                state: appeal.state,
                action: "decide",
            });
        }

        let mut institution = self
            .institutions
            .fetch_institution(&appeal.institution_id)?
            .ok_or(RepositoryError::NotFound)?;

        let now = Utc::now();
        appeal.state = match verdict {
            AppealVerdict::Approved => AppealState::Approved,
            AppealVerdict::Rejected => AppealState::Rejected,
        };
        appeal.reviewer_id = Some(reviewer_id.to_string());
        appeal.decision_reason = Some(reason.to_string());
        appeal.reviewed_at = Some(now);

        if verdict == AppealVerdict::Approved {
            if let Some(days) = extend_grace_period_days {
                let base = institution.verification_deadline.unwrap_or(now);
                let extended = grace::extend(base, days);
                appeal.extended_deadline = Some(extended);
                institution.verification_deadline = Some(extended);
            }
        }

        let audit = AuditEntry::by(
            appeal.institution_id.clone(),
            AuditAction::AppealDecided,
            json!({
                "appeal_id": appeal.id.0,
                "verdict": appeal.state.label(),
                "reason": reason,
            }),
            reviewer_id,
        );
        self.appeals.update_appeal(appeal.clone(), audit)?;

        if verdict == AppealVerdict::Approved {
            let decision = self.engine.manual_override(
                &institution,
                reviewer_id,
                format!("appeal {} approved: {reason}", appeal.id.0),
            );
            institution.status = decision.status;
            institution.tier = decision.tier;

            let audit = AuditEntry::by(
                appeal.institution_id.clone(),
                AuditAction::DecisionRecorded,
                json!({
                    "decision_id": decision.id.0,
                    "status": decision.status.label(),
                    "tier": decision.tier.map(|tier| tier.label()),
                    "trigger": decision.trigger.label(),
                }),
                reviewer_id,
            );
            let decision = self
                .institutions
                .commit_decision(institution, decision, audit)?;
            dispatch(self.events.as_ref(), OutboundEvent::from_decision(&decision));
        }

        dispatch(
            self.events.as_ref(),
            OutboundEvent::new(
                appeal.institution_id.clone(),
                EventKind::AppealResolved,
                json!({
                    "appeal_id": appeal.id.0,
                    "verdict": appeal.state.label(),
                    "reason": reason,
                }),
            ),
        );
        Ok(appeal)
    }

    pub fn get(&self, appeal_id: &AppealId) -> Result<Appeal, AppealError> {
        self.fetch(appeal_id)
    }

    pub fn list(&self, filter: &AppealFilter) -> Result<Vec<Appeal>, AppealError> {
        Ok(self.appeals.appeals(filter)?)
    }

    fn fetch(&self, appeal_id: &AppealId) -> Result<Appeal, AppealError> {
        Ok(self
            .appeals
            .fetch_appeal(appeal_id)?
            .ok_or(RepositoryError::NotFound)?)
    }
}
