use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::domain::{EligibilityDecision, EligibilityStatus, InstitutionId};

/// Notification kinds consumed by the dispatch and support-ticket
/// collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    VerificationApproved,
    VerificationRejected,
    RequiresMoreInfo,
    ManualReviewRequired,
    VerificationExpired,
    AppealSubmitted,
    AppealAssigned,
    AppealInfoRequested,
    AppealResubmitted,
    AppealResolved,
}

impl EventKind {
    pub const fn label(self) -> &'static str {
        match self {
            EventKind::VerificationApproved => "VERIFICATION_APPROVED",
            EventKind::VerificationRejected => "VERIFICATION_REJECTED",
            EventKind::RequiresMoreInfo => "REQUIRES_MORE_INFO",
            EventKind::ManualReviewRequired => "MANUAL_REVIEW_REQUIRED",
            EventKind::VerificationExpired => "VERIFICATION_EXPIRED",
            EventKind::AppealSubmitted => "APPEAL_SUBMITTED",
            EventKind::AppealAssigned => "APPEAL_ASSIGNED",
            EventKind::AppealInfoRequested => "APPEAL_INFO_REQUESTED",
            EventKind::AppealResubmitted => "APPEAL_RESUBMITTED",
            EventKind::AppealResolved => "APPEAL_RESOLVED",
        }
    }
}

/// One logical notification handed to the external dispatch collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEvent {
    pub institution_id: InstitutionId,
    pub kind: EventKind,
    pub payload: Value,
}

impl OutboundEvent {
    pub fn new(institution_id: InstitutionId, kind: EventKind, payload: Value) -> Self {
        OutboundEvent {
            institution_id,
            kind,
            payload,
        }
    }

    /// Event carried by every committed eligibility decision.
    pub fn from_decision(decision: &EligibilityDecision) -> Self {
        let kind = match decision.status {
            EligibilityStatus::Eligible => EventKind::VerificationApproved,
            EligibilityStatus::Rejected => EventKind::VerificationRejected,
            EligibilityStatus::Pending => EventKind::RequiresMoreInfo,
            EligibilityStatus::UnderReview => EventKind::ManualReviewRequired,
            EligibilityStatus::Expired => EventKind::VerificationExpired,
        };

        OutboundEvent {
            institution_id: decision.institution_id.clone(),
            kind,
            payload: json!({
                "decision_id": decision.id.0,
                "status": decision.status.label(),
                "tier": decision.tier.map(|tier| tier.label()),
                "trigger": decision.trigger.label(),
                "reason": decision.reason,
            }),
        }
    }
}

/// Outbound transport hook; implementations own their delivery guarantees.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: OutboundEvent) -> Result<(), EventError>;
}

/// Event transport failure.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("event transport unavailable: {0}")]
    Transport(String),
}

/// Fire-and-forget dispatch: delivery failures are logged and never block,
/// retry, or fail the originating transition.
pub(crate) fn dispatch(sink: &dyn EventSink, event: OutboundEvent) {
    let kind = event.kind;
    let institution_id = event.institution_id.clone();
    if let Err(error) = sink.publish(event) {
        tracing::warn!(
            %error,
            institution_id = %institution_id.0,
            event = kind.label(),
            "dropping undeliverable outbound event"
        );
    }
}
