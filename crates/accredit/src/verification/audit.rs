use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::InstitutionId;

/// Actor recorded when the pipeline itself performs an action.
pub const SYSTEM_ACTOR: &str = "SYSTEM";

/// Action tags recorded against the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    InstitutionRegistered,
    DocumentUploaded,
    ReviewStarted,
    DocumentAnalyzed,
    AnalysisDegraded,
    RegistryChecked,
    RegistryDegraded,
    DecisionRecorded,
    DeadlineExpired,
    AppealSubmitted,
    AppealAssigned,
    AppealInfoRequested,
    AppealResubmitted,
    AppealDecided,
}

impl AuditAction {
    pub const fn label(self) -> &'static str {
        match self {
            AuditAction::InstitutionRegistered => "INSTITUTION_REGISTERED",
            AuditAction::DocumentUploaded => "DOCUMENT_UPLOADED",
            AuditAction::ReviewStarted => "REVIEW_STARTED",
            AuditAction::DocumentAnalyzed => "DOCUMENT_ANALYZED",
            AuditAction::AnalysisDegraded => "ANALYSIS_DEGRADED",
            AuditAction::RegistryChecked => "REGISTRY_CHECKED",
            AuditAction::RegistryDegraded => "REGISTRY_DEGRADED",
            AuditAction::DecisionRecorded => "DECISION_RECORDED",
            AuditAction::DeadlineExpired => "DEADLINE_EXPIRED",
            AuditAction::AppealSubmitted => "APPEAL_SUBMITTED",
            AuditAction::AppealAssigned => "APPEAL_ASSIGNED",
            AuditAction::AppealInfoRequested => "APPEAL_INFO_REQUESTED",
            AuditAction::AppealResubmitted => "APPEAL_RESUBMITTED",
            AuditAction::AppealDecided => "APPEAL_DECIDED",
        }
    }
}

/// Input to the audit log; the store assigns the sequence number on append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub institution_id: InstitutionId,
    pub action: AuditAction,
    pub payload: Value,
    pub actor: String,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Entry performed by the pipeline rather than a named reviewer.
    pub fn system(institution_id: InstitutionId, action: AuditAction, payload: Value) -> Self {
        Self::by(institution_id, action, payload, SYSTEM_ACTOR)
    }

    pub fn by(
        institution_id: InstitutionId,
        action: AuditAction,
        payload: Value,
        actor: impl Into<String>,
    ) -> Self {
        AuditEntry {
            institution_id,
            action,
            payload,
            actor: actor.into(),
            recorded_at: Utc::now(),
        }
    }
}

/// Stored audit record with its assigned, per-process-monotonic sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub seq: u64,
    pub institution_id: InstitutionId,
    pub action: AuditAction,
    pub payload: Value,
    pub actor: String,
    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn from_entry(seq: u64, entry: AuditEntry) -> Self {
        AuditRecord {
            seq,
            institution_id: entry.institution_id,
            action: entry.action,
            payload: entry.payload,
            actor: entry.actor,
            recorded_at: entry.recorded_at,
        }
    }
}

/// Filter for the admin audit listing.
#[derive(Debug, Default, Clone)]
pub struct AuditQuery {
    pub institution_id: Option<InstitutionId>,
    pub action: Option<AuditAction>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Append-only trail; `append` is the sole write, there is no update or
/// delete. Entries for one institution are totally ordered by sequence.
pub trait AuditLog: Send + Sync {
    fn append(&self, entry: AuditEntry) -> Result<AuditRecord, AuditError>;
    fn by_institution(&self, id: &InstitutionId) -> Result<Vec<AuditRecord>, AuditError>;
    fn query(&self, filter: &AuditQuery) -> Result<Vec<AuditRecord>, AuditError>;
}

/// Audit persistence failure.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit log unavailable: {0}")]
    Unavailable(String),
}
