use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for registered institutions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstitutionId(pub String);

static INSTITUTION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

impl InstitutionId {
    /// Mint the next process-local identifier.
    pub fn next() -> Self {
        let id = INSTITUTION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        InstitutionId(format!("ins-{id:06}"))
    }
}

/// Identifier wrapper for uploaded verification documents.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

static DOCUMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

impl DocumentId {
    pub fn next() -> Self {
        let id = DOCUMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        DocumentId(format!("doc-{id:06}"))
    }
}

/// Identifier wrapper for eligibility decisions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DecisionId(pub String);

static DECISION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

impl DecisionId {
    pub fn next() -> Self {
        let id = DECISION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        DecisionId(format!("dec-{id:06}"))
    }
}

/// Identifier wrapper for appeals.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AppealId(pub String);

static APPEAL_SEQUENCE: AtomicU64 = AtomicU64::new(1);

impl AppealId {
    pub fn next() -> Self {
        let id = APPEAL_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        AppealId(format!("apl-{id:06}"))
    }
}

/// Where an institution stands in the verification lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EligibilityStatus {
    Pending,
    UnderReview,
    Eligible,
    Rejected,
    Expired,
}

impl EligibilityStatus {
    pub const fn label(self) -> &'static str {
        match self {
            EligibilityStatus::Pending => "PENDING",
            EligibilityStatus::UnderReview => "UNDER_REVIEW",
            EligibilityStatus::Eligible => "ELIGIBLE",
            EligibilityStatus::Rejected => "REJECTED",
            EligibilityStatus::Expired => "EXPIRED",
        }
    }
}

/// Subscription tier, derived purely from the declared student count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    Foundation,
    Growth,
    Scale,
    Enterprise,
}

impl Tier {
    pub const fn for_student_count(count: u32) -> Self {
        if count >= 5000 {
            Tier::Enterprise
        } else if count >= 1500 {
            Tier::Scale
        } else if count >= 500 {
            Tier::Growth
        } else {
            Tier::Foundation
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Tier::Foundation => "Foundation",
            Tier::Growth => "Growth",
            Tier::Scale => "Scale",
            Tier::Enterprise => "Enterprise",
        }
    }
}

/// An education provider registered on the platform.
///
/// Status and tier are mutated only by the decision engine and the appeal
/// workflow; institutions are never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Institution {
    pub id: InstitutionId,
    pub name: String,
    pub student_count: u32,
    pub status: EligibilityStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_deadline: Option<DateTime<Utc>>,
    pub registered_at: DateTime<Utc>,
}

/// Closed set of document categories the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    AicteApproval,
    NcteRecognition,
    StateGovernmentApproval,
    EnrollmentData,
    StudentIdSample,
}

impl DocumentType {
    pub const fn label(self) -> &'static str {
        match self {
            DocumentType::AicteApproval => "AICTE_APPROVAL",
            DocumentType::NcteRecognition => "NCTE_RECOGNITION",
            DocumentType::StateGovernmentApproval => "STATE_GOVERNMENT_APPROVAL",
            DocumentType::EnrollmentData => "ENROLLMENT_DATA",
            DocumentType::StudentIdSample => "STUDENT_ID_SAMPLE",
        }
    }

    pub const fn is_approval_certificate(self) -> bool {
        matches!(
            self,
            DocumentType::AicteApproval
                | DocumentType::NcteRecognition
                | DocumentType::StateGovernmentApproval
        )
    }

    /// Registry that can corroborate an approval certificate of this type.
    pub const fn registry_name(self) -> Option<&'static str> {
        match self {
            DocumentType::AicteApproval => Some("AICTE"),
            DocumentType::NcteRecognition => Some("NCTE"),
            DocumentType::StateGovernmentApproval => Some("STATE_GOVERNMENT"),
            DocumentType::EnrollmentData | DocumentType::StudentIdSample => None,
        }
    }
}

/// A document submitted as verification evidence.
///
/// Re-analysis appends to `analyses`; earlier results are retained for audit
/// and never overwritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationDocument {
    pub id: DocumentId,
    pub institution_id: InstitutionId,
    pub document_type: DocumentType,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub storage_ref: String,
    pub uploaded_at: DateTime<Utc>,
    pub analyses: Vec<AnalysisResult>,
}

impl VerificationDocument {
    pub fn latest_analysis(&self) -> Option<&AnalysisResult> {
        self.analyses.last()
    }
}

/// Finding categories raised by document analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RedFlagKind {
    Forgery,
    Manipulation,
    Expired,
    Incomplete,
    Mismatch,
    Suspicious,
}

impl RedFlagKind {
    pub const fn label(self) -> &'static str {
        match self {
            RedFlagKind::Forgery => "FORGERY",
            RedFlagKind::Manipulation => "MANIPULATION",
            RedFlagKind::Expired => "EXPIRED",
            RedFlagKind::Incomplete => "INCOMPLETE",
            RedFlagKind::Mismatch => "MISMATCH",
            RedFlagKind::Suspicious => "SUSPICIOUS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub const fn label(self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
        }
    }
}

/// A typed, severity-ranked finding from document analysis.
///
/// HIGH flags always carry a concrete description; any HIGH flag forces
/// manual review regardless of the numeric scores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedFlag {
    pub kind: RedFlagKind,
    pub severity: Severity,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Outcome of one analysis pass over a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub document_id: DocumentId,
    pub document_type: DocumentType,
    pub authenticity_score: f32,
    pub completeness_score: f32,
    pub red_flags: Vec<RedFlag>,
    pub extracted_fields: BTreeMap<String, String>,
    pub recommendations: Vec<String>,
    pub analyzed_at: DateTime<Utc>,
}

impl AnalysisResult {
    pub fn has_high_flag(&self) -> bool {
        self.red_flags
            .iter()
            .any(|flag| flag.severity == Severity::High)
    }
}

/// Status reported by an approval registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistryStatus {
    Active,
    Expired,
    Suspended,
    NotFound,
}

impl RegistryStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RegistryStatus::Active => "ACTIVE",
            RegistryStatus::Expired => "EXPIRED",
            RegistryStatus::Suspended => "SUSPENDED",
            RegistryStatus::NotFound => "NOT_FOUND",
        }
    }
}

/// One registry's answer for one approval number.
///
/// Produced fresh on each verification attempt; earlier results are retained
/// as history and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryVerificationResult {
    pub registry: String,
    pub approval_number: String,
    pub institution_name: String,
    pub status: RegistryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl RegistryVerificationResult {
    /// Only an ACTIVE approval counts as valid; absence of proof is not proof.
    pub fn is_valid(&self) -> bool {
        self.status == RegistryStatus::Active
    }

    /// Degraded result for timeouts, transport errors, and unknown registries.
    pub fn not_found(
        registry: &str,
        approval_number: &str,
        institution_name: &str,
        error: String,
    ) -> Self {
        RegistryVerificationResult {
            registry: registry.to_string(),
            approval_number: approval_number.to_string(),
            institution_name: institution_name.to_string(),
            status: RegistryStatus::NotFound,
            valid_from: None,
            valid_until: None,
            error: Some(error),
            checked_at: Utc::now(),
        }
    }
}

/// What caused a decision to be issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionTrigger {
    Automatic,
    Manual { reviewer_id: String },
}

impl DecisionTrigger {
    pub fn label(&self) -> String {
        match self {
            DecisionTrigger::Automatic => "AUTOMATIC".to_string(),
            DecisionTrigger::Manual { reviewer_id } => format!("MANUAL:{reviewer_id}"),
        }
    }
}

/// Immutable point-in-time verdict for an institution.
///
/// The institution's current status is always derived from its most recent
/// decision (or appeal outcome).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityDecision {
    pub id: DecisionId,
    pub institution_id: InstitutionId,
    pub status: EligibilityStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
    pub trigger: DecisionTrigger,
    pub reason: String,
    pub document_ids: Vec<DocumentId>,
    pub registries_consulted: Vec<String>,
    pub decided_at: DateTime<Utc>,
}

/// Appeal lifecycle states; `approved` and `rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppealState {
    Pending,
    UnderReview,
    AdditionalInfo,
    Approved,
    Rejected,
}

impl AppealState {
    pub const fn label(self) -> &'static str {
        match self {
            AppealState::Pending => "pending",
            AppealState::UnderReview => "under_review",
            AppealState::AdditionalInfo => "additional_info",
            AppealState::Approved => "approved",
            AppealState::Rejected => "rejected",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, AppealState::Approved | AppealState::Rejected)
    }
}

/// Reviewer's final call on an appeal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppealVerdict {
    Approved,
    Rejected,
}

/// A rejected institution's contest of an eligibility decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appeal {
    pub id: AppealId,
    pub institution_id: InstitutionId,
    pub decision_id: DecisionId,
    pub state: AppealState,
    pub justification: String,
    pub evidence: Vec<DocumentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer_notes: Option<String>,
    pub requested_documents: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_reason: Option<String>,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extended_deadline: Option<DateTime<Utc>>,
}
