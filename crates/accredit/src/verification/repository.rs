use chrono::{DateTime, Utc};

use super::audit::AuditEntry;
use super::domain::{
    AnalysisResult, Appeal, AppealId, AppealState, DocumentId, EligibilityDecision,
    EligibilityStatus, Institution, InstitutionId, RegistryVerificationResult,
    VerificationDocument,
};

/// Filter for decision listings and the CSV export.
#[derive(Debug, Default, Clone)]
pub struct DecisionFilter {
    pub institution_id: Option<InstitutionId>,
    pub status: Option<EligibilityStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Filter for appeal listings.
#[derive(Debug, Default, Clone)]
pub struct AppealFilter {
    pub institution_id: Option<InstitutionId>,
    pub state: Option<AppealState>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Storage abstraction for institutions, their documents, registry history,
/// and decisions.
///
/// Methods that change an institution's visible state take the paired audit
/// entry and must persist both in one transaction, so no reader ever observes
/// a status change without its trail entry (or the reverse).
pub trait InstitutionRepository: Send + Sync {
    fn insert_institution(
        &self,
        institution: Institution,
        audit: AuditEntry,
    ) -> Result<Institution, RepositoryError>;

    fn fetch_institution(
        &self,
        id: &InstitutionId,
    ) -> Result<Option<Institution>, RepositoryError>;

    /// Status-only update outside a decision, e.g. review start on first
    /// upload.
    fn update_status(
        &self,
        institution: Institution,
        audit: AuditEntry,
    ) -> Result<(), RepositoryError>;

    fn add_document(
        &self,
        document: VerificationDocument,
        audit: AuditEntry,
    ) -> Result<VerificationDocument, RepositoryError>;

    fn fetch_document(
        &self,
        id: &DocumentId,
    ) -> Result<Option<VerificationDocument>, RepositoryError>;

    fn documents_for(
        &self,
        id: &InstitutionId,
    ) -> Result<Vec<VerificationDocument>, RepositoryError>;

    /// Append a re-analysis to the document's history, never overwriting.
    fn append_analysis(
        &self,
        document_id: &DocumentId,
        analysis: AnalysisResult,
    ) -> Result<(), RepositoryError>;

    fn record_registry_results(
        &self,
        institution_id: &InstitutionId,
        results: Vec<RegistryVerificationResult>,
    ) -> Result<(), RepositoryError>;

    fn registry_history(
        &self,
        institution_id: &InstitutionId,
    ) -> Result<Vec<RegistryVerificationResult>, RepositoryError>;

    /// Persist the decision, the institution's new status/tier, and the
    /// paired audit entry in one transaction.
    fn commit_decision(
        &self,
        institution: Institution,
        decision: EligibilityDecision,
        audit: AuditEntry,
    ) -> Result<EligibilityDecision, RepositoryError>;

    fn decisions(&self, filter: &DecisionFilter) -> Result<Vec<EligibilityDecision>, RepositoryError>;
}

/// Storage abstraction for appeals.
pub trait AppealRepository: Send + Sync {
    /// Check-and-create: fails with `OpenAppealExists` when the institution
    /// already has a non-terminal appeal. The check and the insert are one
    /// atomic step.
    fn create_appeal(&self, appeal: Appeal, audit: AuditEntry) -> Result<Appeal, RepositoryError>;

    fn fetch_appeal(&self, id: &AppealId) -> Result<Option<Appeal>, RepositoryError>;

    fn update_appeal(&self, appeal: Appeal, audit: AuditEntry) -> Result<(), RepositoryError>;

    fn open_appeal_for(
        &self,
        institution_id: &InstitutionId,
    ) -> Result<Option<Appeal>, RepositoryError>;

    fn appeals(&self, filter: &AppealFilter) -> Result<Vec<Appeal>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("an open appeal already exists for this institution")]
    OpenAppealExists,
    #[error("integrity violation: {0}")]
    Integrity(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
