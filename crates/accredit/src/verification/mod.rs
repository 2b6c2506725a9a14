//! Institution eligibility verification and appeal pipeline.
//!
//! Intake accepts uploaded evidence, the analysis engine extracts and scores
//! it, the registry service corroborates approval numbers with the issuing
//! authorities, and the decision engine folds everything into one audited
//! eligibility verdict. Rejected institutions can contest that verdict
//! through the bounded appeal workflow. Every state change lands in the
//! append-only audit trail.

pub mod analysis;
pub mod appeal;
pub mod audit;
pub mod decision;
pub mod domain;
pub mod events;
pub mod grace;
pub mod memory;
pub mod registry;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use analysis::{
    name_similarity, required_fields, score_document, AnalysisOutcome, DocumentAnalyzer,
    DocumentScore, DocumentStore, DocumentStoreError, ExtractedText, ExtractionError,
    PlainTextExtractor, TextExtractor,
};
pub use appeal::{AppealError, AppealService, MIN_JUSTIFICATION_CHARS};
pub use audit::{
    AuditAction, AuditEntry, AuditError, AuditLog, AuditQuery, AuditRecord, SYSTEM_ACTOR,
};
pub use decision::DecisionEngine;
pub use domain::{
    AnalysisResult, Appeal, AppealId, AppealState, AppealVerdict, DecisionId, DecisionTrigger,
    DocumentId, DocumentType, EligibilityDecision, EligibilityStatus, Institution, InstitutionId,
    RedFlag, RedFlagKind, RegistryStatus, RegistryVerificationResult, Severity, Tier,
    VerificationDocument,
};
pub use events::{EventError, EventKind, EventSink, OutboundEvent};
pub use grace::{GracePeriodConfig, GraceStatus, GraceView};
pub use memory::InMemoryVerificationStore;
pub use registry::{
    AicteRegistry, ApprovalDetails, ApprovalRegistry, NcteRegistry, RegistryError, RegistryManager,
    StateGovernmentRegistry,
};
pub use repository::{
    AppealFilter, AppealRepository, DecisionFilter, InstitutionRepository, RepositoryError,
};
pub use router::{verification_router, VerificationApi};
pub use service::{
    DocumentUpload, InstitutionStatusView, VerificationRun, VerificationService,
    VerificationServiceError,
};
