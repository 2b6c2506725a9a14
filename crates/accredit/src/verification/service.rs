use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};

use crate::config::VerificationConfig;

use super::analysis::{degraded_outcome, AnalysisOutcome, DocumentAnalyzer};
use super::audit::{AuditAction, AuditEntry, AuditError, AuditLog, AuditQuery, AuditRecord};
use super::decision::DecisionEngine;
use super::domain::{
    AnalysisResult, DocumentId, DocumentType, EligibilityDecision, EligibilityStatus, Institution,
    InstitutionId, RegistryVerificationResult, VerificationDocument,
};
use super::events::{dispatch, EventSink, OutboundEvent};
use super::grace::{self, GraceView};
use super::registry::RegistryManager;
use super::repository::{DecisionFilter, InstitutionRepository, RepositoryError};

/// Metadata for a document the caller has already placed in blob storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentUpload {
    pub document_type: DocumentType,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub storage_ref: String,
}

/// Everything one verification run produced, returned to the caller after
/// the decision is committed.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationRun {
    pub institution: Institution,
    pub decision: EligibilityDecision,
    pub analyses: Vec<AnalysisResult>,
    pub registry_results: Vec<RegistryVerificationResult>,
    /// Human-readable notes for every sub-call that degraded.
    pub degraded: Vec<String>,
}

/// Point-in-time snapshot served to the institution dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct InstitutionStatusView {
    pub institution: Institution,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grace: Option<GraceView>,
    pub documents: Vec<VerificationDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_decision: Option<EligibilityDecision>,
}

/// Error raised by the verification service.
#[derive(Debug, thiserror::Error)]
pub enum VerificationServiceError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Audit(#[from] AuditError),
    #[error("failed to render export: {0}")]
    Export(String),
}

/// Orchestrates intake, the analysis and registry fan-outs, and decision
/// commits.
///
/// One run analyzes every document and checks every presented approval
/// before the decision rules fire; sub-calls degrade rather than abort, so
/// every run ends in a definite status.
pub struct VerificationService {
    institutions: Arc<dyn InstitutionRepository>,
    audit: Arc<dyn AuditLog>,
    events: Arc<dyn EventSink>,
    analyzer: DocumentAnalyzer,
    registries: Arc<RegistryManager>,
    engine: DecisionEngine,
    config: VerificationConfig,
}

impl VerificationService {
    pub fn new(
        institutions: Arc<dyn InstitutionRepository>,
        audit: Arc<dyn AuditLog>,
        events: Arc<dyn EventSink>,
        analyzer: DocumentAnalyzer,
        registries: Arc<RegistryManager>,
        config: VerificationConfig,
    ) -> Self {
        VerificationService {
            institutions,
            audit,
            events,
            analyzer,
            registries,
            engine: DecisionEngine::new(config.clone()),
            config,
        }
    }

    /// Intake from signup: the institution starts `PENDING` with a grace
    /// deadline counting down from now.
    pub fn register_institution(
        &self,
        name: &str,
        student_count: u32,
    ) -> Result<Institution, VerificationServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(VerificationServiceError::Validation(
                "institution name must not be empty".to_string(),
            ));
        }

        let now = Utc::now();
        let institution = Institution {
            id: InstitutionId::next(),
            name: name.to_string(),
            student_count,
            status: EligibilityStatus::Pending,
            tier: None,
            verification_deadline: Some(grace::deadline_from(&self.config.grace, now)),
            registered_at: now,
        };

        let audit = AuditEntry::system(
            institution.id.clone(),
            AuditAction::InstitutionRegistered,
            json!({
                "name": institution.name,
                "student_count": institution.student_count,
                "verification_deadline": institution.verification_deadline,
            }),
        );
        Ok(self.institutions.insert_institution(institution, audit)?)
    }

    pub fn status(
        &self,
        institution_id: &InstitutionId,
    ) -> Result<InstitutionStatusView, VerificationServiceError> {
        let institution = self.fetch(institution_id)?;
        let documents = self.institutions.documents_for(institution_id)?;
        let latest_decision = self
            .institutions
            .decisions(&DecisionFilter {
                institution_id: Some(institution_id.clone()),
                ..Default::default()
            })?
            .pop();
        let grace = institution
            .verification_deadline
            .map(|deadline| grace::view(&self.config.grace, deadline, Utc::now()));

        Ok(InstitutionStatusView {
            institution,
            grace,
            documents,
            latest_decision,
        })
    }

    /// Record an uploaded document; the first upload moves a `PENDING`
    /// intake under review.
    pub fn upload_document(
        &self,
        institution_id: &InstitutionId,
        upload: DocumentUpload,
    ) -> Result<VerificationDocument, VerificationServiceError> {
        let mut institution = self.fetch(institution_id)?;
        self.validate_upload(&upload)?;

        let document = VerificationDocument {
            id: DocumentId::next(),
            institution_id: institution_id.clone(),
            document_type: upload.document_type,
            file_name: upload.file_name,
            content_type: upload.content_type,
            size_bytes: upload.size_bytes,
            storage_ref: upload.storage_ref,
            uploaded_at: Utc::now(),
            analyses: Vec::new(),
        };

        let audit = AuditEntry::by(
            institution_id.clone(),
            AuditAction::DocumentUploaded,
            json!({
                "document_id": document.id.0,
                "document_type": document.document_type.label(),
                "file_name": document.file_name,
                "size_bytes": document.size_bytes,
            }),
            institution_id.0.clone(),
        );
        let document = self.institutions.add_document(document, audit)?;

        if institution.status == EligibilityStatus::Pending {
            institution.status = EligibilityStatus::UnderReview;
            let audit = AuditEntry::system(
                institution_id.clone(),
                AuditAction::ReviewStarted,
                json!({ "first_document_id": document.id.0 }),
            );
            self.institutions.update_status(institution, audit)?;
        }

        Ok(document)
    }

    /// Analyze every document and check every presented approval, then apply
    /// the decision rules and commit the verdict.
    ///
    /// Both fan-outs run concurrently under the per-call timeouts plus one
    /// overall run budget; work still in flight when the budget elapses is
    /// cancelled and fed in as its degraded value.
    pub async fn run_verification(
        &self,
        institution_id: &InstitutionId,
    ) -> Result<VerificationRun, VerificationServiceError> {
        let mut institution = self.fetch(institution_id)?;
        let documents = self.institutions.documents_for(institution_id)?;
        if documents.is_empty() {
            return Err(VerificationServiceError::Validation(
                "at least one verification document must be uploaded before verification can run"
                    .to_string(),
            ));
        }

        let budget = Instant::now() + self.config.run_budget;
        let mut degraded = Vec::new();

        let outcomes = self.analyze_documents(&institution, &documents, budget).await;
        let mut analyses = Vec::with_capacity(outcomes.len());
        for (document, outcome) in documents.iter().zip(outcomes) {
            self.institutions
                .append_analysis(&document.id, outcome.result.clone())?;
            match &outcome.degraded {
                Some(reason) => {
                    degraded.push(format!("document {}: {reason}", document.id.0));
                    self.audit.append(AuditEntry::system(
                        institution_id.clone(),
                        AuditAction::AnalysisDegraded,
                        json!({ "document_id": document.id.0, "reason": reason }),
                    ))?;
                }
                None => {
                    self.audit.append(AuditEntry::system(
                        institution_id.clone(),
                        AuditAction::DocumentAnalyzed,
                        json!({
                            "document_id": document.id.0,
                            "document_type": document.document_type.label(),
                            "authenticity_score": outcome.result.authenticity_score,
                            "completeness_score": outcome.result.completeness_score,
                            "red_flags": outcome.result.red_flags.len(),
                        }),
                    ))?;
                }
            }
            analyses.push(outcome.result);
        }

        let approvals = presented_approvals(&analyses);
        let results_by_registry = self
            .registries
            .verify_all(&approvals, &institution.name, budget)
            .await;
        let registry_results: Vec<RegistryVerificationResult> =
            results_by_registry.into_values().collect();
        self.institutions
            .record_registry_results(institution_id, registry_results.clone())?;
        for result in &registry_results {
            match &result.error {
                Some(reason) => {
                    degraded.push(format!("registry {}: {reason}", result.registry));
                    self.audit.append(AuditEntry::system(
                        institution_id.clone(),
                        AuditAction::RegistryDegraded,
                        json!({
                            "registry": result.registry,
                            "approval_number": result.approval_number,
                            "reason": reason,
                        }),
                    ))?;
                }
                None => {
                    self.audit.append(AuditEntry::system(
                        institution_id.clone(),
                        AuditAction::RegistryChecked,
                        json!({
                            "registry": result.registry,
                            "approval_number": result.approval_number,
                            "status": result.status.label(),
                        }),
                    ))?;
                }
            }
        }

        let decision = self.engine.decide(&institution, &analyses, &registry_results);
        institution.status = decision.status;
        institution.tier = decision.tier;

        let audit = AuditEntry::system(
            institution_id.clone(),
            AuditAction::DecisionRecorded,
            json!({
                "decision_id": decision.id.0,
                "status": decision.status.label(),
                "tier": decision.tier.map(|tier| tier.label()),
                "trigger": decision.trigger.label(),
                "reason": decision.reason,
            }),
        );
        let decision = self
            .institutions
            .commit_decision(institution.clone(), decision, audit)?;
        dispatch(self.events.as_ref(), OutboundEvent::from_decision(&decision));

        tracing::info!(
            institution_id = %institution_id.0,
            status = decision.status.label(),
            degraded = degraded.len(),
            "eligibility decision recorded"
        );

        Ok(VerificationRun {
            institution,
            decision,
            analyses,
            registry_results,
            degraded,
        })
    }

    /// Deadline sweep entry point for the platform scheduler.
    ///
    /// Returns the expiry decision when one was issued, `None` when the
    /// institution's deadline has not lapsed or its status is already
    /// settled.
    pub fn expire(
        &self,
        institution_id: &InstitutionId,
        now: DateTime<Utc>,
    ) -> Result<Option<EligibilityDecision>, VerificationServiceError> {
        let mut institution = self.fetch(institution_id)?;
        let Some(decision) = self.engine.expire(&institution, now) else {
            return Ok(None);
        };

        institution.status = decision.status;
        institution.tier = decision.tier;

        let audit = AuditEntry::system(
            institution_id.clone(),
            AuditAction::DeadlineExpired,
            json!({
                "decision_id": decision.id.0,
                "deadline": institution.verification_deadline,
            }),
        );
        let decision = self
            .institutions
            .commit_decision(institution, decision, audit)?;
        dispatch(self.events.as_ref(), OutboundEvent::from_decision(&decision));
        Ok(Some(decision))
    }

    pub fn decisions(
        &self,
        filter: &DecisionFilter,
    ) -> Result<Vec<EligibilityDecision>, VerificationServiceError> {
        Ok(self.institutions.decisions(filter)?)
    }

    pub fn audit_trail(
        &self,
        institution_id: &InstitutionId,
    ) -> Result<Vec<AuditRecord>, VerificationServiceError> {
        Ok(self.audit.by_institution(institution_id)?)
    }

    pub fn audit_query(
        &self,
        filter: &AuditQuery,
    ) -> Result<Vec<AuditRecord>, VerificationServiceError> {
        Ok(self.audit.query(filter)?)
    }

    /// Operator CSV of decisions matching the filter.
    pub fn export_decisions_csv(
        &self,
        filter: &DecisionFilter,
    ) -> Result<String, VerificationServiceError> {
        let decisions = self.institutions.decisions(filter)?;
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record([
                "decision_id",
                "institution_id",
                "status",
                "tier",
                "trigger",
                "reason",
                "registries",
                "documents",
                "decided_at",
            ])
            .map_err(|error| VerificationServiceError::Export(error.to_string()))?;
        for decision in &decisions {
            let trigger = decision.trigger.label();
            let registries = decision.registries_consulted.join(";");
            let documents = decision.document_ids.len().to_string();
            let decided_at = decision.decided_at.to_rfc3339();
            writer
                .write_record([
                    decision.id.0.as_str(),
                    decision.institution_id.0.as_str(),
                    decision.status.label(),
                    decision.tier.map(|tier| tier.label()).unwrap_or(""),
                    trigger.as_str(),
                    decision.reason.as_str(),
                    registries.as_str(),
                    documents.as_str(),
                    decided_at.as_str(),
                ])
                .map_err(|error| VerificationServiceError::Export(error.to_string()))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|error| VerificationServiceError::Export(error.to_string()))?;
        String::from_utf8(bytes).map_err(|error| VerificationServiceError::Export(error.to_string()))
    }

    async fn analyze_documents(
        &self,
        institution: &Institution,
        documents: &[VerificationDocument],
        budget: Instant,
    ) -> Vec<AnalysisOutcome> {
        let mut join_set = JoinSet::new();
        for (idx, document) in documents.iter().enumerate() {
            let analyzer = self.analyzer.clone();
            let institution = institution.clone();
            let document = document.clone();
            join_set.spawn(async move {
                let outcome = analyzer.analyze(&institution, &document).await;
                (idx, outcome)
            });
        }

        let mut slots: Vec<Option<AnalysisOutcome>> = Vec::new();
        slots.resize_with(documents.len(), || None);
        loop {
            match timeout_at(budget, join_set.join_next()).await {
                Ok(Some(Ok((idx, outcome)))) => slots[idx] = Some(outcome),
                Ok(Some(Err(_))) => {}
                Ok(None) => break,
                Err(_) => {
                    join_set.abort_all();
                    break;
                }
            }
        }

        documents
            .iter()
            .zip(slots)
            .map(|(document, slot)| {
                slot.unwrap_or_else(|| {
                    degraded_outcome(document, "analysis did not complete within the run budget")
                })
            })
            .collect()
    }

    fn validate_upload(&self, upload: &DocumentUpload) -> Result<(), VerificationServiceError> {
        if upload.file_name.trim().is_empty() || upload.storage_ref.trim().is_empty() {
            return Err(VerificationServiceError::Validation(
                "document file name and storage reference must not be empty".to_string(),
            ));
        }

        let parsed: mime::Mime = upload.content_type.parse().map_err(|_| {
            VerificationServiceError::Validation(format!(
                "unrecognized content type '{}'",
                upload.content_type
            ))
        })?;
        let accepted = [mime::APPLICATION_PDF, mime::IMAGE_JPEG, mime::IMAGE_PNG];
        if !accepted.contains(&parsed) {
            return Err(VerificationServiceError::Validation(format!(
                "content type '{parsed}' is not accepted; upload PDF, JPEG, or PNG"
            )));
        }

        if upload.size_bytes > self.config.max_upload_bytes {
            return Err(VerificationServiceError::Validation(format!(
                "document is {} bytes; the upload limit is {} bytes",
                upload.size_bytes, self.config.max_upload_bytes
            )));
        }
        Ok(())
    }

    fn fetch(&self, institution_id: &InstitutionId) -> Result<Institution, VerificationServiceError> {
        Ok(self
            .institutions
            .fetch_institution(institution_id)?
            .ok_or(RepositoryError::NotFound)?)
    }
}

/// Approval numbers extracted from certificate analyses, keyed by the
/// registry that can corroborate them. The first number seen per registry
/// wins.
fn presented_approvals(analyses: &[AnalysisResult]) -> BTreeMap<String, String> {
    let mut approvals = BTreeMap::new();
    for analysis in analyses {
        let Some(registry) = analysis.document_type.registry_name() else {
            continue;
        };
        if let Some(number) = analysis.extracted_fields.get("approval_number") {
            approvals
                .entry(registry.to_string())
                .or_insert_with(|| number.clone());
        }
    }
    approvals
}
