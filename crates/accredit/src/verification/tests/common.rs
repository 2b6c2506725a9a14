use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::config::VerificationConfig;
use crate::verification::analysis::{
    DocumentAnalyzer, DocumentStore, DocumentStoreError, ExtractedText, PlainTextExtractor,
};
use crate::verification::appeal::AppealService;
use crate::verification::audit::{AuditAction, AuditEntry};
use crate::verification::decision::DecisionEngine;
use crate::verification::domain::{
    AnalysisResult, DecisionId, DecisionTrigger, DocumentId, DocumentType, EligibilityDecision,
    EligibilityStatus, Institution, InstitutionId, RedFlag, RedFlagKind, RegistryStatus,
    RegistryVerificationResult, Severity, VerificationDocument,
};
use crate::verification::events::{EventError, EventSink, OutboundEvent};
use crate::verification::memory::InMemoryVerificationStore;
use crate::verification::registry::{
    AicteRegistry, ApprovalDetails, ApprovalRegistry, NcteRegistry, RegistryError, RegistryManager,
    StateGovernmentRegistry,
};
use crate::verification::repository::InstitutionRepository;
use crate::verification::router::VerificationApi;
use crate::verification::service::{DocumentUpload, VerificationService};

pub(super) const DECLARED_NAME: &str = "Sunrise College";

pub(super) const AICTE_VALID_REF: &str = "docs/aicte-valid.txt";
pub(super) const AICTE_EXPIRED_REF: &str = "docs/aicte-expired.txt";
pub(super) const ENROLLMENT_REF: &str = "docs/enrollment.txt";
pub(super) const MISMATCH_REF: &str = "docs/mismatch.txt";
pub(super) const PROSE_REF: &str = "docs/prose.txt";

pub(super) fn test_config() -> VerificationConfig {
    VerificationConfig {
        document_timeout: Duration::from_millis(500),
        registry_timeout: Duration::from_millis(500),
        run_budget: Duration::from_secs(5),
        ..VerificationConfig::default()
    }
}

pub(super) fn aicte_certificate(approval_number: &str) -> String {
    format!(
        "Institution Name: {DECLARED_NAME}\n\
         Approval Number: {approval_number}\n\
         Valid From: 2023-06-01\n\
         Valid Until: 2030-12-31\n"
    )
}

pub(super) fn enrollment_summary() -> String {
    format!(
        "Student Count: 1200\n\
         Academic Year: 2024-2025\n\
         Institution Name: {DECLARED_NAME}\n"
    )
}

fn mismatched_certificate() -> String {
    "Institution Name: Zenith Academy of Maritime Law\n\
     Approval Number: VALID-AICTE-2024-404\n\
     Valid From: 2023-06-01\n\
     Valid Until: 2030-12-31\n"
        .to_string()
}

pub(super) fn long_justification() -> String {
    "Our AICTE approval was renewed in January and the registry record simply lags the paper certificate."
        .to_string()
}

#[derive(Default)]
pub(super) struct StaticDocumentStore {
    documents: BTreeMap<String, Vec<u8>>,
}

impl StaticDocumentStore {
    pub(super) fn seed(&mut self, storage_ref: &str, text: String) {
        self.documents.insert(storage_ref.to_string(), text.into_bytes());
    }
}

#[async_trait]
impl DocumentStore for StaticDocumentStore {
    async fn fetch(&self, storage_ref: &str) -> Result<Vec<u8>, DocumentStoreError> {
        self.documents
            .get(storage_ref)
            .cloned()
            .ok_or_else(|| DocumentStoreError::NotFound(storage_ref.to_string()))
    }
}

pub(super) struct FailingStore;

#[async_trait]
impl DocumentStore for FailingStore {
    async fn fetch(&self, _storage_ref: &str) -> Result<Vec<u8>, DocumentStoreError> {
        Err(DocumentStoreError::Unreachable("blob store offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct CollectingSink {
    events: Mutex<Vec<OutboundEvent>>,
}

impl CollectingSink {
    pub(super) fn events(&self) -> Vec<OutboundEvent> {
        self.events.lock().expect("event mutex poisoned").clone()
    }
}

impl EventSink for CollectingSink {
    fn publish(&self, event: OutboundEvent) -> Result<(), EventError> {
        self.events.lock().expect("event mutex poisoned").push(event);
        Ok(())
    }
}

pub(super) struct FailingSink;

impl EventSink for FailingSink {
    fn publish(&self, _event: OutboundEvent) -> Result<(), EventError> {
        Err(EventError::Transport("webhook endpoint unreachable".to_string()))
    }
}

pub(super) struct SlowRegistry {
    pub(super) name: &'static str,
    pub(super) delay: Duration,
}

#[async_trait]
impl ApprovalRegistry for SlowRegistry {
    fn name(&self) -> &str {
        self.name
    }

    async fn verify_approval(
        &self,
        approval_number: &str,
        institution_name: &str,
    ) -> Result<RegistryVerificationResult, RegistryError> {
        tokio::time::sleep(self.delay).await;
        Ok(RegistryVerificationResult {
            registry: self.name.to_string(),
            approval_number: approval_number.to_string(),
            institution_name: institution_name.to_string(),
            status: RegistryStatus::Active,
            valid_from: None,
            valid_until: None,
            error: None,
            checked_at: Utc::now(),
        })
    }

    async fn approval_details(&self, _approval_number: &str) -> Option<ApprovalDetails> {
        None
    }
}

pub(super) fn seeded_document_store() -> Arc<StaticDocumentStore> {
    let mut store = StaticDocumentStore::default();
    store.seed(AICTE_VALID_REF, aicte_certificate("VALID-AICTE-2024-017"));
    store.seed(AICTE_EXPIRED_REF, aicte_certificate("EXPIRED-AICTE-2019-042"));
    store.seed(ENROLLMENT_REF, enrollment_summary());
    store.seed(MISMATCH_REF, mismatched_certificate());
    store.seed(
        PROSE_REF,
        "The institution has operated continuously since 1987 and maintains excellent standing."
            .to_string(),
    );
    Arc::new(store)
}

pub(super) fn default_registries(config: &VerificationConfig) -> Arc<RegistryManager> {
    let mut manager = RegistryManager::new(config.registry_timeout);
    manager.register(Arc::new(AicteRegistry));
    manager.register(Arc::new(NcteRegistry));
    manager.register(Arc::new(StateGovernmentRegistry));
    Arc::new(manager)
}

pub(super) fn build_service() -> (
    Arc<VerificationService>,
    Arc<InMemoryVerificationStore>,
    Arc<CollectingSink>,
) {
    let store = Arc::new(InMemoryVerificationStore::default());
    let sink = Arc::new(CollectingSink::default());
    let config = test_config();
    let analyzer = DocumentAnalyzer::new(
        seeded_document_store(),
        Arc::new(PlainTextExtractor),
        config.clone(),
    );
    let service = VerificationService::new(
        store.clone(),
        store.clone(),
        sink.clone(),
        analyzer,
        default_registries(&config),
        config,
    );
    (Arc::new(service), store, sink)
}

pub(super) fn build_appeals(
    store: Arc<InMemoryVerificationStore>,
    sink: Arc<CollectingSink>,
) -> AppealService {
    AppealService::new(
        store.clone(),
        store,
        sink,
        DecisionEngine::new(test_config()),
    )
}

pub(super) fn build_api() -> (
    VerificationApi,
    Arc<InMemoryVerificationStore>,
    Arc<CollectingSink>,
) {
    let (verification, store, sink) = build_service();
    let appeals = Arc::new(build_appeals(store.clone(), sink.clone()));
    (
        VerificationApi {
            verification,
            appeals,
        },
        store,
        sink,
    )
}

pub(super) fn register(service: &VerificationService, student_count: u32) -> Institution {
    service
        .register_institution(DECLARED_NAME, student_count)
        .expect("registration accepted")
}

pub(super) fn upload(
    service: &VerificationService,
    institution_id: &InstitutionId,
    document_type: DocumentType,
    storage_ref: &str,
) -> VerificationDocument {
    service
        .upload_document(
            institution_id,
            DocumentUpload {
                document_type,
                file_name: format!("{}.pdf", document_type.label().to_ascii_lowercase()),
                content_type: "application/pdf".to_string(),
                size_bytes: 64_000,
                storage_ref: storage_ref.to_string(),
            },
        )
        .expect("upload accepted")
}

/// Institution already rejected by a committed decision, seeded directly so
/// appeal tests do not have to run the whole pipeline first.
pub(super) fn seed_rejected_institution(store: &InMemoryVerificationStore) -> Institution {
    let institution = Institution {
        id: InstitutionId::next(),
        name: DECLARED_NAME.to_string(),
        student_count: 1200,
        status: EligibilityStatus::Pending,
        tier: None,
        verification_deadline: Some(Utc::now() + chrono::Duration::days(30)),
        registered_at: Utc::now(),
    };
    store
        .insert_institution(
            institution.clone(),
            AuditEntry::system(
                institution.id.clone(),
                AuditAction::InstitutionRegistered,
                json!({ "name": institution.name }),
            ),
        )
        .expect("institution stored");

    let mut rejected = institution;
    rejected.status = EligibilityStatus::Rejected;
    let decision = EligibilityDecision {
        id: DecisionId::next(),
        institution_id: rejected.id.clone(),
        status: EligibilityStatus::Rejected,
        tier: None,
        trigger: DecisionTrigger::Automatic,
        reason: "no presented approval is active with its registry (AICTE: EXPIRED)".to_string(),
        document_ids: Vec::new(),
        registries_consulted: vec!["AICTE".to_string()],
        decided_at: Utc::now(),
    };
    store
        .commit_decision(
            rejected.clone(),
            decision,
            AuditEntry::system(
                rejected.id.clone(),
                AuditAction::DecisionRecorded,
                json!({ "status": "REJECTED" }),
            ),
        )
        .expect("rejection committed");
    rejected
}

pub(super) fn institution_with(
    status: EligibilityStatus,
    student_count: u32,
    verification_deadline: Option<DateTime<Utc>>,
) -> Institution {
    Institution {
        id: InstitutionId::next(),
        name: DECLARED_NAME.to_string(),
        student_count,
        status,
        tier: None,
        verification_deadline,
        registered_at: Utc::now(),
    }
}

pub(super) fn analysis(
    document_type: DocumentType,
    completeness: f32,
    red_flags: Vec<RedFlag>,
) -> AnalysisResult {
    AnalysisResult {
        document_id: DocumentId::next(),
        document_type,
        authenticity_score: 0.9,
        completeness_score: completeness,
        red_flags,
        extracted_fields: BTreeMap::new(),
        recommendations: Vec::new(),
        analyzed_at: Utc::now(),
    }
}

pub(super) fn flag(kind: RedFlagKind, severity: Severity, description: &str) -> RedFlag {
    RedFlag {
        kind,
        severity,
        description: description.to_string(),
        location: None,
    }
}

pub(super) fn registry_result(registry: &str, status: RegistryStatus) -> RegistryVerificationResult {
    RegistryVerificationResult {
        registry: registry.to_string(),
        approval_number: format!("{registry}-2024-001"),
        institution_name: DECLARED_NAME.to_string(),
        status,
        valid_from: None,
        valid_until: None,
        error: None,
        checked_at: Utc::now(),
    }
}

pub(super) fn extraction(confidence: f32, fields: &[(&str, &str)]) -> ExtractedText {
    ExtractedText {
        text: fields
            .iter()
            .map(|(key, value)| format!("{key}: {value}"))
            .collect::<Vec<_>>()
            .join("\n"),
        confidence,
        fields: fields
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect(),
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
