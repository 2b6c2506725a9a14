//! Integration coverage for the eligibility verification pipeline.
//!
//! Scenarios drive the public service facade and the HTTP router end to end:
//! intake, the analysis and registry fan-outs, the ordered decision rules,
//! and the audit trail they leave behind.

mod common {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    use accredit::config::VerificationConfig;
    use accredit::verification::analysis::{
        DocumentAnalyzer, DocumentStore, DocumentStoreError, PlainTextExtractor,
    };
    use accredit::verification::domain::{
        DocumentType, Institution, InstitutionId, VerificationDocument,
    };
    use accredit::verification::events::{EventError, EventSink, OutboundEvent};
    use accredit::verification::memory::InMemoryVerificationStore;
    use accredit::verification::registry::{
        AicteRegistry, NcteRegistry, RegistryManager, StateGovernmentRegistry,
    };
    use accredit::verification::service::{DocumentUpload, VerificationService};

    pub(super) const INSTITUTION_NAME: &str = "Sunrise College";
    pub(super) const MISMATCHED_NAME: &str = "Zenith Academy of Maritime Law";

    pub(super) const VALID_CERT: &str = "blob/sunrise/aicte-2025.txt";
    pub(super) const EXPIRED_CERT: &str = "blob/sunrise/aicte-2018.txt";
    pub(super) const LAPSED_CERT: &str = "blob/sunrise/aicte-2016.txt";
    pub(super) const ENROLLMENT: &str = "blob/sunrise/enrollment.txt";
    pub(super) const MISMATCH_CERT: &str = "blob/sunrise/aicte-zenith.txt";
    pub(super) const PROSPECTUS: &str = "blob/sunrise/prospectus.txt";

    fn approval_certificate(name: &str, approval_number: &str) -> String {
        format!(
            "Institution Name: {name}\n\
             Approval Number: {approval_number}\n\
             Valid From: 2024-04-01\n\
             Valid Until: 2031-03-31\n"
        )
    }

    fn enrollment_statement(students: u32) -> String {
        format!(
            "Institution Name: {INSTITUTION_NAME}\n\
             Student Count: {students}\n\
             Academic Year: 2025-2026\n"
        )
    }

    pub(super) struct BlobStore {
        blobs: HashMap<String, Vec<u8>>,
    }

    impl BlobStore {
        fn seeded() -> Self {
            let mut blobs = HashMap::new();
            let mut seed = |key: &str, text: String| {
                blobs.insert(key.to_string(), text.into_bytes());
            };
            seed(
                VALID_CERT,
                approval_certificate(INSTITUTION_NAME, "VALID-AICTE-2025-114"),
            );
            seed(
                EXPIRED_CERT,
                approval_certificate(INSTITUTION_NAME, "EXPIRED-AICTE-2018-031"),
            );
            // Registry still says ACTIVE; only the paper window has lapsed.
            seed(
                LAPSED_CERT,
                format!(
                    "Institution Name: {INSTITUTION_NAME}\n\
                     Approval Number: VALID-AICTE-2016-020\n\
                     Valid From: 2016-04-01\n\
                     Valid Until: 2019-03-31\n"
                ),
            );
            seed(ENROLLMENT, enrollment_statement(5200));
            seed(
                MISMATCH_CERT,
                approval_certificate(MISMATCHED_NAME, "VALID-AICTE-2025-733"),
            );
            seed(
                PROSPECTUS,
                "Founded in 1987, the college maintains excellent academic standing."
                    .to_string(),
            );
            BlobStore { blobs }
        }
    }

    #[async_trait]
    impl DocumentStore for BlobStore {
        async fn fetch(&self, storage_ref: &str) -> Result<Vec<u8>, DocumentStoreError> {
            self.blobs
                .get(storage_ref)
                .cloned()
                .ok_or_else(|| DocumentStoreError::NotFound(storage_ref.to_string()))
        }
    }

    #[derive(Default)]
    pub(super) struct RecordingSink {
        events: Mutex<Vec<OutboundEvent>>,
    }

    impl RecordingSink {
        pub(super) fn events(&self) -> Vec<OutboundEvent> {
            self.events.lock().expect("event mutex poisoned").clone()
        }
    }

    impl EventSink for RecordingSink {
        fn publish(&self, event: OutboundEvent) -> Result<(), EventError> {
            self.events.lock().expect("event mutex poisoned").push(event);
            Ok(())
        }
    }

    pub(super) fn pipeline() -> (
        Arc<VerificationService>,
        Arc<InMemoryVerificationStore>,
        Arc<RecordingSink>,
    ) {
        pipeline_with(VerificationConfig::default())
    }

    pub(super) fn pipeline_with_budget(
        run_budget: Duration,
    ) -> (
        Arc<VerificationService>,
        Arc<InMemoryVerificationStore>,
        Arc<RecordingSink>,
    ) {
        pipeline_with(VerificationConfig {
            run_budget,
            ..VerificationConfig::default()
        })
    }

    fn pipeline_with(
        config: VerificationConfig,
    ) -> (
        Arc<VerificationService>,
        Arc<InMemoryVerificationStore>,
        Arc<RecordingSink>,
    ) {
        let store = Arc::new(InMemoryVerificationStore::default());
        let sink = Arc::new(RecordingSink::default());
        let analyzer = DocumentAnalyzer::new(
            Arc::new(BlobStore::seeded()),
            Arc::new(PlainTextExtractor),
            config.clone(),
        );
        let mut registries = RegistryManager::new(config.registry_timeout);
        registries.register(Arc::new(AicteRegistry));
        registries.register(Arc::new(NcteRegistry));
        registries.register(Arc::new(StateGovernmentRegistry));
        let service = VerificationService::new(
            store.clone(),
            store.clone(),
            sink.clone(),
            analyzer,
            Arc::new(registries),
            config,
        );
        (Arc::new(service), store, sink)
    }

    pub(super) fn enroll(service: &VerificationService, student_count: u32) -> Institution {
        service
            .register_institution(INSTITUTION_NAME, student_count)
            .expect("registration accepted")
    }

    pub(super) fn attach(
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
                    size_bytes: 48_000,
                    storage_ref: storage_ref.to_string(),
                },
            )
            .expect("upload accepted")
    }
}

mod decisions {
    use super::common::*;

    use accredit::verification::domain::{DocumentType, EligibilityStatus, Tier};
    use accredit::verification::events::EventKind;
    use accredit::verification::repository::{DecisionFilter, InstitutionRepository};

    #[tokio::test]
    async fn clean_dossier_lands_eligible_with_its_tier() {
        let (service, store, sink) = pipeline();
        let institution = enroll(&service, 5200);
        attach(
            &service,
            &institution.id,
            DocumentType::AicteApproval,
            VALID_CERT,
        );
        attach(
            &service,
            &institution.id,
            DocumentType::EnrollmentData,
            ENROLLMENT,
        );

        let run = service
            .run_verification(&institution.id)
            .await
            .expect("run completed");

        assert_eq!(run.decision.status, EligibilityStatus::Eligible);
        assert_eq!(run.decision.tier, Some(Tier::Enterprise));
        assert!(run.decision.reason.contains("Enterprise"));
        assert_eq!(run.decision.registries_consulted, vec!["AICTE".to_string()]);
        assert_eq!(run.decision.document_ids.len(), 2);
        assert!(run.degraded.is_empty());

        let stored = store
            .fetch_institution(&institution.id)
            .expect("fetch")
            .expect("present");
        assert_eq!(stored.status, EligibilityStatus::Eligible);
        assert_eq!(stored.tier, Some(Tier::Enterprise));
        assert_eq!(
            store
                .decisions(&DecisionFilter::default())
                .expect("decisions")
                .len(),
            1
        );

        let kinds: Vec<EventKind> = sink.events().iter().map(|event| event.kind).collect();
        assert_eq!(kinds, vec![EventKind::VerificationApproved]);
    }

    #[tokio::test]
    async fn certificate_for_another_institution_routes_to_manual_review() {
        let (service, store, sink) = pipeline();
        let institution = enroll(&service, 5200);
        attach(
            &service,
            &institution.id,
            DocumentType::AicteApproval,
            MISMATCH_CERT,
        );
        attach(
            &service,
            &institution.id,
            DocumentType::EnrollmentData,
            ENROLLMENT,
        );

        let run = service
            .run_verification(&institution.id)
            .await
            .expect("run completed");

        assert_eq!(run.decision.status, EligibilityStatus::UnderReview);
        assert!(run.decision.reason.starts_with("manual review required"));
        assert!(run.decision.reason.contains(MISMATCHED_NAME));

        let stored = store
            .fetch_institution(&institution.id)
            .expect("fetch")
            .expect("present");
        assert_eq!(stored.status, EligibilityStatus::UnderReview);

        let kinds: Vec<EventKind> = sink.events().iter().map(|event| event.kind).collect();
        assert_eq!(kinds, vec![EventKind::ManualReviewRequired]);
    }

    #[tokio::test]
    async fn prose_only_dossier_stays_pending() {
        let (service, _, sink) = pipeline();
        let institution = enroll(&service, 5200);
        attach(
            &service,
            &institution.id,
            DocumentType::AicteApproval,
            PROSPECTUS,
        );

        let run = service
            .run_verification(&institution.id)
            .await
            .expect("run completed");

        assert_eq!(run.decision.status, EligibilityStatus::Pending);
        assert_eq!(
            run.decision.reason,
            "0 of 2 required document types are sufficiently complete"
        );

        let kinds: Vec<EventKind> = sink.events().iter().map(|event| event.kind).collect();
        assert_eq!(kinds, vec![EventKind::RequiresMoreInfo]);
    }

    #[tokio::test]
    async fn lapsed_certificate_rejects_despite_active_registry() {
        let (service, store, sink) = pipeline();
        let institution = enroll(&service, 5200);
        attach(
            &service,
            &institution.id,
            DocumentType::AicteApproval,
            LAPSED_CERT,
        );
        attach(
            &service,
            &institution.id,
            DocumentType::EnrollmentData,
            ENROLLMENT,
        );

        let run = service
            .run_verification(&institution.id)
            .await
            .expect("run completed");

        assert_eq!(run.decision.status, EligibilityStatus::Rejected);
        assert_eq!(run.decision.reason, "approval expired on 2019-03-31");
        assert_eq!(run.decision.tier, None);

        let stored = store
            .fetch_institution(&institution.id)
            .expect("fetch")
            .expect("present");
        assert_eq!(stored.status, EligibilityStatus::Rejected);

        let kinds: Vec<EventKind> = sink.events().iter().map(|event| event.kind).collect();
        assert_eq!(kinds, vec![EventKind::VerificationRejected]);
    }

    #[tokio::test]
    async fn expired_registry_approval_rejects_the_dossier() {
        let (service, store, sink) = pipeline();
        let institution = enroll(&service, 5200);
        attach(
            &service,
            &institution.id,
            DocumentType::AicteApproval,
            EXPIRED_CERT,
        );
        attach(
            &service,
            &institution.id,
            DocumentType::EnrollmentData,
            ENROLLMENT,
        );

        let run = service
            .run_verification(&institution.id)
            .await
            .expect("run completed");

        assert_eq!(run.decision.status, EligibilityStatus::Rejected);
        assert_eq!(
            run.decision.reason,
            "no presented approval is active with its registry (AICTE: EXPIRED)"
        );
        assert_eq!(run.decision.tier, None);

        let stored = store
            .fetch_institution(&institution.id)
            .expect("fetch")
            .expect("present");
        assert_eq!(stored.status, EligibilityStatus::Rejected);

        let kinds: Vec<EventKind> = sink.events().iter().map(|event| event.kind).collect();
        assert_eq!(kinds, vec![EventKind::VerificationRejected]);
    }
}

mod degradation {
    use super::common::*;
    use std::time::Duration;

    use accredit::verification::audit::{AuditAction, AuditLog};
    use accredit::verification::domain::{DocumentType, EligibilityStatus};

    // Paused clock makes the zero budget deterministic: on the real clock the
    // elapsed deadline rounds up to the next timer tick, so already-queued
    // instant sub-tasks can win the race and the run never degrades.
    #[tokio::test(start_paused = true)]
    async fn exhausted_run_budget_degrades_every_document() {
        let (service, store, _) = pipeline_with_budget(Duration::from_millis(0));
        let institution = enroll(&service, 5200);
        attach(
            &service,
            &institution.id,
            DocumentType::AicteApproval,
            VALID_CERT,
        );
        attach(
            &service,
            &institution.id,
            DocumentType::EnrollmentData,
            ENROLLMENT,
        );

        let run = service
            .run_verification(&institution.id)
            .await
            .expect("run completes even with no budget");

        assert_eq!(run.decision.status, EligibilityStatus::UnderReview);
        assert_eq!(run.degraded.len(), 2);
        assert!(run.degraded.iter().all(|note| note.contains("run budget")));
        assert!(run.registry_results.is_empty());
        assert!(run
            .analyses
            .iter()
            .all(|analysis| analysis.completeness_score == 0.0));

        let trail = store.by_institution(&institution.id).expect("trail");
        assert_eq!(
            trail
                .iter()
                .filter(|record| record.action == AuditAction::AnalysisDegraded)
                .count(),
            2
        );
        assert!(trail
            .iter()
            .all(|record| record.action != AuditAction::DocumentAnalyzed));
    }
}

mod auditing {
    use super::common::*;

    use accredit::verification::audit::{AuditAction, AuditLog, SYSTEM_ACTOR};
    use accredit::verification::domain::DocumentType;

    #[tokio::test]
    async fn every_pipeline_step_lands_in_the_trail_in_order() {
        let (service, store, _) = pipeline();
        let institution = enroll(&service, 5200);
        attach(
            &service,
            &institution.id,
            DocumentType::AicteApproval,
            VALID_CERT,
        );
        attach(
            &service,
            &institution.id,
            DocumentType::EnrollmentData,
            ENROLLMENT,
        );
        service
            .run_verification(&institution.id)
            .await
            .expect("run completed");

        let trail = store.by_institution(&institution.id).expect("trail");
        let actions: Vec<AuditAction> = trail.iter().map(|record| record.action).collect();
        assert_eq!(
            actions,
            vec![
                AuditAction::InstitutionRegistered,
                AuditAction::DocumentUploaded,
                AuditAction::ReviewStarted,
                AuditAction::DocumentUploaded,
                AuditAction::DocumentAnalyzed,
                AuditAction::DocumentAnalyzed,
                AuditAction::RegistryChecked,
                AuditAction::DecisionRecorded,
            ]
        );
        assert!(trail.windows(2).all(|pair| pair[0].seq < pair[1].seq));
        for record in &trail {
            if record.action == AuditAction::DocumentUploaded {
                assert_eq!(record.actor, institution.id.0);
            } else {
                assert_eq!(record.actor, SYSTEM_ACTOR);
            }
        }
    }
}

mod routing {
    use super::common::*;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    use accredit::config::VerificationConfig;
    use accredit::verification::appeal::AppealService;
    use accredit::verification::decision::DecisionEngine;
    use accredit::verification::router::{verification_router, VerificationApi};

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), 1 << 20)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json payload")
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request built")
    }

    #[tokio::test]
    async fn full_verification_flow_over_http() {
        let (verification, store, _) = pipeline();
        let appeals = Arc::new(AppealService::new(
            store.clone(),
            store.clone(),
            Arc::new(RecordingSink::default()),
            DecisionEngine::new(VerificationConfig::default()),
        ));
        let app = verification_router(VerificationApi {
            verification,
            appeals,
        });

        let registered = app
            .clone()
            .oneshot(post_json(
                "/api/v1/institutions",
                json!({ "name": INSTITUTION_NAME, "student_count": 5200 }),
            ))
            .await
            .expect("routed");
        assert_eq!(registered.status(), StatusCode::CREATED);
        let institution = json_body(registered).await;
        let id = institution["id"].as_str().expect("id").to_string();

        for (document_type, storage_ref) in [
            ("AICTE_APPROVAL", VALID_CERT),
            ("ENROLLMENT_DATA", ENROLLMENT),
        ] {
            let uploaded = app
                .clone()
                .oneshot(post_json(
                    &format!("/api/v1/institutions/{id}/documents"),
                    json!({
                        "document_type": document_type,
                        "file_name": "evidence.pdf",
                        "content_type": "application/pdf",
                        "size_bytes": 48_000,
                        "storage_ref": storage_ref,
                    }),
                ))
                .await
                .expect("routed");
            assert_eq!(uploaded.status(), StatusCode::CREATED);
        }

        let verified = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/v1/institutions/{id}/verify"))
                    .body(Body::empty())
                    .expect("request built"),
            )
            .await
            .expect("routed");
        assert_eq!(verified.status(), StatusCode::OK);
        let run = json_body(verified).await;
        assert_eq!(run["decision"]["status"], "ELIGIBLE");
        assert_eq!(run["decision"]["tier"], "Enterprise");

        let status = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/institutions/{id}"))
                    .body(Body::empty())
                    .expect("request built"),
            )
            .await
            .expect("routed");
        assert_eq!(status.status(), StatusCode::OK);
        let view = json_body(status).await;
        assert_eq!(view["institution"]["status"], "ELIGIBLE");
        assert_eq!(view["latest_decision"]["status"], "ELIGIBLE");
        assert_eq!(view["documents"].as_array().expect("documents").len(), 2);
    }
}
