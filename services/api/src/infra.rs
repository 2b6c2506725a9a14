use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use accredit::config::VerificationConfig;
use accredit::verification::{
    AicteRegistry, AppealService, DecisionEngine, DocumentAnalyzer, DocumentStore,
    DocumentStoreError, EventError, EventSink, InMemoryVerificationStore, NcteRegistry,
    OutboundEvent, PlainTextExtractor, RegistryManager, StateGovernmentRegistry, VerificationApi,
    VerificationService,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) const DEMO_INSTITUTION: &str = "Horizon Engineering College";
pub(crate) const DEMO_APPELLANT: &str = "Coastal Polytechnic";

pub(crate) const SAMPLE_APPROVAL_REF: &str = "samples/horizon-aicte-approval.txt";
pub(crate) const SAMPLE_ENROLLMENT_REF: &str = "samples/horizon-enrollment.txt";
pub(crate) const SAMPLE_LAPSED_APPROVAL_REF: &str = "samples/coastal-aicte-approval.txt";
pub(crate) const SAMPLE_LAPSED_ENROLLMENT_REF: &str = "samples/coastal-enrollment.txt";
pub(crate) const SAMPLE_RENEWED_APPROVAL_REF: &str = "samples/coastal-aicte-renewal.txt";

/// Blob store stand-in holding the sample documents the demo and the
/// playground server reference by storage key.
pub(crate) struct SeededDocumentStore {
    blobs: HashMap<String, Vec<u8>>,
}

impl SeededDocumentStore {
    pub(crate) fn with_samples() -> Self {
        let mut blobs = HashMap::new();
        blobs.insert(
            SAMPLE_APPROVAL_REF.to_string(),
            approval_certificate(
                DEMO_INSTITUTION,
                "VALID-AICTE-2024-118",
                "2024-07-01",
                "2031-06-30",
            ),
        );
        blobs.insert(
            SAMPLE_ENROLLMENT_REF.to_string(),
            enrollment_summary(DEMO_INSTITUTION, 1200),
        );
        blobs.insert(
            SAMPLE_LAPSED_APPROVAL_REF.to_string(),
            approval_certificate(
                DEMO_APPELLANT,
                "EXPIRED-AICTE-2016-054",
                "2013-07-01",
                "2016-06-30",
            ),
        );
        blobs.insert(
            SAMPLE_LAPSED_ENROLLMENT_REF.to_string(),
            enrollment_summary(DEMO_APPELLANT, 800),
        );
        blobs.insert(
            SAMPLE_RENEWED_APPROVAL_REF.to_string(),
            approval_certificate(
                DEMO_APPELLANT,
                "VALID-AICTE-2026-012",
                "2025-07-01",
                "2032-06-30",
            ),
        );
        SeededDocumentStore { blobs }
    }
}

#[async_trait]
impl DocumentStore for SeededDocumentStore {
    async fn fetch(&self, storage_ref: &str) -> Result<Vec<u8>, DocumentStoreError> {
        self.blobs
            .get(storage_ref)
            .cloned()
            .ok_or_else(|| DocumentStoreError::NotFound(storage_ref.to_string()))
    }
}

fn approval_certificate(name: &str, number: &str, valid_from: &str, valid_until: &str) -> Vec<u8> {
    format!(
        "Institution Name: {name}\nApproval Number: {number}\nValid From: {valid_from}\nValid Until: {valid_until}\n"
    )
    .into_bytes()
}

fn enrollment_summary(name: &str, students: u32) -> Vec<u8> {
    format!("Institution Name: {name}\nStudent Count: {students}\nAcademic Year: 2025-26\n")
        .into_bytes()
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryEventSink {
    events: Arc<Mutex<Vec<OutboundEvent>>>,
}

impl EventSink for InMemoryEventSink {
    fn publish(&self, event: OutboundEvent) -> Result<(), EventError> {
        let mut guard = self.events.lock().expect("event mutex poisoned");
        guard.push(event);
        Ok(())
    }
}

impl InMemoryEventSink {
    pub(crate) fn events(&self) -> Vec<OutboundEvent> {
        self.events.lock().expect("event mutex poisoned").clone()
    }
}

/// Wire the whole pipeline over in-memory infrastructure. The store and the
/// sink come back alongside the API so callers can inspect trails and events.
pub(crate) fn build_pipeline(
    config: VerificationConfig,
) -> (
    VerificationApi,
    Arc<InMemoryVerificationStore>,
    Arc<InMemoryEventSink>,
) {
    let store = Arc::new(InMemoryVerificationStore::default());
    let events = Arc::new(InMemoryEventSink::default());

    let analyzer = DocumentAnalyzer::new(
        Arc::new(SeededDocumentStore::with_samples()),
        Arc::new(PlainTextExtractor),
        config.clone(),
    );

    let mut registries = RegistryManager::new(config.registry_timeout);
    registries.register(Arc::new(AicteRegistry));
    registries.register(Arc::new(NcteRegistry));
    registries.register(Arc::new(StateGovernmentRegistry));

    let verification = Arc::new(VerificationService::new(
        store.clone(),
        store.clone(),
        events.clone(),
        analyzer,
        Arc::new(registries),
        config.clone(),
    ));
    let appeals = Arc::new(AppealService::new(
        store.clone(),
        store.clone(),
        events.clone(),
        DecisionEngine::new(config),
    ));

    let api = VerificationApi {
        verification,
        appeals,
    };
    (api, store, events)
}
