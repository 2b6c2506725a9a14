use super::common::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::verification::domain::RegistryStatus;
use crate::verification::registry::{
    AicteRegistry, ApprovalRegistry, RegistryManager, StateGovernmentRegistry,
};

fn approvals(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(registry, number)| ((*registry).to_string(), (*number).to_string()))
        .collect()
}

fn far_deadline() -> Instant {
    Instant::now() + Duration::from_secs(5)
}

#[tokio::test]
async fn approval_prefixes_map_to_registry_statuses() {
    let registry = AicteRegistry;

    let active = registry
        .verify_approval("VALID-AICTE-2024-001", DECLARED_NAME)
        .await
        .expect("call succeeds");
    assert_eq!(active.status, RegistryStatus::Active);
    assert!(active.is_valid());
    assert!(active.error.is_none());

    let expired = registry
        .verify_approval("EXPIRED-AICTE-2019-042", DECLARED_NAME)
        .await
        .expect("call succeeds");
    assert_eq!(expired.status, RegistryStatus::Expired);
    assert!(!expired.is_valid());

    let suspended = registry
        .verify_approval("SUSPENDED-AICTE-2022-007", DECLARED_NAME)
        .await
        .expect("call succeeds");
    assert_eq!(suspended.status, RegistryStatus::Suspended);

    let unknown = registry
        .verify_approval("AICTE-2024-001", DECLARED_NAME)
        .await
        .expect("call succeeds");
    assert_eq!(unknown.status, RegistryStatus::NotFound);
    assert!(
        unknown.error.is_none(),
        "a definite no-match is not a degraded call"
    );
}

#[tokio::test]
async fn state_registry_accepts_state_prefix_with_open_ended_window() {
    let registry = StateGovernmentRegistry;

    let result = registry
        .verify_approval("STATE-KA-2023-100", DECLARED_NAME)
        .await
        .expect("call succeeds");

    assert_eq!(result.status, RegistryStatus::Active);
    assert!(result.valid_from.is_some());
    assert!(result.valid_until.is_none());
}

#[tokio::test]
async fn verify_all_returns_one_result_per_presented_approval() {
    let manager = default_registries(&test_config());
    let presented = approvals(&[
        ("AICTE", "VALID-AICTE-2024-001"),
        ("NCTE", "EXPIRED-NCTE-2018-009"),
        ("STATE_GOVERNMENT", "STATE-KA-2023-100"),
    ]);

    let results = manager
        .verify_all(&presented, DECLARED_NAME, far_deadline())
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(results["AICTE"].status, RegistryStatus::Active);
    assert_eq!(results["NCTE"].status, RegistryStatus::Expired);
    assert_eq!(results["STATE_GOVERNMENT"].status, RegistryStatus::Active);

    let none = manager
        .verify_all(&BTreeMap::new(), DECLARED_NAME, far_deadline())
        .await;
    assert!(none.is_empty());
}

#[tokio::test]
async fn unknown_registry_degrades_to_not_found() {
    let mut manager = RegistryManager::new(Duration::from_millis(500));
    manager.register(Arc::new(AicteRegistry));
    let presented = approvals(&[("UGC", "VALID-UGC-2024-001")]);

    let results = manager
        .verify_all(&presented, DECLARED_NAME, far_deadline())
        .await;

    let result = &results["UGC"];
    assert_eq!(result.status, RegistryStatus::NotFound);
    let error = result.error.as_deref().expect("degrade reason recorded");
    assert!(error.contains("no registry integration"));
}

#[tokio::test]
async fn slow_registry_degrades_after_call_timeout() {
    let mut manager = RegistryManager::new(Duration::from_millis(50));
    manager.register(Arc::new(SlowRegistry {
        name: "AICTE",
        delay: Duration::from_millis(400),
    }));
    let presented = approvals(&[("AICTE", "VALID-AICTE-2024-001")]);

    let results = manager
        .verify_all(&presented, DECLARED_NAME, far_deadline())
        .await;

    let result = &results["AICTE"];
    assert_eq!(result.status, RegistryStatus::NotFound);
    assert!(result
        .error
        .as_deref()
        .expect("degrade reason recorded")
        .contains("timed out"));
}

#[tokio::test]
async fn run_budget_cancels_in_flight_calls_but_keeps_finished_ones() {
    let mut manager = RegistryManager::new(Duration::from_secs(10));
    manager.register(Arc::new(AicteRegistry));
    manager.register(Arc::new(SlowRegistry {
        name: "SLOWGOV",
        delay: Duration::from_secs(10),
    }));
    let presented = approvals(&[
        ("AICTE", "VALID-AICTE-2024-001"),
        ("SLOWGOV", "VALID-SLOWGOV-2024-001"),
    ]);

    let deadline = Instant::now() + Duration::from_millis(200);
    let results = manager.verify_all(&presented, DECLARED_NAME, deadline).await;

    assert_eq!(results["AICTE"].status, RegistryStatus::Active);
    assert!(results["AICTE"].error.is_none());

    let slow = &results["SLOWGOV"];
    assert_eq!(slow.status, RegistryStatus::NotFound);
    assert!(slow
        .error
        .as_deref()
        .expect("degrade reason recorded")
        .contains("run budget"));
}

#[tokio::test]
async fn approval_details_expose_the_registry_window() {
    let registry = AicteRegistry;

    let details = registry
        .approval_details("VALID-AICTE-2024-001")
        .await
        .expect("known number has details on file");
    assert_eq!(details.approval_number, "VALID-AICTE-2024-001");
    assert_eq!(details.status, RegistryStatus::Active);
    assert!(details.valid_from.is_some());
    assert!(details.valid_until.is_some());

    assert!(registry.approval_details("AICTE-2024-001").await.is_none());

    let open_ended = StateGovernmentRegistry
        .approval_details("STATE-KA-2023-100")
        .await
        .expect("known number has details on file");
    assert_eq!(open_ended.status, RegistryStatus::Active);
    assert!(open_ended.valid_until.is_none());
}

#[tokio::test]
async fn manager_resolves_registries_by_name() {
    let manager = default_registries(&test_config());

    let aicte = manager.get("AICTE").expect("registered authority");
    assert_eq!(aicte.name(), "AICTE");
    assert!(manager.get("UGC").is_none());
}
