mod providers;

pub use providers::{AicteRegistry, NcteRegistry, StateGovernmentRegistry};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use tokio::task::JoinSet;
use tokio::time::{timeout, timeout_at, Instant};

use super::domain::{RegistryStatus, RegistryVerificationResult};

/// Details a registry can return for a known approval number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApprovalDetails {
    pub approval_number: String,
    pub institution_name: String,
    pub status: RegistryStatus,
    pub valid_from: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
}

/// Uniform interface over one external approval authority.
///
/// Implementations own their transport; the manager applies the uniform
/// per-call timeout and the fails-closed degrade.
#[async_trait]
pub trait ApprovalRegistry: Send + Sync {
    fn name(&self) -> &str;

    async fn verify_approval(
        &self,
        approval_number: &str,
        institution_name: &str,
    ) -> Result<RegistryVerificationResult, RegistryError>;

    async fn approval_details(&self, approval_number: &str) -> Option<ApprovalDetails>;
}

/// Transport failure reported by a registry integration.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("registry unreachable: {0}")]
    Unreachable(String),
}

/// Name-keyed lookup over the configured registries.
///
/// New registries register themselves here; the fan-out logic never changes
/// per authority.
pub struct RegistryManager {
    registries: BTreeMap<String, Arc<dyn ApprovalRegistry>>,
    call_timeout: Duration,
}

impl RegistryManager {
    pub fn new(call_timeout: Duration) -> Self {
        RegistryManager {
            registries: BTreeMap::new(),
            call_timeout,
        }
    }

    pub fn register(&mut self, registry: Arc<dyn ApprovalRegistry>) {
        self.registries.insert(registry.name().to_string(), registry);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ApprovalRegistry>> {
        self.registries.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.registries.keys().cloned().collect()
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Check every presented approval concurrently, one task per registry.
    ///
    /// Timeouts, transport errors, and unknown registry names all degrade to
    /// `NOT_FOUND` with an explanatory message; the returned map always holds
    /// one result per presented approval. When `deadline` elapses, calls
    /// still in flight are cancelled and degraded while finished ones are
    /// kept as-is.
    pub async fn verify_all(
        &self,
        approvals: &BTreeMap<String, String>,
        institution_name: &str,
        deadline: Instant,
    ) -> BTreeMap<String, RegistryVerificationResult> {
        let items: Vec<(String, String)> = approvals
            .iter()
            .map(|(registry, number)| (registry.clone(), number.clone()))
            .collect();

        let mut join_set = JoinSet::new();
        for (idx, (registry_name, approval_number)) in items.iter().cloned().enumerate() {
            let registry = self.registries.get(&registry_name).cloned();
            let institution = institution_name.to_string();
            let call_timeout = self.call_timeout;
            join_set.spawn(async move {
                let result = checked_call(
                    registry,
                    &registry_name,
                    &approval_number,
                    &institution,
                    call_timeout,
                )
                .await;
                (idx, result)
            });
        }

        let mut slots: Vec<Option<RegistryVerificationResult>> = vec![None; items.len()];
        loop {
            match timeout_at(deadline, join_set.join_next()).await {
                Ok(Some(Ok((idx, result)))) => slots[idx] = Some(result),
                Ok(Some(Err(_))) => {}
                Ok(None) => break,
                Err(_) => {
                    join_set.abort_all();
                    break;
                }
            }
        }

        items
            .into_iter()
            .zip(slots)
            .map(|((registry_name, approval_number), slot)| {
                let result = slot.unwrap_or_else(|| {
                    RegistryVerificationResult::not_found(
                        &registry_name,
                        &approval_number,
                        institution_name,
                        "verification did not complete within the run budget".to_string(),
                    )
                });
                (registry_name, result)
            })
            .collect()
    }
}

/// One guarded registry call: uniform timeout, `NOT_FOUND` on any failure.
pub(crate) async fn checked_call(
    registry: Option<Arc<dyn ApprovalRegistry>>,
    registry_name: &str,
    approval_number: &str,
    institution_name: &str,
    call_timeout: Duration,
) -> RegistryVerificationResult {
    let registry = match registry {
        Some(registry) => registry,
        None => {
            return RegistryVerificationResult::not_found(
                registry_name,
                approval_number,
                institution_name,
                format!("no registry integration named '{registry_name}'"),
            )
        }
    };

    match timeout(
        call_timeout,
        registry.verify_approval(approval_number, institution_name),
    )
    .await
    {
        Ok(Ok(result)) => result,
        Ok(Err(error)) => RegistryVerificationResult::not_found(
            registry_name,
            approval_number,
            institution_name,
            error.to_string(),
        ),
        Err(_) => RegistryVerificationResult::not_found(
            registry_name,
            approval_number,
            institution_name,
            format!("verification timed out after {call_timeout:?}"),
        ),
    }
}
