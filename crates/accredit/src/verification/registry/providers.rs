use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use super::super::domain::{RegistryStatus, RegistryVerificationResult};
use super::{ApprovalDetails, ApprovalRegistry, RegistryError};

/// Stand-ins for the government registries, keyed by approval-number prefix
/// so demos and tests can exercise every status deterministically:
/// `VALID-*` is active, `EXPIRED-*` lapsed, `SUSPENDED-*` suspended, and
/// anything else is unknown. The state board additionally accepts `STATE-*`
/// as active and issues open-ended approvals.

fn status_for_number(approval_number: &str, accepts_state_prefix: bool) -> RegistryStatus {
    if approval_number.starts_with("VALID-")
        || (accepts_state_prefix && approval_number.starts_with("STATE-"))
    {
        RegistryStatus::Active
    } else if approval_number.starts_with("EXPIRED-") {
        RegistryStatus::Expired
    } else if approval_number.starts_with("SUSPENDED-") {
        RegistryStatus::Suspended
    } else {
        RegistryStatus::NotFound
    }
}

fn validity_window(
    status: RegistryStatus,
    open_ended: bool,
) -> (Option<NaiveDate>, Option<NaiveDate>) {
    match status {
        RegistryStatus::Active => (
            NaiveDate::from_ymd_opt(2023, 6, 1),
            if open_ended {
                None
            } else {
                NaiveDate::from_ymd_opt(2030, 5, 31)
            },
        ),
        RegistryStatus::Expired => (
            NaiveDate::from_ymd_opt(2019, 6, 1),
            NaiveDate::from_ymd_opt(2022, 5, 31),
        ),
        RegistryStatus::Suspended => (
            NaiveDate::from_ymd_opt(2022, 6, 1),
            NaiveDate::from_ymd_opt(2025, 5, 31),
        ),
        RegistryStatus::NotFound => (None, None),
    }
}

fn simulated_result(
    registry: &str,
    approval_number: &str,
    institution_name: &str,
    accepts_state_prefix: bool,
    open_ended: bool,
) -> RegistryVerificationResult {
    let status = status_for_number(approval_number, accepts_state_prefix);
    let (valid_from, valid_until) = validity_window(status, open_ended);

    // A genuine NOT_FOUND answer is a completed check; `error` stays reserved
    // for calls that never got a real answer.
    RegistryVerificationResult {
        registry: registry.to_string(),
        approval_number: approval_number.to_string(),
        institution_name: institution_name.to_string(),
        status,
        valid_from,
        valid_until,
        error: None,
        checked_at: Utc::now(),
    }
}

fn simulated_details(
    approval_number: &str,
    accepts_state_prefix: bool,
    open_ended: bool,
) -> Option<ApprovalDetails> {
    let status = status_for_number(approval_number, accepts_state_prefix);
    if status == RegistryStatus::NotFound {
        return None;
    }
    let (valid_from, valid_until) = validity_window(status, open_ended);
    Some(ApprovalDetails {
        approval_number: approval_number.to_string(),
        institution_name: "On file with the issuing authority".to_string(),
        status,
        valid_from,
        valid_until,
    })
}

/// National technical-education authority.
#[derive(Debug, Default, Clone)]
pub struct AicteRegistry;

#[async_trait]
impl ApprovalRegistry for AicteRegistry {
    fn name(&self) -> &str {
        "AICTE"
    }

    async fn verify_approval(
        &self,
        approval_number: &str,
        institution_name: &str,
    ) -> Result<RegistryVerificationResult, RegistryError> {
        Ok(simulated_result(
            self.name(),
            approval_number,
            institution_name,
            false,
            false,
        ))
    }

    async fn approval_details(&self, approval_number: &str) -> Option<ApprovalDetails> {
        simulated_details(approval_number, false, false)
    }
}

/// National teacher-education authority.
#[derive(Debug, Default, Clone)]
pub struct NcteRegistry;

#[async_trait]
impl ApprovalRegistry for NcteRegistry {
    fn name(&self) -> &str {
        "NCTE"
    }

    async fn verify_approval(
        &self,
        approval_number: &str,
        institution_name: &str,
    ) -> Result<RegistryVerificationResult, RegistryError> {
        Ok(simulated_result(
            self.name(),
            approval_number,
            institution_name,
            false,
            false,
        ))
    }

    async fn approval_details(&self, approval_number: &str) -> Option<ApprovalDetails> {
        simulated_details(approval_number, false, false)
    }
}

/// State government education board.
#[derive(Debug, Default, Clone)]
pub struct StateGovernmentRegistry;

#[async_trait]
impl ApprovalRegistry for StateGovernmentRegistry {
    fn name(&self) -> &str {
        "STATE_GOVERNMENT"
    }

    async fn verify_approval(
        &self,
        approval_number: &str,
        institution_name: &str,
    ) -> Result<RegistryVerificationResult, RegistryError> {
        Ok(simulated_result(
            self.name(),
            approval_number,
            institution_name,
            true,
            true,
        ))
    }

    async fn approval_details(&self, approval_number: &str) -> Option<ApprovalDetails> {
        simulated_details(approval_number, true, true)
    }
}
