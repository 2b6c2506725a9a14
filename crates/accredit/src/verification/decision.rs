use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::config::VerificationConfig;

use super::domain::{
    AnalysisResult, DecisionId, DecisionTrigger, DocumentType, EligibilityDecision,
    EligibilityStatus, Institution, RedFlag, RedFlagKind, RegistryVerificationResult, Severity,
    Tier,
};

/// Red-flag kinds that invalidate everything a document might corroborate.
const FATAL_FLAG_KINDS: [RedFlagKind; 3] = [
    RedFlagKind::Forgery,
    RedFlagKind::Manipulation,
    RedFlagKind::Expired,
];

/// Combines document analyses, registry results, and the declared student
/// count into one immutable verdict.
///
/// The rules are ordered and the first terminal rule wins: authenticity
/// failures dominate completeness, which dominates registry corroboration.
pub struct DecisionEngine {
    config: VerificationConfig,
}

impl DecisionEngine {
    pub fn new(config: VerificationConfig) -> Self {
        DecisionEngine { config }
    }

    pub fn decide(
        &self,
        institution: &Institution,
        analyses: &[AnalysisResult],
        registry_results: &[RegistryVerificationResult],
    ) -> EligibilityDecision {
        // Rule 1: a HIGH forgery, manipulation, or expiry flag rejects outright.
        if let Some(flag) = first_flag(analyses, |flag| {
            flag.severity == Severity::High && FATAL_FLAG_KINDS.contains(&flag.kind)
        }) {
            return build_decision(
                institution,
                EligibilityStatus::Rejected,
                None,
                flag.description.clone(),
                analyses,
                registry_results,
            );
        }

        // Rule 2: any other HIGH flag routes to a human instead of guessing.
        if let Some(flag) = first_flag(analyses, |flag| flag.severity == Severity::High) {
            return build_decision(
                institution,
                EligibilityStatus::UnderReview,
                None,
                format!("manual review required: {}", flag.description),
                analyses,
                registry_results,
            );
        }

        // Rule 3: enough sufficiently-complete document types must be present.
        let complete_types: BTreeSet<DocumentType> = analyses
            .iter()
            .filter(|analysis| analysis.completeness_score >= self.config.completeness_threshold)
            .map(|analysis| analysis.document_type)
            .collect();
        if complete_types.len() < self.config.min_complete_document_types {
            return build_decision(
                institution,
                EligibilityStatus::Pending,
                None,
                format!(
                    "{} of {} required document types are sufficiently complete",
                    complete_types.len(),
                    self.config.min_complete_document_types
                ),
                analyses,
                registry_results,
            );
        }

        // Rule 4: at least one presented approval must verify as active.
        if !registry_results.iter().any(|result| result.is_valid()) {
            if registry_results.is_empty() {
                return build_decision(
                    institution,
                    EligibilityStatus::Pending,
                    None,
                    "no approval numbers were presented for any integrated registry".to_string(),
                    analyses,
                    registry_results,
                );
            }
            return build_decision(
                institution,
                EligibilityStatus::Rejected,
                None,
                registry_rejection_reason(registry_results),
                analyses,
                registry_results,
            );
        }

        // Rule 5: eligible; the tier follows from the declared student count.
        let tier = Tier::for_student_count(institution.student_count);
        build_decision(
            institution,
            EligibilityStatus::Eligible,
            Some(tier),
            format!(
                "verification passed; placed in the {} tier for {} declared students",
                tier.label(),
                institution.student_count
            ),
            analyses,
            registry_results,
        )
    }

    /// Decision issued when a reviewer overturns a rejection on appeal.
    pub fn manual_override(
        &self,
        institution: &Institution,
        reviewer_id: &str,
        reason: String,
    ) -> EligibilityDecision {
        let tier = Tier::for_student_count(institution.student_count);
        EligibilityDecision {
            id: DecisionId::next(),
            institution_id: institution.id.clone(),
            status: EligibilityStatus::Eligible,
            tier: Some(tier),
            trigger: DecisionTrigger::Manual {
                reviewer_id: reviewer_id.to_string(),
            },
            reason,
            document_ids: Vec::new(),
            registries_consulted: Vec::new(),
            decided_at: Utc::now(),
        }
    }

    /// Deadline lapse, driven by the platform scheduler through the service.
    ///
    /// Returns `None` when there is nothing to expire: no deadline, deadline
    /// still ahead, or the institution already eligible or expired.
    pub fn expire(
        &self,
        institution: &Institution,
        now: DateTime<Utc>,
    ) -> Option<EligibilityDecision> {
        let deadline = institution.verification_deadline?;
        if deadline >= now {
            return None;
        }
        if matches!(
            institution.status,
            EligibilityStatus::Eligible | EligibilityStatus::Expired
        ) {
            return None;
        }

        Some(EligibilityDecision {
            id: DecisionId::next(),
            institution_id: institution.id.clone(),
            status: EligibilityStatus::Expired,
            tier: None,
            trigger: DecisionTrigger::Automatic,
            reason: format!("verification deadline {deadline} elapsed without approval"),
            document_ids: Vec::new(),
            registries_consulted: Vec::new(),
            decided_at: now,
        })
    }
}

fn first_flag<'a>(
    analyses: &'a [AnalysisResult],
    predicate: impl Fn(&RedFlag) -> bool,
) -> Option<&'a RedFlag> {
    analyses
        .iter()
        .flat_map(|analysis| analysis.red_flags.iter())
        .find(|flag| predicate(flag))
}

fn registry_rejection_reason(registry_results: &[RegistryVerificationResult]) -> String {
    let statuses: Vec<String> = registry_results
        .iter()
        .map(|result| format!("{}: {}", result.registry, result.status.label()))
        .collect();
    format!(
        "no presented approval is active with its registry ({})",
        statuses.join(", ")
    )
}

fn build_decision(
    institution: &Institution,
    status: EligibilityStatus,
    tier: Option<Tier>,
    reason: String,
    analyses: &[AnalysisResult],
    registry_results: &[RegistryVerificationResult],
) -> EligibilityDecision {
    let registries_consulted: BTreeSet<String> = registry_results
        .iter()
        .map(|result| result.registry.clone())
        .collect();

    EligibilityDecision {
        id: DecisionId::next(),
        institution_id: institution.id.clone(),
        status,
        tier,
        trigger: DecisionTrigger::Automatic,
        reason,
        document_ids: analyses
            .iter()
            .map(|analysis| analysis.document_id.clone())
            .collect(),
        registries_consulted: registries_consulted.into_iter().collect(),
        decided_at: Utc::now(),
    }
}
