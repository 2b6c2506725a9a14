use chrono::NaiveDate;

use crate::config::VerificationConfig;

use super::super::domain::{DocumentType, RedFlag, RedFlagKind, Severity};
use super::extraction::ExtractedText;

/// Closed per-type list of fields a document must carry to be complete.
pub fn required_fields(document_type: DocumentType) -> &'static [&'static str] {
    match document_type {
        DocumentType::AicteApproval | DocumentType::NcteRecognition => {
            &["institution_name", "approval_number", "valid_from", "valid_until"]
        }
        // State approvals are issued open-ended.
        DocumentType::StateGovernmentApproval => {
            &["institution_name", "approval_number", "valid_from"]
        }
        DocumentType::EnrollmentData => &["student_count", "academic_year", "institution_name"],
        DocumentType::StudentIdSample => &["student_name", "student_id", "photo"],
    }
}

/// Pure scoring outcome for one extraction pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentScore {
    pub authenticity: f32,
    pub completeness: f32,
    pub red_flags: Vec<RedFlag>,
    pub recommendations: Vec<String>,
}

/// Score an extraction against the declared institution identity.
///
/// Deterministic: identical extractions always produce identical scores and
/// red flags, so re-analysis is reproducible.
pub fn score_document(
    document_type: DocumentType,
    declared_name: &str,
    extraction: &ExtractedText,
    prior_completeness: Option<f32>,
    today: NaiveDate,
    config: &VerificationConfig,
) -> DocumentScore {
    let required = required_fields(document_type);
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|field| !extraction.fields.contains_key(*field))
        .collect();
    let completeness = (required.len() - missing.len()) as f32 / required.len() as f32;

    let mut red_flags = Vec::new();
    let mut authenticity = extraction.confidence.clamp(0.0, 1.0);

    let valid_from = parse_field_date(extraction, "valid_from", &mut red_flags);
    let valid_until = parse_field_date(extraction, "valid_until", &mut red_flags);

    if let (Some(from), Some(until)) = (valid_from, valid_until) {
        if from > until {
            authenticity -= 0.3;
            red_flags.push(RedFlag {
                kind: RedFlagKind::Manipulation,
                severity: Severity::High,
                description: format!(
                    "validity window is reversed: valid_from {from} is after valid_until {until}"
                ),
                location: Some("valid_from".to_string()),
            });
        }
    }

    if let Some(until) = valid_until {
        if until < today {
            red_flags.push(RedFlag {
                kind: RedFlagKind::Expired,
                severity: Severity::High,
                description: format!("approval expired on {until}"),
                location: Some("valid_until".to_string()),
            });
        }
    }

    if extraction.confidence < config.low_confidence_threshold {
        red_flags.push(RedFlag {
            kind: RedFlagKind::Suspicious,
            severity: Severity::Medium,
            description: format!(
                "extraction confidence {:.2} is below the {:.2} threshold",
                extraction.confidence, config.low_confidence_threshold
            ),
            location: None,
        });
    }

    for field in &missing {
        red_flags.push(RedFlag {
            kind: RedFlagKind::Incomplete,
            severity: Severity::Medium,
            description: format!("required field '{field}' is missing"),
            location: Some((*field).to_string()),
        });
    }

    if let Some(extracted_name) = extraction.fields.get("institution_name") {
        let similarity = name_similarity(extracted_name, declared_name);
        if similarity < config.name_similarity_threshold {
            let severity = if similarity < config.name_similarity_threshold / 2.0 {
                Severity::High
            } else {
                Severity::Medium
            };
            red_flags.push(RedFlag {
                kind: RedFlagKind::Mismatch,
                severity,
                description: format!(
                    "extracted institution name '{extracted_name}' does not match declared '{declared_name}'"
                ),
                location: Some("institution_name".to_string()),
            });
        }
    }

    if let Some(number) = extraction.fields.get("approval_number") {
        if !plausible_approval_number(number) {
            authenticity -= 0.2;
            red_flags.push(RedFlag {
                kind: RedFlagKind::Suspicious,
                severity: Severity::Low,
                description: format!("approval number '{number}' has an unusual format"),
                location: Some("approval_number".to_string()),
            });
        }
    }

    if let Some(prior) = prior_completeness {
        if completeness < prior {
            red_flags.push(RedFlag {
                kind: RedFlagKind::Suspicious,
                severity: Severity::High,
                description: format!(
                    "completeness dropped from {prior:.2} to {completeness:.2} since the last analysis"
                ),
                location: None,
            });
        }
    }

    DocumentScore {
        authenticity: authenticity.clamp(0.0, 1.0),
        completeness,
        recommendations: recommendations_for(&red_flags),
        red_flags,
    }
}

fn parse_field_date(
    extraction: &ExtractedText,
    field: &str,
    red_flags: &mut Vec<RedFlag>,
) -> Option<NaiveDate> {
    let raw = extraction.fields.get(field)?;
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            red_flags.push(RedFlag {
                kind: RedFlagKind::Suspicious,
                severity: Severity::Medium,
                description: format!("field '{field}' holds '{raw}', not a YYYY-MM-DD date"),
                location: Some(field.to_string()),
            });
            None
        }
    }
}

fn plausible_approval_number(number: &str) -> bool {
    number.len() >= 6
        && number.contains('-')
        && number
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '/')
}

fn recommendations_for(red_flags: &[RedFlag]) -> Vec<String> {
    let mut recommendations = Vec::new();
    let mut push_once = |text: &str| {
        if !recommendations.iter().any(|existing| existing == text) {
            recommendations.push(text.to_string());
        }
    };

    for flag in red_flags {
        match flag.kind {
            RedFlagKind::Expired => {
                push_once("Upload a current approval certificate; the presented one has lapsed.")
            }
            RedFlagKind::Incomplete => {
                push_once("Provide the missing required fields and re-upload the document.")
            }
            RedFlagKind::Mismatch => {
                push_once("Confirm the institution name matches the registered name exactly.")
            }
            RedFlagKind::Manipulation | RedFlagKind::Forgery => push_once(
                "Request a re-issued certificate from the issuing authority; this copy is inconsistent.",
            ),
            RedFlagKind::Suspicious if flag.severity == Severity::Medium => {
                push_once("Re-upload a clearer scan; text extraction confidence was low.")
            }
            RedFlagKind::Suspicious => {}
        }
    }

    recommendations
}

/// Similarity in `[0, 1]` between two institution names, insensitive to case,
/// punctuation, and spacing (character-bigram Dice coefficient).
pub fn name_similarity(left: &str, right: &str) -> f32 {
    let a = normalize_name(left);
    let b = normalize_name(right);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let left_pairs = bigrams(&a);
    let right_pairs = bigrams(&b);
    if left_pairs.is_empty() || right_pairs.is_empty() {
        return 0.0;
    }

    let total = left_pairs.len() + right_pairs.len();
    let mut remaining = right_pairs;
    let mut matched = 0usize;
    for pair in &left_pairs {
        if let Some(position) = remaining.iter().position(|candidate| candidate == pair) {
            remaining.swap_remove(position);
            matched += 1;
        }
    }

    (2.0 * matched as f32) / total as f32
}

fn normalize_name(name: &str) -> String {
    let folded: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn bigrams(text: &str) -> Vec<(char, char)> {
    let chars: Vec<char> = text.chars().collect();
    chars.windows(2).map(|pair| (pair[0], pair[1])).collect()
}
