mod extraction;
mod scoring;

pub use extraction::{
    DocumentStore, DocumentStoreError, ExtractedText, ExtractionError, PlainTextExtractor,
    TextExtractor,
};
pub use scoring::{name_similarity, required_fields, score_document, DocumentScore};

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::time::timeout;

use crate::config::VerificationConfig;

use super::domain::{
    AnalysisResult, Institution, RedFlag, RedFlagKind, Severity, VerificationDocument,
};

/// Analysis plus the degradation reason when the document could not be read.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub result: AnalysisResult,
    pub degraded: Option<String>,
}

/// Runs the fetch, extract, score pipeline for one document.
#[derive(Clone)]
pub struct DocumentAnalyzer {
    store: Arc<dyn DocumentStore>,
    extractor: Arc<dyn TextExtractor>,
    config: VerificationConfig,
}

impl DocumentAnalyzer {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        extractor: Arc<dyn TextExtractor>,
        config: VerificationConfig,
    ) -> Self {
        DocumentAnalyzer {
            store,
            extractor,
            config,
        }
    }

    /// Analyze one document against the institution's declared identity.
    ///
    /// Idempotent for identical stored bytes. Store and extractor failures
    /// degrade to a zero-confidence, all-fields-missing result carrying a
    /// HIGH `SUSPICIOUS` flag instead of failing the run.
    pub async fn analyze(
        &self,
        institution: &Institution,
        document: &VerificationDocument,
    ) -> AnalysisOutcome {
        let prior_completeness = document
            .latest_analysis()
            .map(|analysis| analysis.completeness_score);

        let extraction = match self.read_document(document).await {
            Ok(extraction) => extraction,
            Err(reason) => return degraded_outcome(document, &reason),
        };

        let score = score_document(
            document.document_type,
            &institution.name,
            &extraction,
            prior_completeness,
            Utc::now().date_naive(),
            &self.config,
        );

        AnalysisOutcome {
            result: AnalysisResult {
                document_id: document.id.clone(),
                document_type: document.document_type,
                authenticity_score: score.authenticity,
                completeness_score: score.completeness,
                red_flags: score.red_flags,
                extracted_fields: extraction.fields,
                recommendations: score.recommendations,
                analyzed_at: Utc::now(),
            },
            degraded: None,
        }
    }

    async fn read_document(&self, document: &VerificationDocument) -> Result<ExtractedText, String> {
        let fetched = timeout(
            self.config.document_timeout,
            self.store.fetch(&document.storage_ref),
        )
        .await;
        let bytes = match fetched {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(error)) => return Err(error.to_string()),
            Err(_) => {
                return Err(format!(
                    "document fetch timed out after {:?}",
                    self.config.document_timeout
                ))
            }
        };

        match timeout(self.config.document_timeout, self.extractor.extract(&bytes)).await {
            Ok(Ok(extraction)) => Ok(extraction),
            Ok(Err(error)) => Err(error.to_string()),
            Err(_) => Err(format!(
                "text extraction timed out after {:?}",
                self.config.document_timeout
            )),
        }
    }
}

/// Conservative stand-in result for a document the pipeline could not read.
pub(crate) fn degraded_outcome(document: &VerificationDocument, reason: &str) -> AnalysisOutcome {
    AnalysisOutcome {
        result: AnalysisResult {
            document_id: document.id.clone(),
            document_type: document.document_type,
            authenticity_score: 0.0,
            completeness_score: 0.0,
            red_flags: vec![RedFlag {
                kind: RedFlagKind::Suspicious,
                severity: Severity::High,
                description: format!("document unreadable: {reason}"),
                location: None,
            }],
            extracted_fields: BTreeMap::new(),
            recommendations: vec![
                "Re-upload the document; the stored copy could not be read.".to_string(),
            ],
            analyzed_at: Utc::now(),
        },
        degraded: Some(reason.to_string()),
    }
}
