use std::collections::BTreeMap;

use async_trait::async_trait;

/// Raw OCR-equivalent output: full text, an overall confidence, and the
/// parsed field map.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    pub text: String,
    pub confidence: f32,
    pub fields: BTreeMap<String, String>,
}

/// Blob storage boundary; the platform's store is consumed, not reimplemented.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn fetch(&self, storage_ref: &str) -> Result<Vec<u8>, DocumentStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentStoreError {
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("document store unreachable: {0}")]
    Unreachable(String),
}

/// OCR-equivalent step turning stored bytes into text and fields.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ExtractionError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("text extraction failed: {0}")]
    Failed(String),
}

/// Deterministic extractor for `key: value` documents.
///
/// Stands in for the OCR integration in the demo and tests. Confidence is the
/// share of non-empty lines that parsed as fields, so a clean certificate
/// scores 1.0 and free-form prose scores near zero.
#[derive(Debug, Default, Clone)]
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ExtractionError> {
        let text = String::from_utf8(bytes.to_vec())
            .map_err(|err| ExtractionError::Failed(format!("payload is not utf-8: {err}")))?;

        let mut fields = BTreeMap::new();
        let mut lines = 0usize;
        let mut parsed = 0usize;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            lines += 1;
            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim().to_ascii_lowercase().replace(' ', "_");
                let value = value.trim().to_string();
                if !key.is_empty() && !value.is_empty() {
                    fields.insert(key, value);
                    parsed += 1;
                }
            }
        }

        let confidence = if lines == 0 {
            0.0
        } else {
            parsed as f32 / lines as f32
        };

        Ok(ExtractedText {
            text,
            confidence,
            fields,
        })
    }
}
