use crate::{DetectedLabel, LabelProvider, ProviderError, TextAnalysis, TextProvider};

/// Placeholder backend: detects nothing and extracts nothing. Deployments
/// without a label service register this so image documents still flow
/// through classification on text alone.
#[derive(Debug, Default)]
pub struct NoopProvider;

#[async_trait::async_trait]
impl TextProvider for NoopProvider {
    async fn analyze(
        &self,
        _storage_key: &str,
        _mime_type: &str,
        _file_name: &str,
    ) -> Result<TextAnalysis, ProviderError> {
        Err(ProviderError::NotImplemented)
    }
}

#[async_trait::async_trait]
impl LabelProvider for NoopProvider {
    async fn detect_labels(&self, _storage_key: &str) -> Result<Vec<DetectedLabel>, ProviderError> {
        Ok(Vec::new())
    }
}
