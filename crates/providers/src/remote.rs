use crate::{
    DetectedLabel, ExpenseField, LabelProvider, ProviderError, TextAnalysis, TextProvider,
};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Clone)]
pub struct RemoteAnalysisConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

/// HTTP-backed analysis gateway. Talks to a service that fronts the actual
/// OCR/detection engines and stores the uploaded objects under `storage_key`.
#[derive(Clone)]
pub struct RemoteAnalysisProvider {
    client: Client,
    cfg: Arc<RemoteAnalysisConfig>,
}

impl RemoteAnalysisProvider {
    pub fn new(cfg: RemoteAnalysisConfig) -> Self {
        Self {
            client: Client::new(),
            cfg: Arc::new(cfg),
        }
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.post(format!("{}{}", self.cfg.base_url, path));
        if let Some(key) = &self.cfg.api_key {
            req = req.bearer_auth(key);
        }
        req
    }
}

#[derive(Deserialize)]
struct AnalyzeApiResponse {
    text: String,
    confidence: f32,
    #[serde(default)]
    page_count: Option<u32>,
    #[serde(default)]
    expense_fields: Vec<ExpenseApiField>,
}

#[derive(Deserialize)]
struct ExpenseApiField {
    #[serde(rename = "type")]
    kind: String,
    value: String,
    confidence: f32,
}

#[async_trait::async_trait]
impl TextProvider for RemoteAnalysisProvider {
    async fn analyze(
        &self,
        storage_key: &str,
        mime_type: &str,
        file_name: &str,
    ) -> Result<TextAnalysis, ProviderError> {
        #[derive(serde::Serialize)]
        struct AnalyzeRequest<'a> {
            key: &'a str,
            mime_type: &'a str,
            file_name: &'a str,
        }

        let body = AnalyzeRequest {
            key: storage_key,
            mime_type,
            file_name,
        };

        let resp = self
            .request("/v1/analyze")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ProviderError::RequestFailed(format!(
                "analysis gateway returned {}",
                resp.status()
            )));
        }

        let parsed: AnalyzeApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        Ok(TextAnalysis {
            text: parsed.text,
            confidence: parsed.confidence,
            page_count: parsed.page_count.unwrap_or(1),
            expense_fields: parsed
                .expense_fields
                .into_iter()
                .map(|f| ExpenseField {
                    kind: f.kind,
                    value: f.value,
                    confidence: f.confidence,
                })
                .collect(),
        })
    }
}

#[derive(Deserialize)]
struct LabelsApiResponse {
    labels: Vec<LabelApiEntry>,
}

#[derive(Deserialize)]
struct LabelApiEntry {
    name: String,
    confidence: f32,
}

#[async_trait::async_trait]
impl LabelProvider for RemoteAnalysisProvider {
    async fn detect_labels(&self, storage_key: &str) -> Result<Vec<DetectedLabel>, ProviderError> {
        #[derive(serde::Serialize)]
        struct LabelsRequest<'a> {
            key: &'a str,
        }

        let resp = self
            .request("/v1/labels")
            .json(&LabelsRequest { key: storage_key })
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        let parsed: LabelsApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        Ok(parsed
            .labels
            .into_iter()
            .map(|l| DetectedLabel {
                name: l.name,
                confidence: l.confidence,
            })
            .collect())
    }
}
