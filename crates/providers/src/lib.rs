//! Provider abstractions for text extraction and image label detection.
//!
//! The OCR pipeline never talks to an analysis service directly; it goes
//! through these traits so the orchestrator can be exercised with fakes and
//! the deployment can pick its backend by name.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod noop;
pub mod remote;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("not implemented")]
    NotImplemented,
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

/// A structured field pulled out of an expense-style document (vendor name,
/// total, invoice id, ...). Mirrors what analysis backends return alongside
/// the raw text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseField {
    pub kind: String,
    pub value: String,
    pub confidence: f32,
}

/// Result of running text extraction over a stored document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextAnalysis {
    pub text: String,
    pub confidence: f32,
    pub page_count: u32,
    #[serde(default)]
    pub expense_fields: Vec<ExpenseField>,
}

/// A label detected on an image (e.g. "Passport", "Receipt").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedLabel {
    pub name: String,
    /// Percentage in 0..100, as the detection services report it.
    pub confidence: f32,
}

#[async_trait::async_trait]
pub trait TextProvider: Send + Sync {
    /// Extract text from the object at `storage_key`. `mime_type` and
    /// `file_name` let backends pick a document vs. expense analysis path.
    async fn analyze(
        &self,
        storage_key: &str,
        mime_type: &str,
        file_name: &str,
    ) -> Result<TextAnalysis, ProviderError>;
}

#[async_trait::async_trait]
pub trait LabelProvider: Send + Sync {
    async fn detect_labels(&self, storage_key: &str) -> Result<Vec<DetectedLabel>, ProviderError>;
}

#[derive(Default, Clone)]
pub struct ProviderRegistry {
    text: HashMap<String, Arc<dyn TextProvider>>,
    labels: HashMap<String, Arc<dyn LabelProvider>>,
    pub preferred_text: Option<String>,
    pub preferred_labels: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, name: &str, provider: Arc<dyn TextProvider>) -> Self {
        self.text.insert(name.to_string(), provider);
        self
    }

    pub fn with_labels(mut self, name: &str, provider: Arc<dyn LabelProvider>) -> Self {
        self.labels.insert(name.to_string(), provider);
        self
    }

    pub fn set_preferred_text(mut self, name: &str) -> Self {
        self.preferred_text = Some(name.to_string());
        self
    }

    pub fn set_preferred_labels(mut self, name: &str) -> Self {
        self.preferred_labels = Some(name.to_string());
        self
    }

    pub fn text(&self, name: Option<&str>) -> Result<Arc<dyn TextProvider>, ProviderError> {
        let key = name
            .map(str::to_string)
            .or_else(|| self.preferred_text.clone())
            .ok_or_else(|| ProviderError::UnknownProvider("no text provider configured".into()))?;
        self.text
            .get(&key)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownProvider(key))
    }

    pub fn labels(&self, name: Option<&str>) -> Result<Arc<dyn LabelProvider>, ProviderError> {
        let key = name
            .map(str::to_string)
            .or_else(|| self.preferred_labels.clone())
            .ok_or_else(|| ProviderError::UnknownProvider("no label provider configured".into()))?;
        self.labels
            .get(&key)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownProvider(key))
    }
}
