//! The OCR pipeline orchestrator.
//!
//! One linear pass per document: limit check, extract and classify, resolve
//! the destination folder, persist, record expiration, account usage. Steps
//! run sequentially with no transaction around the folder-creation /
//! document-update pair; a crash in between leaves an orphaned (harmless)
//! folder. Known gap, kept to match the deployed behavior.
//!
//! No error escapes the public methods; everything folds into the outcome
//! object with an error taxonomy of: entitlement failures (terminal),
//! extraction failures (retryable), metadata-persistence failures (swallowed
//! and logged), and unexpected errors (retryable).

use crate::classifier::Classifier;
use crate::config::OcrConfig;
use crate::expiration::ExpirationSink;
use crate::folders::FolderService;
use crate::limits::{is_trial_expired, Plan, UsageTracker};
use crate::metadata;
use crate::models::{
    ClassificationResult, ExtractedMetadata, OcrOutcome, PreviewOutcome, ProcessRequest,
    SortOutcome, TargetFolder, VaultScope,
};
use crate::path::{self, PathOptions};
use anyhow::Context;
use chrono::Utc;
use providers::{ProviderError, ProviderRegistry, TextAnalysis};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;
use storage::models::DocumentRow;
use tracing::{debug, info, warn};

/// Pages reserved by the limit gate and charged on success. Billing is per
/// document; the outcome reports the real page count separately.
const PAGES_CHARGED: i64 = 1;

pub struct OcrProcessor {
    config: OcrConfig,
    registry: ProviderRegistry,
    classifier: Classifier,
    folders: FolderService,
    usage: UsageTracker,
    expiration: Arc<dyn ExpirationSink>,
    pool: SqlitePool,
}

impl OcrProcessor {
    pub fn new(
        pool: SqlitePool,
        config: OcrConfig,
        registry: ProviderRegistry,
        expiration: Arc<dyn ExpirationSink>,
    ) -> Self {
        let classifier = Classifier::new(config.confidence_threshold);
        Self {
            classifier,
            folders: FolderService::new(pool.clone()),
            usage: UsageTracker::new(pool.clone()),
            registry,
            expiration,
            config,
            pool,
        }
    }

    pub fn folders(&self) -> &FolderService {
        &self.folders
    }

    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    /// Run the full pipeline for one uploaded document.
    pub async fn process_document(&self, request: &ProcessRequest) -> OcrOutcome {
        let started = Instant::now();
        match self.try_process(request, started).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(document = %request.document_id, error = %err, "ocr processing failed");
                failure(&request.document_id, err.to_string(), true, started)
            }
        }
    }

    async fn try_process(
        &self,
        request: &ProcessRequest,
        started: Instant,
    ) -> anyhow::Result<OcrOutcome> {
        if let Some(reason) = self.check_limits(&request.user_id, PAGES_CHARGED).await? {
            return Ok(failure(&request.document_id, reason, false, started));
        }

        let (analysis, classification, meta) = match self
            .analyze(&request.storage_key, &request.mime_type, &request.file_name)
            .await
        {
            Ok(parts) => parts,
            Err(err) => {
                return Ok(failure(&request.document_id, err.to_string(), true, started));
            }
        };

        let pages = analysis
            .page_count
            .max(1)
            .min(self.config.max_pages_per_document);

        let target_folder = if self.config.auto_sort_enabled {
            let folder_path = if self.classifier.is_confident(&classification) {
                path::build_folder_path(
                    &request.scope,
                    &classification,
                    &meta,
                    PathOptions {
                        use_upload_date: true,
                    },
                )
            } else {
                // Not confident enough to file automatically; park it where
                // the user will triage it.
                vec!["Unsorted".to_string()]
            };
            let target = self
                .folders
                .get_or_create_folder_path(&folder_path, &request.scope)
                .await?;
            self.update_document(&request.document_id, Some(&target.id), &classification, &meta)
                .await?;
            target
        } else {
            // Auto-sort is switched off: keep the document where it is but
            // still persist what we learned.
            self.update_document(&request.document_id, None, &classification, &meta)
                .await?;
            TargetFolder::unsorted()
        };

        if let Some(expires_at) = &meta.expiration_date {
            self.expiration
                .save_expiration(&request.document_id, expires_at, &request.user_id, true)
                .await?;
        }

        // Charge what the gate reserved, so the counter can never pass the
        // plan limit even for multi-page documents.
        self.usage
            .increment_ocr_usage(&request.user_id, PAGES_CHARGED)
            .await?;

        info!(
            document = %request.document_id,
            category = wire_name(&classification.category),
            folder = %target_folder.path,
            pages,
            "document processed"
        );

        Ok(OcrOutcome {
            success: true,
            document_id: request.document_id.clone(),
            classification,
            metadata: meta,
            target_folder,
            processing_time: started.elapsed().as_millis() as u64,
            pages_processed: pages,
            error: None,
            retryable: None,
        })
    }

    /// Entitlement gate. `Some(reason)` means processing must not start.
    async fn check_limits(
        &self,
        user_id: &str,
        page_count: i64,
    ) -> anyhow::Result<Option<String>> {
        let Some(user) = self.usage.load_user(user_id).await? else {
            return Ok(Some("User not found".to_string()));
        };

        if is_trial_expired(user.trial_expires_at.as_deref()) {
            return Ok(Some(
                "Your trial has expired. Please upgrade to continue using OCR.".to_string(),
            ));
        }

        let plan = Plan::from_name(user.plan.as_deref());
        let limit = plan.ocr_pages_per_month();
        let check = self.usage.check_ocr_limit(user_id, page_count, limit).await?;
        if !check.allowed {
            return Ok(Some(format!(
                "You've reached your OCR limit of {limit} pages per month."
            )));
        }

        Ok(None)
    }

    /// Extraction and classification. A text-provider failure is the
    /// retryable error of the pipeline; label detection is advisory and its
    /// failures are only logged.
    async fn analyze(
        &self,
        storage_key: &str,
        mime_type: &str,
        file_name: &str,
    ) -> Result<(TextAnalysis, ClassificationResult, ExtractedMetadata), ProviderError> {
        let text_provider = self.registry.text(None)?;
        let analysis = text_provider.analyze(storage_key, mime_type, file_name).await?;

        let mut labels = Vec::new();
        if mime_type.starts_with("image/") && self.config.enable_id_detection {
            if let Ok(provider) = self.registry.labels(None) {
                match provider.detect_labels(storage_key).await {
                    Ok(detected) => labels = detected,
                    Err(err) => warn!(error = %err, "label detection failed"),
                }
            }
        }

        let classification = self
            .classifier
            .classify(&analysis.text, &labels, Some(file_name));
        let meta = metadata::extract_metadata(&analysis.text, &analysis);

        Ok((analysis, classification, meta))
    }

    /// Persist the filing decision. The folder assignment must land; the OCR
    /// metadata columns are best-effort because older deployments may not
    /// have them yet.
    async fn update_document(
        &self,
        document_id: &str,
        folder_id: Option<&str>,
        classification: &ClassificationResult,
        meta: &ExtractedMetadata,
    ) -> anyhow::Result<()> {
        let now = Utc::now().to_rfc3339();

        if let Some(folder_id) = folder_id {
            sqlx::query("UPDATE documents SET folder_id = ?, updated_at = ? WHERE id = ?")
                .bind(folder_id)
                .bind(&now)
                .bind(document_id)
                .execute(&self.pool)
                .await
                .context("assign document folder")?;
        }

        let meta_json = serde_json::to_string(meta).unwrap_or_default();
        let result = sqlx::query(
            "UPDATE documents
             SET ocr_processed = 1, ocr_confidence = ?, document_category = ?,
                 document_subtype = ?, extracted_metadata = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(classification.confidence as f64)
        .bind(wire_name(&classification.category))
        .bind(wire_name(&classification.subtype))
        .bind(&meta_json)
        .bind(&now)
        .bind(document_id)
        .execute(&self.pool)
        .await;

        if let Err(err) = result {
            warn!(document = document_id, error = %err, "ocr metadata update skipped");
        }

        Ok(())
    }

    /// Re-run processing from a stored document row, inferring the vault
    /// scope from whichever scope column is set.
    pub async fn retry_process(&self, document_id: &str, user_id: &str) -> OcrOutcome {
        let started = Instant::now();

        let row = match self.load_document(document_id).await {
            Ok(Some(row)) => row,
            Ok(None) => {
                return failure(document_id, "Document not found".to_string(), false, started);
            }
            Err(err) => return failure(document_id, err.to_string(), true, started),
        };

        let scope = if let Some(vault_id) = &row.personal_vault_id {
            VaultScope::personal(vault_id.clone())
        } else if let Some(org_id) = &row.organization_id {
            VaultScope::organization(org_id.clone())
        } else {
            return failure(
                document_id,
                "Document has no vault scope".to_string(),
                false,
                started,
            );
        };

        let request = ProcessRequest {
            document_id: row.id,
            storage_key: row.storage_key,
            file_name: row.name,
            mime_type: row
                .mime_type
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            scope,
            user_id: user_id.to_string(),
        };

        self.process_document(&request).await
    }

    /// Dry run: extract, classify, and suggest a path without touching the
    /// database or any counters.
    pub async fn preview_classification(
        &self,
        storage_key: &str,
        file_name: &str,
        mime_type: &str,
    ) -> PreviewOutcome {
        match self.analyze(storage_key, mime_type, file_name).await {
            Ok((_, classification, meta)) => {
                let suggested = path::build_folder_path(
                    &VaultScope::personal(String::new()),
                    &classification,
                    &meta,
                    PathOptions::default(),
                );
                PreviewOutcome {
                    success: true,
                    classification,
                    metadata: meta,
                    suggested_path: suggested,
                    error: None,
                }
            }
            Err(err) => PreviewOutcome {
                success: false,
                classification: ClassificationResult::unclassified(),
                metadata: ExtractedMetadata::default(),
                suggested_path: vec!["Unsorted".to_string()],
                error: Some(err.to_string()),
            },
        }
    }

    /// Direct reassignment by the user, bypassing OCR. Always clears the
    /// processed flag so the document reads as manually filed.
    pub async fn manual_sort(&self, document_id: &str, target_folder_id: &str) -> SortOutcome {
        let result = sqlx::query(
            "UPDATE documents SET folder_id = ?, ocr_processed = 0, updated_at = ? WHERE id = ?",
        )
        .bind(target_folder_id)
        .bind(Utc::now().to_rfc3339())
        .bind(document_id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!(document = document_id, folder = target_folder_id, "manual sort");
                SortOutcome {
                    success: true,
                    error: None,
                }
            }
            Err(err) => SortOutcome {
                success: false,
                error: Some(err.to_string()),
            },
        }
    }

    async fn load_document(&self, document_id: &str) -> anyhow::Result<Option<DocumentRow>> {
        let row = sqlx::query_as::<_, DocumentRow>("SELECT * FROM documents WHERE id = ?")
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}

fn failure(document_id: &str, error: String, retryable: bool, started: Instant) -> OcrOutcome {
    OcrOutcome {
        success: false,
        document_id: document_id.to_string(),
        classification: ClassificationResult::unclassified(),
        metadata: ExtractedMetadata::default(),
        target_folder: TargetFolder::unsorted(),
        processing_time: started.elapsed().as_millis() as u64,
        pages_processed: 0,
        error: Some(error),
        retryable: Some(retryable),
    }
}

/// Serde wire name of a category/subtype, for the denormalized columns.
fn wire_name<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expiration::SqliteExpirationStore;
    use crate::models::{DocumentCategory, DocumentSubtype};
    use providers::{DetectedLabel, ExpenseField, LabelProvider, TextProvider};
    use std::sync::Mutex;
    use storage::models::ExpirationRow;

    struct FakeText {
        text: String,
        fail: bool,
        pages: u32,
        expense_fields: Vec<ExpenseField>,
    }

    #[async_trait::async_trait]
    impl TextProvider for FakeText {
        async fn analyze(
            &self,
            _storage_key: &str,
            _mime_type: &str,
            _file_name: &str,
        ) -> Result<TextAnalysis, ProviderError> {
            if self.fail {
                return Err(ProviderError::RequestFailed("extraction timed out".into()));
            }
            Ok(TextAnalysis {
                text: self.text.clone(),
                confidence: 0.93,
                page_count: self.pages,
                expense_fields: self.expense_fields.clone(),
            })
        }
    }

    struct FakeLabels(Vec<DetectedLabel>);

    #[async_trait::async_trait]
    impl LabelProvider for FakeLabels {
        async fn detect_labels(
            &self,
            _storage_key: &str,
        ) -> Result<Vec<DetectedLabel>, ProviderError> {
            Ok(self.0.clone())
        }
    }

    struct FailingLabels;

    #[async_trait::async_trait]
    impl LabelProvider for FailingLabels {
        async fn detect_labels(
            &self,
            _storage_key: &str,
        ) -> Result<Vec<DetectedLabel>, ProviderError> {
            Err(ProviderError::RequestFailed("label service down".into()))
        }
    }

    struct RecordingSink(Mutex<Vec<(String, String)>>);

    #[async_trait::async_trait]
    impl ExpirationSink for RecordingSink {
        async fn save_expiration(
            &self,
            document_id: &str,
            expires_at: &str,
            _user_id: &str,
            _notify: bool,
        ) -> anyhow::Result<()> {
            self.0
                .lock()
                .unwrap()
                .push((document_id.to_string(), expires_at.to_string()));
            Ok(())
        }
    }

    async fn test_pool() -> SqlitePool {
        let pool = storage::connect("sqlite::memory:").await.unwrap();
        storage::migrate(&pool).await.unwrap();
        pool
    }

    async fn insert_user(pool: &SqlitePool, id: &str, plan: &str, used: i64) {
        let month = Utc::now().format("%Y-%m").to_string();
        sqlx::query(
            "INSERT INTO users (id, plan, trial_expires_at, ocr_pages_used, usage_month)
             VALUES (?, ?, NULL, ?, ?)",
        )
        .bind(id)
        .bind(plan)
        .bind(used)
        .bind(month)
        .execute(pool)
        .await
        .unwrap();
    }

    async fn insert_document(pool: &SqlitePool, id: &str, vault: Option<&str>, org: Option<&str>) {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO documents (id, name, storage_key, mime_type, folder_id,
                personal_vault_id, organization_id, ocr_processed, created_at, updated_at)
             VALUES (?, ?, ?, 'application/pdf', NULL, ?, ?, 0, ?, ?)",
        )
        .bind(id)
        .bind(format!("{id}.pdf"))
        .bind(format!("uploads/{id}"))
        .bind(vault)
        .bind(org)
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await
        .unwrap();
    }

    fn processor_with(pool: &SqlitePool, text: FakeText) -> OcrProcessor {
        let registry = ProviderRegistry::new()
            .with_text("fake", Arc::new(text))
            .set_preferred_text("fake");
        OcrProcessor::new(
            pool.clone(),
            OcrConfig::default(),
            registry,
            Arc::new(SqliteExpirationStore::new(pool.clone())),
        )
    }

    fn invoice_text() -> FakeText {
        FakeText {
            text: "INVOICE #881\nBill To: Acme Corp\nAmount Due: $120.00\nPayment Terms: Net 30\nDue Date: 04/01/2026".into(),
            fail: false,
            pages: 1,
            expense_fields: Vec::new(),
        }
    }

    fn request(document_id: &str, user_id: &str) -> ProcessRequest {
        ProcessRequest {
            document_id: document_id.to_string(),
            storage_key: format!("uploads/{document_id}"),
            file_name: format!("{document_id}.pdf"),
            mime_type: "application/pdf".to_string(),
            scope: VaultScope::personal("pv1"),
            user_id: user_id.to_string(),
        }
    }

    #[tokio::test]
    async fn success_path_files_and_accounts() {
        let pool = test_pool().await;
        insert_user(&pool, "u1", "starter", 0).await;
        insert_document(&pool, "doc1", Some("pv1"), None).await;
        let proc = processor_with(&pool, invoice_text());

        let outcome = proc.process_document(&request("doc1", "u1")).await;
        assert!(outcome.success, "error: {:?}", outcome.error);
        assert_eq!(outcome.classification.category, DocumentCategory::Invoice);
        assert_eq!(outcome.pages_processed, 1);
        assert_eq!(outcome.target_folder.path_segments[0], "Invoices");
        assert!(outcome.target_folder.created);

        let row = sqlx::query_as::<_, DocumentRow>("SELECT * FROM documents WHERE id = 'doc1'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.folder_id.as_deref(), Some(outcome.target_folder.id.as_str()));
        assert_eq!(row.ocr_processed, 1);
        assert_eq!(row.document_category.as_deref(), Some("invoice"));
        assert_eq!(row.document_subtype.as_deref(), Some("invoice"));

        assert_eq!(proc.usage().current_usage("u1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reprocessing_reuses_the_folder() {
        let pool = test_pool().await;
        insert_user(&pool, "u1", "starter", 0).await;
        insert_document(&pool, "doc1", Some("pv1"), None).await;
        let proc = processor_with(&pool, invoice_text());

        let first = proc.process_document(&request("doc1", "u1")).await;
        let second = proc.process_document(&request("doc1", "u1")).await;
        assert_eq!(first.target_folder.id, second.target_folder.id);
        assert!(!second.target_folder.created);
    }

    #[tokio::test]
    async fn quota_exhaustion_is_terminal_and_unaccounted() {
        let pool = test_pool().await;
        // Starter allows 150/month; already at the cap.
        insert_user(&pool, "u1", "starter", 150).await;
        insert_document(&pool, "doc1", Some("pv1"), None).await;
        let proc = processor_with(&pool, invoice_text());

        let outcome = proc.process_document(&request("doc1", "u1")).await;
        assert!(!outcome.success);
        assert_eq!(outcome.retryable, Some(false));
        assert!(outcome.error.unwrap().contains("OCR limit"));
        assert_eq!(outcome.pages_processed, 0);

        // Counter untouched, document untouched.
        assert_eq!(proc.usage().current_usage("u1").await.unwrap(), 150);
        let row = sqlx::query_as::<_, DocumentRow>("SELECT * FROM documents WHERE id = 'doc1'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(row.folder_id.is_none());
        assert_eq!(row.ocr_processed, 0);
    }

    #[tokio::test]
    async fn expired_trial_is_terminal() {
        let pool = test_pool().await;
        let past = (Utc::now() - chrono::Duration::days(2)).to_rfc3339();
        sqlx::query(
            "INSERT INTO users (id, plan, trial_expires_at, ocr_pages_used, usage_month)
             VALUES ('u1', 'trial', ?, 0, NULL)",
        )
        .bind(past)
        .execute(&pool)
        .await
        .unwrap();
        insert_document(&pool, "doc1", Some("pv1"), None).await;
        let proc = processor_with(&pool, invoice_text());

        let outcome = proc.process_document(&request("doc1", "u1")).await;
        assert!(!outcome.success);
        assert_eq!(outcome.retryable, Some(false));
        assert!(outcome.error.unwrap().contains("trial has expired"));
    }

    #[tokio::test]
    async fn missing_user_is_terminal() {
        let pool = test_pool().await;
        insert_document(&pool, "doc1", Some("pv1"), None).await;
        let proc = processor_with(&pool, invoice_text());

        let outcome = proc.process_document(&request("doc1", "ghost")).await;
        assert!(!outcome.success);
        assert_eq!(outcome.retryable, Some(false));
        assert_eq!(outcome.error.as_deref(), Some("User not found"));
    }

    #[tokio::test]
    async fn extraction_failure_is_retryable_with_defaults() {
        let pool = test_pool().await;
        insert_user(&pool, "u1", "starter", 0).await;
        insert_document(&pool, "doc1", Some("pv1"), None).await;
        let proc = processor_with(
            &pool,
            FakeText {
                text: String::new(),
                fail: true,
                pages: 1,
                expense_fields: Vec::new(),
            },
        );

        let outcome = proc.process_document(&request("doc1", "u1")).await;
        assert!(!outcome.success);
        assert_eq!(outcome.retryable, Some(true));
        assert_eq!(outcome.classification.category, DocumentCategory::Other);
        assert_eq!(outcome.classification.subtype, DocumentSubtype::Unknown);
        assert_eq!(outcome.classification.confidence, 0.0);
        assert_eq!(outcome.target_folder.name, "Unsorted");
        assert_eq!(outcome.target_folder.path, "Unsorted");

        // Failure must not consume quota.
        assert_eq!(proc.usage().current_usage("u1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn expiration_date_reaches_the_sink() {
        let pool = test_pool().await;
        insert_user(&pool, "u1", "pro", 0).await;
        insert_document(&pool, "doc1", Some("pv1"), None).await;
        let proc = processor_with(
            &pool,
            FakeText {
                text: "DRIVER LICENSE\nLicense Number D1234\nClass C\nState of Nevada\nEXPIRES: 08/31/2030".into(),
                fail: false,
                pages: 1,
                expense_fields: Vec::new(),
            },
        );

        let outcome = proc.process_document(&request("doc1", "u1")).await;
        assert!(outcome.success, "error: {:?}", outcome.error);
        assert_eq!(
            outcome.metadata.expiration_date.as_deref(),
            Some("08/31/2030")
        );

        let rows = sqlx::query_as::<_, ExpirationRow>("SELECT * FROM document_expirations")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].document_id, "doc1");
        assert_eq!(rows[0].expires_at, "08/31/2030");
    }

    #[tokio::test]
    async fn recording_sink_sees_the_forwarded_date() {
        let pool = test_pool().await;
        insert_user(&pool, "u1", "pro", 0).await;
        insert_document(&pool, "doc1", Some("pv1"), None).await;

        let sink = Arc::new(RecordingSink(Mutex::new(Vec::new())));
        let registry = ProviderRegistry::new()
            .with_text(
                "fake",
                Arc::new(FakeText {
                    text: "passport nationality place of birth".into(),
                    fail: false,
                    pages: 1,
                    expense_fields: vec![ExpenseField {
                        kind: "EXPIRATION_DATE".into(),
                        value: "2032-05-01".into(),
                        confidence: 0.9,
                    }],
                }),
            )
            .set_preferred_text("fake");
        let proc = OcrProcessor::new(pool, OcrConfig::default(), registry, sink.clone());

        let outcome = proc.process_document(&request("doc1", "u1")).await;
        assert!(outcome.success);
        let saved = sink.0.lock().unwrap();
        assert_eq!(saved.as_slice(), &[("doc1".to_string(), "2032-05-01".to_string())]);
    }

    #[tokio::test]
    async fn multi_page_documents_charge_one_gated_page() {
        let pool = test_pool().await;
        // One page under the starter cap; a 10-page scan must still fit.
        insert_user(&pool, "u1", "starter", 149).await;
        insert_document(&pool, "doc1", Some("pv1"), None).await;
        let mut text = invoice_text();
        text.pages = 10;
        let proc = processor_with(&pool, text);

        let outcome = proc.process_document(&request("doc1", "u1")).await;
        assert!(outcome.success, "error: {:?}", outcome.error);
        assert_eq!(outcome.pages_processed, 10);

        // The counter moves by the gated amount and never passes the limit.
        assert_eq!(proc.usage().current_usage("u1").await.unwrap(), 150);
    }

    #[tokio::test]
    async fn labels_boost_image_classification() {
        let text = "receipt total subtotal";

        let plain_pool = test_pool().await;
        insert_user(&plain_pool, "u1", "starter", 0).await;
        insert_document(&plain_pool, "doc1", Some("pv1"), None).await;
        let plain = processor_with(
            &plain_pool,
            FakeText {
                text: text.into(),
                fail: false,
                pages: 1,
                expense_fields: Vec::new(),
            },
        );
        let without = plain.process_document(&request("doc1", "u1")).await;

        let pool = test_pool().await;
        insert_user(&pool, "u1", "starter", 0).await;
        insert_document(&pool, "doc1", Some("pv1"), None).await;
        let registry = ProviderRegistry::new()
            .with_text(
                "fake",
                Arc::new(FakeText {
                    text: text.into(),
                    fail: false,
                    pages: 1,
                    expense_fields: Vec::new(),
                }),
            )
            .set_preferred_text("fake")
            .with_labels(
                "fake",
                Arc::new(FakeLabels(vec![DetectedLabel {
                    name: "Receipt".into(),
                    confidence: 95.0,
                }])),
            )
            .set_preferred_labels("fake");
        let proc = OcrProcessor::new(
            pool.clone(),
            OcrConfig::default(),
            registry,
            Arc::new(SqliteExpirationStore::new(pool)),
        );

        let mut image_request = request("doc1", "u1");
        image_request.mime_type = "image/jpeg".to_string();
        let with = proc.process_document(&image_request).await;

        assert!(with.success, "error: {:?}", with.error);
        assert_eq!(with.classification.category, DocumentCategory::Expense);
        assert!(with.classification.confidence > without.classification.confidence);
    }

    #[tokio::test]
    async fn label_failure_is_non_fatal_for_images() {
        let pool = test_pool().await;
        insert_user(&pool, "u1", "starter", 0).await;
        insert_document(&pool, "doc1", Some("pv1"), None).await;

        let registry = ProviderRegistry::new()
            .with_text("fake", Arc::new(invoice_text()))
            .set_preferred_text("fake")
            .with_labels("fake", Arc::new(FailingLabels))
            .set_preferred_labels("fake");
        let proc = OcrProcessor::new(
            pool.clone(),
            OcrConfig::default(),
            registry,
            Arc::new(SqliteExpirationStore::new(pool)),
        );

        let mut image_request = request("doc1", "u1");
        image_request.mime_type = "image/jpeg".to_string();
        let outcome = proc.process_document(&image_request).await;

        assert!(outcome.success, "error: {:?}", outcome.error);
        assert_eq!(outcome.classification.category, DocumentCategory::Invoice);
    }

    #[tokio::test]
    async fn low_confidence_parks_in_unsorted() {
        let pool = test_pool().await;
        insert_user(&pool, "u1", "starter", 0).await;
        insert_document(&pool, "doc1", Some("pv1"), None).await;
        let proc = processor_with(
            &pool,
            FakeText {
                // One hit out of seven bank-statement patterns stays far
                // under the 0.7 threshold.
                text: "your account summary for March is attached".into(),
                fail: false,
                pages: 1,
                expense_fields: Vec::new(),
            },
        );

        let outcome = proc.process_document(&request("doc1", "u1")).await;
        assert!(outcome.success);
        assert_eq!(outcome.target_folder.path, "Unsorted");
        assert!(!outcome.target_folder.id.is_empty());
    }

    #[tokio::test]
    async fn disabled_auto_sort_leaves_folder_untouched() {
        let pool = test_pool().await;
        insert_user(&pool, "u1", "starter", 0).await;
        insert_document(&pool, "doc1", Some("pv1"), None).await;

        let registry = ProviderRegistry::new()
            .with_text("fake", Arc::new(invoice_text()))
            .set_preferred_text("fake");
        let config = OcrConfig {
            auto_sort_enabled: false,
            ..Default::default()
        };
        let proc = OcrProcessor::new(
            pool.clone(),
            config,
            registry,
            Arc::new(SqliteExpirationStore::new(pool.clone())),
        );

        let outcome = proc.process_document(&request("doc1", "u1")).await;
        assert!(outcome.success);
        assert!(outcome.target_folder.id.is_empty());

        let row = sqlx::query_as::<_, DocumentRow>("SELECT * FROM documents WHERE id = 'doc1'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(row.folder_id.is_none());
        // Classification still lands.
        assert_eq!(row.document_category.as_deref(), Some("invoice"));
    }

    #[tokio::test]
    async fn retry_missing_document_is_terminal() {
        let pool = test_pool().await;
        insert_user(&pool, "u1", "starter", 0).await;
        let proc = processor_with(&pool, invoice_text());

        let outcome = proc.retry_process("ghost", "u1").await;
        assert!(!outcome.success);
        assert_eq!(outcome.retryable, Some(false));
        assert_eq!(outcome.error.as_deref(), Some("Document not found"));
    }

    #[tokio::test]
    async fn retry_infers_scope_from_the_row() {
        let pool = test_pool().await;
        insert_user(&pool, "u1", "starter", 0).await;
        insert_document(&pool, "doc1", None, Some("org9")).await;
        let proc = processor_with(&pool, invoice_text());

        let outcome = proc.retry_process("doc1", "u1").await;
        assert!(outcome.success, "error: {:?}", outcome.error);

        // The folder must live in the organization scope.
        let folder = proc
            .folders()
            .folder_by_id(&outcome.target_folder.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(folder.organization_id.as_deref(), Some("org9"));
        assert!(folder.personal_vault_id.is_none());
    }

    #[tokio::test]
    async fn preview_persists_nothing() {
        let pool = test_pool().await;
        insert_user(&pool, "u1", "starter", 0).await;
        let proc = processor_with(&pool, invoice_text());

        let preview = proc
            .preview_classification("uploads/x", "x.pdf", "application/pdf")
            .await;
        assert!(preview.success);
        assert_eq!(preview.classification.category, DocumentCategory::Invoice);
        assert_eq!(preview.suggested_path[0], "Invoices");

        let folders: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM folders")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(folders.0, 0);
        assert_eq!(proc.usage().current_usage("u1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn manual_sort_always_clears_the_processed_flag() {
        let pool = test_pool().await;
        insert_user(&pool, "u1", "starter", 0).await;
        insert_document(&pool, "doc1", Some("pv1"), None).await;
        let proc = processor_with(&pool, invoice_text());

        // Process first so ocr_processed is set.
        let processed = proc.process_document(&request("doc1", "u1")).await;
        assert!(processed.success);

        let target = proc
            .folders()
            .get_or_create_folder_path(
                &["Archive".to_string()],
                &VaultScope::personal("pv1"),
            )
            .await
            .unwrap();

        let sorted = proc.manual_sort("doc1", &target.id).await;
        assert!(sorted.success);

        let row = sqlx::query_as::<_, DocumentRow>("SELECT * FROM documents WHERE id = 'doc1'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.folder_id.as_deref(), Some(target.id.as_str()));
        assert_eq!(row.ocr_processed, 0);
    }
}
