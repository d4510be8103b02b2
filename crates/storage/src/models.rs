//! Typed rows for the vault tables.
//!
//! Timestamps are stored as RFC 3339 text; higher layers parse them where
//! they need real dates (trial expiry, usage months).

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FolderRow {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub personal_vault_id: Option<String>,
    pub organization_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DocumentRow {
    pub id: String,
    pub name: String,
    pub storage_key: String,
    pub mime_type: Option<String>,
    pub folder_id: Option<String>,
    pub personal_vault_id: Option<String>,
    pub organization_id: Option<String>,
    pub ocr_processed: i64,
    pub ocr_confidence: Option<f64>,
    pub document_category: Option<String>,
    pub document_subtype: Option<String>,
    pub extracted_metadata: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserRow {
    pub id: String,
    pub plan: Option<String>,
    pub trial_expires_at: Option<String>,
    pub ocr_pages_used: i64,
    pub usage_month: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExpirationRow {
    pub document_id: String,
    pub user_id: String,
    pub expires_at: String,
    pub notify: i64,
    pub created_at: String,
}
