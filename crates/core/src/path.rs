//! Folder path construction.
//!
//! Turns a classification plus extracted metadata into the ordered folder
//! names the resolver should materialize. Path shape is
//! `<Root> / <Family> / <Year> / <Subtype folder>` for personal-record
//! families, and `<Family> / <Year>` for expense-style documents.

use crate::models::{
    ClassificationResult, DocumentCategory, DocumentSubtype, ExtractedMetadata, VaultScope,
};
use chrono::{Datelike, Utc};
use regex::Regex;

#[derive(Debug, Clone, Copy, Default)]
pub struct PathOptions {
    /// When set, the upload year is used even if the document carries its
    /// own date. Processing uses this; previews date off the document.
    pub use_upload_date: bool,
}

/// Classifier-facing suggestion: the personal-vault phrasing of the path.
pub fn suggested_path(
    category: DocumentCategory,
    subtype: DocumentSubtype,
    year: i32,
) -> Vec<String> {
    path_for(category, subtype, year, "Personal Documents")
}

/// Build the destination path for a document.
pub fn build_folder_path(
    scope: &VaultScope,
    classification: &ClassificationResult,
    metadata: &ExtractedMetadata,
    opts: PathOptions,
) -> Vec<String> {
    let year = if opts.use_upload_date {
        Utc::now().year()
    } else {
        document_year(metadata)
    };

    let root = match scope {
        VaultScope::Personal { .. } => "Personal Documents",
        VaultScope::Organization { .. } => "Organization Documents",
    };

    path_for(classification.category, classification.subtype, year, root)
}

fn path_for(
    category: DocumentCategory,
    subtype: DocumentSubtype,
    year: i32,
    root: &str,
) -> Vec<String> {
    let year = year.to_string();
    let folder = subtype.folder_name().to_string();

    match category {
        DocumentCategory::Identity => {
            vec![root.to_string(), "Identity".to_string(), year, folder]
        }
        DocumentCategory::Financial => {
            vec![root.to_string(), "Financial".to_string(), year, folder]
        }
        DocumentCategory::Medical => {
            vec![root.to_string(), "Medical".to_string(), year, folder]
        }
        DocumentCategory::Legal => {
            vec![root.to_string(), "Legal".to_string(), year, folder]
        }
        DocumentCategory::Expense => vec!["Expenses".to_string(), year],
        DocumentCategory::Invoice => vec!["Invoices".to_string(), year],
        DocumentCategory::Other => vec!["Other".to_string(), year],
    }
}

/// Year from the document's own date when one was extracted and carries a
/// recognizable 4-digit year; upload year otherwise.
fn document_year(metadata: &ExtractedMetadata) -> i32 {
    if let Some(date) = &metadata.document_date {
        let year_re = Regex::new(r"\b(19|20)\d{2}\b").expect("valid year pattern");
        if let Some(m) = year_re.find(date) {
            if let Ok(y) = m.as_str().parse::<i32>() {
                return y;
            }
        }
    }
    Utc::now().year()
}
