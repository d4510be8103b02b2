use serde::{Deserialize, Serialize};

/// Top-level family a document is classified into. The classifier only ever
/// produces this set; more exotic families from the portal UI collapse into
/// `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    Identity,
    Financial,
    Medical,
    Legal,
    Expense,
    Invoice,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSubtype {
    // Identity
    DriversLicense,
    Passport,
    IdCard,
    BirthCertificate,
    SocialSecurity,
    // Financial
    BankStatement,
    TaxDocument,
    W2,
    #[serde(rename = "1099")]
    Form1099,
    InvestmentReport,
    PayStub,
    // Medical
    MedicalRecord,
    Prescription,
    InsuranceCard,
    LabResults,
    // Legal
    Contract,
    Deed,
    Will,
    CourtDocument,
    PowerOfAttorney,
    // Expense / invoice
    Receipt,
    Invoice,
    Bill,
    PurchaseOrder,
    // Fallbacks
    General,
    Unknown,
}

impl DocumentSubtype {
    /// Human-facing folder name used when building vault paths.
    pub fn folder_name(&self) -> &'static str {
        match self {
            DocumentSubtype::DriversLicense => "Driver Licenses",
            DocumentSubtype::Passport => "Passports",
            DocumentSubtype::IdCard => "ID Cards",
            DocumentSubtype::BirthCertificate => "Birth Certificates",
            DocumentSubtype::SocialSecurity => "Social Security",
            DocumentSubtype::BankStatement => "Bank Statements",
            DocumentSubtype::TaxDocument => "Tax Documents",
            DocumentSubtype::W2 => "W-2 Forms",
            DocumentSubtype::Form1099 => "1099 Forms",
            DocumentSubtype::InvestmentReport => "Investment Reports",
            DocumentSubtype::PayStub => "Pay Stubs",
            DocumentSubtype::MedicalRecord => "Medical Records",
            DocumentSubtype::Prescription => "Prescriptions",
            DocumentSubtype::InsuranceCard => "Insurance Cards",
            DocumentSubtype::LabResults => "Lab Results",
            DocumentSubtype::Contract => "Contracts",
            DocumentSubtype::Deed => "Property Deeds",
            DocumentSubtype::Will => "Wills & Trusts",
            DocumentSubtype::CourtDocument => "Court Documents",
            DocumentSubtype::PowerOfAttorney => "Power of Attorney",
            DocumentSubtype::Receipt => "Receipts",
            DocumentSubtype::Invoice => "Invoices",
            DocumentSubtype::Bill => "Bills",
            DocumentSubtype::PurchaseOrder => "Purchase Orders",
            DocumentSubtype::General => "General",
            DocumentSubtype::Unknown => "Unsorted",
        }
    }
}

/// Which vault a document (and its folders) belongs to. The two scope ids
/// are mutually exclusive by construction; on the wire this serializes to
/// the portal's `{vaultContext, personalVaultId | organizationId}` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "vaultContext", rename_all = "lowercase")]
pub enum VaultScope {
    #[serde(rename_all = "camelCase")]
    Personal { personal_vault_id: String },
    #[serde(rename_all = "camelCase")]
    Organization { organization_id: String },
}

impl VaultScope {
    pub fn personal(vault_id: impl Into<String>) -> Self {
        VaultScope::Personal {
            personal_vault_id: vault_id.into(),
        }
    }

    pub fn organization(organization_id: impl Into<String>) -> Self {
        VaultScope::Organization {
            organization_id: organization_id.into(),
        }
    }

    pub fn personal_vault_id(&self) -> Option<&str> {
        match self {
            VaultScope::Personal { personal_vault_id } => Some(personal_vault_id),
            VaultScope::Organization { .. } => None,
        }
    }

    pub fn organization_id(&self) -> Option<&str> {
        match self {
            VaultScope::Personal { .. } => None,
            VaultScope::Organization { organization_id } => Some(organization_id),
        }
    }
}

/// Per-document classification output. Ephemeral: persisted only as
/// denormalized columns on the document row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub category: DocumentCategory,
    pub subtype: DocumentSubtype,
    pub confidence: f32,
    /// Pattern sources that matched, for explainability in the portal.
    pub patterns: Vec<String>,
    pub suggested_folder_path: Vec<String>,
}

impl ClassificationResult {
    /// Default returned when extraction or classification never ran.
    pub fn unclassified() -> Self {
        Self {
            category: DocumentCategory::Other,
            subtype: DocumentSubtype::Unknown,
            confidence: 0.0,
            patterns: Vec::new(),
            suggested_folder_path: vec!["Unsorted".to_string()],
        }
    }
}

/// Metadata pulled out of the extracted text. Every field is best-effort.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
    /// Raw extracted text, truncated for storage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
}

/// Resolution result for a folder path; derived, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetFolder {
    pub id: String,
    pub name: String,
    pub path: String,
    pub path_segments: Vec<String>,
    /// True when this call created at least one segment.
    pub created: bool,
}

impl TargetFolder {
    /// Fallback folder reported on failed runs. Not a real row.
    pub fn unsorted() -> Self {
        Self {
            id: String::new(),
            name: "Unsorted".to_string(),
            path: "Unsorted".to_string(),
            path_segments: vec!["Unsorted".to_string()],
            created: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    pub document_id: String,
    pub storage_key: String,
    pub file_name: String,
    pub mime_type: String,
    #[serde(flatten)]
    pub scope: VaultScope,
    pub user_id: String,
}

/// The one shape every processing entry point resolves to. Errors never
/// cross the public API; they are folded into `error`/`retryable` here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrOutcome {
    pub success: bool,
    pub document_id: String,
    pub classification: ClassificationResult,
    pub metadata: ExtractedMetadata,
    pub target_folder: TargetFolder,
    /// Wall-clock milliseconds for the whole call.
    pub processing_time: u64,
    pub pages_processed: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Exact,
    // Declared for the portal contract; the matcher does not produce these
    // yet (see folders::FOLDER_ALIASES).
    Fuzzy,
    Alias,
    Category,
    None,
}

/// Result of trying to reuse an existing folder for a suggested path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartMatch {
    pub matched: bool,
    pub match_type: MatchType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_path: Option<String>,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_path: Option<Vec<String>>,
}

/// Dry-run classification result: nothing is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewOutcome {
    pub success: bool,
    pub classification: ClassificationResult,
    pub metadata: ExtractedMetadata,
    pub suggested_path: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
