//! Best-effort metadata extraction from document text.
//!
//! Structured fields from the analysis backend win; regex scraping over the
//! raw text fills the gaps. Everything here is heuristic and optional.

use crate::models::ExtractedMetadata;
use providers::TextAnalysis;
use regex::Regex;

const RAW_TEXT_LIMIT: usize = 2000;

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid metadata pattern")
}

struct Patterns {
    date: Vec<Regex>,
    amount: Vec<Regex>,
    vendor: Vec<Regex>,
    reference: Vec<Regex>,
    client: Vec<Regex>,
    expiration: Vec<Regex>,
}

fn patterns() -> Patterns {
    Patterns {
        date: vec![
            re(r"\d{1,2}[/\-.]\d{1,2}[/\-.]\d{2,4}"),
            re(r"\d{4}[/\-.]\d{1,2}[/\-.]\d{1,2}"),
            re(r"(?i)(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\.?\s*\d{1,2},?\s*\d{4}"),
            re(r"(?i)\d{1,2}\s*(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\.?\s*\d{4}"),
        ],
        amount: vec![
            re(r"\$[\d,]+\.?\d{0,2}"),
            re(r"(?i)(?:total|amount|sum|balance)[:\s]*\$?[\d,]+\.?\d{0,2}"),
            re(r"(?i)[\d,]+\.?\d{0,2}\s*(?:USD|CAD|EUR|GBP)"),
        ],
        vendor: vec![re(
            r"(?i)(?:from|vendor|merchant|store|company)[:\s]*([A-Z][A-Za-z\s&]+(?:Inc\.?|LLC|Ltd\.?|Corp\.?)?)",
        )],
        reference: vec![re(
            r"(?i)(?:invoice|receipt|order|ref|reference|confirmation)\s*(?:#|no\.?|number)?[:\s]*([A-Z0-9\-]+)",
        )],
        client: vec![
            re(r"(?i)(?:client|customer|patient|account)[:\s]*([A-Z][A-Za-z\s]+)"),
            re(r"(?i)(?:bill\s*to|ship\s*to)[:\s]*\n?\s*([A-Z][A-Za-z\s]+)"),
        ],
        expiration: vec![re(
            r"(?i)(?:expires?|expiration\s*date|exp\.?\s*date|valid\s*(?:through|until))[:\s]*(\d{1,2}[/\-.]\d{1,2}[/\-.]\d{2,4}|\d{4}[/\-.]\d{1,2}[/\-.]\d{1,2})",
        )],
    }
}

fn first_match(text: &str, regexes: &[Regex]) -> Option<String> {
    regexes
        .iter()
        .find_map(|r| r.find(text).map(|m| m.as_str().to_string()))
}

fn first_group(text: &str, regexes: &[Regex]) -> Option<String> {
    regexes.iter().find_map(|r| {
        r.captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
    })
}

pub fn extract_metadata(text: &str, analysis: &TextAnalysis) -> ExtractedMetadata {
    let mut meta = ExtractedMetadata::default();

    // Structured expense fields from the backend take priority.
    for field in &analysis.expense_fields {
        match field.kind.as_str() {
            "VENDOR_NAME" => meta.vendor = Some(field.value.clone()),
            "INVOICE_RECEIPT_DATE" => meta.document_date = Some(field.value.clone()),
            "TOTAL" => meta.amount = Some(field.value.clone()),
            "INVOICE_RECEIPT_ID" => meta.invoice_number = Some(field.value.clone()),
            "EXPIRATION_DATE" => meta.expiration_date = Some(field.value.clone()),
            _ => {}
        }
    }

    let p = patterns();

    if meta.document_date.is_none() {
        meta.document_date = first_match(text, &p.date);
    }
    if meta.amount.is_none() {
        meta.amount = first_match(text, &p.amount).map(|m| {
            m.chars()
                .filter(|c| matches!(c, '$' | '0'..='9' | '.' | ','))
                .collect()
        });
    }
    if meta.vendor.is_none() {
        meta.vendor = first_group(text, &p.vendor);
    }
    if meta.invoice_number.is_none() {
        meta.invoice_number = first_group(text, &p.reference);
    }
    meta.client_name = first_group(text, &p.client);
    if meta.expiration_date.is_none() {
        meta.expiration_date = first_group(text, &p.expiration);
    }

    if !text.is_empty() {
        let end = text
            .char_indices()
            .take_while(|(i, _)| *i < RAW_TEXT_LIMIT)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        meta.raw_text = Some(text[..end].to_string());
    }

    meta
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis() -> TextAnalysis {
        TextAnalysis {
            text: String::new(),
            confidence: 0.9,
            page_count: 1,
            expense_fields: Vec::new(),
        }
    }

    #[test]
    fn extracts_date_amount_and_reference() {
        let text = "INVOICE #INV-2043\nDate: 03/15/2026\nTotal: $1,234.56";
        let meta = extract_metadata(text, &analysis());
        assert_eq!(meta.document_date.as_deref(), Some("03/15/2026"));
        assert_eq!(meta.amount.as_deref(), Some("$1,234.56"));
        assert_eq!(meta.invoice_number.as_deref(), Some("INV-2043"));
    }

    #[test]
    fn structured_fields_override_text_scraping() {
        let mut a = analysis();
        a.expense_fields = vec![
            providers::ExpenseField {
                kind: "VENDOR_NAME".into(),
                value: "Acme Supplies".into(),
                confidence: 0.99,
            },
            providers::ExpenseField {
                kind: "TOTAL".into(),
                value: "$42.00".into(),
                confidence: 0.97,
            },
        ];
        let meta = extract_metadata("Total: $99.99 from SomeOther Corp", &a);
        assert_eq!(meta.vendor.as_deref(), Some("Acme Supplies"));
        assert_eq!(meta.amount.as_deref(), Some("$42.00"));
    }

    #[test]
    fn expiration_date_is_picked_up_from_text() {
        let meta = extract_metadata("DRIVER LICENSE\nEXPIRES: 08/31/2030", &analysis());
        assert_eq!(meta.expiration_date.as_deref(), Some("08/31/2030"));
    }

    #[test]
    fn raw_text_is_truncated() {
        let long = "x".repeat(5000);
        let meta = extract_metadata(&long, &analysis());
        assert_eq!(meta.raw_text.unwrap().len(), 2000);
    }

    #[test]
    fn empty_text_leaves_fields_unset() {
        let meta = extract_metadata("", &analysis());
        assert!(meta.document_date.is_none());
        assert!(meta.amount.is_none());
        assert!(meta.raw_text.is_none());
    }
}
