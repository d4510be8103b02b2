//! Pattern-based document classification.
//!
//! Classification is pure: weighted regex sets over the extracted text,
//! optionally boosted by image labels and filename hints. The strongest
//! match (match count x weight) wins.

use crate::models::{ClassificationResult, DocumentCategory, DocumentSubtype};
use crate::path;
use chrono::{Datelike, Utc};
use providers::DetectedLabel;
use regex::Regex;

struct PatternSet {
    category: DocumentCategory,
    subtype: DocumentSubtype,
    patterns: Vec<Regex>,
    /// Higher weight = stronger indicator.
    weight: f32,
}

struct ScoredMatch {
    category: DocumentCategory,
    subtype: DocumentSubtype,
    weight: f32,
    match_count: usize,
    pattern_count: usize,
    sources: Vec<String>,
}

pub struct Classifier {
    sets: Vec<PatternSet>,
    confidence_threshold: f32,
}

impl Classifier {
    pub fn new(confidence_threshold: f32) -> Self {
        Self {
            sets: build_pattern_sets(),
            confidence_threshold,
        }
    }

    /// Whether a result clears the auto-sort confidence bar.
    pub fn is_confident(&self, result: &ClassificationResult) -> bool {
        result.confidence >= self.confidence_threshold
    }

    pub fn classify(
        &self,
        text: &str,
        labels: &[DetectedLabel],
        file_name: Option<&str>,
    ) -> ClassificationResult {
        let mut matches: Vec<ScoredMatch> = Vec::new();

        for set in &self.sets {
            let sources: Vec<String> = set
                .patterns
                .iter()
                .filter(|p| p.is_match(text))
                .map(|p| p.as_str().to_string())
                .collect();
            if !sources.is_empty() {
                matches.push(ScoredMatch {
                    category: set.category,
                    subtype: set.subtype,
                    weight: set.weight,
                    match_count: sources.len(),
                    pattern_count: set.patterns.len(),
                    sources,
                });
            }
        }

        matches.sort_by(|a, b| {
            let score_a = a.match_count as f32 * a.weight;
            let score_b = b.match_count as f32 * b.weight;
            score_b.partial_cmp(&score_a).unwrap_or(std::cmp::Ordering::Equal)
        });

        // Label hints from image analysis.
        let mut label_boost = 0.0_f32;
        let mut boosted_category = None;
        if !labels.is_empty() {
            let (category, confidence) = analyze_labels(labels);
            if confidence > 0.7 {
                label_boost = 0.2;
                boosted_category = Some(category);
            }
        }

        // Filename hints go after the ranked text matches, so they decide the
        // outcome only when nothing in the text matched. Users often name
        // identity documents accurately, so those get a heavier synthetic
        // match for the confidence math.
        if let Some(name) = file_name {
            if let Some((category, subtype)) = filename_hint(name) {
                let already_matched = matches.iter().any(|m| m.subtype == subtype);
                if !already_matched {
                    let identity = category == DocumentCategory::Identity;
                    matches.push(ScoredMatch {
                        category,
                        subtype,
                        weight: if identity { 1.5 } else { 0.5 },
                        match_count: if identity { 3 } else { 1 },
                        pattern_count: 0,
                        sources: vec![format!("filename: {name}")],
                    });
                }
            }
        }

        if matches.is_empty() {
            return ClassificationResult {
                category: DocumentCategory::Other,
                subtype: DocumentSubtype::Unknown,
                confidence: 0.3,
                patterns: Vec::new(),
                suggested_folder_path: vec!["Other".to_string()],
            };
        }

        let best = &matches[0];

        // Ratio of patterns hit, scaled by set weight. Synthetic filename
        // matches have no pattern list and count as a full hit.
        let ratio = if best.pattern_count == 0 {
            1.0
        } else {
            (best.match_count as f32 / best.pattern_count as f32).min(1.0)
        };
        let mut confidence = ratio * best.weight;
        if boosted_category == Some(best.category) {
            confidence += label_boost;
        }
        let confidence = confidence.min(1.0);

        let year = Utc::now().year();
        ClassificationResult {
            category: best.category,
            subtype: best.subtype,
            confidence,
            patterns: best.sources.clone(),
            suggested_folder_path: path::suggested_path(best.category, best.subtype, year),
        }
    }
}

/// Score label names against the category families; returns the best
/// category and its clamped score.
fn analyze_labels(labels: &[DetectedLabel]) -> (DocumentCategory, f32) {
    use DocumentCategory::*;
    let mut scores: Vec<(DocumentCategory, f32)> = vec![
        (Identity, 0.0),
        (Financial, 0.0),
        (Medical, 0.0),
        (Legal, 0.0),
        (Expense, 0.0),
        (Invoice, 0.0),
    ];

    for label in labels {
        let name = label.name.to_lowercase();
        // Detection services report confidence as a percentage.
        let confidence = label.confidence / 100.0;
        let mut add = |category: DocumentCategory| {
            for (c, score) in scores.iter_mut() {
                if *c == category {
                    *score += confidence;
                }
            }
        };

        if name.contains("id") || name.contains("license") || name.contains("passport") {
            add(Identity);
        }
        if name.contains("receipt") || name.contains("bill") {
            add(Expense);
        }
        if name.contains("invoice") {
            add(Invoice);
        }
        if name.contains("medical") || name.contains("prescription") {
            add(Medical);
        }
        if name.contains("bank") || name.contains("financial") || name.contains("check") {
            add(Financial);
        }
        if name.contains("contract") || name.contains("legal") {
            add(Legal);
        }
    }

    let (best, score) = scores
        .into_iter()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .unwrap_or((Other, 0.0));
    if score > 0.0 {
        (best, score.min(1.0))
    } else {
        (Other, 0.0)
    }
}

/// Map obvious filename fragments to a classification. Order matters:
/// "birth" must be checked before the generic certificate/license checks.
fn filename_hint(file_name: &str) -> Option<(DocumentCategory, DocumentSubtype)> {
    use DocumentCategory::*;
    use DocumentSubtype::*;
    let lower = file_name.to_lowercase();

    if lower.contains("receipt") || lower.contains("expense") {
        return Some((Expense, Receipt));
    }
    if lower.contains("invoice") {
        return Some((DocumentCategory::Invoice, DocumentSubtype::Invoice));
    }
    if lower.contains("birth") {
        return Some((Identity, BirthCertificate));
    }
    if lower.contains("social")
        || lower.contains("ssn")
        || lower.contains("ss-card")
        || lower.contains("ss_card")
    {
        return Some((Identity, SocialSecurity));
    }
    if lower.contains("license") || lower.contains("dl") || lower.contains("driver") {
        return Some((Identity, DriversLicense));
    }
    if lower.contains("passport") {
        return Some((Identity, Passport));
    }
    if lower.contains("id_card")
        || lower.contains("id-card")
        || lower.contains("idcard")
        || lower.contains("identification")
    {
        return Some((Identity, IdCard));
    }
    if lower.contains("w2") || lower.contains("w-2") {
        return Some((Financial, W2));
    }
    if lower.contains("1099") {
        return Some((Financial, Form1099));
    }
    if lower.contains("statement") {
        return Some((Financial, BankStatement));
    }
    if lower.contains("contract") || lower.contains("agreement") {
        return Some((Legal, Contract));
    }
    if lower.contains("prescription") || lower.contains("rx") {
        return Some((Medical, Prescription));
    }

    None
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid classifier pattern")
}

fn build_pattern_sets() -> Vec<PatternSet> {
    use DocumentCategory::*;
    use DocumentSubtype::*;

    let set = |category, subtype, weight: f32, patterns: &[&str]| PatternSet {
        category,
        subtype,
        patterns: patterns.iter().map(|p| re(p)).collect(),
        weight,
    };

    vec![
        // Identity
        set(
            Identity,
            DriversLicense,
            1.0,
            &[
                r"(?i)driver'?s?\s*licen[cs]e",
                r"(?i)\bDL\s*#?\s*[A-Z0-9]+",
                r"(?i)class\s*[A-Z]",
                r"(?i)license\s*number",
                r"(?i)state\s*of\s*[A-Z]",
            ],
        ),
        set(
            Identity,
            Passport,
            1.0,
            &[
                r"(?i)\bpassport\b",
                r"(?i)passport\s*no\.?",
                r"(?i)nationality",
                r"(?i)place\s*of\s*birth",
                r"(?i)\bMRZ\b",
                r"(?i)P<[A-Z]{3}",
            ],
        ),
        set(
            Identity,
            IdCard,
            0.9,
            &[
                r"(?i)\bid\s*card\b",
                r"(?i)identification\s*card",
                r"(?i)national\s*id",
                r"(?i)identity\s*card",
            ],
        ),
        // Weighted above driver's license so birth certificates win ties.
        set(
            Identity,
            BirthCertificate,
            1.2,
            &[
                r"(?i)birth\s*certificate",
                r"(?i)certificate\s*of\s*(?:live\s*)?birth",
                r"(?i)vital\s*records",
                r"(?i)live\s*birth",
                r"(?i)registrar",
                r"(?i)child'?s?\s*name",
                r"(?i)place\s*of\s*birth",
                r"(?i)mother'?s?\s*name",
                r"(?i)father'?s?\s*name",
                r"(?i)date\s*filed",
            ],
        ),
        set(
            Identity,
            SocialSecurity,
            1.0,
            &[
                r"(?i)social\s*security",
                r"(?i)\bSSN\b",
                r"(?i)\bSSA\b",
                r"\d{3}-\d{2}-\d{4}",
            ],
        ),
        // Financial
        set(
            Financial,
            BankStatement,
            1.0,
            &[
                r"(?i)bank\s*statement",
                r"(?i)account\s*statement",
                r"(?i)statement\s*period",
                r"(?i)beginning\s*balance",
                r"(?i)ending\s*balance",
                r"(?i)account\s*summary",
                r"(?i)account\s*number",
            ],
        ),
        set(
            Financial,
            TaxDocument,
            1.0,
            &[
                r"(?i)form\s*1040",
                r"(?i)tax\s*return",
                r"(?i)internal\s*revenue",
                r"(?i)\bIRS\b",
                r"(?i)taxable\s*income",
                r"(?i)tax\s*year",
            ],
        ),
        set(
            Financial,
            W2,
            1.0,
            &[
                r"(?i)\bW-?2\b",
                r"(?i)wage\s*and\s*tax\s*statement",
                r"(?i)employer'?s?\s*federal\s*EIN",
                r"(?i)wages,?\s*tips",
            ],
        ),
        set(
            Financial,
            Form1099,
            1.0,
            &[
                r"(?i)\b1099\b",
                r"(?i)1099-MISC",
                r"(?i)1099-NEC",
                r"(?i)1099-INT",
                r"(?i)nonemployee\s*compensation",
            ],
        ),
        set(
            Financial,
            InvestmentReport,
            0.9,
            &[
                r"(?i)investment\s*report",
                r"(?i)portfolio\s*statement",
                r"(?i)brokerage\s*statement",
                r"(?i)dividend",
                r"(?i)stock\s*holdings",
                r"(?i)mutual\s*fund",
            ],
        ),
        set(
            Financial,
            PayStub,
            1.0,
            &[
                r"(?i)pay\s*stub",
                r"(?i)pay\s*statement",
                r"(?i)earnings\s*statement",
                r"(?i)gross\s*pay",
                r"(?i)net\s*pay",
                r"(?i)deductions",
                r"(?i)pay\s*period",
            ],
        ),
        // Medical
        set(
            Medical,
            MedicalRecord,
            0.9,
            &[
                r"(?i)medical\s*record",
                r"(?i)patient\s*record",
                r"(?i)clinical\s*notes",
                r"(?i)diagnosis",
                r"(?i)treatment\s*plan",
                r"(?i)physician",
                r"(?i)healthcare\s*provider",
            ],
        ),
        set(
            Medical,
            Prescription,
            1.0,
            &[
                r"(?i)\bRx\b",
                r"(?i)prescription",
                r"(?i)pharmacy",
                r"(?i)dosage",
                r"(?i)refills",
                r"(?i)take\s*\d+\s*tablet",
                r"(?i)mg\s*tablet",
            ],
        ),
        set(
            Medical,
            InsuranceCard,
            1.0,
            &[
                r"(?i)health\s*insurance",
                r"(?i)member\s*id",
                r"(?i)group\s*number",
                r"(?i)copay",
                r"(?i)\bPPO\b",
                r"(?i)\bHMO\b",
                r"(?i)subscriber",
            ],
        ),
        set(
            Medical,
            LabResults,
            1.0,
            &[
                r"(?i)lab\s*results",
                r"(?i)laboratory\s*report",
                r"(?i)blood\s*test",
                r"(?i)test\s*results",
                r"(?i)specimen",
                r"(?i)reference\s*range",
            ],
        ),
        // Legal
        set(
            Legal,
            Contract,
            0.8,
            &[
                r"(?i)\bcontract\b",
                r"(?i)agreement\b",
                r"(?i)terms\s*and\s*conditions",
                r"(?i)hereby\s*agree",
                r"(?i)party\s*of\s*the\s*first",
                r"(?i)witnesseth",
                r"(?i)executed\s*on",
            ],
        ),
        set(
            Legal,
            Deed,
            1.0,
            &[
                r"(?i)\bdeed\b",
                r"(?i)property\s*deed",
                r"(?i)title\s*deed",
                r"(?i)grantor",
                r"(?i)grantee",
                r"(?i)real\s*property",
                r"(?i)legal\s*description",
            ],
        ),
        set(
            Legal,
            Will,
            1.0,
            &[
                r"(?i)last\s*will",
                r"(?i)testament",
                r"(?i)\bwill\b.*\bestate\b",
                r"(?i)executor",
                r"(?i)beneficiary",
                r"(?i)bequeath",
                r"(?i)hereby\s*revoke",
            ],
        ),
        set(
            Legal,
            CourtDocument,
            0.9,
            &[
                r"(?i)court\s*of",
                r"(?i)case\s*no\.?",
                r"(?i)plaintiff",
                r"(?i)defendant",
                r"(?i)docket",
                r"(?i)\bvs?\.?\b",
                r"(?i)judgment",
                r"(?i)petition",
            ],
        ),
        set(
            Legal,
            PowerOfAttorney,
            1.0,
            &[
                r"(?i)power\s*of\s*attorney",
                r"\bPOA\b",
                r"(?i)attorney.in.fact",
                r"(?i)principal\s*hereby",
                r"(?i)authorize.*act\s*on",
            ],
        ),
        // Expense / invoice
        set(
            Expense,
            Receipt,
            0.9,
            &[
                r"(?i)\breceipt\b",
                r"(?i)thank\s*you\s*for\s*(your\s*)?(purchase|shopping)",
                r"(?i)\btotal\b",
                r"(?i)\bsubtotal\b",
                r"(?i)\bchange\s*due\b",
                r"(?i)visa|mastercard|amex|discover",
                r"\*{4}\d{4}",
            ],
        ),
        set(
            DocumentCategory::Invoice,
            DocumentSubtype::Invoice,
            1.0,
            &[
                r"(?i)\binvoice\b",
                r"(?i)invoice\s*#",
                r"(?i)invoice\s*number",
                r"(?i)bill\s*to",
                r"(?i)ship\s*to",
                r"(?i)due\s*date",
                r"(?i)payment\s*terms",
                r"(?i)amount\s*due",
            ],
        ),
        set(
            Expense,
            Bill,
            0.8,
            &[
                r"(?i)\bbill\b",
                r"(?i)utility\s*bill",
                r"(?i)amount\s*due",
                r"(?i)due\s*by",
                r"(?i)service\s*period",
                r"(?i)account\s*balance",
            ],
        ),
        set(
            Expense,
            PurchaseOrder,
            1.0,
            &[
                r"(?i)purchase\s*order",
                r"(?i)\bP\.?O\.?\s*#",
                r"(?i)order\s*number",
                r"(?i)ship\s*date",
                r"(?i)delivery\s*date",
                r"(?i)ordered\s*by",
            ],
        ),
    ]
}
