//! Local rule-based analyzer
//!
//! Runs entirely in-process on the original text. Used whenever the
//! external path is skipped or fails, so it must always produce a verdict.

use crate::types::{AnalysisStatus, DocumentType};
use regex::Regex;
use std::sync::OnceLock;

/// Reasoning suffix marking a locally produced verdict
pub const LOCAL_MARKER: &str = "(Basic analysis - external AI not used)";

/// Elements found before a document counts as complete
const COMPLETE_AT: usize = 4;
/// Elements found before a document counts as partially complete
const PARTIAL_AT: usize = 2;
/// Missing elements listed in the reasoning
const MISSING_LISTED: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct LocalAnalysis {
    pub status: AnalysisStatus,
    pub summary: String,
    pub reasoning: String,
}

/// One expected element of a document and whether it was found
struct Element {
    name: &'static str,
    present: bool,
}

impl Element {
    fn keywords(name: &'static str, lower: &str, keywords: &[&str]) -> Self {
        Self {
            name,
            present: keywords.iter().any(|k| lower.contains(k)),
        }
    }

    fn pattern(name: &'static str, text: &str, re: &Regex) -> Self {
        Self {
            name,
            present: re.is_match(text),
        }
    }
}

fn found(elements: &[Element]) -> usize {
    elements.iter().filter(|e| e.present).count()
}

fn missing(elements: &[Element]) -> Vec<&'static str> {
    elements
        .iter()
        .filter(|e| !e.present)
        .map(|e| e.name)
        .collect()
}

fn date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{1,2}[/\-]\d{1,2}[/\-]\d{2,4}").unwrap())
}

fn amount_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\d+\.?\d*").unwrap())
}

fn balance_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:ending|current|available)?\s*balance[:\s]*\$?(\d[\d,]*\.?\d*)").unwrap()
    })
}

fn holder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z][a-z]+ [A-Z][a-z]+\b").unwrap())
}

fn tax_year_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\btax\s+year\b|\b(?:19|20)\d{2}\b").unwrap())
}

/// Capitalized pairs that are statement vocabulary, not people
const HEADING_WORDS: &[&str] = &[
    "Account", "Statement", "Bank", "Balance", "Holder", "Customer", "Number", "Routing",
    "Summary", "Total", "Ending", "Beginning", "Direct", "Deposit", "Credit", "Union",
];

/// Analyze `text` without leaving the process.
pub fn analyze_locally(text: &str, doc_type: DocumentType) -> LocalAnalysis {
    if text.trim().is_empty() {
        return LocalAnalysis {
            status: AnalysisStatus::NeedsManualReview,
            summary: "No readable text was available for analysis.".to_string(),
            reasoning: format!("Empty document text {}", LOCAL_MARKER),
        };
    }

    match doc_type {
        DocumentType::BankStatement => bank_statement(text),
        DocumentType::PayStub => pay_stub(text),
        DocumentType::TaxReturn => tax_return(text),
        DocumentType::Other => LocalAnalysis {
            status: AnalysisStatus::NeedsManualReview,
            summary: "Document type is not covered by local analysis.".to_string(),
            reasoning: format!("Manual review required for this document type {}", LOCAL_MARKER),
        },
    }
}

fn bank_statement(text: &str) -> LocalAnalysis {
    let lower = text.to_lowercase();
    let elements = [
        Element::keywords("account information", &lower, &["account", "checking", "savings"]),
        Element::keywords("balance", &lower, &["balance", "total"]),
        Element::keywords("bank name", &lower, &["bank", "credit union", "financial"]),
        Element::pattern("dates", text, date_regex()),
        Element::pattern("transaction amounts", text, amount_regex()),
    ];

    let balance = balance_regex()
        .captures(&lower)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());
    let balance_info = balance
        .as_ref()
        .map(|b| format!("Balance: ${}", b))
        .unwrap_or_else(|| "Balance not clearly identified".to_string());

    let count = found(&elements);
    if count >= COMPLETE_AT {
        let mut summary = format!(
            "Bank statement appears complete. {}. Contains account information, dates, and transaction amounts.",
            balance_info
        );
        if let Some(holder) = likely_holder(text) {
            summary.push_str(&format!(" Account holder appears to be: {}", holder));
        }
        LocalAnalysis {
            status: AnalysisStatus::Complete,
            summary,
            reasoning: format!(
                "Document contains most required elements for a bank statement {}",
                LOCAL_MARKER
            ),
        }
    } else if count >= PARTIAL_AT {
        let balance_note = if balance.is_some() {
            balance_info
        } else {
            "Balance unclear".to_string()
        };
        LocalAnalysis {
            status: AnalysisStatus::NotComplete,
            summary: format!(
                "Bank statement is missing some key information. {}.",
                balance_note
            ),
            reasoning: missing_reasoning(&elements),
        }
    } else {
        LocalAnalysis {
            status: AnalysisStatus::NeedsManualReview,
            summary: "Document does not appear to be a standard bank statement or is heavily corrupted."
                .to_string(),
            reasoning: format!(
                "Too few recognizable bank statement elements found {}",
                LOCAL_MARKER
            ),
        }
    }
}

fn pay_stub(text: &str) -> LocalAnalysis {
    let lower = text.to_lowercase();
    let elements = [
        Element::keywords("employer information", &lower, &["employer", "company", "from:"]),
        Element::keywords("employee information", &lower, &["employee", "name:", "to:"]),
        Element::keywords("pay period", &lower, &["pay period", "period ending", "pay date"]),
        Element::keywords("earnings", &lower, &["earnings", "gross pay", "salary", "wages"]),
        Element::keywords("deductions", &lower, &["deductions", "tax", "withholding", "net pay"]),
    ];
    grade(
        &elements,
        "Pay stub appears complete with employer info, employee details, pay period, earnings, and deductions.",
        "Pay stub is missing some key information.",
        "Document does not appear to be a valid pay stub or is missing critical information.",
    )
}

fn tax_return(text: &str) -> LocalAnalysis {
    let lower = text.to_lowercase();
    let elements = [
        Element::keywords("form identifier", &lower, &["form 1040", "1040", "w-2", "1099", "schedule"]),
        Element::pattern("tax year", text, tax_year_regex()),
        Element::keywords(
            "filing status",
            &lower,
            &["filing status", "single", "married filing", "head of household"],
        ),
        Element::keywords(
            "income totals",
            &lower,
            &["total income", "adjusted gross income", "agi", "wages"],
        ),
        Element::keywords(
            "tax computation",
            &lower,
            &["total tax", "refund", "amount you owe", "tax due"],
        ),
    ];
    grade(
        &elements,
        "Tax return appears complete with form identification, tax year, filing status, income totals, and tax computation.",
        "Tax return is missing some key information.",
        "Document does not appear to be a valid tax return or is missing critical information.",
    )
}

fn grade(
    elements: &[Element],
    complete: &str,
    partial: &str,
    unrecognized: &str,
) -> LocalAnalysis {
    let count = found(elements);
    if count >= COMPLETE_AT {
        LocalAnalysis {
            status: AnalysisStatus::Complete,
            summary: complete.to_string(),
            reasoning: format!("{} of {} expected elements found {}", count, elements.len(), LOCAL_MARKER),
        }
    } else if count >= PARTIAL_AT {
        LocalAnalysis {
            status: AnalysisStatus::NotComplete,
            summary: partial.to_string(),
            reasoning: missing_reasoning(elements),
        }
    } else {
        LocalAnalysis {
            status: AnalysisStatus::NeedsManualReview,
            summary: unrecognized.to_string(),
            reasoning: format!("Too few recognizable elements found {}", LOCAL_MARKER),
        }
    }
}

fn missing_reasoning(elements: &[Element]) -> String {
    let missing = missing(elements);
    let listed: Vec<_> = missing.into_iter().take(MISSING_LISTED).collect();
    format!("Missing: {} {}", listed.join(", "), LOCAL_MARKER)
}

/// First capitalized word pair near the top that is not statement vocabulary.
fn likely_holder(text: &str) -> Option<&str> {
    let head = match text.char_indices().nth(500) {
        Some((idx, _)) => &text[..idx],
        None => text,
    };
    holder_regex()
        .find_iter(head)
        .map(|m| m.as_str())
        .find(|pair| !pair.split(' ').any(|w| HEADING_WORDS.contains(&w)))
}
