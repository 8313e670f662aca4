//! Fixed instruction text sent alongside redacted documents
//!
//! Instructions are compile-time constants. Nothing derived from the
//! document is interpolated into them.

use crate::provider::ProviderRequest;
use crate::redact::SessionId;
use crate::types::DocumentType;

const BANK_STATEMENT: &str = r#"Analyze this redacted bank statement for a rental application. Names and sensitive data are redacted with tokens like [NAME-abc123-0]. Focus on financial stability and income verification. Return JSON only:
{
    "status": "Complete|Not Complete|Needs Manual Review",
    "summary": "Account assessment with ending balance, monthly income estimate, and key financial patterns. Keep redaction tokens as-is (e.g. 'Account holder [NAME-abc123-0] shows...')",
    "reasoning": "Assessment based on income stability, balance trends, and document completeness",
    "income_analysis": "Regular deposits, salary patterns, income consistency",
    "risk_factors": "Red flags such as overdrafts, irregular income, or financial instability"
}
Complete = has account info, bank, balance, income verification. Not Complete = missing critical data. Needs Manual Review = insufficient data or concerning patterns."#;

const PAY_STUB: &str = r#"Analyze this redacted pay stub for a rental application. Names and sensitive data are redacted with tokens like [NAME-abc123-0]. Verify employment and income. Return JSON only:
{
    "status": "Complete|Not Complete|Needs Manual Review",
    "summary": "Employer, pay period, gross and net pay, and estimated monthly income. Keep redaction tokens as-is",
    "reasoning": "Assessment based on presence of employer, employee, pay period, earnings and deductions",
    "income_analysis": "Pay frequency and year-to-date consistency",
    "risk_factors": "Inconsistencies between gross, deductions and net pay"
}
Complete = employer, employee, pay period, earnings and deductions present. Not Complete = some missing. Needs Manual Review = not a recognizable pay stub."#;

const TAX_RETURN: &str = r#"Analyze this redacted tax return for a rental application. Names and identifiers are redacted with tokens like [NAME-abc123-0]. Verify reported income. Return JSON only:
{
    "status": "Complete|Not Complete|Needs Manual Review",
    "summary": "Tax year, filing status, total income and adjusted gross income. Keep redaction tokens as-is",
    "reasoning": "Assessment based on form identification, tax year, income totals and tax computation",
    "income_analysis": "Income sources and totals",
    "risk_factors": "Missing schedules or inconsistent totals"
}
Complete = form, year, filing status and income totals present. Not Complete = some missing. Needs Manual Review = not a recognizable tax return."#;

const OTHER: &str = r#"Analyze this redacted financial document for a rental application. Sensitive data is redacted with tokens like [NAME-abc123-0]. Return JSON only:
{
    "status": "Complete|Not Complete|Needs Manual Review",
    "summary": "What the document is and the financial facts it establishes. Keep redaction tokens as-is",
    "reasoning": "Why the document is or is not sufficient"
}"#;

/// Instruction text for a document type
pub fn instruction_for(doc_type: DocumentType) -> &'static str {
    match doc_type {
        DocumentType::BankStatement => BANK_STATEMENT,
        DocumentType::PayStub => PAY_STUB,
        DocumentType::TaxReturn => TAX_RETURN,
        DocumentType::Other => OTHER,
    }
}

/// Minimized request for already-redacted text.
pub fn build_request(
    doc_type: DocumentType,
    redacted_text: String,
    session_id: SessionId,
    zero_retention: bool,
) -> ProviderRequest {
    ProviderRequest {
        session_id,
        instruction: instruction_for(doc_type),
        redacted_text,
        zero_retention,
    }
}
