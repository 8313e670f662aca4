//! Core result types for the analysis pipeline
//!
//! `AnalysisResult` is the whole contract handed back to the calling layer.
//! Status strings match what downstream review screens already expect
//! (`"Complete"`, `"Not Complete"`, `"Needs Manual Review"`).

use crate::error::ProviderError;
use crate::sensitivity::SensitivityLevel;
use crate::tamper::TamperReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::str::FromStr;

/// First 16 hex characters of the SHA-256 of `bytes`
pub(crate) fn short_digest(bytes: &[u8]) -> String {
    let mut hex = hex::encode(Sha256::digest(bytes));
    hex.truncate(16);
    hex
}

/// Kind of financial document being analyzed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    BankStatement,
    PayStub,
    TaxReturn,
    Other,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BankStatement => "bank_statement",
            Self::PayStub => "pay_stub",
            Self::TaxReturn => "tax_return",
            Self::Other => "other",
        }
    }

    /// Human-readable name used in prompts
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::BankStatement => "Bank Statement",
            Self::PayStub => "Pay Stub",
            Self::TaxReturn => "Tax Return",
            Self::Other => "Document",
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    /// Accepts `bank_statement`, `bank-statement` and `Bank Statement` forms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect();
        match normalized.as_str() {
            "bank_statement" => Ok(Self::BankStatement),
            "pay_stub" => Ok(Self::PayStub),
            "tax_return" => Ok(Self::TaxReturn),
            "other" | "document" => Ok(Self::Other),
            _ => Err(format!("unknown document type: {}", s)),
        }
    }
}

/// Verdict on document completeness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalysisStatus {
    #[serde(rename = "Complete")]
    Complete,
    #[serde(rename = "Not Complete")]
    NotComplete,
    #[serde(rename = "Needs Manual Review")]
    NeedsManualReview,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "Complete",
            Self::NotComplete => "Not Complete",
            Self::NeedsManualReview => "Needs Manual Review",
        }
    }

    /// Parse a provider-authored status string; exact match only.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "Complete" => Some(Self::Complete),
            "Not Complete" => Some(Self::NotComplete),
            "Needs Manual Review" => Some(Self::NeedsManualReview),
            _ => None,
        }
    }
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the final analysis was produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProcessingPath {
    External { provider: String },
    Local,
}

impl ProcessingPath {
    pub fn is_external(&self) -> bool {
        matches!(self, Self::External { .. })
    }
}

/// Why the local analyzer produced the result instead of a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// Caller asked for local analysis
    LocalPreferred,
    UnknownProvider,
    MissingCredentials,
    /// High-sensitivity document under a local-only deployment policy
    LocalOnlyPolicy,
    /// Critical PII survived redaction
    ResidualPii,
    ProviderTimeout,
    ProviderTransport,
    ProviderHttp,
    MalformedResponse,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalPreferred => "local_preferred",
            Self::UnknownProvider => "unknown_provider",
            Self::MissingCredentials => "missing_credentials",
            Self::LocalOnlyPolicy => "local_only_policy",
            Self::ResidualPii => "residual_pii",
            Self::ProviderTimeout => "provider_timeout",
            Self::ProviderTransport => "provider_transport",
            Self::ProviderHttp => "provider_http",
            Self::MalformedResponse => "malformed_response",
        }
    }

    /// Whether this reason stems from a failed provider attempt
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Self::ProviderTimeout
                | Self::ProviderTransport
                | Self::ProviderHttp
                | Self::MalformedResponse
        )
    }
}

impl From<&ProviderError> for FallbackReason {
    fn from(e: &ProviderError) -> Self {
        match e {
            ProviderError::MissingCredentials { .. } => Self::MissingCredentials,
            ProviderError::Timeout(_) => Self::ProviderTimeout,
            ProviderError::Transport(_) => Self::ProviderTransport,
            ProviderError::Http { .. } => Self::ProviderHttp,
            ProviderError::MalformedResponse(_) => Self::MalformedResponse,
        }
    }
}

/// Privacy and processing facts attached to every result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityMetadata {
    pub session_id: String,
    /// Short SHA-256 of the truncated original text
    pub document_hash: String,
    pub sensitivity: SensitivityLevel,
    pub redaction_count: usize,
    pub zero_retention_requested: bool,
    pub data_minimized: bool,
    pub processing_path: ProcessingPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
    pub processing_error: bool,
    /// Characters in the text as received
    pub original_length: usize,
    /// Characters actually analyzed (redacted length on the external path)
    pub processed_length: usize,
    pub processed_at: DateTime<Utc>,
}

/// Final, caller-facing outcome of one document analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub status: AnalysisStatus,
    pub summary: String,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub income_analysis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_factors: Option<String>,
    pub modification_check: TamperReport,
    pub security_metadata: SecurityMetadata,
}
