//! # a3s-docguard
//!
//! Privacy-preserving analysis of financial documents for the A3S ecosystem.
//!
//! ## Overview
//!
//! `a3s-docguard` takes text extracted from an uploaded bank statement, pay
//! stub or tax return, scores how sensitive it is, replaces PII with
//! reversible session tokens, fingerprints the PDF for signs of tampering,
//! and routes the redacted text to an external AI provider or a local
//! rule-based analyzer. Tokens are restored in the final summary, and every
//! decision is written to a structured audit log.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use a3s_docguard::{DocGuardConfig, DocumentType, SecureAnalyzer};
//!
//! # async fn example() -> a3s_docguard::Result<()> {
//! let mut config = DocGuardConfig::default();
//! config.apply_env()?;
//!
//! let analyzer = SecureAnalyzer::new(config);
//! let result = analyzer
//!     .analyze("Account Holder: Jane Roe\nEnding Balance: $3,100.25", DocumentType::BankStatement, "anthropic")
//!     .await;
//!
//! println!("{}: {}", result.status, result.summary);
//! # Ok(())
//! # }
//! ```
//!
//! ## Components
//!
//! - **redact**: tokenized, reversible PII redaction per [`RedactionSession`]
//! - **sensitivity**: weighted pattern scoring into [`SensitivityLevel`]
//! - **tamper**: metadata and per-page content fingerprinting
//! - **provider**: Anthropic and OpenAI clients behind [`AnalysisProvider`]
//! - **orchestrator**: [`SecureAnalyzer`], which never fails and always falls
//!   back to local analysis
//! - **audit**: append-only [`AuditLog`] and broadcast [`AuditEventBus`]

pub mod audit;
pub mod config;
pub mod error;
pub mod local;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod redact;
pub mod sensitivity;
pub mod tamper;
pub mod telemetry;
pub mod types;

// Re-export core types
pub use audit::{
    AuditDetails, AuditEvent, AuditEventBus, AuditLog, AuditLogEntry, AuditSink, AuditValue,
    DocumentHash,
};
pub use config::DocGuardConfig;
pub use error::{DocGuardError, ProviderError, Result};
pub use local::{analyze_locally, LocalAnalysis};
pub use orchestrator::{AnalysisStage, DocumentInput, SecureAnalyzer};
pub use provider::{AnalysisProvider, ProviderRegistry, ProviderRequest, SecretString};
pub use redact::{
    scan_residual, CategorySet, PiiCategory, RedactionSession, Redactor, ResidualFinding,
    SessionId,
};
pub use sensitivity::{assess, assess_detailed, SensitivityAssessment, SensitivityLevel};
pub use tamper::{
    InMemoryPages, ObjectSummary, PageContent, PageFingerprint, PageSize, PageSource,
    PdfMetadata, TamperDetector, TamperReport, TamperSeverity,
};
pub use types::{
    AnalysisResult, AnalysisStatus, DocumentType, FallbackReason, ProcessingPath,
    SecurityMetadata,
};

// Re-export providers for convenience
pub use provider::{AnthropicProvider, OpenAiProvider};
