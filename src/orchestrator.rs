//! Secure Analysis Orchestrator
//!
//! Drives one document through the pipeline:
//!
//! ```text
//! text → truncate → sensitivity → redact → residual scan → route
//!   route = external: minimized request → provider (one attempt, timeout)
//!             ok  → parse → restore summary
//!             err → local analyzer
//!   route = local:    local analyzer on the original truncated text
//! ```
//!
//! `analyze` never fails. Every error path resolves to a valid
//! [`AnalysisResult`] and every decision is appended to the audit sink.
//! Dropping the returned future cancels an in-flight provider call.

use crate::audit::{AuditDetails, AuditEvent, AuditLog, AuditLogEntry, AuditSink, DocumentHash};
use crate::config::DocGuardConfig;
use crate::error::ProviderError;
use crate::local::{analyze_locally, LocalAnalysis};
use crate::prompt;
use crate::provider::response::{parse_analysis, ParsedAnalysis};
use crate::provider::{AnalysisProvider, ProviderRegistry};
use crate::redact::{scan_residual, RedactionSession, Redactor, SessionId};
use crate::sensitivity::{assess_detailed, SensitivityLevel};
use crate::tamper::{PageSource, PdfMetadata, TamperDetector, TamperReport};
use crate::telemetry;
use crate::types::{
    AnalysisResult, AnalysisStatus, DocumentType, FallbackReason, ProcessingPath, SecurityMetadata,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Provider name that selects the local analyzer
pub const LOCAL_PROVIDER: &str = "local";

// ─── Stages ────────────────────────────────────────────────────

/// Position of one analysis run in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStage {
    Start,
    Classified,
    Redacted,
    ProviderAttempt,
    ProviderSuccess,
    ProviderError,
    FallbackLocal,
    Restored,
    Done,
}

impl AnalysisStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Classified => "classified",
            Self::Redacted => "redacted",
            Self::ProviderAttempt => "provider_attempt",
            Self::ProviderSuccess => "provider_success",
            Self::ProviderError => "provider_error",
            Self::FallbackLocal => "fallback_local",
            Self::Restored => "restored",
            Self::Done => "done",
        }
    }

    /// Whether `next` directly follows `self`.
    ///
    /// `Start → Done` covers input that cannot be analyzed at all.
    pub fn can_advance_to(self, next: Self) -> bool {
        use AnalysisStage::*;
        matches!(
            (self, next),
            (Start, Classified)
                | (Start, Done)
                | (Classified, Redacted)
                | (Redacted, ProviderAttempt)
                | (Redacted, FallbackLocal)
                | (ProviderAttempt, ProviderSuccess)
                | (ProviderAttempt, ProviderError)
                | (ProviderError, FallbackLocal)
                | (ProviderSuccess, Restored)
                | (FallbackLocal, Restored)
                | (Restored, Done)
        )
    }
}

struct StageTracker {
    stage: AnalysisStage,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            stage: AnalysisStage::Start,
        }
    }

    fn advance(&mut self, next: AnalysisStage) {
        if !self.stage.can_advance_to(next) {
            tracing::warn!(
                from = self.stage.as_str(),
                to = next.as_str(),
                "Unexpected analysis stage transition"
            );
        }
        tracing::debug!(stage = next.as_str(), "Analysis stage");
        self.stage = next;
    }
}

// ─── Input ─────────────────────────────────────────────────────

/// Everything known about one uploaded document
pub struct DocumentInput {
    /// Extracted UTF-8 text
    pub text: String,
    pub doc_type: DocumentType,
    /// Provider to try; `None` uses the configured preference
    pub preferred_provider: Option<String>,
    pub metadata: PdfMetadata,
    pub pages: Option<Arc<dyn PageSource>>,
    /// Upstream text extraction failure, if any
    pub extraction_error: Option<String>,
}

impl DocumentInput {
    pub fn new(text: impl Into<String>, doc_type: DocumentType) -> Self {
        Self {
            text: text.into(),
            doc_type,
            preferred_provider: None,
            metadata: PdfMetadata::new(),
            pages: None,
            extraction_error: None,
        }
    }

    pub fn with_provider(mut self, name: impl Into<String>) -> Self {
        self.preferred_provider = Some(name.into());
        self
    }

    pub fn with_metadata(mut self, metadata: PdfMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_pages(mut self, pages: Arc<dyn PageSource>) -> Self {
        self.pages = Some(pages);
        self
    }

    pub fn with_extraction_error(mut self, error: impl Into<String>) -> Self {
        self.extraction_error = Some(error.into());
        self
    }
}

impl std::fmt::Debug for DocumentInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentInput")
            .field("text_len", &self.text.len())
            .field("doc_type", &self.doc_type)
            .field("preferred_provider", &self.preferred_provider)
            .field("has_pages", &self.pages.is_some())
            .field("extraction_failed", &self.extraction_error.is_some())
            .finish()
    }
}

// ─── Routing ───────────────────────────────────────────────────

enum Route {
    External(Arc<dyn AnalysisProvider>),
    Local(FallbackReason),
}

/// Status and text fields before security metadata is attached
struct Verdict {
    status: AnalysisStatus,
    summary: String,
    reasoning: String,
    income_analysis: Option<String>,
    risk_factors: Option<String>,
}

impl From<LocalAnalysis> for Verdict {
    fn from(local: LocalAnalysis) -> Self {
        Self {
            status: local.status,
            summary: local.summary,
            reasoning: local.reasoning,
            income_analysis: None,
            risk_factors: None,
        }
    }
}

/// Per-run facts shared by the result and the audit trail
struct RunContext<'a> {
    session_id: &'a SessionId,
    document_hash: &'a DocumentHash,
    original_length: usize,
    modification_check: TamperReport,
}

// ─── Analyzer ──────────────────────────────────────────────────

/// Secure document analyzer.
///
/// `Send + Sync`; share one instance behind an `Arc`. Each call owns its
/// redaction session, so concurrent analyses never see each other's tokens.
pub struct SecureAnalyzer {
    config: DocGuardConfig,
    registry: ProviderRegistry,
    audit: Arc<dyn AuditSink>,
    /// Built-in log; `None` once a custom sink is installed
    log: Option<Arc<AuditLog>>,
    redactor: Redactor,
    detector: TamperDetector,
}

impl SecureAnalyzer {
    /// Analyzer with the configured Anthropic and OpenAI clients and an
    /// in-memory audit log bounded by `audit_capacity`.
    pub fn new(config: DocGuardConfig) -> Self {
        let registry = ProviderRegistry::from_config(&config.providers);
        let detector = TamperDetector::new(config.max_fingerprint_pages);
        let log = Arc::new(AuditLog::with_capacity(config.audit_capacity));
        Self {
            config,
            registry,
            audit: log.clone(),
            log: Some(log),
            redactor: Redactor::new(),
            detector,
        }
    }

    pub fn with_registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self.log = None;
        self
    }

    /// The built-in audit log, or `None` when a custom sink was installed
    /// with [`with_audit`](Self::with_audit).
    pub fn audit(&self) -> Option<&Arc<AuditLog>> {
        self.log.as_ref()
    }

    pub fn config(&self) -> &DocGuardConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Analyze extracted text with no PDF structure available.
    pub async fn analyze(
        &self,
        text: &str,
        doc_type: DocumentType,
        preferred_provider: &str,
    ) -> AnalysisResult {
        self.analyze_document(DocumentInput::new(text, doc_type).with_provider(preferred_provider))
            .await
    }

    /// Analyze a document, including the tamper check over its metadata and pages.
    pub async fn analyze_document(&self, input: DocumentInput) -> AnalysisResult {
        let session_id = SessionId::generate();
        let span = tracing::info_span!(
            "docguard.analyze",
            docguard.session_id = %session_id,
            docguard.document_type = input.doc_type.as_str(),
            docguard.sensitivity = tracing::field::Empty,
            docguard.redactions = tracing::field::Empty,
            docguard.path = tracing::field::Empty,
            docguard.status = tracing::field::Empty,
        );
        self.run(session_id, input).instrument(span).await
    }

    async fn run(&self, session_id: SessionId, input: DocumentInput) -> AnalysisResult {
        let mut stages = StageTracker::new();
        let DocumentInput {
            text,
            doc_type,
            preferred_provider,
            metadata,
            pages,
            extraction_error,
        } = input;

        let modification_check = self.detector.detect(&metadata, pages.as_deref());
        let original_length = text.chars().count();
        let text = truncate_chars(&text, self.config.max_text_length);
        let document_hash = DocumentHash::of(text);
        let ctx = RunContext {
            session_id: &session_id,
            document_hash: &document_hash,
            original_length,
            modification_check,
        };

        self.record(
            &ctx,
            AuditEvent::Start,
            AuditDetails::new()
                .label("document_type", doc_type.as_str())
                .count("original_length", original_length)
                .count("analyzed_length", text.chars().count())
                .flag("tampering_suspected", ctx.modification_check.is_suspected()),
        )
        .await;

        // --- Unreadable input ---
        if extraction_error.is_some() || text.trim().is_empty() {
            stages.advance(AnalysisStage::Done);
            return self.unreadable(ctx, extraction_error.as_deref()).await;
        }

        // --- Sensitivity ---
        let assessment = assess_detailed(text);
        stages.advance(AnalysisStage::Classified);
        self.record(
            &ctx,
            AuditEvent::SensitivityAssessed,
            AuditDetails::new()
                .label("level", assessment.level.as_str())
                .count("score", assessment.score as usize)
                .count("high_risk_hits", assessment.high_risk_hits as usize)
                .count("medium_risk_hits", assessment.medium_risk_hits as usize),
        )
        .await;

        // --- Redaction ---
        let categories = self.config.redaction.categories_for(doc_type);
        let (redacted, session) =
            self.redactor
                .redact_with_session(text, &categories, session_id.clone());
        stages.advance(AnalysisStage::Redacted);
        telemetry::record_preparation(assessment.level.as_str(), session.len());

        let mut details = AuditDetails::new().count("redactions", session.len());
        for (category, n) in session.category_counts() {
            details = details.count(category.as_str(), n);
        }
        self.record(&ctx, AuditEvent::RedactionApplied, details).await;

        // --- Routing ---
        let route = self
            .route(&ctx, assessment.level, &redacted, &session, preferred_provider.as_deref())
            .await;

        // --- Provider attempt ---
        let (verdict, reason, provider_name, restored) = match route {
            Route::External(provider) => {
                stages.advance(AnalysisStage::ProviderAttempt);
                match self
                    .call_provider(&ctx, provider.as_ref(), doc_type, &redacted)
                    .await
                {
                    Ok(parsed) => {
                        stages.advance(AnalysisStage::ProviderSuccess);
                        let restored = restored_tokens(&parsed.summary, &session);
                        let verdict = restore_verdict(parsed, &session);
                        (verdict, None, Some(provider.name()), restored)
                    }
                    Err(e) => {
                        stages.advance(AnalysisStage::ProviderError);
                        stages.advance(AnalysisStage::FallbackLocal);
                        let reason = FallbackReason::from(&e);
                        let verdict = self.fallback(&ctx, text, doc_type, reason).await;
                        (verdict, Some(reason), None, 0)
                    }
                }
            }
            Route::Local(reason) => {
                stages.advance(AnalysisStage::FallbackLocal);
                let verdict = self.fallback(&ctx, text, doc_type, reason).await;
                (verdict, Some(reason), None, 0)
            }
        };

        // --- Restoration ---
        stages.advance(AnalysisStage::Restored);
        self.record(
            &ctx,
            AuditEvent::RestorationComplete,
            AuditDetails::new()
                .count("tokens_in_session", session.len())
                .count("tokens_restored", restored),
        )
        .await;

        let (processing_path, processed_length) = match provider_name {
            Some(name) => (
                ProcessingPath::External {
                    provider: name.to_string(),
                },
                redacted.chars().count(),
            ),
            None => (ProcessingPath::Local, text.chars().count()),
        };
        let processing_error = reason.map(|r| r.is_provider_failure()).unwrap_or(false);
        let metadata = SecurityMetadata {
            session_id: session_id.to_string(),
            document_hash: document_hash.to_string(),
            sensitivity: assessment.level,
            redaction_count: session.len(),
            zero_retention_requested: processing_path.is_external()
                && self.config.policy.request_zero_retention,
            data_minimized: true,
            processing_path,
            fallback_reason: reason,
            processing_error,
            original_length,
            processed_length,
            processed_at: Utc::now(),
        };

        stages.advance(AnalysisStage::Done);
        self.finish(ctx, verdict, metadata).await
    }

    /// Decide where the redacted document may go.
    async fn route(
        &self,
        ctx: &RunContext<'_>,
        level: SensitivityLevel,
        redacted: &str,
        session: &RedactionSession,
        preferred: Option<&str>,
    ) -> Route {
        if level == SensitivityLevel::High && self.config.policy.local_only_for_high {
            return self.skip(ctx, FallbackReason::LocalOnlyPolicy).await;
        }

        let findings = scan_residual(redacted, session);
        if findings.iter().any(|f| f.is_critical()) {
            let mut details = AuditDetails::new().count("findings", findings.len());
            for finding in &findings {
                details = details.flag(finding.label(), true);
            }
            tracing::warn!(
                findings = findings.len(),
                "Residual PII after redaction; external analysis blocked"
            );
            self.record(ctx, AuditEvent::ResidualPiiBlocked, details).await;
            return Route::Local(FallbackReason::ResidualPii);
        }

        let name = preferred.unwrap_or(self.config.providers.preferred.as_str());
        if name.trim().eq_ignore_ascii_case(LOCAL_PROVIDER) {
            return self.skip(ctx, FallbackReason::LocalPreferred).await;
        }
        let Some(provider) = self.registry.get(name) else {
            return self.skip(ctx, FallbackReason::UnknownProvider).await;
        };
        if !provider.has_credentials() {
            return self.skip(ctx, FallbackReason::MissingCredentials).await;
        }
        Route::External(provider)
    }

    async fn skip(&self, ctx: &RunContext<'_>, reason: FallbackReason) -> Route {
        tracing::info!(reason = reason.as_str(), "External analysis skipped");
        self.record(
            ctx,
            AuditEvent::ProviderSkipped,
            AuditDetails::new().label("reason", reason.as_str()),
        )
        .await;
        Route::Local(reason)
    }

    /// One provider attempt under the configured timeout.
    async fn call_provider(
        &self,
        ctx: &RunContext<'_>,
        provider: &dyn AnalysisProvider,
        doc_type: DocumentType,
        redacted: &str,
    ) -> Result<ParsedAnalysis, ProviderError> {
        let zero_retention = self.config.policy.request_zero_retention;
        let request = prompt::build_request(
            doc_type,
            redacted.to_string(),
            ctx.session_id.clone(),
            zero_retention,
        );
        let timeout = self.config.providers.timeout();

        self.record(
            ctx,
            AuditEvent::ProviderCallStart,
            AuditDetails::new()
                .label("provider", provider.name())
                .count("payload_length", redacted.chars().count())
                .flag("zero_retention", zero_retention)
                .millis("timeout_ms", timeout),
        )
        .await;

        let span = tracing::info_span!(
            "docguard.provider.call",
            docguard.provider = provider.name(),
            docguard.provider.outcome = tracing::field::Empty,
            docguard.provider.duration_ms = tracing::field::Empty,
        );
        let started = Instant::now();
        let outcome = async {
            let result = match tokio::time::timeout(timeout, provider.complete(&request)).await {
                Ok(completion) => completion.and_then(|text| parse_analysis(&text)),
                Err(_) => Err(ProviderError::Timeout(timeout)),
            };
            let label = match &result {
                Ok(_) => "success",
                Err(e) => e.kind(),
            };
            telemetry::record_provider_call(label, started.elapsed());
            result
        }
        .instrument(span)
        .await;
        let elapsed = started.elapsed();

        match &outcome {
            Ok(parsed) => {
                self.record(
                    ctx,
                    AuditEvent::ProviderCallSuccess,
                    AuditDetails::new()
                        .label("provider", provider.name())
                        .label("status", parsed.status.as_str())
                        .millis("elapsed_ms", elapsed),
                )
                .await;
            }
            Err(e) => {
                tracing::warn!(
                    provider = provider.name(),
                    error_kind = e.kind(),
                    "Provider call failed; falling back to local analysis"
                );
                let mut details = AuditDetails::new()
                    .label("provider", provider.name())
                    .label("error_kind", e.kind())
                    .millis("elapsed_ms", elapsed);
                if let Some(status) = e.status_code() {
                    details = details.status_code("http_status", status);
                }
                self.record(ctx, AuditEvent::ProviderCallError, details).await;
            }
        }
        outcome
    }

    /// Local analysis of the original text; it never leaves the process.
    async fn fallback(
        &self,
        ctx: &RunContext<'_>,
        text: &str,
        doc_type: DocumentType,
        reason: FallbackReason,
    ) -> Verdict {
        self.record(
            ctx,
            AuditEvent::LocalFallback,
            AuditDetails::new().label("reason", reason.as_str()),
        )
        .await;
        analyze_locally(text, doc_type).into()
    }

    async fn unreadable(&self, ctx: RunContext<'_>, extraction_error: Option<&str>) -> AnalysisResult {
        let (summary, reasoning) = match extraction_error {
            Some(e) => (
                format!("Text extraction failed: {}", e),
                format!("Text extraction failed: {}; manual review required", e),
            ),
            None => (
                "No text could be extracted from the document.".to_string(),
                "Document text is empty; manual review required".to_string(),
            ),
        };
        let verdict = Verdict {
            status: AnalysisStatus::NeedsManualReview,
            summary,
            reasoning,
            income_analysis: None,
            risk_factors: None,
        };
        let metadata = SecurityMetadata {
            session_id: ctx.session_id.to_string(),
            document_hash: ctx.document_hash.to_string(),
            sensitivity: SensitivityLevel::Low,
            redaction_count: 0,
            zero_retention_requested: false,
            data_minimized: true,
            processing_path: ProcessingPath::Local,
            fallback_reason: None,
            processing_error: extraction_error.is_some(),
            original_length: ctx.original_length,
            processed_length: 0,
            processed_at: Utc::now(),
        };
        self.finish(ctx, verdict, metadata).await
    }

    async fn finish(
        &self,
        ctx: RunContext<'_>,
        verdict: Verdict,
        security_metadata: SecurityMetadata,
    ) -> AnalysisResult {
        let path = if security_metadata.processing_path.is_external() {
            "external"
        } else {
            "local"
        };
        telemetry::record_outcome(path, verdict.status.as_str());
        self.record(
            &ctx,
            AuditEvent::Complete,
            AuditDetails::new()
                .label("status", verdict.status.as_str())
                .label("path", path)
                .flag("processing_error", security_metadata.processing_error),
        )
        .await;

        AnalysisResult {
            status: verdict.status,
            summary: verdict.summary,
            reasoning: verdict.reasoning,
            income_analysis: verdict.income_analysis,
            risk_factors: verdict.risk_factors,
            modification_check: ctx.modification_check,
            security_metadata,
        }
    }

    async fn record(&self, ctx: &RunContext<'_>, event: AuditEvent, details: AuditDetails) {
        let entry = AuditLogEntry::new(ctx.session_id, event, ctx.document_hash.clone(), details);
        self.audit.append(entry).await;
    }
}

impl std::fmt::Debug for SecureAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureAnalyzer")
            .field("registry", &self.registry)
            .field("max_text_length", &self.config.max_text_length)
            .finish()
    }
}

/// Session tokens the provider echoed back in its summary
fn restored_tokens(summary: &str, session: &RedactionSession) -> usize {
    session.tokens().filter(|t| summary.contains(t)).count()
}

/// Restore tokens in the summary; other provider fields stay tokenized.
fn restore_verdict(parsed: ParsedAnalysis, session: &RedactionSession) -> Verdict {
    Verdict {
        status: parsed.status,
        summary: session.restore(&parsed.summary),
        reasoning: parsed.reasoning,
        income_analysis: parsed.income_analysis,
        risk_factors: parsed.risk_factors,
    }
}

/// First `max` characters of `text`.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
