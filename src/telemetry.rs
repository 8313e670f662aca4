//! Telemetry primitives
//!
//! Span name and field key constants, span record helpers, and the
//! subscriber setup used by the CLI.
//!
//! ## Span Hierarchy
//!
//! ```text
//! docguard.analyze
//!   +-- docguard.provider.call
//!       +-- docguard.provider.http
//! ```
//!
//! Spans carry ids, labels and counts only. Document text, PII values and
//! token maps are never recorded.

use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

pub const SERVICE_NAME: &str = "a3s-docguard";

// Span name constants
pub const SPAN_ANALYZE: &str = "docguard.analyze";
pub const SPAN_PROVIDER_CALL: &str = "docguard.provider.call";
pub const SPAN_PROVIDER_HTTP: &str = "docguard.provider.http";

// Field key constants
pub const FIELD_SESSION_ID: &str = "docguard.session_id";
pub const FIELD_DOCUMENT_TYPE: &str = "docguard.document_type";
pub const FIELD_SENSITIVITY: &str = "docguard.sensitivity";
pub const FIELD_REDACTIONS: &str = "docguard.redactions";
pub const FIELD_PATH: &str = "docguard.path";
pub const FIELD_STATUS: &str = "docguard.status";

pub const FIELD_PROVIDER: &str = "docguard.provider";
pub const FIELD_OUTCOME: &str = "docguard.provider.outcome";
pub const FIELD_DURATION_MS: &str = "docguard.provider.duration_ms";

// ============================================================================
// Span Helpers
// ============================================================================

/// Record classification and redaction results on the current analyze span
pub fn record_preparation(sensitivity: &'static str, redactions: usize) {
    let span = tracing::Span::current();
    span.record(FIELD_SENSITIVITY, sensitivity);
    span.record(FIELD_REDACTIONS, redactions as i64);
}

/// Record the final routing and verdict on the current analyze span
pub fn record_outcome(path: &'static str, status: &'static str) {
    let span = tracing::Span::current();
    span.record(FIELD_PATH, path);
    span.record(FIELD_STATUS, status);
}

/// Record a provider call's outcome label and duration on the current span
pub fn record_provider_call(outcome: &'static str, elapsed: Duration) {
    let span = tracing::Span::current();
    span.record(FIELD_OUTCOME, outcome);
    span.record(FIELD_DURATION_MS, elapsed.as_millis() as i64);
}

// ============================================================================
// Subscriber
// ============================================================================

/// Install the global fmt subscriber.
///
/// Honors `RUST_LOG`; falls back to `info`. Safe to call more than once.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
