//! Structured audit entries and the in-memory append-only log
//!
//! Entry fields are typed so that only hashes, counts, durations, status
//! codes and static labels can be recorded. There is no variant that holds
//! runtime text, so document content and PII values cannot reach the log.

use crate::redact::SessionId;
use crate::types::short_digest;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

/// Pipeline stage being recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    Start,
    SensitivityAssessed,
    RedactionApplied,
    /// Critical PII survived redaction; external path aborted
    ResidualPiiBlocked,
    /// Provider not called (local preference, policy, unknown or no credentials)
    ProviderSkipped,
    ProviderCallStart,
    ProviderCallSuccess,
    ProviderCallError,
    LocalFallback,
    RestorationComplete,
    Complete,
}

impl AuditEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::SensitivityAssessed => "sensitivity_assessed",
            Self::RedactionApplied => "redaction_applied",
            Self::ResidualPiiBlocked => "residual_pii_blocked",
            Self::ProviderSkipped => "provider_skipped",
            Self::ProviderCallStart => "provider_call_start",
            Self::ProviderCallSuccess => "provider_call_success",
            Self::ProviderCallError => "provider_call_error",
            Self::LocalFallback => "local_fallback",
            Self::RestorationComplete => "restoration_complete",
            Self::Complete => "complete",
        }
    }
}

/// Non-sensitive value stored in an entry's details
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AuditValue {
    Count(u64),
    Millis(u64),
    StatusCode(u16),
    Flag(bool),
    Label(&'static str),
}

/// Ordered detail map for one entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AuditDetails(BTreeMap<&'static str, AuditValue>);

impl AuditDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(mut self, key: &'static str, n: usize) -> Self {
        self.0.insert(key, AuditValue::Count(n as u64));
        self
    }

    pub fn millis(mut self, key: &'static str, elapsed: Duration) -> Self {
        let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.0.insert(key, AuditValue::Millis(ms));
        self
    }

    pub fn status_code(mut self, key: &'static str, code: u16) -> Self {
        self.0.insert(key, AuditValue::StatusCode(code));
        self
    }

    pub fn flag(mut self, key: &'static str, value: bool) -> Self {
        self.0.insert(key, AuditValue::Flag(value));
        self
    }

    pub fn label(mut self, key: &'static str, value: &'static str) -> Self {
        self.0.insert(key, AuditValue::Label(value));
        self
    }

    pub fn get(&self, key: &str) -> Option<AuditValue> {
        self.0.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Content fingerprint of the original document text.
///
/// Only constructible by hashing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DocumentHash(String);

impl DocumentHash {
    pub fn of(text: &str) -> Self {
        Self(short_digest(text.as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize)]
pub struct AuditLogEntry {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub event: AuditEvent,
    pub document_hash: DocumentHash,
    pub details: AuditDetails,
}

impl AuditLogEntry {
    pub fn new(
        session_id: &SessionId,
        event: AuditEvent,
        document_hash: DocumentHash,
        details: AuditDetails,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            session_id: session_id.to_string(),
            event,
            document_hash,
            details,
        }
    }
}

/// Entries kept by [`AuditLog::new`]
pub const DEFAULT_AUDIT_CAPACITY: usize = 10_000;

/// Thread-safe append-only audit log with bounded capacity.
///
/// When full, the oldest entry is evicted. Every entry is also mirrored to
/// tracing, so evicted entries survive in the log output.
#[derive(Debug)]
pub struct AuditLog {
    entries: RwLock<VecDeque<AuditLogEntry>>,
    capacity: usize,
    /// Entries recorded, including evicted ones
    total_count: AtomicU64,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_AUDIT_CAPACITY)
    }
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log retaining at most `capacity` entries (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            total_count: AtomicU64::new(0),
        }
    }

    pub(crate) fn push(&self, entry: AuditLogEntry) {
        tracing::info!(
            target: "a3s_docguard::audit",
            session_id = %entry.session_id,
            event = entry.event.as_str(),
            document_hash = %entry.document_hash,
            details = ?entry.details,
            "Audit"
        );
        let Ok(mut entries) = self.entries.write() else {
            tracing::error!("Audit log lock poisoned; dropping audit entry");
            return;
        };
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
        self.total_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn total_count(&self) -> u64 {
        self.total_count.load(Ordering::Relaxed)
    }

    /// All entries in append order
    pub fn entries(&self) -> Vec<AuditLogEntry> {
        self.entries
            .read()
            .map(|e| e.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Entries for one analysis session, in append order
    pub fn by_session(&self, session_id: &str) -> Vec<AuditLogEntry> {
        self.filtered(|e| e.session_id == session_id)
    }

    pub fn by_event(&self, event: AuditEvent) -> Vec<AuditLogEntry> {
        self.filtered(|e| e.event == event)
    }

    fn filtered(&self, keep: impl Fn(&AuditLogEntry) -> bool) -> Vec<AuditLogEntry> {
        self.entries
            .read()
            .map(|e| e.iter().filter(|entry| keep(entry)).cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().map(|e| e.is_empty()).unwrap_or(true)
    }
}
