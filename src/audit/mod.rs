//! Audit trail for the analysis pipeline: typed entries, append-only log,
//! and a broadcast bus for compliance consumers.

mod bus;
mod log;

pub use bus::AuditEventBus;
pub use log::{
    AuditDetails, AuditEvent, AuditLog, AuditLogEntry, AuditValue, DocumentHash,
    DEFAULT_AUDIT_CAPACITY,
};

use async_trait::async_trait;

/// Destination for audit entries.
///
/// `append` is the only write operation; implementations must accept
/// concurrent appends from many analyses.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: AuditLogEntry);
}

#[async_trait]
impl AuditSink for AuditLog {
    async fn append(&self, entry: AuditLogEntry) {
        self.push(entry);
    }
}
