//! Audit fan-out for compliance consumers
//!
//! Every entry is appended to the shared [`AuditLog`] first, then broadcast
//! to subscribers. The log is the source of truth; a subscriber that falls
//! behind sees `RecvError::Lagged` and can re-read from the log.

use super::log::{AuditLog, AuditLogEntry};
use super::AuditSink;
use std::sync::Arc;
use tokio::sync::broadcast;

pub struct AuditEventBus {
    tx: broadcast::Sender<AuditLogEntry>,
    log: Arc<AuditLog>,
}

impl AuditEventBus {
    /// `capacity` is the broadcast channel buffer size.
    pub fn new(capacity: usize, log: Arc<AuditLog>) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx, log }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuditLogEntry> {
        self.tx.subscribe()
    }

    pub fn log(&self) -> &Arc<AuditLog> {
        &self.log
    }
}

#[async_trait::async_trait]
impl AuditSink for AuditEventBus {
    async fn append(&self, entry: AuditLogEntry) {
        self.log.push(entry.clone());
        // No receivers is fine.
        let _ = self.tx.send(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditDetails, AuditEvent, DocumentHash};
    use crate::redact::SessionId;

    fn entry(session: &str, event: AuditEvent) -> AuditLogEntry {
        AuditLogEntry::new(
            &SessionId::parse(session).unwrap(),
            event,
            DocumentHash::of("doc"),
            AuditDetails::new(),
        )
    }

    #[tokio::test]
    async fn test_append_records_to_log() {
        let log = Arc::new(AuditLog::new());
        let bus = AuditEventBus::new(16, log.clone());

        bus.append(entry("s1", AuditEvent::Start)).await;

        assert_eq!(log.len(), 1);
        assert_eq!(bus.log().by_session("s1").len(), 1);
    }

    #[tokio::test]
    async fn test_subscribers_receive_entries_in_order() {
        let bus = AuditEventBus::new(16, Arc::new(AuditLog::new()));
        let mut rx = bus.subscribe();

        bus.append(entry("s1", AuditEvent::Start)).await;
        bus.append(entry("s1", AuditEvent::Complete)).await;

        assert_eq!(rx.recv().await.unwrap().event, AuditEvent::Start);
        assert_eq!(rx.recv().await.unwrap().event, AuditEvent::Complete);
    }

    #[tokio::test]
    async fn test_append_without_subscribers() {
        let bus = AuditEventBus::new(1, Arc::new(AuditLog::new()));
        for _ in 0..4 {
            bus.append(entry("s1", AuditEvent::Start)).await;
        }
        assert_eq!(bus.log().len(), 4);
    }

    #[tokio::test]
    async fn test_lagging_subscriber() {
        let bus = AuditEventBus::new(2, Arc::new(AuditLog::new()));
        let mut rx = bus.subscribe();
        for _ in 0..5 {
            bus.append(entry("s1", AuditEvent::Start)).await;
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
        assert_eq!(bus.log().len(), 5);
    }
}
