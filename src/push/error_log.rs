use async_trait::async_trait;
use dashmap::DashMap;
use tracing::warn;
use uuid::Uuid;

use crate::models::notification::NotificationFailure;

/// Best-effort sink for failed sends. Recording never fails the caller.
#[async_trait]
pub trait ErrorLog: Send + Sync {
    async fn record(&self, failure: NotificationFailure);
}

#[derive(Default)]
pub struct MemoryErrorLog {
    entries: DashMap<Uuid, NotificationFailure>,
}

impl MemoryErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded failures, oldest first.
    pub fn entries(&self) -> Vec<NotificationFailure> {
        let mut entries: Vec<NotificationFailure> = self
            .entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        entries.sort_by_key(|failure| failure.failed_at);
        entries
    }

    pub fn for_order(&self, order_id: Uuid) -> Vec<NotificationFailure> {
        self.entries()
            .into_iter()
            .filter(|failure| failure.order_id == order_id)
            .collect()
    }
}

#[async_trait]
impl ErrorLog for MemoryErrorLog {
    async fn record(&self, failure: NotificationFailure) {
        warn!(
            order_id = %failure.order_id,
            recipient_id = %failure.recipient_id,
            error = %failure.error,
            "notification failure recorded"
        );
        self.entries.insert(failure.id, failure);
    }
}
