use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::models::notification::{NotificationFailure, NotificationMessage};
use crate::observability::metrics::Metrics;
use crate::push::{ErrorLog, PushGateway};

#[derive(Debug, Clone)]
pub struct Recipient {
    pub id: Uuid,
    pub message: NotificationMessage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedDelivery {
    pub recipient_id: Uuid,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FanoutReport {
    pub delivered: Vec<Uuid>,
    pub failures: Vec<FailedDelivery>,
}

impl FanoutReport {
    pub fn sent(&self) -> u32 {
        self.delivered.len() as u32
    }

    pub fn failed(&self) -> u32 {
        self.failures.len() as u32
    }
}

/// Sends a batch of notifications concurrently and waits for every outcome.
///
/// One recipient failing never affects another. Failed sends are not retried
/// here; they are reported and handed to the error log.
pub struct NotificationFanout {
    gateway: Arc<dyn PushGateway>,
    error_log: Arc<dyn ErrorLog>,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
}

impl NotificationFanout {
    pub fn new(
        gateway: Arc<dyn PushGateway>,
        error_log: Arc<dyn ErrorLog>,
        clock: Arc<dyn Clock>,
        metrics: Metrics,
    ) -> Self {
        Self {
            gateway,
            error_log,
            clock,
            metrics,
        }
    }

    pub async fn deliver(&self, order_id: Uuid, recipients: Vec<Recipient>) -> FanoutReport {
        if recipients.is_empty() {
            return FanoutReport::default();
        }

        let sends = recipients.iter().map(|recipient| async move {
            let kind = recipient
                .message
                .data
                .get("type")
                .map(String::as_str)
                .unwrap_or("unknown");

            match self.gateway.send(&recipient.message).await {
                Ok(message_id) => {
                    self.metrics
                        .notifications_total
                        .with_label_values(&[kind, "sent"])
                        .inc();
                    info!(
                        order_id = %order_id,
                        recipient_id = %recipient.id,
                        message_id = %message_id,
                        "notification sent"
                    );
                    Ok(recipient.id)
                }
                Err(err) => {
                    self.metrics
                        .notifications_total
                        .with_label_values(&[kind, "failed"])
                        .inc();
                    warn!(
                        order_id = %order_id,
                        recipient_id = %recipient.id,
                        error = %err,
                        "notification failed"
                    );
                    self.error_log
                        .record(NotificationFailure {
                            id: Uuid::new_v4(),
                            order_id,
                            recipient_id: recipient.id,
                            error: err.to_string(),
                            failed_at: self.clock.now(),
                        })
                        .await;
                    Err(FailedDelivery {
                        recipient_id: recipient.id,
                        error: err.to_string(),
                    })
                }
            }
        });

        let mut report = FanoutReport::default();
        for outcome in join_all(sends).await {
            match outcome {
                Ok(recipient_id) => report.delivered.push(recipient_id),
                Err(failure) => report.failures.push(failure),
            }
        }

        info!(
            order_id = %order_id,
            sent = report.sent(),
            failed = report.failed(),
            "fan-out complete"
        );

        report
    }
}
