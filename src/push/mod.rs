pub mod error_log;
pub mod http;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::error::GatewayError;
use crate::models::notification::NotificationMessage;

pub use error_log::{ErrorLog, MemoryErrorLog};
pub use http::HttpPushGateway;

/// Push-notification gateway. Returns the gateway's message id on success.
#[async_trait]
pub trait PushGateway: Send + Sync {
    async fn send(&self, message: &NotificationMessage) -> Result<String, GatewayError>;
}

/// Acknowledges every message and writes it to the log. Used when no real
/// gateway is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPushGateway;

#[async_trait]
impl PushGateway for LogPushGateway {
    async fn send(&self, message: &NotificationMessage) -> Result<String, GatewayError> {
        let message_id = Uuid::new_v4().to_string();
        info!(
            message_id = %message_id,
            title = %message.title,
            kind = message.data.get("type").map(String::as_str).unwrap_or("unknown"),
            order_id = message.data.get("orderId").map(String::as_str).unwrap_or(""),
            "push notification accepted"
        );
        Ok(message_id)
    }
}
