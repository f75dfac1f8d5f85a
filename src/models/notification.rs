use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryPriority {
    Normal,
    High,
}

/// Platform hints passed through to the push gateway untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryHints {
    pub priority: DeliveryPriority,
    pub channel_id: String,
    pub sound: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationMessage {
    pub endpoint: String,
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
    pub hints: DeliveryHints,
}

/// A single failed send, kept for operators to inspect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationFailure {
    pub id: Uuid,
    pub order_id: Uuid,
    pub recipient_id: Uuid,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}
