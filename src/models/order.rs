use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::courier::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Placed,
    NoRidersAvailable,
    NoNearbyRiders,
    RiderAccepted,
    Cancelled,
}

impl OrderStatus {
    /// Terminal states end all dispatch and retry activity for an order.
    pub fn is_terminal(self) -> bool {
        !matches!(self, OrderStatus::Placed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Placed => "PLACED",
            OrderStatus::NoRidersAvailable => "NO_RIDERS_AVAILABLE",
            OrderStatus::NoNearbyRiders => "NO_NEARBY_RIDERS",
            OrderStatus::RiderAccepted => "RIDER_ACCEPTED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryOrder {
    pub id: Uuid,
    pub status: OrderStatus,
    pub customer_id: Option<Uuid>,
    pub customer_name: Option<String>,
    pub pickup_location: GeoPoint,
    pub pickup_address: Option<String>,
    pub drop_address: Option<String>,
    pub total: f64,
    pub assigned_courier_id: Option<Uuid>,
    pub assigned_courier_name: Option<String>,
    pub notified_couriers: BTreeSet<Uuid>,
    pub rejected_by: BTreeSet<Uuid>,
    pub retry_count: u32,
    pub search_started_at: Option<DateTime<Utc>>,
    pub notifications_sent: u32,
    pub notifications_failed: u32,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
}

impl DeliveryOrder {
    /// A freshly placed order, as handed over by the order-placement service.
    pub fn placed(pickup_location: GeoPoint, total: f64, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: OrderStatus::Placed,
            customer_id: None,
            customer_name: None,
            pickup_location,
            pickup_address: None,
            drop_address: None,
            total,
            assigned_courier_id: None,
            assigned_courier_name: None,
            notified_couriers: BTreeSet::new(),
            rejected_by: BTreeSet::new(),
            retry_count: 0,
            search_started_at: None,
            notifications_sent: 0,
            notifications_failed: 0,
            created_at,
            accepted_at: None,
        }
    }

    /// Still waiting for a courier: placed and nobody assigned yet.
    pub fn is_searching(&self) -> bool {
        self.status == OrderStatus::Placed && self.assigned_courier_id.is_none()
    }
}

/// Field changes applied by the dispatch components in a single store write.
///
/// Set-valued fields only ever grow, and a status change is only honoured
/// while the order is still `PLACED`.
#[derive(Debug, Clone, Default)]
pub struct OrderPatch {
    pub status: Option<OrderStatus>,
    pub rejected: Option<Uuid>,
    pub notifications_sent: u32,
    pub notifications_failed: u32,
}

impl OrderPatch {
    pub fn status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn rejection(courier_id: Uuid) -> Self {
        Self {
            rejected: Some(courier_id),
            ..Self::default()
        }
    }

    pub fn apply_to(&self, order: &mut DeliveryOrder) {
        if let Some(status) = self.status {
            if order.status == OrderStatus::Placed {
                order.status = status;
            }
        }
        if let Some(courier_id) = self.rejected {
            order.rejected_by.insert(courier_id);
        }
        order.notifications_sent = order.notifications_sent.saturating_add(self.notifications_sent);
        order.notifications_failed = order
            .notifications_failed
            .saturating_add(self.notifications_failed);
    }
}
