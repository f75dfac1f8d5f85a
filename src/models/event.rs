use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::order::DeliveryOrder;

/// Change events emitted by the order store after every committed write.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Created {
        order: DeliveryOrder,
    },
    Updated {
        before: DeliveryOrder,
        after: DeliveryOrder,
    },
}

impl OrderEvent {
    pub fn order_id(&self) -> Uuid {
        match self {
            OrderEvent::Created { order } => order.id,
            OrderEvent::Updated { after, .. } => after.id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OrderEvent::Created { .. } => "created",
            OrderEvent::Updated { .. } => "updated",
        }
    }
}
