use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role value a user record must carry to be offered deliveries.
pub const COURIER_ROLE: &str = "courier";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Read-only snapshot of a courier as seen by the matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Courier {
    pub id: Uuid,
    pub display_name: String,
    pub role: String,
    pub is_online: bool,
    pub location: Option<GeoPoint>,
    pub notification_endpoint: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub display_name: String,
    pub notification_endpoint: Option<String>,
}

/// A courier that passed the eligibility filter: it has both a known
/// location and somewhere to deliver a push notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub courier_id: Uuid,
    pub display_name: String,
    pub endpoint: String,
    pub location: GeoPoint,
}

impl Candidate {
    pub fn from_courier(courier: &Courier) -> Option<Self> {
        let endpoint = courier
            .notification_endpoint
            .as_ref()
            .filter(|endpoint| !endpoint.trim().is_empty())?;
        let location = courier.location?;

        Some(Self {
            courier_id: courier.id,
            display_name: courier.display_name.clone(),
            endpoint: endpoint.clone(),
            location,
        })
    }
}
