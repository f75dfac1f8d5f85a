use std::collections::BTreeMap;

use crate::geo::RankedCandidate;
use crate::models::notification::{DeliveryHints, DeliveryPriority, NotificationMessage};
use crate::models::order::DeliveryOrder;

pub const DELIVERY_REQUEST: &str = "delivery_request";
pub const RIDER_ACCEPTED: &str = "rider_accepted";

/// Courier's cut of the order total, shown as the earnings estimate.
const EARNINGS_SHARE: f64 = 0.10;

/// Which flavour of courier request to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestVariant {
    Initial,
    StillLooking,
}

pub fn earnings_estimate(total: f64) -> i64 {
    (total * EARNINGS_SHARE).round() as i64
}

fn customer_name(order: &DeliveryOrder) -> &str {
    order.customer_name.as_deref().unwrap_or("Customer")
}

fn hints(channel_id: &str) -> DeliveryHints {
    DeliveryHints {
        priority: DeliveryPriority::High,
        channel_id: channel_id.to_string(),
        sound: "default".to_string(),
    }
}

pub fn courier_request(
    order: &DeliveryOrder,
    ranked: &RankedCandidate,
    variant: RequestVariant,
    channel_id: &str,
) -> NotificationMessage {
    let customer = customer_name(order);
    let distance = format!("{:.1}", ranked.distance_km);

    let mut data = BTreeMap::new();
    data.insert("type".to_string(), DELIVERY_REQUEST.to_string());
    data.insert("orderId".to_string(), order.id.to_string());
    data.insert("customerName".to_string(), customer.to_string());
    data.insert(
        "pickupAddress".to_string(),
        order
            .pickup_address
            .clone()
            .unwrap_or_else(|| "Pickup Location".to_string()),
    );
    data.insert(
        "dropAddress".to_string(),
        order
            .drop_address
            .clone()
            .unwrap_or_else(|| "Drop Location".to_string()),
    );
    data.insert("distance".to_string(), distance.clone());
    data.insert(
        "earnings".to_string(),
        earnings_estimate(order.total).to_string(),
    );

    let (title, body) = match variant {
        RequestVariant::Initial => (
            "New Delivery Request".to_string(),
            format!("{customer} • {distance}km away"),
        ),
        RequestVariant::StillLooking => {
            data.insert("isRetry".to_string(), "true".to_string());
            (
                "Still Looking!".to_string(),
                format!("Order from {customer} needs a rider urgently!"),
            )
        }
    };

    NotificationMessage {
        endpoint: ranked.candidate.endpoint.clone(),
        title,
        body,
        data,
        hints: hints(channel_id),
    }
}

pub fn rider_accepted(
    order: &DeliveryOrder,
    customer_endpoint: &str,
    channel_id: &str,
) -> NotificationMessage {
    let rider = order.assigned_courier_name.as_deref().unwrap_or("Your rider");

    let mut data = BTreeMap::new();
    data.insert("type".to_string(), RIDER_ACCEPTED.to_string());
    data.insert("orderId".to_string(), order.id.to_string());
    if let Some(courier_id) = order.assigned_courier_id {
        data.insert("courierId".to_string(), courier_id.to_string());
    }

    NotificationMessage {
        endpoint: customer_endpoint.to_string(),
        title: "Rider Found!".to_string(),
        body: format!("{rider} is picking up your order"),
        data,
        hints: hints(channel_id),
    }
}
