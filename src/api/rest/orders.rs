use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use serde::Deserialize;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::AppError;
use crate::models::courier::GeoPoint;
use crate::models::order::{DeliveryOrder, OrderPatch, OrderStatus};
use crate::state::AppState;
use crate::store::OrderStore;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/accept", post(accept_order))
        .route("/orders/:id/reject", post(reject_order))
        .route("/orders/:id/cancel", post(cancel_order))
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: Option<Uuid>,
    pub customer_name: Option<String>,
    pub pickup_location: GeoPoint,
    pub pickup_address: Option<String>,
    pub drop_address: Option<String>,
    pub total: f64,
}

#[derive(Deserialize)]
pub struct CourierDecision {
    pub courier_id: Uuid,
}

fn validate_location(location: &GeoPoint) -> Result<(), AppError> {
    let valid = (-90.0..=90.0).contains(&location.lat) && (-180.0..=180.0).contains(&location.lng);
    if !valid {
        return Err(AppError::BadRequest(
            "pickup_location is out of range".to_string(),
        ));
    }
    Ok(())
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<DeliveryOrder>, AppError> {
    validate_location(&payload.pickup_location)?;
    if !payload.total.is_finite() || payload.total < 0.0 {
        return Err(AppError::BadRequest("total must be >= 0".to_string()));
    }

    let mut order =
        DeliveryOrder::placed(payload.pickup_location, payload.total, state.clock.now());
    order.customer_id = payload.customer_id;
    order.customer_name = payload.customer_name;
    order.pickup_address = payload.pickup_address;
    order.drop_address = payload.drop_address;

    let order = state.orders.insert(order).await?;
    Ok(Json(order))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryOrder>, AppError> {
    let order = state
        .orders
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {} not found", id)))?;

    Ok(Json(order))
}

async fn accept_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CourierDecision>,
) -> Result<Json<DeliveryOrder>, AppError> {
    let order = state.engine.acceptance.accept(id, payload.courier_id).await?;
    Ok(Json(order))
}

async fn reject_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CourierDecision>,
) -> Result<Json<DeliveryOrder>, AppError> {
    let order = state.engine.acceptance.reject(id, payload.courier_id).await?;
    Ok(Json(order))
}

async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryOrder>, AppError> {
    let current = state
        .orders
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {} not found", id)))?;
    if current.status.is_terminal() {
        return Err(AppError::Conflict(format!(
            "order {} is already {}",
            id,
            current.status.as_str()
        )));
    }

    let order = state
        .orders
        .apply(id, OrderPatch::status(OrderStatus::Cancelled))
        .await?;

    if order.status != OrderStatus::Cancelled {
        return Err(AppError::Conflict(format!(
            "order {} is already {}",
            id,
            order.status.as_str()
        )));
    }

    Ok(Json(order))
}
