use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{patch, post};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::courier::{COURIER_ROLE, Courier, Customer, GeoPoint};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/couriers", post(create_courier).get(list_couriers))
        .route("/couriers/:id/status", patch(update_courier_status))
        .route("/couriers/:id/location", patch(update_courier_location))
        .route("/customers", post(create_customer))
}

fn default_online() -> bool {
    true
}

#[derive(Deserialize)]
pub struct CreateCourierRequest {
    pub display_name: String,
    pub location: Option<GeoPoint>,
    pub notification_endpoint: Option<String>,
    #[serde(default = "default_online")]
    pub is_online: bool,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub is_online: bool,
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub location: GeoPoint,
}

#[derive(Deserialize)]
pub struct CreateCustomerRequest {
    pub display_name: String,
    pub notification_endpoint: Option<String>,
}

async fn create_courier(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateCourierRequest>,
) -> Result<Json<Courier>, AppError> {
    if payload.display_name.trim().is_empty() {
        return Err(AppError::BadRequest("display_name cannot be empty".to_string()));
    }

    let courier = Courier {
        id: Uuid::new_v4(),
        display_name: payload.display_name,
        role: COURIER_ROLE.to_string(),
        is_online: payload.is_online,
        location: payload.location,
        notification_endpoint: payload.notification_endpoint,
        updated_at: Utc::now(),
    };

    Ok(Json(state.directory.upsert_courier(courier)))
}

async fn list_couriers(State(state): State<Arc<AppState>>) -> Json<Vec<Courier>> {
    Json(state.directory.couriers())
}

async fn update_courier_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Courier>, AppError> {
    Ok(Json(state.directory.set_online(id, payload.is_online)?))
}

async fn update_courier_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<Courier>, AppError> {
    Ok(Json(state.directory.set_location(id, payload.location)?))
}

async fn create_customer(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateCustomerRequest>,
) -> Result<Json<Customer>, AppError> {
    if payload.display_name.trim().is_empty() {
        return Err(AppError::BadRequest("display_name cannot be empty".to_string()));
    }

    let customer = Customer {
        id: Uuid::new_v4(),
        display_name: payload.display_name,
        notification_endpoint: payload.notification_endpoint,
    };

    Ok(Json(state.directory.upsert_customer(customer)))
}
