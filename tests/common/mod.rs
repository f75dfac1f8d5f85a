#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use courier_dispatch::clock::{Clock, ManualClock};
use courier_dispatch::directory::{MemoryUserDirectory, UserDirectory};
use courier_dispatch::engine::{Collaborators, DispatchEngine, DispatchPolicy};
use courier_dispatch::error::{AppError, GatewayError};
use courier_dispatch::models::courier::{COURIER_ROLE, Courier, Customer, GeoPoint};
use courier_dispatch::models::event::OrderEvent;
use courier_dispatch::models::notification::NotificationMessage;
use courier_dispatch::models::order::DeliveryOrder;
use courier_dispatch::observability::metrics::Metrics;
use courier_dispatch::push::{MemoryErrorLog, PushGateway};
use courier_dispatch::state::AppState;
use courier_dispatch::store::{MemoryOrderStore, OrderStore};
use tokio::sync::{Notify, Semaphore, broadcast};
use uuid::Uuid;

pub const PICKUP: GeoPoint = GeoPoint {
    lat: 12.90,
    lng: 77.60,
};

/// Records every message and fails the ones addressed to `failing` endpoints.
/// Sends to `held` endpoints stay in flight until `release_held`.
pub struct RecordingGateway {
    sent: Mutex<Vec<NotificationMessage>>,
    failing: Mutex<HashSet<String>>,
    held: Mutex<HashSet<String>>,
    in_flight: Notify,
    release: Semaphore,
}

impl Default for RecordingGateway {
    fn default() -> Self {
        Self {
            sent: Mutex::default(),
            failing: Mutex::default(),
            held: Mutex::default(),
            in_flight: Notify::new(),
            release: Semaphore::new(0),
        }
    }
}

impl RecordingGateway {
    pub fn hold_endpoint(&self, endpoint: &str) {
        self.held.lock().unwrap().insert(endpoint.to_string());
    }

    /// Resolves once a send to a held endpoint has started.
    pub async fn wait_for_held_send(&self) {
        self.in_flight.notified().await;
    }

    pub fn release_held(&self) {
        self.release.add_permits(64);
    }

    pub fn fail_endpoint(&self, endpoint: &str) {
        self.failing.lock().unwrap().insert(endpoint.to_string());
    }

    pub fn sent(&self) -> Vec<NotificationMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, endpoint: &str) -> Vec<NotificationMessage> {
        self.sent()
            .into_iter()
            .filter(|message| message.endpoint == endpoint)
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl PushGateway for RecordingGateway {
    async fn send(&self, message: &NotificationMessage) -> Result<String, GatewayError> {
        if self.failing.lock().unwrap().contains(&message.endpoint) {
            return Err(GatewayError::Rejected("registration-token-not-registered".to_string()));
        }
        let held = self.held.lock().unwrap().contains(&message.endpoint);
        if held {
            self.in_flight.notify_one();
            self.release.acquire().await.unwrap().forget();
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(Uuid::new_v4().to_string())
    }
}

pub struct Harness {
    pub state: Arc<AppState>,
    pub gateway: Arc<RecordingGateway>,
    pub clock: Arc<ManualClock>,
    pub events_rx: broadcast::Receiver<OrderEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_policy(DispatchPolicy::default())
    }

    pub fn with_policy(policy: DispatchPolicy) -> Self {
        let gateway = Arc::new(RecordingGateway::default());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
        ));
        let (state, events_rx) = AppState::new(1024, policy, gateway.clone(), clock.clone());

        Self {
            state: Arc::new(state),
            gateway,
            clock,
            events_rx,
        }
    }

    /// Adds an online courier `km` kilometres due north of the pickup point.
    pub fn courier_north(&self, seed: u128, km: f64) -> Courier {
        self.add_courier(seed, Some(north_of(PICKUP, km)), true, Some(endpoint(seed)))
    }

    pub fn add_courier(
        &self,
        seed: u128,
        location: Option<GeoPoint>,
        is_online: bool,
        notification_endpoint: Option<String>,
    ) -> Courier {
        self.state.directory.upsert_courier(courier_record(
            seed,
            location,
            is_online,
            notification_endpoint,
        ))
    }

    pub fn add_customer(&self, endpoint: Option<&str>) -> Customer {
        self.state.directory.upsert_customer(Customer {
            id: Uuid::new_v4(),
            display_name: "Asha".to_string(),
            notification_endpoint: endpoint.map(str::to_string),
        })
    }

    pub async fn place_order(&self, customer_id: Option<Uuid>) -> DeliveryOrder {
        let mut order = placed_order(self.clock_now());
        order.customer_id = customer_id;
        self.state.orders.insert(order).await.unwrap()
    }

    pub async fn order(&self, id: Uuid) -> DeliveryOrder {
        self.state.orders.get(id).await.unwrap().unwrap()
    }

    pub fn clock_now(&self) -> chrono::DateTime<Utc> {
        self.clock.now()
    }

    /// Drains events published so far.
    pub fn drain_events(&mut self) -> Vec<OrderEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Directory whose `find_couriers` can be made to fail or to pause until
/// resumed.
pub struct ControlledDirectory {
    pub inner: MemoryUserDirectory,
    failures: AtomicU32,
    pause_next: AtomicBool,
    paused: Notify,
    resume: Semaphore,
}

impl ControlledDirectory {
    pub fn new() -> Self {
        Self {
            inner: MemoryUserDirectory::new(),
            failures: AtomicU32::new(0),
            pause_next: AtomicBool::new(false),
            paused: Notify::new(),
            resume: Semaphore::new(0),
        }
    }

    pub fn fail_next(&self, times: u32) {
        self.failures.store(times, Ordering::SeqCst);
    }

    pub fn pause_next(&self) {
        self.pause_next.store(true, Ordering::SeqCst);
    }

    pub async fn wait_until_paused(&self) {
        self.paused.notified().await;
    }

    pub fn resume(&self) {
        self.resume.add_permits(1);
    }
}

#[async_trait]
impl UserDirectory for ControlledDirectory {
    async fn find_couriers(&self, role: &str, is_online: bool) -> Result<Vec<Courier>, AppError> {
        if self.pause_next.swap(false, Ordering::SeqCst) {
            self.paused.notify_one();
            self.resume.acquire().await.unwrap().forget();
        }
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AppError::Unavailable("user directory unavailable".to_string()));
        }
        self.inner.find_couriers(role, is_online).await
    }

    async fn find_courier(&self, id: Uuid) -> Result<Option<Courier>, AppError> {
        self.inner.find_courier(id).await
    }

    async fn find_customer(&self, id: Uuid) -> Result<Option<Customer>, AppError> {
        self.inner.find_customer(id).await
    }
}

/// A dispatch engine wired straight to its collaborators, with a
/// `ControlledDirectory` in place of the app's registry.
pub struct Rig {
    pub orders: Arc<MemoryOrderStore>,
    pub directory: Arc<ControlledDirectory>,
    pub gateway: Arc<RecordingGateway>,
    pub clock: Arc<ManualClock>,
    pub engine: DispatchEngine,
}

impl Rig {
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(64);
        let orders = Arc::new(MemoryOrderStore::new(events_tx));
        let directory = Arc::new(ControlledDirectory::new());
        let gateway = Arc::new(RecordingGateway::default());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
        ));

        let engine = DispatchEngine::new(
            Collaborators {
                orders: orders.clone(),
                directory: directory.clone(),
                gateway: gateway.clone(),
                error_log: Arc::new(MemoryErrorLog::new()),
                clock: clock.clone(),
            },
            DispatchPolicy::default(),
            Metrics::new(),
        );

        Self {
            orders,
            directory,
            gateway,
            clock,
            engine,
        }
    }

    pub fn courier_north(&self, seed: u128, km: f64) -> Courier {
        self.directory.inner.upsert_courier(courier_record(
            seed,
            Some(north_of(PICKUP, km)),
            true,
            Some(endpoint(seed)),
        ))
    }

    pub async fn place_order(&self) -> DeliveryOrder {
        self.orders
            .insert(placed_order(self.clock.now()))
            .await
            .unwrap()
    }

    pub async fn order(&self, id: Uuid) -> DeliveryOrder {
        self.orders.get(id).await.unwrap().unwrap()
    }
}

pub fn courier_record(
    seed: u128,
    location: Option<GeoPoint>,
    is_online: bool,
    notification_endpoint: Option<String>,
) -> Courier {
    Courier {
        id: Uuid::from_u128(seed),
        display_name: format!("Rider {seed}"),
        role: COURIER_ROLE.to_string(),
        is_online,
        location,
        notification_endpoint,
        updated_at: Utc::now(),
    }
}

pub fn placed_order(created_at: chrono::DateTime<Utc>) -> DeliveryOrder {
    let mut order = DeliveryOrder::placed(PICKUP, 420.0, created_at);
    order.customer_name = Some("Asha".to_string());
    order.pickup_address = Some("14 MG Road".to_string());
    order.drop_address = Some("22 Church Street".to_string());
    order
}

pub fn endpoint(seed: u128) -> String {
    format!("device-token-{seed}")
}

/// A point `km` kilometres due north of `origin` along the meridian.
pub fn north_of(origin: GeoPoint, km: f64) -> GeoPoint {
    GeoPoint {
        lat: origin.lat + (km / 6_371.0).to_degrees(),
        lng: origin.lng,
    }
}
