use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::event::OrderEvent;
use crate::models::order::{DeliveryOrder, OrderPatch, OrderStatus};
use crate::store::{AssignOutcome, OrderStore};

/// Order store backed by a `DashMap`. The shard lock held by `get_mut` is
/// what makes the conditional writes atomic.
pub struct MemoryOrderStore {
    orders: DashMap<Uuid, DeliveryOrder>,
    events_tx: broadcast::Sender<OrderEvent>,
}

impl MemoryOrderStore {
    pub fn new(events_tx: broadcast::Sender<OrderEvent>) -> Self {
        Self {
            orders: DashMap::new(),
            events_tx,
        }
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    fn publish(&self, event: OrderEvent) {
        // No subscribers is fine; the sweep still picks the order up.
        if self.events_tx.send(event).is_err() {
            debug!("order event dropped: no subscribers");
        }
    }

    /// Runs `mutate` under the entry lock and publishes an update when it
    /// reports a change. Returns `None` when the order does not exist.
    fn modify<F>(&self, id: Uuid, mutate: F) -> Option<(DeliveryOrder, bool)>
    where
        F: FnOnce(&mut DeliveryOrder) -> bool,
    {
        let (before, after, changed) = {
            let mut entry = self.orders.get_mut(&id)?;
            let before = entry.value().clone();
            let changed = mutate(entry.value_mut());
            (before, entry.value().clone(), changed)
        };

        if changed {
            self.publish(OrderEvent::Updated {
                before,
                after: after.clone(),
            });
        }

        Some((after, changed))
    }
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("order {id} not found"))
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert(&self, order: DeliveryOrder) -> Result<DeliveryOrder, AppError> {
        match self.orders.entry(order.id) {
            Entry::Occupied(_) => {
                return Err(AppError::Conflict(format!(
                    "order {} already exists",
                    order.id
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(order.clone());
            }
        }

        self.publish(OrderEvent::Created {
            order: order.clone(),
        });
        Ok(order)
    }

    async fn get(&self, id: Uuid) -> Result<Option<DeliveryOrder>, AppError> {
        Ok(self.orders.get(&id).map(|entry| entry.value().clone()))
    }

    async fn placed_orders(&self) -> Result<Vec<DeliveryOrder>, AppError> {
        Ok(self
            .orders
            .iter()
            .filter(|entry| entry.value().status == OrderStatus::Placed)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn apply(&self, id: Uuid, patch: OrderPatch) -> Result<DeliveryOrder, AppError> {
        self.modify(id, |order| {
            let before = order.clone();
            patch.apply_to(order);
            *order != before
        })
        .map(|(order, _)| order)
        .ok_or_else(|| not_found(id))
    }

    async fn begin_search(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<DeliveryOrder>, AppError> {
        let (order, claimed) = self
            .modify(id, |order| {
                let fresh = order.is_searching()
                    && order.search_started_at.is_none()
                    && order.notified_couriers.is_empty();
                if fresh {
                    order.search_started_at = Some(now);
                }
                fresh
            })
            .ok_or_else(|| not_found(id))?;

        Ok(claimed.then_some(order))
    }

    async fn release_search(&self, id: Uuid, observed: DateTime<Utc>) -> Result<bool, AppError> {
        let (_, released) = self
            .modify(id, |order| {
                let unused = order.is_searching()
                    && order.search_started_at == Some(observed)
                    && order.notified_couriers.is_empty();
                if unused {
                    order.search_started_at = None;
                }
                unused
            })
            .ok_or_else(|| not_found(id))?;

        Ok(released)
    }

    async fn claim_retry(
        &self,
        id: Uuid,
        observed: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<DeliveryOrder>, AppError> {
        let (order, claimed) = self
            .modify(id, |order| {
                let due = order.is_searching() && order.search_started_at == Some(observed);
                if due {
                    order.search_started_at = Some(now);
                    order.retry_count = order.retry_count.saturating_add(1);
                }
                due
            })
            .ok_or_else(|| not_found(id))?;

        Ok(claimed.then_some(order))
    }

    async fn offer(&self, id: Uuid, couriers: Vec<Uuid>) -> Result<DeliveryOrder, AppError> {
        self.modify(id, |order| {
            if !order.is_searching() {
                return false;
            }
            let known = order.notified_couriers.len();
            order.notified_couriers.extend(couriers);
            order.notified_couriers.len() != known
        })
        .map(|(order, _)| order)
        .ok_or_else(|| not_found(id))
    }

    async fn compare_and_assign(
        &self,
        id: Uuid,
        courier_id: Uuid,
        courier_name: &str,
        now: DateTime<Utc>,
    ) -> Result<AssignOutcome, AppError> {
        let mut outcome = None;
        let (order, won) = self
            .modify(id, |order| {
                if let Some(holder) = order.assigned_courier_id {
                    outcome = Some(AssignOutcome::AlreadyAssigned { courier_id: holder });
                    return false;
                }
                if order.status != OrderStatus::Placed {
                    outcome = Some(AssignOutcome::NotAcceptable {
                        status: order.status,
                    });
                    return false;
                }

                order.assigned_courier_id = Some(courier_id);
                order.assigned_courier_name = Some(courier_name.to_string());
                order.accepted_at = Some(now);
                order.status = OrderStatus::RiderAccepted;
                true
            })
            .ok_or_else(|| not_found(id))?;

        if won {
            return Ok(AssignOutcome::Assigned(order));
        }

        outcome.ok_or_else(|| AppError::Internal("assignment outcome missing".to_string()))
    }
}
