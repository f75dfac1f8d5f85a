use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::engine::DispatchPolicy;
use crate::engine::events::{EventHandler, HandlerOutcome};
use crate::engine::fanout::{FanoutReport, NotificationFanout, Recipient};
use crate::engine::locator::CourierLocator;
use crate::engine::messages::{RequestVariant, courier_request};
use crate::error::AppError;
use crate::geo::rank_within;
use crate::models::event::OrderEvent;
use crate::models::order::{DeliveryOrder, OrderPatch, OrderStatus};
use crate::observability::metrics::Metrics;
use crate::store::OrderStore;

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    NotPlaced { status: OrderStatus },
    AlreadyDispatched,
    NoRidersAvailable,
    NoNearbyRiders,
    Notified(FanoutReport),
}

impl DispatchOutcome {
    fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::NotPlaced { .. } => "not_placed",
            DispatchOutcome::AlreadyDispatched => "already_dispatched",
            DispatchOutcome::NoRidersAvailable => "no_riders_available",
            DispatchOutcome::NoNearbyRiders => "no_nearby_riders",
            DispatchOutcome::Notified(_) => "notified",
        }
    }
}

/// Reacts to new orders: locate, rank, notify every courier in range.
pub struct DispatchTrigger {
    orders: Arc<dyn OrderStore>,
    locator: Arc<CourierLocator>,
    fanout: Arc<NotificationFanout>,
    clock: Arc<dyn Clock>,
    policy: DispatchPolicy,
    metrics: Metrics,
}

impl DispatchTrigger {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        locator: Arc<CourierLocator>,
        fanout: Arc<NotificationFanout>,
        clock: Arc<dyn Clock>,
        policy: DispatchPolicy,
        metrics: Metrics,
    ) -> Self {
        Self {
            orders,
            locator,
            fanout,
            clock,
            policy,
            metrics,
        }
    }

    pub async fn dispatch(&self, order: &DeliveryOrder) -> Result<DispatchOutcome, AppError> {
        let outcome = self.run(order).await?;
        self.metrics
            .dispatch_outcomes_total
            .with_label_values(&[outcome.label()])
            .inc();
        Ok(outcome)
    }

    async fn run(&self, order: &DeliveryOrder) -> Result<DispatchOutcome, AppError> {
        if order.status != OrderStatus::Placed {
            info!(
                order_id = %order.id,
                status = order.status.as_str(),
                "order not placed; skipping dispatch"
            );
            return Ok(DispatchOutcome::NotPlaced {
                status: order.status,
            });
        }

        if !order.notified_couriers.is_empty() {
            info!(order_id = %order.id, "order already dispatched; skipping");
            return Ok(DispatchOutcome::AlreadyDispatched);
        }

        let started = self.clock.now();
        let Some(order) = self.orders.begin_search(order.id, started).await? else {
            info!(order_id = %order.id, "dispatch already claimed; skipping");
            return Ok(DispatchOutcome::AlreadyDispatched);
        };

        match self.notify_nearby(&order).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                // A redelivered creation event must be able to dispatch again.
                match self.orders.release_search(order.id, started).await {
                    Ok(released) => {
                        warn!(order_id = %order.id, error = %err, released, "dispatch failed")
                    }
                    Err(release_err) => warn!(
                        order_id = %order.id,
                        error = %err,
                        release_error = %release_err,
                        "dispatch failed and search claim could not be released"
                    ),
                }
                Err(err)
            }
        }
    }

    async fn notify_nearby(&self, order: &DeliveryOrder) -> Result<DispatchOutcome, AppError> {
        let candidates = self.locator.locate(&order.rejected_by).await?;
        if candidates.is_empty() {
            warn!(order_id = %order.id, "no online couriers");
            self.orders
                .apply(order.id, OrderPatch::status(OrderStatus::NoRidersAvailable))
                .await?;
            return Ok(DispatchOutcome::NoRidersAvailable);
        }

        let ranked = rank_within(&order.pickup_location, candidates, self.policy.radius_km);
        if ranked.is_empty() {
            warn!(
                order_id = %order.id,
                radius_km = self.policy.radius_km,
                "no couriers within radius"
            );
            self.orders
                .apply(order.id, OrderPatch::status(OrderStatus::NoNearbyRiders))
                .await?;
            return Ok(DispatchOutcome::NoNearbyRiders);
        }

        let recipients: Vec<Recipient> = ranked
            .iter()
            .map(|ranked| Recipient {
                id: ranked.candidate.courier_id,
                message: courier_request(
                    order,
                    ranked,
                    RequestVariant::Initial,
                    &self.policy.notification_channel,
                ),
            })
            .collect();

        // Offered couriers may accept as soon as their push lands.
        let offered = self
            .orders
            .offer(order.id, recipients.iter().map(|recipient| recipient.id).collect())
            .await?;
        if !offered.is_searching() {
            info!(
                order_id = %order.id,
                status = offered.status.as_str(),
                "order settled before couriers were notified"
            );
            return Ok(DispatchOutcome::NotPlaced {
                status: offered.status,
            });
        }

        info!(order_id = %order.id, nearby = recipients.len(), "notifying nearby couriers");
        let report = self.fanout.deliver(order.id, recipients).await;

        self.orders
            .apply(
                order.id,
                OrderPatch {
                    notifications_sent: report.sent(),
                    notifications_failed: report.failed(),
                    ..OrderPatch::default()
                },
            )
            .await?;

        Ok(DispatchOutcome::Notified(report))
    }
}

#[async_trait]
impl EventHandler for DispatchTrigger {
    fn name(&self) -> &'static str {
        "dispatch_trigger"
    }

    async fn handle(&self, event: &OrderEvent) -> Result<HandlerOutcome, AppError> {
        match event {
            OrderEvent::Created { order } => {
                Ok(HandlerOutcome::Dispatch(self.dispatch(order).await?))
            }
            OrderEvent::Updated { .. } => Ok(HandlerOutcome::Ignored),
        }
    }
}
