use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::directory::UserDirectory;
use crate::engine::DispatchPolicy;
use crate::engine::events::{EventHandler, HandlerOutcome};
use crate::engine::fanout::{FanoutReport, NotificationFanout, Recipient};
use crate::engine::messages::rider_accepted;
use crate::error::AppError;
use crate::models::event::OrderEvent;
use crate::models::order::{DeliveryOrder, OrderPatch};
use crate::observability::metrics::Metrics;
use crate::store::{AssignOutcome, OrderStore};

#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmationOutcome {
    NoCustomer,
    CustomerNotFound,
    NoEndpoint,
    Sent(FanoutReport),
}

/// Settles the acceptance race and tells the customer who won it.
pub struct AcceptanceResolver {
    orders: Arc<dyn OrderStore>,
    directory: Arc<dyn UserDirectory>,
    fanout: Arc<NotificationFanout>,
    clock: Arc<dyn Clock>,
    policy: DispatchPolicy,
    metrics: Metrics,
}

impl AcceptanceResolver {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        directory: Arc<dyn UserDirectory>,
        fanout: Arc<NotificationFanout>,
        clock: Arc<dyn Clock>,
        policy: DispatchPolicy,
        metrics: Metrics,
    ) -> Self {
        Self {
            orders,
            directory,
            fanout,
            clock,
            policy,
            metrics,
        }
    }

    /// A courier claims the order. Only the first conditional write wins;
    /// everyone after it gets "order no longer available".
    pub async fn accept(
        &self,
        order_id: Uuid,
        courier_id: Uuid,
    ) -> Result<DeliveryOrder, AppError> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        if !order.notified_couriers.contains(&courier_id) {
            return Err(AppError::BadRequest(format!(
                "courier {courier_id} was not offered order {order_id}"
            )));
        }

        let courier = self
            .directory
            .find_courier(courier_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("courier {courier_id} not found")))?;

        let outcome = self
            .orders
            .compare_and_assign(order_id, courier_id, &courier.display_name, self.clock.now())
            .await?;

        match outcome {
            AssignOutcome::Assigned(order) => {
                self.metrics.acceptances_total.with_label_values(&["won"]).inc();
                info!(order_id = %order_id, courier_id = %courier_id, "courier accepted order");
                Ok(order)
            }
            AssignOutcome::AlreadyAssigned { courier_id: holder } => {
                self.metrics.acceptances_total.with_label_values(&["lost"]).inc();
                info!(
                    order_id = %order_id,
                    courier_id = %courier_id,
                    holder_id = %holder,
                    "acceptance lost the race"
                );
                Err(AppError::no_longer_available())
            }
            AssignOutcome::NotAcceptable { status } => {
                self.metrics.acceptances_total.with_label_values(&["closed"]).inc();
                info!(
                    order_id = %order_id,
                    courier_id = %courier_id,
                    status = status.as_str(),
                    "acceptance on closed order"
                );
                Err(AppError::no_longer_available())
            }
        }
    }

    /// A courier declines; retries will skip them from now on.
    pub async fn reject(
        &self,
        order_id: Uuid,
        courier_id: Uuid,
    ) -> Result<DeliveryOrder, AppError> {
        let order = self.orders.apply(order_id, OrderPatch::rejection(courier_id)).await?;
        info!(order_id = %order_id, courier_id = %courier_id, "courier declined order");
        Ok(order)
    }

    /// Confirms the customer when an update carries the assignment landing.
    pub async fn on_update(
        &self,
        before: &DeliveryOrder,
        after: &DeliveryOrder,
    ) -> Result<Option<ConfirmationOutcome>, AppError> {
        if before.assigned_courier_id.is_some() || after.assigned_courier_id.is_none() {
            return Ok(None);
        }

        self.confirm_customer(after).await.map(Some)
    }

    async fn confirm_customer(
        &self,
        order: &DeliveryOrder,
    ) -> Result<ConfirmationOutcome, AppError> {
        let Some(customer_id) = order.customer_id else {
            info!(order_id = %order.id, "order has no customer to confirm");
            return Ok(ConfirmationOutcome::NoCustomer);
        };

        let Some(customer) = self.directory.find_customer(customer_id).await? else {
            warn!(order_id = %order.id, customer_id = %customer_id, "customer not found");
            return Ok(ConfirmationOutcome::CustomerNotFound);
        };

        let Some(endpoint) = customer.notification_endpoint.as_deref() else {
            warn!(
                order_id = %order.id,
                customer_id = %customer_id,
                "customer has no notification endpoint"
            );
            return Ok(ConfirmationOutcome::NoEndpoint);
        };

        let report = self
            .fanout
            .deliver(
                order.id,
                vec![Recipient {
                    id: customer.id,
                    message: rider_accepted(order, endpoint, &self.policy.notification_channel),
                }],
            )
            .await;

        Ok(ConfirmationOutcome::Sent(report))
    }
}

#[async_trait]
impl EventHandler for AcceptanceResolver {
    fn name(&self) -> &'static str {
        "acceptance_resolver"
    }

    async fn handle(&self, event: &OrderEvent) -> Result<HandlerOutcome, AppError> {
        match event {
            OrderEvent::Updated { before, after } => match self.on_update(before, after).await? {
                Some(outcome) => Ok(HandlerOutcome::Confirmation(outcome)),
                None => Ok(HandlerOutcome::Ignored),
            },
            OrderEvent::Created { .. } => Ok(HandlerOutcome::Ignored),
        }
    }
}
