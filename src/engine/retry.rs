use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use tracing::{debug, info, warn};

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
pub enum RetryOutcome {
    /// Terminal, assigned, or never dispatched.
    Inactive,
    NotDue { remaining: Duration },
    /// Another invocation claimed this cycle first.
    ClaimedElsewhere,
    /// The retry cap was reached and the search was closed.
    Exhausted,
    /// The order was accepted or closed while the retry was being prepared.
    Settled { status: OrderStatus },
    Fired { retry_count: u32, report: FanoutReport },
}

/// Re-notifies couriers when nobody has accepted within the retry window.
///
/// The window is measured from `search_started_at` against the injected
/// clock, so the decision is the same whether it is driven by an order
/// update or by the periodic sweep.
pub struct RetryScheduler {
    orders: Arc<dyn OrderStore>,
    locator: Arc<CourierLocator>,
    fanout: Arc<NotificationFanout>,
    clock: Arc<dyn Clock>,
    policy: DispatchPolicy,
    metrics: Metrics,
}

impl RetryScheduler {
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

    pub async fn evaluate(&self, order: &DeliveryOrder) -> Result<RetryOutcome, AppError> {
        if !order.is_searching() {
            return Ok(RetryOutcome::Inactive);
        }
        let Some(started) = order.search_started_at else {
            return Ok(RetryOutcome::Inactive);
        };

        let now = self.clock.now();
        let elapsed = now - started;
        if elapsed < self.policy.retry_after {
            return Ok(RetryOutcome::NotDue {
                remaining: self.policy.retry_after - elapsed,
            });
        }

        if let Some(max_retries) = self.policy.max_retries {
            if order.retry_count >= max_retries {
                warn!(
                    order_id = %order.id,
                    retry_count = order.retry_count,
                    "retry limit reached; closing search"
                );
                let closed = self
                    .orders
                    .apply(order.id, OrderPatch::status(OrderStatus::NoRidersAvailable))
                    .await?;
                if closed.status != OrderStatus::NoRidersAvailable {
                    return Ok(RetryOutcome::Inactive);
                }
                self.metrics
                    .retries_total
                    .with_label_values(&["exhausted"])
                    .inc();
                return Ok(RetryOutcome::Exhausted);
            }
        }

        let Some(claimed) = self.orders.claim_retry(order.id, started, now).await? else {
            debug!(order_id = %order.id, "retry cycle claimed elsewhere");
            return Ok(RetryOutcome::ClaimedElsewhere);
        };

        info!(
            order_id = %claimed.id,
            retry_count = claimed.retry_count,
            elapsed_secs = elapsed.num_seconds(),
            "no courier accepted in time; retrying"
        );

        let candidates = self.locator.locate(&claimed.rejected_by).await?;
        let ranked = rank_within(&claimed.pickup_location, candidates, self.policy.radius_km);

        let recipients: Vec<Recipient> = ranked
            .iter()
            .map(|ranked| Recipient {
                id: ranked.candidate.courier_id,
                message: courier_request(
                    &claimed,
                    ranked,
                    RequestVariant::StillLooking,
                    &self.policy.notification_channel,
                ),
            })
            .collect();

        if recipients.is_empty() {
            warn!(order_id = %claimed.id, "no couriers left to retry");
            self.metrics.retries_total.with_label_values(&["fired"]).inc();
            return Ok(RetryOutcome::Fired {
                retry_count: claimed.retry_count,
                report: FanoutReport::default(),
            });
        }

        // An acceptance may have landed while the pool was loading.
        let offered = self
            .orders
            .offer(claimed.id, recipients.iter().map(|recipient| recipient.id).collect())
            .await?;
        if !offered.is_searching() {
            info!(
                order_id = %claimed.id,
                status = offered.status.as_str(),
                "order settled during retry; nothing sent"
            );
            self.metrics.retries_total.with_label_values(&["settled"]).inc();
            return Ok(RetryOutcome::Settled {
                status: offered.status,
            });
        }

        let report = self.fanout.deliver(claimed.id, recipients).await;

        self.orders
            .apply(
                claimed.id,
                OrderPatch {
                    notifications_sent: report.sent(),
                    notifications_failed: report.failed(),
                    ..OrderPatch::default()
                },
            )
            .await?;

        self.metrics.retries_total.with_label_values(&["fired"]).inc();

        Ok(RetryOutcome::Fired {
            retry_count: claimed.retry_count,
            report,
        })
    }
}

#[async_trait]
impl EventHandler for RetryScheduler {
    fn name(&self) -> &'static str {
        "retry_scheduler"
    }

    async fn handle(&self, event: &OrderEvent) -> Result<HandlerOutcome, AppError> {
        match event {
            OrderEvent::Updated { after, .. } => {
                Ok(HandlerOutcome::Retry(self.evaluate(after).await?))
            }
            OrderEvent::Created { .. } => Ok(HandlerOutcome::Ignored),
        }
    }
}
