use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time;
use tracing::{debug, error, info};

use crate::clock::Clock;
use crate::engine::DispatchPolicy;
use crate::engine::retry::{RetryOutcome, RetryScheduler};
use crate::engine::trigger::{DispatchOutcome, DispatchTrigger};
use crate::error::AppError;
use crate::observability::metrics::Metrics;
use crate::store::OrderStore;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub searching: usize,
    pub recovered: usize,
    pub retried: usize,
    pub failed: usize,
}

/// Timer that re-evaluates every searching order, so retries fire even when
/// nothing else touches the order. It also picks up orders whose creation
/// event was lost before dispatch began.
pub struct RetrySweeper {
    orders: Arc<dyn OrderStore>,
    trigger: Arc<DispatchTrigger>,
    retry: Arc<RetryScheduler>,
    clock: Arc<dyn Clock>,
    policy: DispatchPolicy,
    metrics: Metrics,
}

impl RetrySweeper {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        trigger: Arc<DispatchTrigger>,
        retry: Arc<RetryScheduler>,
        clock: Arc<dyn Clock>,
        policy: DispatchPolicy,
        metrics: Metrics,
    ) -> Self {
        Self {
            orders,
            trigger,
            retry,
            clock,
            policy,
            metrics,
        }
    }

    pub async fn sweep(&self) -> Result<SweepReport, AppError> {
        let placed = self.orders.placed_orders().await?;
        let now = self.clock.now();

        let mut report = SweepReport {
            searching: placed.len(),
            ..SweepReport::default()
        };
        self.metrics.orders_searching.set(placed.len() as i64);

        let evaluations = placed.iter().map(|order| async move {
            if order.search_started_at.is_none() {
                if now - order.created_at < self.policy.retry_after {
                    return Ok(false);
                }
                return self
                    .trigger
                    .dispatch(order)
                    .await
                    .map(|outcome| matches!(outcome, DispatchOutcome::Notified(_)));
            }
            self.retry
                .evaluate(order)
                .await
                .map(|outcome| matches!(outcome, RetryOutcome::Fired { .. }))
        });

        for (order, result) in placed.iter().zip(join_all(evaluations).await) {
            match result {
                Ok(true) if order.search_started_at.is_none() => report.recovered += 1,
                Ok(true) => report.retried += 1,
                Ok(false) => {}
                Err(err) => {
                    report.failed += 1;
                    error!(order_id = %order.id, error = %err, "sweep evaluation failed");
                }
            }
        }

        debug!(
            searching = report.searching,
            recovered = report.recovered,
            retried = report.retried,
            failed = report.failed,
            "retry sweep complete"
        );

        Ok(report)
    }

    pub async fn run(self, interval: Duration) {
        info!(interval_ms = interval.as_millis() as u64, "retry sweeper started");

        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(err) = self.sweep().await {
                error!(error = %err, "retry sweep failed");
            }
        }
    }
}
