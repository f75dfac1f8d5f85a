use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::engine::acceptance::ConfirmationOutcome;
use crate::engine::retry::RetryOutcome;
use crate::engine::trigger::DispatchOutcome;
use crate::error::AppError;
use crate::models::event::OrderEvent;
use crate::observability::metrics::Metrics;

#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutcome {
    Ignored,
    Dispatch(DispatchOutcome),
    Retry(RetryOutcome),
    Confirmation(ConfirmationOutcome),
}

/// A named reaction to order events. Handlers inspect the event themselves
/// and return `Ignored` when it is not theirs; they must tolerate states
/// they did not expect.
#[async_trait]
pub trait EventHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &OrderEvent) -> Result<HandlerOutcome, AppError>;
}

/// Runs every handler against one event concurrently. A failing handler is
/// logged and does not stop the others.
pub async fn dispatch_event(
    handlers: &[Arc<dyn EventHandler>],
    event: &OrderEvent,
    metrics: &Metrics,
) -> Vec<(&'static str, Result<HandlerOutcome, AppError>)> {
    let runs = handlers.iter().map(|handler| async move {
        let start = Instant::now();
        let result = handler.handle(event).await;
        metrics
            .handler_latency_seconds
            .with_label_values(&[handler.name()])
            .observe(start.elapsed().as_secs_f64());

        match &result {
            Ok(HandlerOutcome::Ignored) => {}
            Ok(outcome) => debug!(
                handler = handler.name(),
                order_id = %event.order_id(),
                outcome = ?outcome,
                "handler finished"
            ),
            Err(err) => error!(
                handler = handler.name(),
                order_id = %event.order_id(),
                event = event.kind(),
                error = %err,
                "handler failed"
            ),
        }

        (handler.name(), result)
    });

    join_all(runs).await
}

pub async fn run_event_loop(
    handlers: Vec<Arc<dyn EventHandler>>,
    mut events_rx: broadcast::Receiver<OrderEvent>,
    metrics: Metrics,
) {
    info!(handlers = handlers.len(), "order event loop started");
    let handlers: Arc<[Arc<dyn EventHandler>]> = handlers.into();

    loop {
        match events_rx.recv().await {
            Ok(event) => {
                let handlers = handlers.clone();
                let metrics = metrics.clone();
                tokio::spawn(async move {
                    dispatch_event(&handlers, &event, &metrics).await;
                });
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "order event loop lagged; sweep will catch up");
            }
            Err(RecvError::Closed) => break,
        }
    }

    warn!("order event loop stopped: event channel closed");
}
