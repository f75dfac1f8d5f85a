use std::sync::Arc;

use tokio::sync::broadcast;

use crate::clock::Clock;
use crate::directory::MemoryUserDirectory;
use crate::engine::{Collaborators, DispatchEngine, DispatchPolicy};
use crate::models::event::OrderEvent;
use crate::observability::metrics::Metrics;
use crate::push::{MemoryErrorLog, PushGateway};
use crate::store::MemoryOrderStore;

pub struct AppState {
    pub orders: Arc<MemoryOrderStore>,
    pub directory: Arc<MemoryUserDirectory>,
    pub error_log: Arc<MemoryErrorLog>,
    pub engine: DispatchEngine,
    pub clock: Arc<dyn Clock>,
    pub events_tx: broadcast::Sender<OrderEvent>,
    pub metrics: Metrics,
}

impl AppState {
    /// Builds the in-process collaborators around the given gateway and
    /// clock. The returned receiver is subscribed before any order exists,
    /// so the event loop sees every event.
    pub fn new(
        event_buffer_size: usize,
        policy: DispatchPolicy,
        gateway: Arc<dyn PushGateway>,
        clock: Arc<dyn Clock>,
    ) -> (Self, broadcast::Receiver<OrderEvent>) {
        let (events_tx, events_rx) = broadcast::channel(event_buffer_size);
        let metrics = Metrics::new();

        let orders = Arc::new(MemoryOrderStore::new(events_tx.clone()));
        let directory = Arc::new(MemoryUserDirectory::new());
        let error_log = Arc::new(MemoryErrorLog::new());

        let engine = DispatchEngine::new(
            Collaborators {
                orders: orders.clone(),
                directory: directory.clone(),
                gateway,
                error_log: error_log.clone(),
                clock: clock.clone(),
            },
            policy,
            metrics.clone(),
        );

        (
            Self {
                orders,
                directory,
                error_log,
                engine,
                clock,
                events_tx,
                metrics,
            },
            events_rx,
        )
    }
}
