pub mod acceptance;
pub mod events;
pub mod fanout;
pub mod locator;
pub mod messages;
pub mod retry;
pub mod sweeper;
pub mod trigger;

use std::sync::Arc;

use chrono::Duration;

use crate::clock::Clock;
use crate::directory::UserDirectory;
use crate::geo::DEFAULT_RADIUS_KM;
use crate::observability::metrics::Metrics;
use crate::push::{ErrorLog, PushGateway};
use crate::store::OrderStore;

use acceptance::AcceptanceResolver;
use events::EventHandler;
use fanout::NotificationFanout;
use locator::CourierLocator;
use retry::RetryScheduler;
use sweeper::RetrySweeper;
use trigger::DispatchTrigger;

#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    pub radius_km: f64,
    pub retry_after: Duration,
    /// `None` keeps retrying until the order is accepted or cancelled.
    pub max_retries: Option<u32>,
    pub notification_channel: String,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            radius_km: DEFAULT_RADIUS_KM,
            retry_after: Duration::seconds(30),
            max_retries: None,
            notification_channel: "delivery_requests".to_string(),
        }
    }
}

/// Everything the dispatch components talk to.
#[derive(Clone)]
pub struct Collaborators {
    pub orders: Arc<dyn OrderStore>,
    pub directory: Arc<dyn UserDirectory>,
    pub gateway: Arc<dyn PushGateway>,
    pub error_log: Arc<dyn ErrorLog>,
    pub clock: Arc<dyn Clock>,
}

pub struct DispatchEngine {
    pub trigger: Arc<DispatchTrigger>,
    pub retry: Arc<RetryScheduler>,
    pub acceptance: Arc<AcceptanceResolver>,
    collaborators: Collaborators,
    policy: DispatchPolicy,
    metrics: Metrics,
}

impl DispatchEngine {
    pub fn new(collaborators: Collaborators, policy: DispatchPolicy, metrics: Metrics) -> Self {
        let locator = Arc::new(CourierLocator::new(collaborators.directory.clone()));
        let fanout = Arc::new(NotificationFanout::new(
            collaborators.gateway.clone(),
            collaborators.error_log.clone(),
            collaborators.clock.clone(),
            metrics.clone(),
        ));

        let trigger = Arc::new(DispatchTrigger::new(
            collaborators.orders.clone(),
            locator.clone(),
            fanout.clone(),
            collaborators.clock.clone(),
            policy.clone(),
            metrics.clone(),
        ));
        let retry = Arc::new(RetryScheduler::new(
            collaborators.orders.clone(),
            locator,
            fanout.clone(),
            collaborators.clock.clone(),
            policy.clone(),
            metrics.clone(),
        ));
        let acceptance = Arc::new(AcceptanceResolver::new(
            collaborators.orders.clone(),
            collaborators.directory.clone(),
            fanout,
            collaborators.clock.clone(),
            policy.clone(),
            metrics.clone(),
        ));

        Self {
            trigger,
            retry,
            acceptance,
            collaborators,
            policy,
            metrics,
        }
    }

    /// The handlers subscribed to the order event stream.
    pub fn handlers(&self) -> Vec<Arc<dyn EventHandler>> {
        let trigger: Arc<dyn EventHandler> = self.trigger.clone();
        let retry: Arc<dyn EventHandler> = self.retry.clone();
        let acceptance: Arc<dyn EventHandler> = self.acceptance.clone();
        vec![trigger, retry, acceptance]
    }

    pub fn sweeper(&self) -> RetrySweeper {
        RetrySweeper::new(
            self.collaborators.orders.clone(),
            self.trigger.clone(),
            self.retry.clone(),
            self.collaborators.clock.clone(),
            self.policy.clone(),
            self.metrics.clone(),
        )
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }
}
