use prometheus::{
    Encoder, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub dispatch_outcomes_total: IntCounterVec,
    pub notifications_total: IntCounterVec,
    pub retries_total: IntCounterVec,
    pub acceptances_total: IntCounterVec,
    pub handler_latency_seconds: HistogramVec,
    pub orders_searching: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let dispatch_outcomes_total = IntCounterVec::new(
            Opts::new("dispatch_outcomes_total", "Initial dispatch attempts by outcome"),
            &["outcome"],
        )
        .expect("valid dispatch_outcomes_total metric");

        let notifications_total = IntCounterVec::new(
            Opts::new("notifications_total", "Push notifications by kind and outcome"),
            &["kind", "outcome"],
        )
        .expect("valid notifications_total metric");

        let retries_total = IntCounterVec::new(
            Opts::new("retries_total", "Retry evaluations that did work, by outcome"),
            &["outcome"],
        )
        .expect("valid retries_total metric");

        let acceptances_total = IntCounterVec::new(
            Opts::new("acceptances_total", "Courier acceptance attempts by outcome"),
            &["outcome"],
        )
        .expect("valid acceptances_total metric");

        let handler_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "handler_latency_seconds",
                "Latency of order event handlers in seconds",
            ),
            &["handler"],
        )
        .expect("valid handler_latency_seconds metric");

        let orders_searching = IntGauge::new(
            "orders_searching",
            "Orders currently waiting for a courier to accept",
        )
        .expect("valid orders_searching metric");

        registry
            .register(Box::new(dispatch_outcomes_total.clone()))
            .expect("register dispatch_outcomes_total");
        registry
            .register(Box::new(notifications_total.clone()))
            .expect("register notifications_total");
        registry
            .register(Box::new(retries_total.clone()))
            .expect("register retries_total");
        registry
            .register(Box::new(acceptances_total.clone()))
            .expect("register acceptances_total");
        registry
            .register(Box::new(handler_latency_seconds.clone()))
            .expect("register handler_latency_seconds");
        registry
            .register(Box::new(orders_searching.clone()))
            .expect("register orders_searching");

        Self {
            registry,
            dispatch_outcomes_total,
            notifications_total,
            retries_total,
            acceptances_total,
            handler_latency_seconds,
            orders_searching,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
