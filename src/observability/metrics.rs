use prometheus::{Encoder, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub rides_created_total: IntCounterVec,
    pub ride_creation_latency_seconds: HistogramVec,
    pub ride_status_updates_total: IntCounterVec,
    pub best_effort_failures_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let rides_created_total = IntCounterVec::new(
            Opts::new("rides_created_total", "Ride creation attempts by outcome"),
            &["outcome"],
        )
        .expect("valid rides_created_total metric");

        let ride_creation_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "ride_creation_latency_seconds",
                "Latency of the ride creation sequence in seconds",
            ),
            &["outcome"],
        )
        .expect("valid ride_creation_latency_seconds metric");

        let ride_status_updates_total = IntCounterVec::new(
            Opts::new(
                "ride_status_updates_total",
                "Committed ride status updates by target status",
            ),
            &["status"],
        )
        .expect("valid ride_status_updates_total metric");

        let best_effort_failures_total = IntCounterVec::new(
            Opts::new(
                "best_effort_failures_total",
                "Follow-up steps that failed without failing the request",
            ),
            &["step"],
        )
        .expect("valid best_effort_failures_total metric");

        registry
            .register(Box::new(rides_created_total.clone()))
            .expect("register rides_created_total");
        registry
            .register(Box::new(ride_creation_latency_seconds.clone()))
            .expect("register ride_creation_latency_seconds");
        registry
            .register(Box::new(ride_status_updates_total.clone()))
            .expect("register ride_status_updates_total");
        registry
            .register(Box::new(best_effort_failures_total.clone()))
            .expect("register best_effort_failures_total");

        Self {
            registry,
            rides_created_total,
            ride_creation_latency_seconds,
            ride_status_updates_total,
            best_effort_failures_total,
        }
    }

    pub fn best_effort_failure(&self, step: &str) {
        self.best_effort_failures_total
            .with_label_values(&[step])
            .inc();
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
