use crate::engine::RideOrchestrator;
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub orchestrator: RideOrchestrator,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(orchestrator: RideOrchestrator) -> Self {
        let metrics = orchestrator.metrics().clone();

        Self {
            orchestrator,
            metrics,
        }
    }
}
