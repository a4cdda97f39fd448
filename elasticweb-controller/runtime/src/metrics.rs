use crate::core::{Error, Outcome};
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, histogram::Histogram},
    registry::{Registry, Unit},
};
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct ReconcileMetrics {
    passes: Family<OutcomeLabels, Counter>,
    errors: Family<ErrorLabels, Counter>,
    duration: Histogram,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct OutcomeLabels {
    outcome: &'static str,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ErrorLabels {
    kind: &'static str,
}

// === impl ReconcileMetrics ===

impl ReconcileMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let passes = Family::default();
        reg.register(
            "passes",
            "Count of reconciliation passes that completed, by outcome",
            passes.clone(),
        );

        let errors = Family::default();
        reg.register(
            "errors",
            "Count of reconciliation passes that failed, by error kind",
            errors.clone(),
        );

        let duration = Histogram::new([0.005, 0.025, 0.1, 0.5, 1.0, 5.0]);
        reg.register_with_unit(
            "duration",
            "Histogram of reconciliation pass latency",
            Unit::Seconds,
            duration.clone(),
        );

        Self {
            passes,
            errors,
            duration,
        }
    }

    pub(crate) fn observe(&self, result: &Result<Outcome, Error>, elapsed: Duration) {
        self.duration.observe(elapsed.as_secs_f64());
        match result {
            Ok(outcome) => {
                let outcome = match outcome {
                    Outcome::ParentMissing => "parent_missing",
                    Outcome::Idle => "idle",
                    Outcome::Bootstrapped { .. } => "bootstrapped",
                    Outcome::Converged { .. } => "converged",
                };
                self.passes.get_or_create(&OutcomeLabels { outcome }).inc();
            }
            Err(error) => {
                let kind = error.kind();
                self.errors.get_or_create(&ErrorLabels { kind }).inc();
            }
        }
    }
}
