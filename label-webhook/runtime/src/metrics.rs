use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, histogram::Histogram},
    registry::{Registry, Unit},
};
use tokio::time;

#[derive(Clone, Debug)]
pub struct AdmissionMetrics {
    reviews: Family<ReviewLabels, Counter>,
    duration: Histogram,
}

/// Records the outcome of a single review.
pub(crate) struct ReviewObserver {
    start: time::Instant,
    metrics: AdmissionMetrics,
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub(crate) enum Decision {
    Allowed,
    Patched,
    Denied,
    Invalid,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ReviewLabels {
    kind: String,
    decision: &'static str,
}

// === impl AdmissionMetrics ===

impl AdmissionMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let reviews = Family::<ReviewLabels, Counter>::default();
        reg.register(
            "reviews",
            "Total number of admission reviews handled, by object kind and decision",
            reviews.clone(),
        );

        let duration = Histogram::new([0.0005, 0.001, 0.005, 0.01, 0.05, 0.1]);
        reg.register_with_unit(
            "review_duration",
            "Histogram of time spent deciding admission reviews",
            Unit::Seconds,
            duration.clone(),
        );

        Self { reviews, duration }
    }

    pub(crate) fn start(&self) -> ReviewObserver {
        ReviewObserver {
            start: time::Instant::now(),
            metrics: self.clone(),
        }
    }
}

impl Default for AdmissionMetrics {
    /// Metrics that are not exported.
    fn default() -> Self {
        Self::register(&mut Registry::default())
    }
}

// === impl ReviewObserver ===

impl ReviewObserver {
    pub(crate) fn end(self, kind: &str, decision: Decision) {
        let Self { start, metrics } = self;
        metrics.duration.observe(start.elapsed().as_secs_f64());
        metrics
            .reviews
            .get_or_create(&ReviewLabels {
                kind: kind.to_string(),
                decision: decision.as_str(),
            })
            .inc();
    }
}

// === impl Decision ===

impl Decision {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::Patched => "patched",
            Self::Denied => "denied",
            Self::Invalid => "invalid",
        }
    }
}
