//! Prometheus metrics for pipeline observability.
//!
//! The pipeline records through the `metrics` facade, so nothing is collected
//! until a recorder is installed. [`PrometheusMetrics`] installs the Prometheus
//! recorder and renders the exposition text for the host to serve.
//!
//! # Example
//!
//! ```rust,no_run
//! use statefold_runtime::metrics::PrometheusMetrics;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = PrometheusMetrics::install()?;
//!
//! // Serve `metrics.render()` at /metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::fmt;
use thiserror::Error;

/// Metric names recorded by the pipeline
pub mod names {
    /// Events read from the inbound stream
    pub const EVENTS_TOTAL: &str = "pipeline.events.total";
    /// Results leaving worker tasks, labelled by `kind`
    pub const RESULTS_TOTAL: &str = "pipeline.results.total";
    /// Results dropped as duplicates
    pub const RESULTS_DEDUPLICATED: &str = "pipeline.results.deduplicated";
    /// Models delivered to the consumer, labelled by `kind`
    pub const MODELS_EMITTED: &str = "pipeline.models.emitted";
    /// Time from dispatch to the end of an event's computation
    pub const DISPATCH_DURATION: &str = "pipeline.dispatch.duration_seconds";
    /// Time spent folding one result
    pub const FOLD_DURATION: &str = "pipeline.fold.duration_seconds";
    /// Pipeline runs started
    pub const ACTIVATIONS_TOTAL: &str = "pipeline.activations.total";
    /// Pipeline runs stopped on request
    pub const CANCELLED_TOTAL: &str = "pipeline.cancelled.total";
    /// Worker or stage tasks that panicked
    pub const PANICS_TOTAL: &str = "pipeline.panics.total";

    /// Every name above
    pub const ALL: [&str; 9] = [
        EVENTS_TOTAL,
        RESULTS_TOTAL,
        RESULTS_DEDUPLICATED,
        MODELS_EMITTED,
        DISPATCH_DURATION,
        FOLD_DURATION,
        ACTIVATIONS_TOTAL,
        CANCELLED_TOTAL,
        PANICS_TOTAL,
    ];
}

/// Bucket bounds, in seconds, for the dispatch and fold duration histograms.
pub const DURATION_BUCKETS: &[f64] = &[
    0.000_05, 0.000_25, 0.001, 0.005, 0.025, 0.1, 0.25, 1.0, 2.5, 10.0,
];

/// Failure to set up the Prometheus recorder
#[derive(Error, Debug)]
pub enum MetricsError {
    /// The recorder could not be configured
    #[error("invalid Prometheus recorder configuration: {0}")]
    Build(String),
    /// The recorder could not become the global recorder
    #[error("could not install Prometheus recorder: {0}")]
    Install(String),
}

/// The process-wide Prometheus recorder for pipeline metrics.
///
/// Only one recorder can be installed per process. A second install succeeds
/// without a handle, so [`render`](Self::render) returns `None` there.
#[derive(Default)]
pub struct PrometheusMetrics {
    handle: Option<PrometheusHandle>,
}

impl fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrometheusMetrics")
            .field("installed", &self.handle.is_some())
            .finish()
    }
}

impl PrometheusMetrics {
    /// Describe every pipeline metric and install the recorder with
    /// [`DURATION_BUCKETS`].
    ///
    /// # Errors
    ///
    /// See [`install_with_buckets`](Self::install_with_buckets).
    pub fn install() -> Result<Self, MetricsError> {
        Self::install_with_buckets(DURATION_BUCKETS)
    }

    /// Like [`install`](Self::install) with custom duration buckets.
    ///
    /// # Errors
    ///
    /// - [`MetricsError::Build`] if `buckets` is empty
    /// - [`MetricsError::Install`] if another kind of recorder is in the way
    pub fn install_with_buckets(buckets: &[f64]) -> Result<Self, MetricsError> {
        register_metrics();

        match builder(buckets)?.install_recorder() {
            Ok(handle) => {
                tracing::info!(buckets = buckets.len(), "Pipeline metrics recorder installed");
                Ok(Self {
                    handle: Some(handle),
                })
            },
            Err(e) if e.to_string().contains("already initialized") => {
                tracing::warn!("A metrics recorder is already installed, pipeline metrics go there");
                Ok(Self::default())
            },
            Err(e) => Err(MetricsError::Install(e.to_string())),
        }
    }

    /// Whether this value owns the installed recorder
    #[must_use]
    pub const fn is_installed(&self) -> bool {
        self.handle.is_some()
    }

    /// Prometheus exposition text for the host to serve.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// A Prometheus builder with `buckets` applied to every duration histogram.
///
/// # Errors
///
/// Returns [`MetricsError::Build`] if `buckets` is empty.
pub fn builder(buckets: &[f64]) -> Result<PrometheusBuilder, MetricsError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Suffix("duration_seconds".to_string()), buckets)
        .map_err(|e| MetricsError::Build(e.to_string()))
}

/// Register descriptions for every pipeline metric.
pub fn register_metrics() {
    describe_counter!(names::EVENTS_TOTAL, "Events read from the inbound stream");
    describe_counter!(
        names::RESULTS_TOTAL,
        "Dispatch results produced by worker tasks, by kind"
    );
    describe_counter!(
        names::RESULTS_DEDUPLICATED,
        "Dispatch results dropped as consecutive duplicates"
    );
    describe_counter!(
        names::MODELS_EMITTED,
        "UI models delivered to the consumer, by kind"
    );
    describe_histogram!(
        names::DISPATCH_DURATION,
        metrics::Unit::Seconds,
        "Time from dispatching an event to the end of its computation"
    );
    describe_histogram!(
        names::FOLD_DURATION,
        metrics::Unit::Seconds,
        "Time spent deduplicating and folding one result"
    );
    describe_counter!(names::ACTIVATIONS_TOTAL, "Pipeline runs started");
    describe_counter!(names::CANCELLED_TOTAL, "Pipeline runs stopped on request");
    describe_counter!(names::PANICS_TOTAL, "Pipeline tasks that panicked");
}
