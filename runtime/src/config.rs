//! Pipeline configuration.

use std::fmt;
use std::time::Duration;

/// How computations of different events are scheduled relative to each other.
///
/// Within one event, `Loading` always precedes that event's outcome. This
/// policy only decides what happens across events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderingPolicy {
    /// Run every event's computation as soon as it arrives.
    ///
    /// Results interleave by completion time, not by arrival order.
    #[default]
    Concurrent,

    /// Run one computation at a time, in arrival order.
    ///
    /// The next event is not read until the previous computation finished.
    Sequential,

    /// A newly arrived event aborts the computation of the previous one.
    ///
    /// Last event wins. An aborted event may leave a `Loading` without a
    /// matching outcome.
    Latest,
}

impl fmt::Display for OrderingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Concurrent => write!(f, "concurrent"),
            Self::Sequential => write!(f, "sequential"),
            Self::Latest => write!(f, "latest"),
        }
    }
}

/// Configuration for [`Pipeline`](crate::Pipeline) runs
///
/// # Example
///
/// ```
/// use statefold_runtime::{OrderingPolicy, PipelineConfig};
/// use std::time::Duration;
///
/// let config = PipelineConfig::default()
///     .with_name("user-list")
///     .with_ordering(OrderingPolicy::Sequential)
///     .with_shutdown_timeout(Duration::from_secs(1));
///
/// assert_eq!(config.name, "user-list");
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Label used in logs and metrics
    pub name: String,
    /// Capacity of the channel between worker tasks and the fold stage
    pub result_buffer: usize,
    /// Capacity of the channel between the fold stage and the consumer
    pub output_buffer: usize,
    /// Cross-event scheduling
    pub ordering: OrderingPolicy,
    /// Default timeout for [`PipelineHandle::stop`](crate::PipelineHandle::stop)
    pub shutdown_timeout: Duration,
}

impl PipelineConfig {
    /// Create a new configuration with custom values
    ///
    /// Buffer sizes of zero are raised to one.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        result_buffer: usize,
        output_buffer: usize,
        ordering: OrderingPolicy,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            result_buffer: result_buffer.max(1),
            output_buffer: output_buffer.max(1),
            ordering,
            shutdown_timeout,
        }
    }

    /// Set the label used in logs and metrics
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the result channel capacity
    #[must_use]
    pub fn with_result_buffer(mut self, capacity: usize) -> Self {
        self.result_buffer = capacity.max(1);
        self
    }

    /// Set the output channel capacity
    #[must_use]
    pub fn with_output_buffer(mut self, capacity: usize) -> Self {
        self.output_buffer = capacity.max(1);
        self
    }

    /// Set the cross-event ordering policy
    #[must_use]
    pub const fn with_ordering(mut self, ordering: OrderingPolicy) -> Self {
        self.ordering = ordering;
        self
    }

    /// Set the default shutdown timeout
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: "pipeline".to_string(),
            result_buffer: 64,
            output_buffer: 64,
            ordering: OrderingPolicy::default(),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.name, "pipeline");
        assert_eq!(config.result_buffer, 64);
        assert_eq!(config.output_buffer, 64);
        assert_eq!(config.ordering, OrderingPolicy::Concurrent);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
    }

    #[test]
    fn zero_buffers_are_raised_to_one() {
        let config = PipelineConfig::default()
            .with_result_buffer(0)
            .with_output_buffer(0);
        assert_eq!(config.result_buffer, 1);
        assert_eq!(config.output_buffer, 1);

        let config = PipelineConfig::new("p", 0, 0, OrderingPolicy::Latest, Duration::ZERO);
        assert_eq!((config.result_buffer, config.output_buffer), (1, 1));
    }

    #[test]
    fn ordering_display() {
        assert_eq!(OrderingPolicy::Concurrent.to_string(), "concurrent");
        assert_eq!(OrderingPolicy::Sequential.to_string(), "sequential");
        assert_eq!(OrderingPolicy::Latest.to_string(), "latest");
    }
}
