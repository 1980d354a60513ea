//! # Statefold Runtime
//!
//! Tokio runtime for the Statefold architecture.
//!
//! This crate wires the pure pieces of `statefold-core` into a concurrent
//! pipeline and gives hosts a lifecycle around it.
//!
//! ## Core Components
//!
//! - **Pipeline**: dispatch stage, per-event workers and the fold stage,
//!   connected by bounded channels
//! - **`PipelineHandle`**: stop, join and observe one run
//! - **`UiModelReceiver`**: the single consumer end, also a `Stream`
//! - **`ViewModel`**: keeps the seed between runs so rebinding resumes
//!   from the last emitted state
//! - **Sinks**: [`View`] + [`ViewObserver`] for screen-style consumers
//!
//! Computations may also emit one-shot effects. They travel the same model
//! stream as `UiModel::Effect`, in order with the states, but never touch the
//! accumulator or the seed.
//!
//! ## Example
//!
//! ```
//! use statefold_core::{computation, dispatch_fn, Computation, StateSeed};
//! use statefold_runtime::{Pipeline, PipelineConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let dispatch = dispatch_fn(|page: &u32| -> Computation<u32, String> {
//!     computation::ready(Ok(page * 10))
//! });
//! let pipeline: Pipeline<u32, _, u32> = Pipeline::new(
//!     dispatch,
//!     |rows: u32, _page: &u32, total: &u32| total + rows,
//!     PipelineConfig::default(),
//! );
//!
//! let (handle, models) = pipeline.activate(futures::stream::iter([1, 2]), StateSeed::new(0));
//! let models = models.collect_all().await;
//!
//! assert!(models[0].is_idle());
//! assert_eq!(models.last().map(|m| *m.state()), Some(30));
//! assert_eq!(handle.join().await.map(StateSeed::into_inner).ok(), Some(30));
//! # }
//! ```

/// Pipeline configuration
pub mod config;

/// Prometheus metrics for observability
pub mod metrics;

/// Hooks observing emitted models
pub mod middleware;

/// The concurrent reduction pipeline
pub mod pipeline;

/// Consumer-side sinks and view adapters
pub mod sink;

/// Host-facing view model lifecycle
pub mod view_model;

pub use config::{OrderingPolicy, PipelineConfig};
pub use error::PipelineError;
pub use middleware::{LoggingMiddleware, Middleware};
pub use pipeline::{Pipeline, PipelineHandle, UiModelReceiver};
pub use sink::{DisplayMessage, ErrorMessageFactory, UiModelSink, View, ViewObserver};
pub use view_model::{ScreenModel, ViewModel};

/// Error types for the pipeline runtime
pub mod error {
    use statefold_core::SnapshotError;
    use std::time::Duration;
    use thiserror::Error;

    /// Errors that can occur while configuring, running or stopping a pipeline
    #[derive(Error, Debug)]
    pub enum PipelineError {
        /// `bind` was called before an accumulator was set
        #[error("No accumulator set, call set_accumulator before bind")]
        AccumulatorMissing,

        /// `bind` was called before an initial state was set
        #[error("No initial state set, call set_initial_state before bind")]
        InitialStateMissing,

        /// A run is in progress and holds the seed
        #[error("Pipeline '{pipeline}' is already active")]
        AlreadyActive {
            /// Pipeline label
            pipeline: String,
        },

        /// `unbind` was called with nothing bound
        #[error("Pipeline is not active")]
        NotActive,

        /// The accumulator or middleware panicked; the run was terminated
        ///
        /// The seed of that run is lost. The last state recorded before the
        /// panic is still readable through its `StateWatch`.
        #[error("Fold stage of '{pipeline}' panicked: {message}")]
        FoldPanicked {
            /// Pipeline label
            pipeline: String,
            /// Panic payload, if it was a string
            message: String,
        },

        /// Reading the event stream panicked
        #[error("Dispatch stage of '{pipeline}' panicked: {message}")]
        DispatchStagePanicked {
            /// Pipeline label
            pipeline: String,
            /// Panic payload, if it was a string
            message: String,
        },

        /// A stage task was cancelled from outside the pipeline
        #[error("Pipeline task failed: {0}")]
        TaskJoin(#[from] tokio::task::JoinError),

        /// The stages did not end in time after a stop request
        ///
        /// Both stages are aborted and the seed is lost.
        #[error("Shutdown of '{pipeline}' timed out after {timeout:?}")]
        ShutdownTimeout {
            /// Pipeline label
            pipeline: String,
            /// How long the stop waited
            timeout: Duration,
        },

        /// A state snapshot could not be encoded or decoded
        #[error(transparent)]
        Snapshot(#[from] SnapshotError),
    }
}
