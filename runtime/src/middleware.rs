//! Hooks observing every emitted model before it reaches the consumer.

use statefold_core::UiModel;
use std::convert::Infallible;
use std::fmt;

/// Observe each model after the fold and before delivery.
///
/// Runs on the fold stage, so it must be cheap and must not block.
pub trait Middleware<E, S, X, F = Infallible>: Send + Sync {
    /// Called once per emitted model, in emission order.
    fn on_model(&self, model: &UiModel<E, S, X, F>);
}

impl<E, S, X, F, H> Middleware<E, S, X, F> for H
where
    H: Fn(&UiModel<E, S, X, F>) + Send + Sync,
{
    fn on_model(&self, model: &UiModel<E, S, X, F>) {
        self(model);
    }
}

/// Logs every model at debug level and failures at error level.
#[derive(Debug, Clone, Default)]
pub struct LoggingMiddleware {
    pipeline: String,
}

impl LoggingMiddleware {
    /// Create a logger labelled with the pipeline name
    #[must_use]
    pub fn new(pipeline: impl Into<String>) -> Self {
        Self {
            pipeline: pipeline.into(),
        }
    }

    /// The pipeline label attached to every record
    #[must_use]
    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }
}

impl<E, S, X, F> Middleware<E, S, X, F> for LoggingMiddleware
where
    E: fmt::Debug,
    S: fmt::Debug,
    X: fmt::Display,
    F: fmt::Debug,
{
    fn on_model(&self, model: &UiModel<E, S, X, F>) {
        tracing::debug!(pipeline = %self.pipeline, "UiModel: {model}");
        if let Some(error) = model.try_error() {
            tracing::error!(
                pipeline = %self.pipeline,
                event = %model.trigger(),
                error = %error,
                "Dispatch failed"
            );
        }
    }
}
