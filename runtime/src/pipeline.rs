//! The concurrent reduction pipeline.
//!
//! A run is two tasks joined by channels:
//!
//! ```text
//! events ─▶ dispatch stage ─▶ worker per event ─┐
//!                                                ├─▶ results (mpsc) ─▶ fold stage ─▶ models (mpsc) ─▶ consumer
//!                              worker per event ─┘
//! ```
//!
//! - The **dispatch stage** reads events and spawns one worker per event into a
//!   `JoinSet`. A worker sends `Loading`, then drives the event's computation.
//! - The **fold stage** drains results through a [`Reduction`], runs the
//!   middleware, delivers the model and then records a delivered success into
//!   the [`StateSeed`]. Effects pass through the same path without touching the
//!   state.
//!
//! Stopping goes through a `watch` channel both stages select on. The fold
//! stage owns the seed for the whole run and hands it back through its
//! `JoinHandle`, so only one run can ever write it.

use crate::config::{OrderingPolicy, PipelineConfig};
use crate::error::PipelineError;
use crate::metrics::names;
use crate::middleware::Middleware;
use crate::sink::UiModelSink;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use statefold_core::{
    Accumulator, Dispatch, DispatchResult, Emission, Reduction, ResultBundle, ResultKind,
    StateSeed, StateWatch, UiModel,
};
use std::convert::Infallible;
use std::any::Any;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::{AbortHandle, JoinError, JoinHandle, JoinSet};

type ResultOf<E, D> = DispatchResult<
    E,
    <D as Dispatch<E>>::Payload,
    <D as Dispatch<E>>::Error,
    <D as Dispatch<E>>::Effect,
>;

pub(crate) type SharedMiddleware<E, S, D> =
    Arc<dyn Middleware<E, S, <D as Dispatch<E>>::Error, <D as Dispatch<E>>::Effect>>;

/// Resolves once shutdown is requested.
///
/// If the handle was dropped without stopping, the run is detached and this
/// never resolves.
async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    let requested = shutdown.wait_for(|stop| *stop).await.is_ok();
    if !requested {
        std::future::pending::<()>().await;
    }
}

/// A configured pipeline, ready to be activated any number of times.
///
/// Each [`activate`](Self::activate) starts an independent run that consumes
/// the given [`StateSeed`] and hands it back when it ends.
pub struct Pipeline<E, D: Dispatch<E>, S> {
    dispatch: Arc<D>,
    accumulator: Arc<dyn Accumulator<E, D::Payload, S>>,
    middleware: Option<SharedMiddleware<E, S, D>>,
    config: PipelineConfig,
}

impl<E, D, S> Pipeline<E, D, S>
where
    E: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
    D: Dispatch<E> + 'static,
    D::Payload: Clone + PartialEq + Send + Sync + 'static,
    D::Error: Send + 'static,
    D::Effect: Send + 'static,
    S: Clone + Send + Sync + 'static,
{
    /// Create a pipeline from a dispatch implementation and an accumulator.
    #[must_use]
    pub fn new<A>(dispatch: D, accumulator: A, config: PipelineConfig) -> Self
    where
        A: Accumulator<E, D::Payload, S> + 'static,
    {
        Self::from_shared(Arc::new(dispatch), Arc::new(accumulator), config)
    }

    /// Create a pipeline from already shared parts.
    #[must_use]
    pub fn from_shared(
        dispatch: Arc<D>,
        accumulator: Arc<dyn Accumulator<E, D::Payload, S>>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            dispatch,
            accumulator,
            middleware: None,
            config,
        }
    }

    /// Observe every model after the fold and before delivery
    #[must_use]
    pub fn with_middleware<M>(self, middleware: M) -> Self
    where
        M: Middleware<E, S, D::Error, D::Effect> + 'static,
    {
        self.with_shared_middleware(Arc::new(middleware))
    }

    /// Like [`with_middleware`](Self::with_middleware) for an already shared hook
    #[must_use]
    pub fn with_shared_middleware(mut self, middleware: SharedMiddleware<E, S, D>) -> Self {
        self.middleware = Some(middleware);
        self
    }

    /// The run configuration
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Start a run over `events`, seeded from `seed`.
    ///
    /// The first delivered model is always `Idle` carrying the seed's state.
    /// The run ends when the event stream is exhausted and every computation
    /// has finished, when the handle is stopped, or when the receiver is
    /// dropped.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[tracing::instrument(
        skip_all,
        fields(pipeline = %self.config.name, ordering = %self.config.ordering)
    )]
    pub fn activate<St>(
        &self,
        events: St,
        seed: StateSeed<S>,
    ) -> (PipelineHandle<S>, UiModelReceiver<E, S, D::Error, D::Effect>)
    where
        St: Stream<Item = E> + Send + 'static,
    {
        let name: Arc<str> = Arc::from(self.config.name.as_str());
        tracing::info!("Activating pipeline");
        metrics::counter!(names::ACTIVATIONS_TOTAL, "pipeline" => name.to_string()).increment(1);

        let (shutdown, shutdown_rx) = watch::channel(false);
        let (result_tx, result_rx) = mpsc::channel(self.config.result_buffer);
        let (model_tx, model_rx) = mpsc::channel(self.config.output_buffer);
        let state = seed.watch();

        let dispatch_stage = DispatchStage {
            name: Arc::clone(&name),
            dispatch: Arc::clone(&self.dispatch),
            ordering: self.config.ordering,
            results: result_tx,
            shutdown: shutdown_rx.clone(),
        };
        let dispatch = tokio::spawn(dispatch_stage.run(events.boxed()));

        let fold_stage = FoldStage {
            name: Arc::clone(&name),
            reduction: Reduction::new(Arc::clone(&self.accumulator), seed.get().clone()),
            seed,
            middleware: self.middleware.clone(),
            models: model_tx,
            shutdown: shutdown_rx,
        };
        let fold = tokio::spawn(fold_stage.run(result_rx));

        let handle = PipelineHandle {
            name,
            shutdown,
            dispatch,
            fold,
            state,
            shutdown_timeout: self.config.shutdown_timeout,
        };
        (handle, UiModelReceiver { receiver: model_rx })
    }
}

impl<E, D: Dispatch<E>, S> fmt::Debug for Pipeline<E, D, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("middleware", &self.middleware.is_some())
            .finish_non_exhaustive()
    }
}

struct DispatchStage<E, D: Dispatch<E>> {
    name: Arc<str>,
    dispatch: Arc<D>,
    ordering: OrderingPolicy,
    results: mpsc::Sender<ResultOf<E, D>>,
    shutdown: watch::Receiver<bool>,
}

impl<E, D> DispatchStage<E, D>
where
    E: Clone + fmt::Debug + Send + Sync + 'static,
    D: Dispatch<E> + 'static,
    D::Payload: Send + 'static,
    D::Error: Send + 'static,
    D::Effect: Send + 'static,
{
    async fn run(mut self, mut events: BoxStream<'static, E>) {
        let mut in_flight = JoinSet::new();
        let mut latest: Option<AbortHandle> = None;
        let mut exhausted = false;

        while !(exhausted && in_flight.is_empty()) {
            let accepting = !exhausted
                && (self.ordering != OrderingPolicy::Sequential || in_flight.is_empty());

            tokio::select! {
                biased;

                () = cancelled(&mut self.shutdown) => {
                    tracing::debug!(pipeline = %self.name, in_flight = in_flight.len(), "Dispatch stage cancelled");
                    in_flight.abort_all();
                    return;
                }
                () = self.results.closed() => {
                    tracing::debug!(pipeline = %self.name, "Fold stage gone, aborting computations");
                    in_flight.abort_all();
                    return;
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    self.on_worker_exit(joined);
                }
                next = events.next(), if accepting => match next {
                    Some(event) => {
                        let handle = self.spawn_worker(&mut in_flight, event);
                        if self.ordering == OrderingPolicy::Latest {
                            if let Some(previous) = latest.replace(handle) {
                                previous.abort();
                            }
                        }
                    }
                    None => {
                        tracing::debug!(pipeline = %self.name, "Event stream exhausted");
                        exhausted = true;
                    }
                },
            }
        }
        tracing::debug!(pipeline = %self.name, "Dispatch stage finished");
    }

    fn spawn_worker(&self, in_flight: &mut JoinSet<()>, event: E) -> AbortHandle {
        tracing::debug!(pipeline = %self.name, event = ?event, "Dispatching event");
        metrics::counter!(names::EVENTS_TOTAL, "pipeline" => self.name.to_string()).increment(1);

        in_flight.spawn(run_worker(
            Arc::clone(&self.name),
            Arc::clone(&self.dispatch),
            self.results.clone(),
            event,
        ))
    }

    fn on_worker_exit(&self, joined: Result<(), JoinError>) {
        match joined {
            Ok(()) => {},
            Err(error) if error.is_panic() => {
                tracing::error!(
                    pipeline = %self.name,
                    message = %panic_message(error.into_panic()),
                    "Computation panicked"
                );
                metrics::counter!(names::PANICS_TOTAL, "pipeline" => self.name.to_string(), "stage" => "worker")
                    .increment(1);
            },
            Err(_) => {
                tracing::trace!(pipeline = %self.name, "Computation aborted");
            },
        }
    }
}

/// One event's sub-sequence: `Loading`, then each value or effect, ending at
/// the first error.
async fn run_worker<E, D>(
    name: Arc<str>,
    dispatch: Arc<D>,
    results: mpsc::Sender<ResultOf<E, D>>,
    event: E,
) where
    E: Clone + fmt::Debug + Send + Sync + 'static,
    D: Dispatch<E>,
{
    let started = Instant::now();

    if results.send(DispatchResult::loading(event.clone())).await.is_err() {
        return;
    }
    count_result(&name, ResultKind::Loading);

    let mut computation = dispatch.dispatch(&event);
    while let Some(item) = computation.next().await {
        let result = match item {
            Ok(Emission::Value(payload)) => {
                DispatchResult::success(ResultBundle::new(event.clone(), payload))
            },
            Ok(Emission::Effect(effect)) => DispatchResult::effect(effect, event.clone()),
            Err(error) => {
                tracing::warn!(pipeline = %name, event = ?event, "Computation failed");
                DispatchResult::error(error, event.clone())
            },
        };
        let kind = result.kind();
        if results.send(result).await.is_err() {
            return;
        }
        count_result(&name, kind);
        if kind == ResultKind::Error {
            break;
        }
    }

    metrics::histogram!(names::DISPATCH_DURATION, "pipeline" => name.to_string())
        .record(started.elapsed().as_secs_f64());
}

fn count_result(name: &str, kind: ResultKind) {
    metrics::counter!(
        names::RESULTS_TOTAL,
        "pipeline" => name.to_string(),
        "kind" => kind.as_str()
    )
    .increment(1);
}

struct FoldStage<E, P, S, X, F> {
    name: Arc<str>,
    reduction: Reduction<E, P, S>,
    seed: StateSeed<S>,
    middleware: Option<Arc<dyn Middleware<E, S, X, F>>>,
    models: mpsc::Sender<UiModel<E, S, X, F>>,
    shutdown: watch::Receiver<bool>,
}

impl<E, P, S, X, F> FoldStage<E, P, S, X, F>
where
    E: Clone + PartialEq + Send + Sync + 'static,
    P: Clone + PartialEq + Send + Sync + 'static,
    S: Clone + Send + Sync + 'static,
    X: Send + 'static,
    F: Send + 'static,
{
    async fn run(
        mut self,
        mut results: mpsc::Receiver<DispatchResult<E, P, X, F>>,
    ) -> StateSeed<S> {
        let seed_model = self.reduction.seed_model();
        if !self.deliver(seed_model).await {
            return self.seed;
        }

        loop {
            let result = tokio::select! {
                biased;

                () = cancelled(&mut self.shutdown) => {
                    tracing::debug!(pipeline = %self.name, "Fold stage cancelled");
                    break;
                }
                () = self.models.closed() => {
                    tracing::debug!(pipeline = %self.name, "Consumer dropped, ending run");
                    break;
                }
                next = results.recv() => match next {
                    Some(result) => result,
                    None => break,
                },
            };

            let started = Instant::now();
            let Some(model) = self.reduction.push(result) else {
                tracing::trace!(pipeline = %self.name, "Dropped duplicate result");
                metrics::counter!(names::RESULTS_DEDUPLICATED, "pipeline" => self.name.to_string())
                    .increment(1);
                continue;
            };
            metrics::histogram!(names::FOLD_DURATION, "pipeline" => self.name.to_string())
                .record(started.elapsed().as_secs_f64());

            // Only a success the consumer can still receive reaches the seed.
            let folded = model.is_success().then(|| model.state().clone());
            if !self.deliver(model).await {
                break;
            }
            if let Some(state) = folded {
                self.seed.record(state);
            }
        }

        tracing::debug!(
            pipeline = %self.name,
            accumulated = self.reduction.accumulated(),
            "Fold stage finished"
        );
        self.seed
    }

    /// Returns `false` once nothing more should be delivered.
    async fn deliver(&mut self, model: UiModel<E, S, X, F>) -> bool {
        if let Some(middleware) = &self.middleware {
            middleware.on_model(&model);
        }
        let kind = model.kind();

        tokio::select! {
            biased;

            () = cancelled(&mut self.shutdown) => false,
            sent = self.models.send(model) => {
                if sent.is_err() {
                    tracing::debug!(pipeline = %self.name, "Consumer dropped, ending run");
                    return false;
                }
                metrics::counter!(
                    names::MODELS_EMITTED,
                    "pipeline" => self.name.to_string(),
                    "kind" => kind.as_str()
                )
                .increment(1);
                true
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Stage {
    Dispatch,
    Fold,
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

fn stage_failure(pipeline: &str, stage: Stage, error: JoinError) -> PipelineError {
    if !error.is_panic() {
        return PipelineError::TaskJoin(error);
    }

    let message = panic_message(error.into_panic());
    let (stage_label, failure) = match stage {
        Stage::Fold => (
            "fold",
            PipelineError::FoldPanicked {
                pipeline: pipeline.to_string(),
                message: message.clone(),
            },
        ),
        Stage::Dispatch => (
            "dispatch",
            PipelineError::DispatchStagePanicked {
                pipeline: pipeline.to_string(),
                message: message.clone(),
            },
        ),
    };
    tracing::error!(pipeline, stage = stage_label, message = %message, "Pipeline stage panicked");
    metrics::counter!(names::PANICS_TOTAL, "pipeline" => pipeline.to_string(), "stage" => stage_label)
        .increment(1);
    failure
}

/// Control over one running activation.
///
/// Dropping the handle detaches the run: it keeps going until its events and
/// computations are exhausted or the receiver is dropped, and the seed is
/// lost with it.
#[must_use = "dropping the handle detaches the run and loses its seed"]
pub struct PipelineHandle<S> {
    name: Arc<str>,
    shutdown: watch::Sender<bool>,
    dispatch: JoinHandle<()>,
    fold: JoinHandle<StateSeed<S>>,
    state: StateWatch<S>,
    shutdown_timeout: Duration,
}

impl<S: Clone + Send + 'static> PipelineHandle<S> {
    /// The pipeline's label
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The last state emitted by this run (the seed's state before any success)
    #[must_use]
    pub fn latest_state(&self) -> S {
        self.state.latest()
    }

    /// Follow the state emitted by this run
    #[must_use]
    pub fn state_watch(&self) -> StateWatch<S> {
        self.state.clone()
    }

    /// Whether both stages have ended
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.fold.is_finished() && self.dispatch.is_finished()
    }

    /// Wait for the run to end on its own and take the seed back.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::FoldPanicked`] if the accumulator or middleware panicked
    /// - [`PipelineError::DispatchStagePanicked`] if reading events panicked
    /// - [`PipelineError::TaskJoin`] if a stage was aborted from outside
    pub async fn join(self) -> Result<StateSeed<S>, PipelineError> {
        let Self {
            name,
            shutdown: _shutdown,
            dispatch,
            fold,
            ..
        } = self;

        let seed = fold.await.map_err(|e| stage_failure(&name, Stage::Fold, e))?;
        dispatch
            .await
            .map_err(|e| stage_failure(&name, Stage::Dispatch, e))?;
        tracing::info!(pipeline = %name, "Pipeline completed");
        Ok(seed)
    }

    /// Stop the run using the configured shutdown timeout.
    ///
    /// # Errors
    ///
    /// See [`stop_with_timeout`](Self::stop_with_timeout).
    pub async fn stop(self) -> Result<StateSeed<S>, PipelineError> {
        let timeout = self.shutdown_timeout;
        self.stop_with_timeout(timeout).await
    }

    /// Stop the run and take the seed back.
    ///
    /// In-flight computations are aborted and pending results are discarded.
    /// The seed holds the state of the last success handed to the receiver. A
    /// success still waiting for buffer space when the stop arrives is
    /// dropped and never reaches the seed.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::ShutdownTimeout`] if the stages did not end within
    ///   `timeout`; they are aborted and the seed is lost
    /// - the errors of [`join`](Self::join) if a stage had already failed
    #[tracing::instrument(skip(self), fields(pipeline = %self.name))]
    pub async fn stop_with_timeout(self, timeout: Duration) -> Result<StateSeed<S>, PipelineError> {
        tracing::info!("Stopping pipeline");
        metrics::counter!(names::CANCELLED_TOTAL, "pipeline" => self.name.to_string()).increment(1);

        self.shutdown.send_replace(true);
        let Self {
            name,
            mut dispatch,
            mut fold,
            ..
        } = self;

        let stages = tokio::time::timeout(timeout, async {
            let seed = (&mut fold).await;
            let dispatched = (&mut dispatch).await;
            (seed, dispatched)
        })
        .await;

        if let Ok((seed, dispatched)) = stages {
            let seed = seed.map_err(|e| stage_failure(&name, Stage::Fold, e))?;
            dispatched.map_err(|e| stage_failure(&name, Stage::Dispatch, e))?;
            tracing::info!("Pipeline stopped");
            Ok(seed)
        } else {
            fold.abort();
            dispatch.abort();
            tracing::error!(timeout_ms = timeout.as_millis(), "Shutdown timed out, stages aborted");
            Err(PipelineError::ShutdownTimeout {
                pipeline: name.to_string(),
                timeout,
            })
        }
    }
}

impl<S> fmt::Debug for PipelineHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineHandle")
            .field("name", &self.name)
            .field("fold_finished", &self.fold.is_finished())
            .field("dispatch_finished", &self.dispatch.is_finished())
            .finish_non_exhaustive()
    }
}

/// The single consumer end of a run.
///
/// Models arrive in emission order. The stream ends when the run ends.
pub struct UiModelReceiver<E, S, X, F = Infallible> {
    receiver: mpsc::Receiver<UiModel<E, S, X, F>>,
}

impl<E, S, X, F> UiModelReceiver<E, S, X, F> {
    /// Receive the next model, or `None` once the run has ended
    pub async fn recv(&mut self) -> Option<UiModel<E, S, X, F>> {
        self.receiver.recv().await
    }

    /// Take a model if one is ready, without waiting
    pub fn try_recv(&mut self) -> Option<UiModel<E, S, X, F>> {
        self.receiver.try_recv().ok()
    }

    /// Feed every model to `sink` until the run ends.
    ///
    /// Returns the number of models delivered.
    pub async fn deliver_to<K>(&mut self, sink: &mut K) -> usize
    where
        K: UiModelSink<E, S, X, F> + ?Sized,
    {
        let mut delivered = 0;
        while let Some(model) = self.receiver.recv().await {
            sink.on_model(model);
            delivered += 1;
        }
        tracing::debug!(delivered, "Delivery finished");
        delivered
    }

    /// Collect every model until the run ends
    pub async fn collect_all(mut self) -> Vec<UiModel<E, S, X, F>> {
        let mut models = Vec::new();
        while let Some(model) = self.receiver.recv().await {
            models.push(model);
        }
        models
    }
}

impl<E, S, X, F> Stream for UiModelReceiver<E, S, X, F> {
    type Item = UiModel<E, S, X, F>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl<E, S, X, F> fmt::Debug for UiModelReceiver<E, S, X, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiModelReceiver")
            .field("closed", &self.receiver.is_closed())
            .finish()
    }
}
