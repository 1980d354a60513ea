//! Host-facing lifecycle around a [`Pipeline`].
//!
//! A screen configures its [`ViewModel`] once (accumulator, initial state),
//! then binds and unbinds it as the screen comes and goes. Between runs the
//! view model keeps the [`StateSeed`], so every bind resumes from the last
//! emitted state.
//!
//! A run that ended on its own (its event stream ran out) is reclaimed by the
//! next call that needs the seed, so configuration calls work again as soon
//! as the run is over.
//!
//! ```text
//! set_accumulator ─┐
//! set_initial_state┴─▶ bind(events) ─▶ UiModelReceiver
//!                        │
//!                      unbind() ─▶ seed returned ─▶ bind(events) ...
//! ```

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::middleware::Middleware;
use crate::pipeline::{Pipeline, PipelineHandle, SharedMiddleware, UiModelReceiver};
use futures::{FutureExt, Stream};
use serde::{Serialize, de::DeserializeOwned};
use statefold_core::{Accumulator, Dispatch, StateSeed, StateWatch};
use std::fmt;
use std::sync::Arc;

/// Screen-specific initialization.
///
/// Implemented by each screen's model to receive its accumulator, its initial
/// state and whatever typed collaborators it needs.
///
/// # Example
///
/// ```ignore
/// impl ScreenModel for UserListScreen {
///     type State = UserListState;
///     type Accumulator = UserListAccumulator;
///     type Deps = Arc<UserRepository>;
///
///     fn init(&mut self, accumulator, initial_state, repository) -> Result<(), PipelineError> {
///         self.repository = Some(repository);
///         self.view_model.init(accumulator, initial_state)
///     }
/// }
/// ```
pub trait ScreenModel {
    /// The accumulated state
    type State;

    /// The merge rule for this screen
    type Accumulator;

    /// Typed dependencies
    type Deps;

    /// Configure the screen before its first bind.
    ///
    /// # Errors
    ///
    /// Returns an error if the screen is already bound.
    fn init(
        &mut self,
        accumulator: Self::Accumulator,
        initial_state: Self::State,
        deps: Self::Deps,
    ) -> Result<(), PipelineError>;
}

/// Owns the seed and at most one active run.
pub struct ViewModel<E, D: Dispatch<E>, S> {
    dispatch: Arc<D>,
    accumulator: Option<Arc<dyn Accumulator<E, D::Payload, S>>>,
    middleware: Option<SharedMiddleware<E, S, D>>,
    config: PipelineConfig,
    seed: Option<StateSeed<S>>,
    state: Option<StateWatch<S>>,
    active: Option<PipelineHandle<S>>,
}

impl<E, D, S> ViewModel<E, D, S>
where
    E: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
    D: Dispatch<E> + 'static,
    D::Payload: Clone + PartialEq + Send + Sync + 'static,
    D::Error: Send + 'static,
    D::Effect: Send + 'static,
    S: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create an unconfigured view model.
    #[must_use]
    pub fn new(dispatch: D, config: PipelineConfig) -> Self {
        Self::from_shared(Arc::new(dispatch), config)
    }

    /// Create an unconfigured view model around a shared dispatch.
    #[must_use]
    pub const fn from_shared(dispatch: Arc<D>, config: PipelineConfig) -> Self {
        Self {
            dispatch,
            accumulator: None,
            middleware: None,
            config,
            seed: None,
            state: None,
            active: None,
        }
    }

    /// Observe every model of every run
    #[must_use]
    pub fn with_middleware<M>(mut self, middleware: M) -> Self
    where
        M: Middleware<E, S, D::Error, D::Effect> + 'static,
    {
        self.middleware = Some(Arc::new(middleware));
        self
    }

    /// Install the accumulator. Only the first call has any effect.
    ///
    /// Returns `true` if this call installed it.
    pub fn set_accumulator<A>(&mut self, accumulator: A) -> bool
    where
        A: Accumulator<E, D::Payload, S> + 'static,
    {
        if self.accumulator.is_some() {
            tracing::debug!(pipeline = %self.config.name, "Accumulator already set, ignoring");
            return false;
        }
        self.accumulator = Some(Arc::new(accumulator));
        true
    }

    /// Seed the next run with `state` unless the current seed is equal.
    ///
    /// Returns `true` if the seed changed.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::AlreadyActive`] while a run holds the seed
    /// - the failure of a finished run being reclaimed; the seed is restored
    ///   from its last emitted state and left untouched
    pub fn set_initial_state(&mut self, state: S) -> Result<bool, PipelineError> {
        self.reclaim_finished()?;
        match &mut self.seed {
            Some(seed) => Ok(seed.set(state)),
            None => {
                self.install_seed(StateSeed::new(state));
                Ok(true)
            },
        }
    }

    /// Install the accumulator and the initial state in one call.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::AlreadyActive`] while a run holds the seed.
    pub fn init<A>(&mut self, accumulator: A, initial_state: S) -> Result<(), PipelineError>
    where
        A: Accumulator<E, D::Payload, S> + 'static,
    {
        self.set_accumulator(accumulator);
        self.set_initial_state(initial_state).map(|_| ())
    }

    /// Swap the dispatch used by future runs.
    ///
    /// The accumulator, seed and middleware are kept.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::AlreadyActive`] while a run is going
    /// - the failure of a finished run being reclaimed; the dispatch is not
    ///   replaced
    pub fn replace_dispatch(&mut self, dispatch: D) -> Result<(), PipelineError> {
        self.reclaim_finished()?;
        tracing::debug!(pipeline = %self.config.name, "Dispatch replaced");
        self.dispatch = Arc::new(dispatch);
        Ok(())
    }

    /// Start a run over `events`, resuming from the last emitted state.
    ///
    /// A previous run that already ended on its own is reclaimed first.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::AccumulatorMissing`] if no accumulator was set
    /// - [`PipelineError::InitialStateMissing`] if no initial state was set
    /// - [`PipelineError::AlreadyActive`] if a run is still going
    /// - the failure of a reclaimed run; the seed is restored regardless
    pub async fn bind<St>(
        &mut self,
        events: St,
    ) -> Result<UiModelReceiver<E, S, D::Error, D::Effect>, PipelineError>
    where
        St: Stream<Item = E> + Send + 'static,
    {
        if let Some(handle) = self.active.take() {
            if !handle.is_finished() {
                self.active = Some(handle);
                return Err(self.already_active());
            }
            let joined = handle.join().await;
            self.reclaim(joined)?;
        }

        let accumulator = self
            .accumulator
            .clone()
            .ok_or(PipelineError::AccumulatorMissing)?;
        let seed = self.seed.take().ok_or(PipelineError::InitialStateMissing)?;

        let mut pipeline =
            Pipeline::from_shared(Arc::clone(&self.dispatch), accumulator, self.config.clone());
        if let Some(middleware) = &self.middleware {
            pipeline = pipeline.with_shared_middleware(Arc::clone(middleware));
        }

        let (handle, models) = pipeline.activate(events, seed);
        self.active = Some(handle);
        Ok(models)
    }

    /// Stop the active run and keep its seed for the next bind.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::NotActive`] if nothing is bound
    /// - the failure reported by the run; the seed is rebuilt from the last
    ///   emitted state so the next bind still works
    pub async fn unbind(&mut self) -> Result<(), PipelineError> {
        let handle = self.active.take().ok_or(PipelineError::NotActive)?;
        let stopped = handle.stop().await;
        self.reclaim(stopped)
    }

    /// Whether a run is currently going
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// The last emitted state, or `None` before any initial state was set
    #[must_use]
    pub fn latest_state(&self) -> Option<S> {
        self.state.as_ref().map(StateWatch::latest)
    }

    /// Follow the emitted state across runs of the current seed
    #[must_use]
    pub fn state_watch(&self) -> Option<StateWatch<S>> {
        self.state.clone()
    }

    /// The run configuration
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn install_seed(&mut self, seed: StateSeed<S>) {
        self.state = Some(seed.watch());
        self.seed = Some(seed);
    }

    /// Take the seed back from a run that already ended.
    fn reclaim_finished(&mut self) -> Result<(), PipelineError> {
        let Some(handle) = self.active.take() else {
            return Ok(());
        };
        if !handle.is_finished() {
            self.active = Some(handle);
            return Err(self.already_active());
        }
        match handle.join().now_or_never() {
            Some(joined) => self.reclaim(joined),
            None => {
                // Both stages are done, so this is not expected; fall back to the last state
                if let Some(state) = self.latest_state() {
                    self.install_seed(StateSeed::new(state));
                }
                Ok(())
            },
        }
    }

    fn reclaim(&mut self, ended: Result<StateSeed<S>, PipelineError>) -> Result<(), PipelineError> {
        match ended {
            Ok(seed) => {
                self.seed = Some(seed);
                Ok(())
            },
            Err(error) => {
                if let Some(state) = self.latest_state() {
                    tracing::warn!(
                        pipeline = %self.config.name,
                        error = %error,
                        "Run failed, restoring seed from last emitted state"
                    );
                    self.install_seed(StateSeed::new(state));
                }
                Err(error)
            },
        }
    }

    fn already_active(&self) -> PipelineError {
        PipelineError::AlreadyActive {
            pipeline: self.config.name.clone(),
        }
    }
}

impl<E, D, S> ViewModel<E, D, S>
where
    E: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
    D: Dispatch<E> + 'static,
    D::Payload: Clone + PartialEq + Send + Sync + 'static,
    D::Error: Send + 'static,
    D::Effect: Send + 'static,
    S: Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Encode the last emitted state so the host can persist it.
    ///
    /// Returns `None` before any initial state was set.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Snapshot`] if the state cannot be encoded.
    pub fn snapshot(&self) -> Result<Option<String>, PipelineError> {
        let Some(state) = self.latest_state() else {
            return Ok(None);
        };
        Ok(Some(StateSeed::new(state).to_json()?))
    }

    /// Seed the next run from a snapshot produced by [`snapshot`](Self::snapshot).
    ///
    /// Returns `true` if the seed changed.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Snapshot`] if the snapshot is malformed
    /// - [`PipelineError::AlreadyActive`] while a run holds the seed
    /// - the failure of a finished run being reclaimed
    pub fn restore(&mut self, snapshot: &str) -> Result<bool, PipelineError> {
        let restored = StateSeed::<S>::from_json(snapshot)?;
        self.set_initial_state(restored.into_inner())
    }
}

impl<E, D: Dispatch<E>, S> fmt::Debug for ViewModel<E, D, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewModel")
            .field("config", &self.config)
            .field("accumulator", &self.accumulator.is_some())
            .field("seeded", &self.seed.is_some())
            .field("active", &self.active.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statefold_core::{Computation, UiModel, computation};
    use std::convert::Infallible;

    type Event = u32;

    struct Scaled(u32);

    impl Dispatch<Event> for Scaled {
        type Payload = u32;
        type Error = String;
        type Effect = Infallible;

        fn dispatch(&self, event: &Event) -> Computation<u32, String> {
            computation::ready(Ok(event * self.0))
        }
    }

    fn view_model() -> ViewModel<Event, Scaled, u32> {
        ViewModel::new(Scaled(1), PipelineConfig::default().with_name("vm-test"))
    }

    #[test]
    fn accumulator_first_write_wins() {
        let mut vm = view_model();
        assert!(vm.set_accumulator(|p: u32, _: &Event, s: &u32| s + p));
        assert!(!vm.set_accumulator(|p: u32, _: &Event, _: &u32| p));
    }

    #[test]
    fn initial_state_only_changes_on_different_value() {
        let mut vm = view_model();
        assert_eq!(vm.latest_state(), None);
        assert!(matches!(vm.set_initial_state(1), Ok(true)));
        assert!(matches!(vm.set_initial_state(1), Ok(false)));
        assert!(matches!(vm.set_initial_state(2), Ok(true)));
        assert_eq!(vm.latest_state(), Some(2));
    }

    #[tokio::test]
    async fn bind_requires_accumulator_and_state() {
        let mut vm = view_model();
        assert!(matches!(
            vm.bind(futures::stream::empty()).await,
            Err(PipelineError::AccumulatorMissing)
        ));

        vm.set_accumulator(|p: u32, _: &Event, s: &u32| s + p);
        assert!(matches!(
            vm.bind(futures::stream::empty()).await,
            Err(PipelineError::InitialStateMissing)
        ));
    }

    #[tokio::test]
    async fn unbind_without_bind_is_an_error() {
        let mut vm = view_model();
        assert!(matches!(vm.unbind().await, Err(PipelineError::NotActive)));
    }

    #[tokio::test]
    async fn second_bind_while_running_is_rejected() {
        let mut vm = view_model();
        assert!(vm.init(|p: u32, _: &Event, s: &u32| s + p, 0).is_ok());

        let _models = vm.bind(futures::stream::pending()).await;
        assert!(vm.is_active());
        assert!(matches!(
            vm.bind(futures::stream::empty()).await,
            Err(PipelineError::AlreadyActive { .. })
        ));
        assert!(matches!(
            vm.set_initial_state(9),
            Err(PipelineError::AlreadyActive { .. })
        ));

        assert!(vm.unbind().await.is_ok());
        assert!(!vm.is_active());
    }

    #[tokio::test]
    async fn snapshot_round_trips_through_restore() {
        let mut vm = view_model();
        assert!(matches!(vm.snapshot(), Ok(None)));
        assert!(vm.set_initial_state(41).is_ok());

        let snapshot = vm.snapshot().ok().flatten();
        assert_eq!(snapshot.as_deref(), Some("41"));

        let mut other = view_model();
        assert!(matches!(other.restore("41"), Ok(true)));
        assert_eq!(other.latest_state(), Some(41));
        assert!(matches!(other.restore("nope"), Err(PipelineError::Snapshot(_))));
    }

    #[tokio::test]
    async fn replaced_dispatch_serves_the_next_bind() {
        let mut vm = view_model();
        assert!(vm.init(|p: u32, _: &Event, s: &u32| s + p, 0).is_ok());

        let models = vm.bind(futures::stream::iter([2])).await;
        let states: Vec<u32> = match models {
            Ok(models) => models.collect_all().await.iter().map(|m| *m.state()).collect(),
            Err(_) => Vec::new(),
        };
        assert_eq!(states, vec![0, 0, 2]);
        assert!(vm.unbind().await.is_ok());

        assert!(vm.replace_dispatch(Scaled(10)).is_ok());
        let models = vm.bind(futures::stream::iter([2])).await;
        let last = match models {
            Ok(models) => models.collect_all().await.pop().map(UiModel::into_state),
            Err(_) => None,
        };
        assert_eq!(last, Some(22));
    }

    #[tokio::test]
    async fn dispatch_cannot_be_replaced_mid_run() {
        let mut vm = view_model();
        assert!(vm.init(|p: u32, _: &Event, s: &u32| s + p, 0).is_ok());

        let _models = vm.bind(futures::stream::pending()).await;
        assert!(matches!(
            vm.replace_dispatch(Scaled(3)),
            Err(PipelineError::AlreadyActive { .. })
        ));
        assert!(vm.unbind().await.is_ok());
        assert!(vm.replace_dispatch(Scaled(3)).is_ok());
    }
}
