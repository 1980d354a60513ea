//! # Statefold Testing
//!
//! Testing utilities and helpers for the Statefold architecture.
//!
//! This crate provides:
//! - Scripted [`Dispatch`](statefold_core::Dispatch) implementations with
//!   controllable timing
//! - An accumulator that records every call
//! - A Given-When-Then harness for whole pipeline runs
//! - Assertion helpers for model sequences
//! - proptest strategies for scripts
//!
//! ## Example
//!
//! ```
//! use statefold_core::UiModelKind;
//! use statefold_testing::{PipelineTest, Script, ScriptedDispatch};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let dispatch = ScriptedDispatch::new().on("load", Script::<i32, String>::new().emit(42));
//!
//! PipelineTest::new(dispatch, |p: i32, _: &&str, s: &i32| s + p)
//!     .given_state(0)
//!     .when_events(["load"])
//!     .then_kinds(&[UiModelKind::Idle, UiModelKind::Loading, UiModelKind::Success])
//!     .then_state(|state| assert_eq!(*state, 42))
//!     .run()
//!     .await;
//! # }
//! ```


/// Mock implementations for testing.
pub mod mocks {
    use futures::StreamExt;
    use statefold_core::{Accumulator, Computation, Dispatch, Emission, computation};
    use std::convert::Infallible;
    use std::fmt;
    use std::sync::{Arc, Mutex, PoisonError};
    use std::time::Duration;

    /// One step of a scripted computation
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Step<P, X, F = Infallible> {
        /// Yield a value
        Emit(P),
        /// Yield a one-shot effect
        Effect(F),
        /// Yield a failure (ends the computation)
        Fail(X),
        /// Sleep on the tokio clock
        Delay(Duration),
    }

    /// A computation described as data.
    ///
    /// # Example
    ///
    /// ```
    /// use statefold_testing::mocks::Script;
    /// use std::time::Duration;
    ///
    /// let script: Script<u32, String> = Script::new()
    ///     .delay(Duration::from_millis(50))
    ///     .emit(1)
    ///     .fail("offline".to_string());
    /// assert_eq!(script.steps().len(), 3);
    /// ```
    ///
    /// Scripts that emit effects name the effect type and start from
    /// [`Script::default`]:
    ///
    /// ```
    /// use statefold_testing::mocks::Script;
    ///
    /// let script: Script<u32, String, &str> = Script::default().emit(1).effect("saved");
    /// assert_eq!(script.steps().len(), 2);
    /// ```
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Script<P, X, F = Infallible> {
        steps: Vec<Step<P, X, F>>,
    }

    impl<P, X> Script<P, X> {
        /// An empty script: the computation completes without a value
        #[must_use]
        pub const fn new() -> Self {
            Self { steps: Vec::new() }
        }
    }

    impl<P, X, F> Script<P, X, F> {
        /// Append a value
        #[must_use]
        pub fn emit(mut self, payload: P) -> Self {
            self.steps.push(Step::Emit(payload));
            self
        }

        /// Append a failure
        #[must_use]
        pub fn fail(mut self, error: X) -> Self {
            self.steps.push(Step::Fail(error));
            self
        }

        /// Append an effect
        #[must_use]
        pub fn effect(mut self, effect: F) -> Self {
            self.steps.push(Step::Effect(effect));
            self
        }

        /// Append a pause
        #[must_use]
        pub fn delay(mut self, duration: Duration) -> Self {
            self.steps.push(Step::Delay(duration));
            self
        }

        /// The steps in order
        #[must_use]
        pub fn steps(&self) -> &[Step<P, X, F>] {
            &self.steps
        }
    }

    impl<P, X, F> Default for Script<P, X, F> {
        fn default() -> Self {
            Self { steps: Vec::new() }
        }
    }

    impl<P, X, F> Script<P, X, F>
    where
        P: Send + 'static,
        X: Send + 'static,
        F: Send + 'static,
    {
        /// Turn the script into a lazily polled computation
        #[must_use]
        pub fn into_computation(self) -> Computation<P, X, F> {
            let steps = self.steps;
            async_stream::stream! {
                for step in steps {
                    match step {
                        Step::Emit(payload) => {
                            yield Ok(Emission::Value(payload));
                        },
                        Step::Effect(effect) => {
                            yield Ok(Emission::Effect(effect));
                        },
                        Step::Fail(error) => {
                            yield Err(error);
                        },
                        Step::Delay(duration) => tokio::time::sleep(duration).await,
                    }
                }
            }
            .boxed()
        }
    }

    /// Dispatch that plays a [`Script`] per event and records what it saw.
    ///
    /// Clones share the dispatch log, so a test can keep one clone while the
    /// pipeline owns another.
    ///
    /// Dispatches with effects start from [`ScriptedDispatch::default`].
    pub struct ScriptedDispatch<E, P, X, F = Infallible> {
        scripts: Vec<(E, Script<P, X, F>)>,
        fallback: Option<Script<P, X, F>>,
        dispatched: Arc<Mutex<Vec<E>>>,
    }

    impl<E, P, X> ScriptedDispatch<E, P, X> {
        /// A dispatch with no scripts; unknown events complete empty
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl<E, P, X, F> ScriptedDispatch<E, P, X, F> {
        /// Play `script` whenever `event` is dispatched
        #[must_use]
        pub fn on(mut self, event: E, script: Script<P, X, F>) -> Self {
            self.scripts.push((event, script));
            self
        }

        /// Play `script` for events without their own script
        #[must_use]
        pub fn otherwise(mut self, script: Script<P, X, F>) -> Self {
            self.fallback = Some(script);
            self
        }
    }

    impl<E: Clone, P, X, F> ScriptedDispatch<E, P, X, F> {
        /// Events dispatched so far, in dispatch order
        #[must_use]
        pub fn dispatched(&self) -> Vec<E> {
            self.dispatched
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Number of dispatch calls so far
        #[must_use]
        pub fn dispatch_count(&self) -> usize {
            self.dispatched
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len()
        }
    }

    impl<E, P, X, F> Default for ScriptedDispatch<E, P, X, F> {
        fn default() -> Self {
            Self {
                scripts: Vec::new(),
                fallback: None,
                dispatched: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl<E: Clone, P: Clone, X: Clone, F: Clone> Clone for ScriptedDispatch<E, P, X, F> {
        fn clone(&self) -> Self {
            Self {
                scripts: self.scripts.clone(),
                fallback: self.fallback.clone(),
                dispatched: Arc::clone(&self.dispatched),
            }
        }
    }

    impl<E, P, X, F> Dispatch<E> for ScriptedDispatch<E, P, X, F>
    where
        E: Clone + PartialEq + Send + Sync,
        P: Clone + Send + Sync + 'static,
        X: Clone + Send + Sync + 'static,
        F: Clone + Send + Sync + 'static,
    {
        type Payload = P;
        type Error = X;
        type Effect = F;

        fn dispatch(&self, event: &E) -> Computation<P, X, F> {
            self.dispatched
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event.clone());

            self.scripts
                .iter()
                .find(|(scripted, _)| scripted == event)
                .map(|(_, script)| script)
                .or(self.fallback.as_ref())
                .cloned()
                .map_or_else(computation::empty, Script::into_computation)
        }
    }

    impl<E: fmt::Debug, P, X, F> fmt::Debug for ScriptedDispatch<E, P, X, F> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("ScriptedDispatch")
                .field("scripted_events", &self.scripts.iter().map(|(e, _)| e).collect::<Vec<_>>())
                .field("has_fallback", &self.fallback.is_some())
                .finish_non_exhaustive()
        }
    }

    /// Accumulator wrapper that records each `(event, payload)` it folds.
    pub struct RecordingAccumulator<E, P, S> {
        inner: Arc<dyn Accumulator<E, P, S>>,
        calls: Arc<Mutex<Vec<(E, P)>>>,
    }

    impl<E, P, S> RecordingAccumulator<E, P, S> {
        /// Record calls, delegating the merge to `inner`
        #[must_use]
        pub fn new<A>(inner: A) -> Self
        where
            A: Accumulator<E, P, S> + 'static,
        {
            Self {
                inner: Arc::new(inner),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl<E: Clone, P: Clone, S> RecordingAccumulator<E, P, S> {
        /// Calls so far, in fold order
        #[must_use]
        pub fn calls(&self) -> Vec<(E, P)> {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Number of calls so far
        #[must_use]
        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
        }
    }

    impl<E, P, S> Clone for RecordingAccumulator<E, P, S> {
        fn clone(&self) -> Self {
            Self {
                inner: Arc::clone(&self.inner),
                calls: Arc::clone(&self.calls),
            }
        }
    }

    impl<E, P, S> Accumulator<E, P, S> for RecordingAccumulator<E, P, S>
    where
        E: Clone + Send + Sync,
        P: Clone + Send + Sync,
    {
        fn accumulate(&self, payload: P, event: &E, previous: &S) -> S {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((event.clone(), payload.clone()));
            self.inner.accumulate(payload, event, previous)
        }
    }

    impl<E, P, S> fmt::Debug for RecordingAccumulator<E, P, S> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("RecordingAccumulator").finish_non_exhaustive()
        }
    }
}

/// Test helpers and utilities.
pub mod helpers {
    use tracing_subscriber::EnvFilter;

    /// Install a test-friendly `tracing` subscriber honouring `RUST_LOG`.
    ///
    /// Safe to call from every test; only the first call installs anything.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use super::mocks::Script;
    use proptest::prelude::*;

    /// Scripts of up to `max_steps` values, sometimes ending in a failure.
    ///
    /// Payloads are drawn from a small range so equal consecutive values
    /// (and therefore deduplication) come up often.
    pub fn scripts(max_steps: usize) -> impl Strategy<Value = Script<i32, String>> {
        (
            prop::collection::vec(0_i32..4, 0..=max_steps),
            prop::option::of("[a-z]{1,6}"),
        )
            .prop_map(|(values, failure)| {
                let script = values.into_iter().fold(Script::new(), Script::emit);
                match failure {
                    Some(error) => script.fail(error),
                    None => script,
                }
            })
    }
}

// Re-export commonly used items
pub use helpers::init_test_tracing;
pub use mocks::{RecordingAccumulator, Script, ScriptedDispatch, Step};
pub use pipeline_test::{PipelineTest, assertions};
