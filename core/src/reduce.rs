//! The pure half of the pipeline: deduplicate, then fold.
//!
//! [`Reduction`] consumes dispatch results one at a time, in the order they
//! leave the worker tasks, and turns each surviving result into the next
//! [`UiModel`]. It has no async code and no locking, so every fold rule can be
//! exercised directly:
//!
//! ```
//! use std::sync::Arc;
//! use statefold_core::bundle::ResultBundle;
//! use statefold_core::reduce::Reduction;
//! use statefold_core::result::DispatchResult;
//!
//! let mut reduction: Reduction<&str, i32, i32> =
//!     Reduction::new(Arc::new(|p: i32, _e: &&str, s: &i32| s + p), 0);
//!
//! let loading = reduction.push(DispatchResult::<_, _, String>::loading("load"));
//! assert!(loading.is_some_and(|m| m.is_loading()));
//!
//! let success = reduction.push(DispatchResult::<_, _, String>::success(ResultBundle::new("load", 42)));
//! assert_eq!(success.map(|m| *m.state()), Some(42));
//! ```

use crate::accumulator::Accumulator;
use crate::bundle::{ResultBundle, Trigger};
use crate::model::UiModel;
use crate::result::DispatchResult;
use std::sync::Arc;

/// What the deduplication step compares: the tag, plus the bundle of a success.
///
/// `B` is a borrowed bundle while comparing and an owned one while remembered.
#[derive(Clone, Debug, PartialEq)]
enum DedupKey<B> {
    Loading,
    Success(B),
    Unique,
}

impl<'a, E, P> DedupKey<&'a ResultBundle<E, P>> {
    fn of<X, F>(result: &'a DispatchResult<E, P, X, F>) -> Self {
        match result {
            DispatchResult::Loading { .. } => Self::Loading,
            DispatchResult::Success(bundle) => Self::Success(bundle),
            DispatchResult::Error { .. } | DispatchResult::Effect { .. } => Self::Unique,
        }
    }

    fn owned(&self) -> DedupKey<ResultBundle<E, P>>
    where
        E: Clone,
        P: Clone,
    {
        match self {
            Self::Loading => DedupKey::Loading,
            Self::Success(bundle) => DedupKey::Success((*bundle).clone()),
            Self::Unique => DedupKey::Unique,
        }
    }
}

impl<E, P> DedupKey<ResultBundle<E, P>> {
    const fn borrowed(&self) -> DedupKey<&ResultBundle<E, P>> {
        match self {
            Self::Loading => DedupKey::Loading,
            Self::Success(bundle) => DedupKey::Success(bundle),
            Self::Unique => DedupKey::Unique,
        }
    }
}

impl<B: PartialEq> DedupKey<B> {
    fn suppresses(&self, next: &Self) -> bool {
        match (self, next) {
            (Self::Loading, Self::Loading) => true,
            (Self::Success(previous), Self::Success(next)) => previous == next,
            _ => false,
        }
    }
}

/// Check whether `next` duplicates the immediately preceding `previous` result.
///
/// Two results are duplicates when both are `Loading` (regardless of event), or
/// when both are successes with structurally equal bundles. Errors and effects
/// are never duplicates.
#[must_use]
pub fn is_duplicate<E, P, X, F>(
    previous: &DispatchResult<E, P, X, F>,
    next: &DispatchResult<E, P, X, F>,
) -> bool
where
    E: PartialEq,
    P: PartialEq,
{
    DedupKey::of(previous).suppresses(&DedupKey::of(next))
}

/// Running dedup + fold over a sequence of dispatch results.
///
/// Owns the accumulated state for the duration of one pipeline run. The state
/// only changes on a success, through the accumulator.
pub struct Reduction<E, P, S> {
    accumulator: Arc<dyn Accumulator<E, P, S>>,
    state: S,
    previous: Option<DedupKey<ResultBundle<E, P>>>,
    accumulated: u64,
}

impl<E, P, S> Reduction<E, P, S>
where
    E: Clone + PartialEq,
    P: Clone + PartialEq,
    S: Clone,
{
    /// Start a reduction from `initial_state`.
    #[must_use]
    pub fn new(accumulator: Arc<dyn Accumulator<E, P, S>>, initial_state: S) -> Self {
        Self {
            accumulator,
            state: initial_state,
            previous: None,
            accumulated: 0,
        }
    }

    /// The seed model: `Idle` carrying the current state.
    #[must_use]
    pub fn seed_model<X, F>(&self) -> UiModel<E, S, X, F> {
        UiModel::idle(ResultBundle::new(Trigger::Idle, self.state.clone()))
    }

    /// The accumulated state so far
    #[must_use]
    pub const fn state(&self) -> &S {
        &self.state
    }

    /// Number of successes folded so far
    #[must_use]
    pub const fn accumulated(&self) -> u64 {
        self.accumulated
    }

    /// Apply one result.
    ///
    /// Returns `None` when the result is dropped as a duplicate of the
    /// preceding one, otherwise the next model:
    ///
    /// - `Loading` → `Loading` with the state unchanged
    /// - `Success` → `Success` with `accumulate(payload, event, state)`
    /// - `Error` → `Error` with the state unchanged
    /// - `Effect` → `Effect` with the state unchanged; the accumulator is not called
    ///
    /// # Panics
    ///
    /// Propagates a panic raised by the accumulator.
    pub fn push<X, F>(
        &mut self,
        result: DispatchResult<E, P, X, F>,
    ) -> Option<UiModel<E, S, X, F>> {
        let key = DedupKey::of(&result);
        let duplicate = self
            .previous
            .as_ref()
            .is_some_and(|previous| previous.borrowed().suppresses(&key));
        // The comparison window always advances, even past a dropped result.
        self.previous = Some(key.owned());
        if duplicate {
            return None;
        }

        let model = match result {
            DispatchResult::Loading { event } => {
                UiModel::loading(ResultBundle::new(Trigger::Event(event), self.state.clone()))
            },
            DispatchResult::Success(bundle) => {
                let (event, payload) = bundle.into_parts();
                self.state = self.accumulator.accumulate(payload, &event, &self.state);
                self.accumulated += 1;
                UiModel::success(ResultBundle::new(Trigger::Event(event), self.state.clone()))
            },
            DispatchResult::Error { error, event } => UiModel::error(
                error,
                ResultBundle::new(Trigger::Event(event), self.state.clone()),
            ),
            DispatchResult::Effect { effect, event } => UiModel::effect(
                effect,
                ResultBundle::new(Trigger::Event(event), self.state.clone()),
            ),
        };
        Some(model)
    }

    /// End the reduction and take the final state.
    #[must_use]
    pub fn into_state(self) -> S {
        self.state
    }
}

impl<E, P, S: std::fmt::Debug> std::fmt::Debug for Reduction<E, P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reduction")
            .field("state", &self.state)
            .field("accumulated", &self.accumulated)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UiModelKind;

    type Result = DispatchResult<&'static str, i32, String>;

    fn summing() -> Reduction<&'static str, i32, i32> {
        Reduction::new(Arc::new(|p: i32, _e: &&'static str, s: &i32| s + p), 0)
    }

    fn success(event: &'static str, payload: i32) -> Result {
        DispatchResult::success(ResultBundle::new(event, payload))
    }

    #[test]
    fn seed_model_is_idle_with_initial_state() {
        let reduction: Reduction<&'static str, i32, i32> =
            Reduction::new(Arc::new(|p: i32, _e: &&'static str, s: &i32| s + p), 7);
        let seed: UiModel<_, _, String> = reduction.seed_model();
        assert!(seed.is_idle());
        assert_eq!(seed.state(), &7);
        assert!(seed.trigger().is_idle());
    }

    #[test]
    fn loading_then_success_accumulates() {
        let mut reduction = summing();

        let loading = reduction.push(Result::loading("load"));
        let success = reduction.push(success("load", 42));

        assert_eq!(loading.map(|m| (m.kind(), *m.state())), Some((UiModelKind::Loading, 0)));
        assert_eq!(success.map(|m| (m.kind(), *m.state())), Some((UiModelKind::Success, 42)));
        assert_eq!(reduction.accumulated(), 1);
    }

    #[test]
    fn error_keeps_previous_state() {
        let mut reduction = summing();
        let _ = reduction.push(Result::loading("load"));
        let _ = reduction.push(success("load", 5));
        let _ = reduction.push(Result::loading("save"));

        let error = reduction.push(Result::error("network".into(), "save"));

        let error = error.map(|m| (m.kind(), m.event().copied(), *m.state()));
        assert_eq!(error, Some((UiModelKind::Error, Some("save"), 5)));
    }

    #[test]
    fn consecutive_loadings_collapse() {
        let mut reduction = summing();
        assert!(reduction.push(Result::loading("a")).is_some());
        assert!(reduction.push(Result::loading("b")).is_none());
    }

    #[test]
    fn equal_consecutive_successes_collapse() {
        let mut reduction = summing();
        let _ = reduction.push(Result::loading("load"));
        assert!(reduction.push(success("load", 1)).is_some());
        assert!(reduction.push(success("load", 1)).is_none());
        assert!(reduction.push(success("load", 2)).is_some());
        assert_eq!(reduction.state(), &3);
        assert_eq!(reduction.accumulated(), 2);
    }

    #[test]
    fn equal_successes_separated_by_loading_are_kept() {
        let mut reduction = summing();
        let _ = reduction.push(Result::loading("load"));
        let _ = reduction.push(success("load", 1));
        let _ = reduction.push(Result::loading("load"));
        assert!(reduction.push(success("load", 1)).is_some());
        assert_eq!(reduction.state(), &2);
    }

    #[test]
    fn errors_are_never_duplicates() {
        let mut reduction = summing();
        let _ = reduction.push(Result::loading("load"));
        assert!(reduction.push(Result::error("a".into(), "load")).is_some());
        assert!(reduction.push(Result::error("a".into(), "load")).is_some());
    }

    #[test]
    fn accumulator_receives_event_and_previous_state() {
        let mut reduction: Reduction<&'static str, i32, Vec<String>> = Reduction::new(
            Arc::new(|p: i32, e: &&'static str, s: &Vec<String>| {
                let mut next = s.clone();
                next.push(format!("{e}:{p}"));
                next
            }),
            vec![],
        );
        let _ = reduction.push(DispatchResult::<_, _, String>::success(ResultBundle::new("a", 1)));
        let _ = reduction.push(DispatchResult::<_, _, String>::success(ResultBundle::new("b", 2)));
        assert_eq!(reduction.into_state(), vec!["a:1".to_string(), "b:2".to_string()]);
    }

    #[test]
    fn is_duplicate_matches_push() {
        assert!(is_duplicate(&Result::loading("a"), &Result::loading("b")));
        assert!(is_duplicate(&success("a", 1), &success("a", 1)));
        assert!(!is_duplicate(&success("a", 1), &success("b", 1)));
        assert!(!is_duplicate(
            &Result::error("x".into(), "a"),
            &Result::error("x".into(), "a")
        ));
        assert!(!is_duplicate(&Result::loading("a"), &success("a", 1)));
    }

    #[test]
    fn effects_skip_the_accumulator() {
        type WithToast = DispatchResult<&'static str, i32, String, &'static str>;

        let mut reduction = summing();
        let _ = reduction.push(WithToast::loading("save"));
        let _ = reduction.push(WithToast::success(ResultBundle::new("save", 3)));

        let effect = reduction.push(WithToast::effect("saved", "save"));
        let effect = effect.map(|m| (m.kind(), m.try_effect().copied(), *m.state()));
        assert_eq!(effect, Some((UiModelKind::Effect, Some("saved"), 3)));
        assert_eq!(reduction.accumulated(), 1);

        // Repeated effects are all delivered
        assert!(reduction.push(WithToast::effect("saved", "save")).is_some());
        assert!(!is_duplicate(
            &WithToast::effect("saved", "save"),
            &WithToast::effect("saved", "save")
        ));
    }

    #[test]
    fn effect_breaks_a_run_of_equal_successes() {
        type WithToast = DispatchResult<&'static str, i32, String, &'static str>;

        let mut reduction = summing();
        let _ = reduction.push(WithToast::success(ResultBundle::new("load", 1)));
        let _ = reduction.push(WithToast::effect("toast", "load"));
        assert!(reduction.push(WithToast::success(ResultBundle::new("load", 1))).is_some());
        assert_eq!(reduction.state(), &2);
    }
}
