//! The caller-supplied merge rule.
//!
//! An [`Accumulator`] folds one success payload into the previous state. It is
//! the only place where use-case logic touches the state, and it should be a
//! pure function.

/// Fold a success payload into the previous state.
///
/// Implemented for any `Fn(P, &E, &S) -> S + Send + Sync`, so most callers
/// pass a closure:
///
/// ```
/// use statefold_core::accumulator::Accumulator;
///
/// let sum = |payload: i32, _event: &&str, previous: &i32| previous + payload;
/// assert_eq!(sum.accumulate(5, &"add", &10), 15);
/// ```
///
/// # Panics
///
/// A panicking accumulator is not contained by the pipeline. The fold stage
/// stops and the run reports the panic when it is joined.
pub trait Accumulator<E, P, S>: Send + Sync {
    /// Produce the next state from `payload`, the `event` that produced it and
    /// the `previous` state.
    fn accumulate(&self, payload: P, event: &E, previous: &S) -> S;
}

impl<E, P, S, F> Accumulator<E, P, S> for F
where
    F: Fn(P, &E, &S) -> S + Send + Sync,
{
    fn accumulate(&self, payload: P, event: &E, previous: &S) -> S {
        self(payload, event, previous)
    }
}

/// Accumulator that replaces the state with the payload.
///
/// Useful when the computation already returns the full next state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplaceState;

impl<E, S> Accumulator<E, S, S> for ReplaceState {
    fn accumulate(&self, payload: S, _event: &E, _previous: &S) -> S {
        payload
    }
}
