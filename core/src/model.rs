//! UI-facing state snapshots.
//!
//! A [`UiModel`] is what the consuming context observes. Every variant
//! carries the accumulated state, so a `Loading`, `Error` or `Effect` model
//! never loses the state reached by earlier successes.

use crate::bundle::{ResultBundle, Trigger};
use std::convert::Infallible;
use std::fmt;

/// Bundle carried by every [`UiModel`]: the trigger and the accumulated state.
pub type StateBundle<E, S> = ResultBundle<Trigger<E>, S>;

/// A point-in-time UI state derived from dispatch results.
///
/// # Transitions
///
/// ```text
/// Idle ──event──▶ Loading ──▶ Success ─┐
///                    ▲    └──▶ Error ──┤
///                    └──── next event ─┘
/// ```
///
/// `Idle` is only the seed of a pipeline run and is never re-entered.
/// `Effect` can follow any model; it carries the state unchanged.
#[derive(Clone, Debug)]
pub enum UiModel<E, S, X, F = Infallible> {
    /// Seed model, emitted before any event
    Idle(StateBundle<E, S>),

    /// An event's computation is in flight
    Loading(StateBundle<E, S>),

    /// A success was folded into the state
    Success(StateBundle<E, S>),

    /// A computation failed; state is unchanged
    Error {
        /// The failure
        error: X,
        /// Trigger and unchanged state
        bundle: StateBundle<E, S>,
    },

    /// A one-shot effect requested by a computation; state is unchanged
    Effect {
        /// The effect
        effect: F,
        /// Trigger and unchanged state
        bundle: StateBundle<E, S>,
    },
}

/// Field-less tag of a [`UiModel`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UiModelKind {
    /// `UiModel::Idle`
    Idle,
    /// `UiModel::Loading`
    Loading,
    /// `UiModel::Success`
    Success,
    /// `UiModel::Error`
    Error,
    /// `UiModel::Effect`
    Effect,
}

impl UiModelKind {
    /// Static label for metrics
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Success => "success",
            Self::Error => "error",
            Self::Effect => "effect",
        }
    }
}

impl fmt::Display for UiModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Loading => write!(f, "Loading"),
            Self::Success => write!(f, "Success"),
            Self::Error => write!(f, "Error"),
            Self::Effect => write!(f, "Effect"),
        }
    }
}

impl<E, S, X, F> UiModel<E, S, X, F> {
    /// The seed model
    #[must_use]
    pub const fn idle(bundle: StateBundle<E, S>) -> Self {
        Self::Idle(bundle)
    }

    /// A loading model
    #[must_use]
    pub const fn loading(bundle: StateBundle<E, S>) -> Self {
        Self::Loading(bundle)
    }

    /// A success model
    #[must_use]
    pub const fn success(bundle: StateBundle<E, S>) -> Self {
        Self::Success(bundle)
    }

    /// An error model
    #[must_use]
    pub const fn error(error: X, bundle: StateBundle<E, S>) -> Self {
        Self::Error { error, bundle }
    }

    /// An effect model
    #[must_use]
    pub const fn effect(effect: F, bundle: StateBundle<E, S>) -> Self {
        Self::Effect { effect, bundle }
    }

    /// The variant tag
    #[must_use]
    pub const fn kind(&self) -> UiModelKind {
        match self {
            Self::Idle(_) => UiModelKind::Idle,
            Self::Loading(_) => UiModelKind::Loading,
            Self::Success(_) => UiModelKind::Success,
            Self::Error { .. } => UiModelKind::Error,
            Self::Effect { .. } => UiModelKind::Effect,
        }
    }

    /// Check if this is the seed model
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle(_))
    }

    /// Check if this is a loading model
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading(_))
    }

    /// Check if this is a success model
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Check if this is an error model
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Check if this is an effect model
    #[must_use]
    pub const fn is_effect(&self) -> bool {
        matches!(self, Self::Effect { .. })
    }

    /// The `(trigger, state)` bundle
    #[must_use]
    pub const fn bundle(&self) -> &StateBundle<E, S> {
        match self {
            Self::Idle(bundle)
            | Self::Loading(bundle)
            | Self::Success(bundle)
            | Self::Error { bundle, .. }
            | Self::Effect { bundle, .. } => bundle,
        }
    }

    /// The accumulated state
    #[must_use]
    pub const fn state(&self) -> &S {
        self.bundle().payload()
    }

    /// The trigger (idle marker or event)
    #[must_use]
    pub const fn trigger(&self) -> &Trigger<E> {
        self.bundle().event()
    }

    /// The event that produced this model, `None` for the seed model
    #[must_use]
    pub const fn event(&self) -> Option<&E> {
        self.trigger().event()
    }

    /// The failure, if this is an error model
    #[must_use]
    pub const fn try_error(&self) -> Option<&X> {
        match self {
            Self::Error { error, .. } => Some(error),
            _ => None,
        }
    }

    /// The effect, if this is an effect model
    #[must_use]
    pub const fn try_effect(&self) -> Option<&F> {
        match self {
            Self::Effect { effect, .. } => Some(effect),
            _ => None,
        }
    }

    /// The failure
    ///
    /// # Panics
    ///
    /// Panics if this model is not an error model.
    #[must_use]
    #[allow(clippy::panic)] // Wrong-tag access is a contract violation
    pub fn error_ref(&self) -> &X {
        match self.try_error() {
            Some(error) => error,
            None => panic!("error_ref() called on a {} model", self.kind()),
        }
    }

    /// Take the accumulated state out of the model
    #[must_use]
    pub fn into_state(self) -> S {
        match self {
            Self::Idle(bundle)
            | Self::Loading(bundle)
            | Self::Success(bundle)
            | Self::Error { bundle, .. }
            | Self::Effect { bundle, .. } => bundle.into_parts().1,
        }
    }
}

impl<E, S, X, F> PartialEq for UiModel<E, S, X, F>
where
    E: PartialEq,
    S: PartialEq,
    X: PartialEq,
    F: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Idle(a), Self::Idle(b))
            | (Self::Loading(a), Self::Loading(b))
            | (Self::Success(a), Self::Success(b)) => a == b,
            (
                Self::Error { error: ea, bundle: a },
                Self::Error { error: eb, bundle: b },
            ) => ea == eb && a == b,
            (
                Self::Effect { effect: fa, bundle: a },
                Self::Effect { effect: fb, bundle: b },
            ) => fa == fb && a == b,
            _ => false,
        }
    }
}

impl<E, S, X, F> fmt::Display for UiModel<E, S, X, F>
where
    E: fmt::Debug,
    S: fmt::Debug,
    X: fmt::Display,
    F: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error { error, bundle } => write!(
                f,
                "State: Error, event: {}, error: {error}",
                bundle.event()
            ),
            Self::Success(bundle) => write!(
                f,
                "State: Success, event: {}, bundle: {:?}",
                bundle.event(),
                bundle.payload()
            ),
            Self::Effect { effect, bundle } => write!(
                f,
                "State: Effect, event: {}, effect: {effect:?}",
                bundle.event()
            ),
            other => write!(f, "State: {}, event: {}", other.kind(), other.trigger()),
        }
    }
}
