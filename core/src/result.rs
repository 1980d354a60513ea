//! Outcome of one dispatch attempt.
//!
//! Every event produces a short sub-sequence of [`DispatchResult`]s:
//! a `Loading` marker first, then zero or more `Success` values or `Effect`s,
//! optionally terminated by a single `Error`.

use crate::bundle::ResultBundle;
use std::convert::Infallible;
use std::fmt;

/// Outcome of dispatching an event.
///
/// # Type Parameters
///
/// - `E`: Event type
/// - `P`: Payload produced by the event's computation
/// - `X`: Failure type of the computation
/// - `F`: One-shot effect type, [`Infallible`] when the dispatch has none
///
/// # Contract
///
/// Tag-specific accessors ([`bundle`](Self::bundle), [`error_ref`](Self::error_ref))
/// panic when called on the wrong variant. Use the `try_` forms when the tag is
/// not known.
#[derive(Clone, Debug, PartialEq)]
pub enum DispatchResult<E, P, X, F = Infallible> {
    /// The computation for `event` has started but not produced anything yet
    Loading {
        /// The dispatched event
        event: E,
    },

    /// The computation produced a value
    Success(ResultBundle<E, P>),

    /// The computation failed
    Error {
        /// The failure raised by the computation
        error: X,
        /// The dispatched event
        event: E,
    },

    /// The computation asked for a one-shot effect
    Effect {
        /// The requested effect
        effect: F,
        /// The dispatched event
        event: E,
    },
}

/// Field-less tag of a [`DispatchResult`], used for logging and metric labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResultKind {
    /// `DispatchResult::Loading`
    Loading,
    /// `DispatchResult::Success`
    Success,
    /// `DispatchResult::Error`
    Error,
    /// `DispatchResult::Effect`
    Effect,
}

impl ResultKind {
    /// Static label for metrics
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Success => "success",
            Self::Error => "error",
            Self::Effect => "effect",
        }
    }
}

impl<E, P, X, F> DispatchResult<E, P, X, F> {
    /// A loading marker for `event`
    #[must_use]
    pub const fn loading(event: E) -> Self {
        Self::Loading { event }
    }

    /// A successful value
    #[must_use]
    pub const fn success(bundle: ResultBundle<E, P>) -> Self {
        Self::Success(bundle)
    }

    /// A failure of the computation dispatched for `event`
    #[must_use]
    pub const fn error(error: X, event: E) -> Self {
        Self::Error { error, event }
    }

    /// An effect requested by the computation dispatched for `event`
    #[must_use]
    pub const fn effect(effect: F, event: E) -> Self {
        Self::Effect { effect, event }
    }

    /// The variant tag
    #[must_use]
    pub const fn kind(&self) -> ResultKind {
        match self {
            Self::Loading { .. } => ResultKind::Loading,
            Self::Success(_) => ResultKind::Success,
            Self::Error { .. } => ResultKind::Error,
            Self::Effect { .. } => ResultKind::Effect,
        }
    }

    /// Check if this is a loading marker
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    /// Check if this is a success
    #[must_use]
    pub const fn is_successful(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Check if this is a failure
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Check if this is an effect
    #[must_use]
    pub const fn is_effect(&self) -> bool {
        matches!(self, Self::Effect { .. })
    }

    /// The event this result belongs to (available on every variant)
    #[must_use]
    pub const fn event(&self) -> &E {
        match self {
            Self::Loading { event } | Self::Error { event, .. } | Self::Effect { event, .. } => {
                event
            },
            Self::Success(bundle) => bundle.event(),
        }
    }

    /// The success bundle, if this is a success
    #[must_use]
    pub const fn try_bundle(&self) -> Option<&ResultBundle<E, P>> {
        match self {
            Self::Success(bundle) => Some(bundle),
            _ => None,
        }
    }

    /// The failure, if this is an error
    #[must_use]
    pub const fn try_error(&self) -> Option<&X> {
        match self {
            Self::Error { error, .. } => Some(error),
            _ => None,
        }
    }

    /// The effect, if this is one
    #[must_use]
    pub const fn try_effect(&self) -> Option<&F> {
        match self {
            Self::Effect { effect, .. } => Some(effect),
            _ => None,
        }
    }

    /// The success bundle
    ///
    /// # Panics
    ///
    /// Panics if this result is not a success.
    #[must_use]
    #[allow(clippy::panic)] // Wrong-tag access is a contract violation
    pub fn bundle(&self) -> &ResultBundle<E, P> {
        match self.try_bundle() {
            Some(bundle) => bundle,
            None => panic!("bundle() called on a {:?} result", self.kind()),
        }
    }

    /// The failure
    ///
    /// # Panics
    ///
    /// Panics if this result is not an error.
    #[must_use]
    #[allow(clippy::panic)] // Wrong-tag access is a contract violation
    pub fn error_ref(&self) -> &X {
        match self.try_error() {
            Some(error) => error,
            None => panic!("error_ref() called on a {:?} result", self.kind()),
        }
    }
}

impl<E: fmt::Debug, P, X: fmt::Display, F> fmt::Display for DispatchResult<E, P, X, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading { event } => write!(f, "Result: Loading, event: {event:?}"),
            Self::Success(bundle) => write!(f, "Result: Success, event: {:?}", bundle.event()),
            Self::Error { error, event } => {
                write!(f, "Result: Error, event: {event:?}, error: {error}")
            },
            Self::Effect { event, .. } => write!(f, "Result: Effect, event: {event:?}"),
        }
    }
}
