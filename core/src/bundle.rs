//! Event/payload pairing shared by dispatch results and UI models.
//!
//! A [`ResultBundle`] is the unit that flows through the reduction:
//! - Inside a success result it pairs the triggering event with the payload
//!   produced by the event's computation.
//! - Inside a [`UiModel`](crate::model::UiModel) it pairs the [`Trigger`]
//!   with the accumulated state.
//!
//! Equality is structural over both fields, which is what the deduplication
//! step relies on.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An immutable `(event, payload)` pair.
///
/// # Examples
///
/// ```
/// use statefold_core::bundle::ResultBundle;
///
/// let bundle = ResultBundle::new("load", 42);
/// assert_eq!(bundle.event(), &"load");
/// assert_eq!(bundle.payload(), &42);
/// assert_eq!(bundle, ResultBundle::new("load", 42));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultBundle<E, P> {
    event: E,
    payload: P,
}

impl<E, P> ResultBundle<E, P> {
    /// Create a new bundle.
    #[must_use]
    pub const fn new(event: E, payload: P) -> Self {
        Self { event, payload }
    }

    /// The event this bundle is attributed to.
    #[must_use]
    pub const fn event(&self) -> &E {
        &self.event
    }

    /// The carried payload (a computation result or an accumulated state).
    #[must_use]
    pub const fn payload(&self) -> &P {
        &self.payload
    }

    /// Split the bundle into its event and payload.
    #[must_use]
    pub fn into_parts(self) -> (E, P) {
        (self.event, self.payload)
    }

    /// Map the payload, keeping the event.
    #[must_use]
    pub fn map_payload<Q>(self, f: impl FnOnce(P) -> Q) -> ResultBundle<E, Q> {
        ResultBundle {
            event: self.event,
            payload: f(self.payload),
        }
    }
}

/// The event identifier stored in a UI model.
///
/// `Idle` is the marker used by the seed model emitted before any event has
/// been processed. Every later model names the event that produced it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trigger<E> {
    /// No event yet; only carried by the seed model.
    Idle,

    /// The event that produced the model.
    Event(E),
}

impl<E> Trigger<E> {
    /// Check if this is the idle marker
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// The event, if any
    #[must_use]
    pub const fn event(&self) -> Option<&E> {
        match self {
            Self::Idle => None,
            Self::Event(event) => Some(event),
        }
    }
}

impl<E> From<E> for Trigger<E> {
    fn from(event: E) -> Self {
        Self::Event(event)
    }
}

impl<E: fmt::Debug> fmt::Display for Trigger<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Event(event) => write!(f, "{event:?}"),
        }
    }
}
