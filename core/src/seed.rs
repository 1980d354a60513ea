//! Owned holder for the state that seeds the next pipeline run.
//!
//! A run moves the [`StateSeed`] in, records every emitted state into it, and
//! hands it back when it stops. Because the seed is not `Clone`, at most one
//! active run can write it. Everyone else reads through a [`StateWatch`].

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tokio::sync::watch;

/// Errors from persisting or restoring a seed.
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// The state could not be encoded
    #[error("Failed to serialize state snapshot: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The snapshot could not be decoded
    #[error("Failed to deserialize state snapshot: {0}")]
    Deserialize(#[source] serde_json::Error),
}

/// The last emitted state, owned by at most one pipeline run at a time.
///
/// # Example
///
/// ```
/// use statefold_core::seed::StateSeed;
///
/// let mut seed = StateSeed::new(0);
/// let watch = seed.watch();
///
/// assert!(seed.set(7));
/// assert!(!seed.set(7)); // unchanged by value
/// assert_eq!(watch.latest(), 7);
/// ```
#[derive(Debug)]
pub struct StateSeed<S> {
    state: S,
    publisher: watch::Sender<S>,
}

impl<S: Clone> StateSeed<S> {
    /// Create a seed holding `state`.
    #[must_use]
    pub fn new(state: S) -> Self {
        let (publisher, _) = watch::channel(state.clone());
        Self { state, publisher }
    }

    /// Record a state emitted by the running pipeline.
    ///
    /// Always overwrites and notifies watchers.
    pub fn record(&mut self, state: S) {
        self.publisher.send_replace(state.clone());
        self.state = state;
    }

    /// A read-only view that follows every recorded state.
    #[must_use]
    pub fn watch(&self) -> StateWatch<S> {
        StateWatch {
            receiver: self.publisher.subscribe(),
        }
    }

    /// Take the state out of the seed.
    #[must_use]
    pub fn into_inner(self) -> S {
        self.state
    }
}

impl<S> StateSeed<S> {
    /// The current state
    #[must_use]
    pub const fn get(&self) -> &S {
        &self.state
    }
}

impl<S: Clone + PartialEq> StateSeed<S> {
    /// Replace the state only if it differs by value.
    ///
    /// Returns `true` if the seed changed.
    pub fn set(&mut self, state: S) -> bool {
        if self.state == state {
            return false;
        }
        self.record(state);
        true
    }
}

impl<S: Clone + Serialize> StateSeed<S> {
    /// Encode the state as JSON so a host can persist it.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Serialize`] if the state cannot be encoded.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string(&self.state).map_err(SnapshotError::Serialize)
    }
}

impl<S: Clone + DeserializeOwned> StateSeed<S> {
    /// Restore a seed from a snapshot produced by [`StateSeed::to_json`].
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Deserialize`] if the snapshot is malformed.
    pub fn from_json(snapshot: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(snapshot)
            .map(Self::new)
            .map_err(SnapshotError::Deserialize)
    }
}

/// Read-only view of a seed's latest state.
///
/// Keeps returning the last recorded state after the seed itself is gone.
#[derive(Debug, Clone)]
pub struct StateWatch<S> {
    receiver: watch::Receiver<S>,
}

impl<S: Clone> StateWatch<S> {
    /// The latest recorded state
    #[must_use]
    pub fn latest(&self) -> S {
        self.receiver.borrow().clone()
    }

    /// Wait until a new state is recorded.
    ///
    /// Returns `false` once the seed has been dropped and no further change
    /// can arrive.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }
}
