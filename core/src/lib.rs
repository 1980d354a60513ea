//! # Statefold Core
//!
//! Core types for unidirectional state management: a stream of events goes
//! in, a stream of UI-facing state snapshots comes out.
//!
//! This crate holds everything that does not need an async runtime:
//!
//! - **Result**: [`DispatchResult`], the outcome of one dispatch attempt
//!   (loading, success, error, effect)
//! - **UI model**: [`UiModel`], the snapshot a consumer renders
//!   (idle, loading, success, error, effect), always carrying the accumulated state
//! - **Bundle**: [`ResultBundle`], the `(event, payload)` pair used for
//!   deduplication and as the accumulator's input
//! - **Accumulator**: [`Accumulator`], the caller's pure merge rule
//! - **Dispatch**: [`Dispatch`], the caller's event → computation mapping;
//!   computations yield [`Emission`]s, either values or one-shot effects
//! - **Reduction**: [`Reduction`], the dedup + fold over results
//! - **Seed**: [`StateSeed`], the single-owner holder of the last state
//!
//! The concurrent pipeline that wires these together lives in
//! `statefold-runtime`.
//!
//! ## Data Flow
//!
//! ```text
//! events ─▶ Dispatch ─▶ [Loading, (Success | Effect)*, Error?] per event
//!        ─▶ flatten (by completion time)
//!        ─▶ Reduction: dedup ─▶ fold with Accumulator (effects pass through)
//!        ─▶ UiModel stream ─▶ single consumer
//! ```
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use statefold_core::*;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! enum Event {
//!     Load,
//! }
//!
//! let mut reduction: Reduction<Event, u32, u32> =
//!     Reduction::new(Arc::new(|payload: u32, _: &Event, total: &u32| total + payload), 0);
//!
//! let models: Vec<UiModel<Event, u32, String>> = [
//!     DispatchResult::loading(Event::Load),
//!     DispatchResult::success(ResultBundle::new(Event::Load, 42)),
//! ]
//! .into_iter()
//! .filter_map(|result| reduction.push(result))
//! .collect();
//!
//! assert!(models[0].is_loading());
//! assert_eq!(models[1].state(), &42);
//! ```

pub mod accumulator;
pub mod bundle;
pub mod dispatch;
pub mod model;
pub mod reduce;
pub mod result;
pub mod seed;

// Re-export the types most callers need
pub use accumulator::{Accumulator, ReplaceState};
pub use bundle::{ResultBundle, Trigger};
pub use dispatch::{Computation, Dispatch, DispatchFn, Emission, computation, dispatch_fn};
pub use model::{StateBundle, UiModel, UiModelKind};
pub use reduce::{Reduction, is_duplicate};
pub use result::{DispatchResult, ResultKind};
pub use seed::{SnapshotError, StateSeed, StateWatch};
