//! Mapping events to asynchronous computations.
//!
//! The [`Dispatch`] contract answers one question: "given this event, what
//! work resolves it?" The answer is a [`Computation`], a lazily polled stream
//! of [`Emission`]s. A computation may yield any number of items; the first
//! `Err` ends it.
//!
//! Most items are values headed for the accumulator. An
//! [`Emission::Effect`] is a one-shot output (navigate, show a toast) that is
//! delivered to the consumer as is and never folded into the state.
//!
//! The [`computation`] module has constructors for the common shapes
//! (a single future, a ready value, a failure, an existing stream).

use futures::stream::BoxStream;
use std::convert::Infallible;

/// One item yielded by a [`Computation`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Emission<P, F> {
    /// A value to fold into the state
    Value(P),
    /// A one-shot output that leaves the state untouched
    Effect(F),
}

/// A lazily started, possibly failing producer of payloads and effects.
///
/// Nothing runs until the pipeline polls it on a worker task. Dispatches
/// without effects leave `F` at [`Infallible`].
pub type Computation<P, X, F = Infallible> = BoxStream<'static, Result<Emission<P, F>, X>>;

/// Resolve an event to the computation that handles it.
///
/// # Example
///
/// ```
/// use statefold_core::dispatch::{computation, Computation, Dispatch};
/// use std::convert::Infallible;
///
/// #[derive(Clone, Debug, PartialEq)]
/// enum Event {
///     Load,
/// }
///
/// struct Loader;
///
/// impl Dispatch<Event> for Loader {
///     type Payload = u32;
///     type Error = String;
///     type Effect = Infallible;
///
///     fn dispatch(&self, event: &Event) -> Computation<u32, String> {
///         match event {
///             Event::Load => computation::once(async { Ok(42) }),
///         }
///     }
/// }
/// ```
pub trait Dispatch<E>: Send + Sync {
    /// Value produced on success
    type Payload;

    /// Failure produced by the computation
    type Error;

    /// One-shot output delivered without folding; [`Infallible`] when unused
    type Effect;

    /// Build the computation for `event`.
    ///
    /// Called on a worker task, never on the consuming context.
    fn dispatch(&self, event: &E) -> Computation<Self::Payload, Self::Error, Self::Effect>;
}

/// Adapter turning a closure into a [`Dispatch`] implementation.
///
/// Closures cannot carry the associated types, so they are named here.
///
/// ```
/// use statefold_core::dispatch::{computation, dispatch_fn, Computation, Dispatch};
///
/// let dispatch = dispatch_fn(|event: &u8| -> Computation<u8, String> {
///     computation::ready(Ok(*event * 2))
/// });
/// let _computation = dispatch.dispatch(&21);
/// ```
pub struct DispatchFn<C> {
    f: C,
}

/// Wrap a closure as a [`Dispatch`] implementation
pub const fn dispatch_fn<C>(f: C) -> DispatchFn<C> {
    DispatchFn { f }
}

impl<E, P, X, F, C> Dispatch<E> for DispatchFn<C>
where
    C: Fn(&E) -> Computation<P, X, F> + Send + Sync,
{
    type Payload = P;
    type Error = X;
    type Effect = F;

    fn dispatch(&self, event: &E) -> Computation<P, X, F> {
        (self.f)(event)
    }
}

impl<C> std::fmt::Debug for DispatchFn<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DispatchFn(<closure>)")
    }
}

/// Constructors for [`Computation`] values.
pub mod computation {
    use super::{Computation, Emission};
    use futures::{Stream, StreamExt, stream};
    use std::future::Future;

    /// A computation resolving a single future
    pub fn once<P, X, F, Fut>(future: Fut) -> Computation<P, X, F>
    where
        Fut: Future<Output = Result<P, X>> + Send + 'static,
        P: Send + 'static,
        X: Send + 'static,
        F: Send + 'static,
    {
        stream::once(future).map(|item| item.map(Emission::Value)).boxed()
    }

    /// A computation that is already resolved
    pub fn ready<P, X, F>(result: Result<P, X>) -> Computation<P, X, F>
    where
        P: Send + 'static,
        X: Send + 'static,
        F: Send + 'static,
    {
        stream::iter([result.map(Emission::Value)]).boxed()
    }

    /// A computation that fails immediately
    pub fn fail<P, X, F>(error: X) -> Computation<P, X, F>
    where
        P: Send + 'static,
        X: Send + 'static,
        F: Send + 'static,
    {
        ready(Err(error))
    }

    /// A computation that completes without producing anything
    pub fn empty<P, X, F>() -> Computation<P, X, F>
    where
        P: Send + 'static,
        X: Send + 'static,
        F: Send + 'static,
    {
        stream::empty().boxed()
    }

    /// A computation yielding a single effect
    pub fn effect<P, X, F>(effect: F) -> Computation<P, X, F>
    where
        P: Send + 'static,
        X: Send + 'static,
        F: Send + 'static,
    {
        stream::iter([Ok(Emission::Effect(effect))]).boxed()
    }

    /// A computation producing several values over time
    pub fn from_stream<P, X, F, St>(stream: St) -> Computation<P, X, F>
    where
        St: Stream<Item = Result<P, X>> + Send + 'static,
        P: Send + 'static,
        X: Send + 'static,
        F: Send + 'static,
    {
        stream.map(|item| item.map(Emission::Value)).boxed()
    }

    /// A computation mixing values and effects over time
    pub fn from_emissions<P, X, F, St>(stream: St) -> Computation<P, X, F>
    where
        St: Stream<Item = Result<Emission<P, F>, X>> + Send + 'static,
    {
        stream.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn collect<P, X, F>(computation: Computation<P, X, F>) -> Vec<Result<Emission<P, F>, X>> {
        tokio_test::block_on(computation.collect::<Vec<_>>())
    }

    fn values<P, X>(computation: Computation<P, X>) -> Vec<Result<Emission<P, Infallible>, X>> {
        collect(computation)
    }

    #[test]
    fn once_yields_future_output() {
        let items = values(computation::once(async { Ok::<_, String>(42) }));
        assert_eq!(items, vec![Ok(Emission::Value(42))]);
    }

    #[test]
    fn fail_yields_single_error() {
        let items: Vec<Result<Emission<u8, Infallible>, String>> =
            collect(computation::fail("boom".to_string()));
        assert_eq!(items, vec![Err("boom".to_string())]);
    }

    #[test]
    fn empty_yields_nothing() {
        let items: Vec<Result<Emission<u8, Infallible>, String>> = collect(computation::empty());
        assert!(items.is_empty());
    }

    #[test]
    fn from_stream_keeps_every_item() {
        let stream = async_stream::stream! {
            yield Ok::<_, String>(1);
            yield Ok(2);
        };
        assert_eq!(
            values(computation::from_stream(stream)),
            vec![Ok(Emission::Value(1)), Ok(Emission::Value(2))]
        );
    }

    #[test]
    fn effects_mix_with_values() {
        let stream = async_stream::stream! {
            yield Ok::<_, String>(Emission::Value(1));
            yield Ok(Emission::Effect("saved"));
        };
        assert_eq!(
            collect(computation::from_emissions(stream)),
            vec![Ok(Emission::Value(1)), Ok(Emission::Effect("saved"))]
        );

        let single: Computation<u8, String, &str> = computation::effect("toast");
        assert_eq!(collect(single), vec![Ok(Emission::Effect("toast"))]);
    }

    #[test]
    fn closures_dispatch_by_event() {
        let dispatch = dispatch_fn(|event: &u8| -> Computation<u32, String> {
            if *event == 0 {
                computation::fail("zero".to_string())
            } else {
                computation::ready(Ok(u32::from(*event) * 10))
            }
        });

        assert_eq!(values(dispatch.dispatch(&3)), vec![Ok(Emission::Value(30))]);
        assert_eq!(values(dispatch.dispatch(&0)), vec![Err("zero".to_string())]);
    }
}
