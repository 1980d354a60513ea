//! Consumer side: where delivered models end up.
//!
//! A [`UiModelSink`] is the single consumer of a pipeline run. Hosts that
//! think in terms of screens implement [`View`] instead and wrap it in a
//! [`ViewObserver`], which translates each model into view callbacks.

use statefold_core::{Trigger, UiModel};
use std::convert::Infallible;
use std::fmt;
use std::marker::PhantomData;

/// Receives delivered models one at a time, in delivery order.
pub trait UiModelSink<E, S, X, F = Infallible> {
    /// Handle one model.
    fn on_model(&mut self, model: UiModel<E, S, X, F>);
}

impl<E, S, X, F, K> UiModelSink<E, S, X, F> for K
where
    K: FnMut(UiModel<E, S, X, F>),
{
    fn on_model(&mut self, model: UiModel<E, S, X, F>) {
        self(model);
    }
}

/// Screen-level callbacks driven by a [`ViewObserver`].
pub trait View<E, S, F = Infallible> {
    /// Show or hide the loading indicator.
    ///
    /// Called for every model, with `true` only for loading models.
    fn toggle_loading(&mut self, is_loading: bool, trigger: &Trigger<E>);

    /// Present a failure.
    fn show_error(&mut self, message: &str, trigger: &Trigger<E>);

    /// Render a successfully accumulated state.
    fn render_success(&mut self, state: &S);

    /// Act on a one-shot effect. Ignored unless overridden.
    fn show_effect(&mut self, _effect: &F, _trigger: &Trigger<E>) {}
}

/// Turn a failure into a user-facing message.
pub trait ErrorMessageFactory<E, X> {
    /// Build the message for `error` raised while handling `trigger`.
    fn message(&self, error: &X, trigger: &Trigger<E>) -> String;
}

/// Uses the error's `Display` output as the message.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayMessage;

impl<E, X: fmt::Display> ErrorMessageFactory<E, X> for DisplayMessage {
    fn message(&self, error: &X, _trigger: &Trigger<E>) -> String {
        error.to_string()
    }
}

/// Adapts a [`View`] into a [`UiModelSink`].
///
/// For each model: the loading indicator is toggled, then an error model shows
/// the factory's message and a success model renders its state. Idle models
/// only toggle loading off. Effect models go to [`View::show_effect`] and leave
/// the loading indicator alone.
pub struct ViewObserver<V, M, E, X> {
    view: V,
    messages: M,
    _types: PhantomData<fn(E, X)>,
}

impl<V, E, X> ViewObserver<V, DisplayMessage, E, X> {
    /// Observe with [`DisplayMessage`] as the error message factory
    #[must_use]
    pub const fn new(view: V) -> Self {
        Self {
            view,
            messages: DisplayMessage,
            _types: PhantomData,
        }
    }
}

impl<V, M, E, X> ViewObserver<V, M, E, X> {
    /// Observe with a custom error message factory
    #[must_use]
    pub const fn with_messages(view: V, messages: M) -> Self {
        Self {
            view,
            messages,
            _types: PhantomData,
        }
    }

    /// The wrapped view
    #[must_use]
    pub const fn view(&self) -> &V {
        &self.view
    }

    /// Take the wrapped view back
    #[must_use]
    pub fn into_view(self) -> V {
        self.view
    }
}

impl<V, M, E, S, X, F> UiModelSink<E, S, X, F> for ViewObserver<V, M, E, X>
where
    V: View<E, S, F>,
    M: ErrorMessageFactory<E, X>,
{
    fn on_model(&mut self, model: UiModel<E, S, X, F>) {
        if let UiModel::Effect { effect, bundle } = &model {
            self.view.show_effect(effect, bundle.event());
            return;
        }
        self.view.toggle_loading(model.is_loading(), model.trigger());
        match &model {
            UiModel::Error { error, bundle } => {
                let message = self.messages.message(error, bundle.event());
                self.view.show_error(&message, bundle.event());
            },
            UiModel::Success(bundle) => self.view.render_success(bundle.payload()),
            UiModel::Idle(_) | UiModel::Loading(_) | UiModel::Effect { .. } => {},
        }
    }
}

impl<V: fmt::Debug, M, E, X> fmt::Debug for ViewObserver<V, M, E, X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewObserver")
            .field("view", &self.view)
            .finish_non_exhaustive()
    }
}
