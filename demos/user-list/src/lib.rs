//! # User List Example
//!
//! A paginated user list screen demonstrating the Statefold architecture.
//!
//! This example showcases:
//! - A typed [`Dispatch`] mapping screen events to repository calls
//! - An [`Accumulator`] merging pages, deletions and search results
//! - A [`ScreenModel`] wiring the view model to its typed dependencies
//! - A terminal [`View`] driven through a [`ViewObserver`]
//! - A one-shot [`UserListEffect`] asking the host to open a user's detail
//!
//! ## Flow
//!
//! ```text
//! UserListEvent ─▶ UserListDispatch ─▶ UserRepository (async, may fail)
//!                                        │
//!            UserListAccumulator ◀───────┘
//!                    │
//!   UiModel<UserListEvent, UserListState, UserListError, UserListEffect> ─▶ TerminalView
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use statefold_runtime::{PipelineConfig, ScreenModel};
//! use user_list::*;
//!
//! # async fn example() -> Result<(), statefold_runtime::PipelineError> {
//! let repository = Arc::new(UserRepository::with_users(25, Duration::from_millis(50)));
//! let mut screen = UserListScreen::new(PipelineConfig::default());
//! screen.init(UserListAccumulator, UserListState::default(), repository)?;
//!
//! let models = screen
//!     .bind(futures::stream::iter([UserListEvent::GetPaginatedUsers(0)]))
//!     .await?;
//! let mut observer = observer(std::io::stdout());
//! models.collect_all().await.into_iter().for_each(|m| observer.on_model(m));
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use statefold_core::{Accumulator, Computation, Dispatch, Emission, Trigger, computation};
use statefold_runtime::{
    ErrorMessageFactory, LoggingMiddleware, PipelineConfig, PipelineError, ScreenModel,
    UiModelReceiver, View, ViewModel, ViewObserver,
};
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

pub use statefold_runtime::UiModelSink;

/// Users per page
pub const PAGE_SIZE: usize = 10;

/// A user row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable, increasing identifier
    pub id: u64,
    /// Unique login
    pub login: String,
}

/// Things the user list screen can ask for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserListEvent {
    /// Load the page of users after this id (0 for the first page)
    GetPaginatedUsers(u64),
    /// Delete users by login
    DeleteUsers(Vec<String>),
    /// Filter users by login prefix; an empty query clears the search
    Search(String),
    /// Open the detail screen of the user with this login
    OpenUser(String),
}

/// One-shot requests for the host, never part of the rendered state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserListEffect {
    /// Navigate to this user's detail screen
    OpenDetail(User),
}

/// Repository failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UserListError {
    /// The backing service cannot be reached
    #[error("user service is unreachable")]
    Offline,

    /// Some requested logins do not exist
    #[error("unknown users: {}", .0.join(", "))]
    UnknownUsers(Vec<String>),
}

/// What a successful repository call produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserListPayload {
    /// Users following the requested id
    Page(Vec<User>),
    /// Logins that were removed
    Deleted(Vec<String>),
    /// Users matching a search
    SearchResults {
        /// The query as typed
        query: String,
        /// Matching users
        users: Vec<User>,
    },
}

/// An active search
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchState {
    /// The query as typed
    pub query: String,
    /// Matching users
    pub matches: Vec<User>,
}

/// Everything the screen renders
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserListState {
    /// Loaded users, in id order
    pub users: Vec<User>,
    /// Id of the last loaded user, the cursor for the next page
    pub last_id: u64,
    /// The current search, if any
    pub search: Option<SearchState>,
}

/// In-memory user store with artificial latency and a kill switch.
#[derive(Debug)]
pub struct UserRepository {
    users: RwLock<Vec<User>>,
    latency: Duration,
    offline: AtomicBool,
}

impl UserRepository {
    /// A repository holding users `1..=count`
    #[must_use]
    pub fn with_users(count: u64, latency: Duration) -> Self {
        let users = (1..=count)
            .map(|id| User {
                id,
                login: format!("user-{id:03}"),
            })
            .collect();
        Self {
            users: RwLock::new(users),
            latency,
            offline: AtomicBool::new(false),
        }
    }

    /// Make every call fail with [`UserListError::Offline`] (or succeed again)
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    async fn round_trip(&self) -> Result<(), UserListError> {
        tokio::time::sleep(self.latency).await;
        if self.offline.load(Ordering::SeqCst) {
            return Err(UserListError::Offline);
        }
        Ok(())
    }

    /// Up to `size` users with an id greater than `after_id`
    ///
    /// # Errors
    ///
    /// Returns [`UserListError::Offline`] while offline.
    pub async fn page(&self, after_id: u64, size: usize) -> Result<Vec<User>, UserListError> {
        self.round_trip().await?;
        let users = self.users.read().await;
        Ok(users
            .iter()
            .filter(|user| user.id > after_id)
            .take(size)
            .cloned()
            .collect())
    }

    /// Remove users by login; all or nothing
    ///
    /// # Errors
    ///
    /// - [`UserListError::Offline`] while offline
    /// - [`UserListError::UnknownUsers`] if any login does not exist
    pub async fn delete(&self, logins: &[String]) -> Result<Vec<String>, UserListError> {
        self.round_trip().await?;
        let mut users = self.users.write().await;
        let unknown: Vec<String> = logins
            .iter()
            .filter(|login| !users.iter().any(|user| &user.login == *login))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(UserListError::UnknownUsers(unknown));
        }
        users.retain(|user| !logins.contains(&user.login));
        Ok(logins.to_vec())
    }

    /// The user with this login
    ///
    /// # Errors
    ///
    /// - [`UserListError::Offline`] while offline
    /// - [`UserListError::UnknownUsers`] if the login does not exist
    pub async fn find(&self, login: &str) -> Result<User, UserListError> {
        self.round_trip().await?;
        let users = self.users.read().await;
        users
            .iter()
            .find(|user| user.login == login)
            .cloned()
            .ok_or_else(|| UserListError::UnknownUsers(vec![login.to_string()]))
    }

    /// Users whose login starts with `query`
    ///
    /// # Errors
    ///
    /// Returns [`UserListError::Offline`] while offline.
    pub async fn search(&self, query: &str) -> Result<Vec<User>, UserListError> {
        self.round_trip().await?;
        let users = self.users.read().await;
        Ok(users
            .iter()
            .filter(|user| user.login.starts_with(query))
            .cloned()
            .collect())
    }
}

/// Maps each event to its repository call
#[derive(Debug, Clone)]
pub struct UserListDispatch {
    repository: Arc<UserRepository>,
}

impl UserListDispatch {
    /// Dispatch against `repository`
    #[must_use]
    pub const fn new(repository: Arc<UserRepository>) -> Self {
        Self { repository }
    }
}

impl Dispatch<UserListEvent> for UserListDispatch {
    type Payload = UserListPayload;
    type Error = UserListError;
    type Effect = UserListEffect;

    fn dispatch(
        &self,
        event: &UserListEvent,
    ) -> Computation<UserListPayload, UserListError, UserListEffect> {
        let repository = Arc::clone(&self.repository);
        match event.clone() {
            UserListEvent::GetPaginatedUsers(after_id) => computation::once(async move {
                repository
                    .page(after_id, PAGE_SIZE)
                    .await
                    .map(UserListPayload::Page)
            }),
            UserListEvent::DeleteUsers(logins) => computation::once(async move {
                repository.delete(&logins).await.map(UserListPayload::Deleted)
            }),
            UserListEvent::Search(query) if query.is_empty() => {
                computation::ready(Ok(UserListPayload::SearchResults {
                    query,
                    users: Vec::new(),
                }))
            },
            UserListEvent::Search(query) => computation::once(async move {
                let users = repository.search(&query).await?;
                Ok(UserListPayload::SearchResults { query, users })
            }),
            UserListEvent::OpenUser(login) => {
                computation::from_emissions(futures::stream::once(async move {
                    let user = repository.find(&login).await?;
                    Ok::<_, UserListError>(Emission::Effect(UserListEffect::OpenDetail(user)))
                }))
            },
        }
    }
}

/// Merges repository results into the screen state
#[derive(Debug, Clone, Copy, Default)]
pub struct UserListAccumulator;

impl Accumulator<UserListEvent, UserListPayload, UserListState> for UserListAccumulator {
    fn accumulate(
        &self,
        payload: UserListPayload,
        _event: &UserListEvent,
        previous: &UserListState,
    ) -> UserListState {
        let mut next = previous.clone();
        match payload {
            UserListPayload::Page(users) => {
                if let Some(last) = users.last() {
                    next.last_id = next.last_id.max(last.id);
                }
                for user in users {
                    if !next.users.iter().any(|known| known.id == user.id) {
                        next.users.push(user);
                    }
                }
                next.users.sort_by_key(|user| user.id);
            },
            UserListPayload::Deleted(logins) => {
                next.users.retain(|user| !logins.contains(&user.login));
                if let Some(search) = &mut next.search {
                    search.matches.retain(|user| !logins.contains(&user.login));
                }
            },
            UserListPayload::SearchResults { query, users } => {
                next.search = (!query.is_empty()).then_some(SearchState {
                    query,
                    matches: users,
                });
            },
        }
        next
    }
}

/// The view model type backing the screen
pub type UserListViewModel = ViewModel<UserListEvent, UserListDispatch, UserListState>;

/// The user list screen's model.
///
/// Created empty; [`ScreenModel::init`] supplies the accumulator, the initial
/// state and the repository. Calling it again swaps in the new repository and
/// keeps the accumulated state unless the new initial state differs.
#[derive(Debug)]
pub struct UserListScreen {
    config: PipelineConfig,
    view_model: Option<UserListViewModel>,
}

impl UserListScreen {
    /// A screen that will run with `config` once initialized
    #[must_use]
    pub const fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            view_model: None,
        }
    }

    /// Start delivering models for `events`
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::AccumulatorMissing`] before `init`, otherwise
    /// the errors of [`ViewModel::bind`].
    pub async fn bind<St>(
        &mut self,
        events: St,
    ) -> Result<
        UiModelReceiver<UserListEvent, UserListState, UserListError, UserListEffect>,
        PipelineError,
    >
    where
        St: futures::Stream<Item = UserListEvent> + Send + 'static,
    {
        self.view_model
            .as_mut()
            .ok_or(PipelineError::AccumulatorMissing)?
            .bind(events)
            .await
    }

    /// Stop delivering and keep the state for the next bind
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NotActive`] if the screen is not bound,
    /// otherwise the errors of [`ViewModel::unbind`].
    pub async fn unbind(&mut self) -> Result<(), PipelineError> {
        self.view_model
            .as_mut()
            .ok_or(PipelineError::NotActive)?
            .unbind()
            .await
    }

    /// The last rendered state
    #[must_use]
    pub fn latest_state(&self) -> Option<UserListState> {
        self.view_model.as_ref().and_then(UserListViewModel::latest_state)
    }

    /// JSON snapshot of the last rendered state
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Snapshot`] if encoding fails.
    pub fn snapshot(&self) -> Result<Option<String>, PipelineError> {
        self.view_model
            .as_ref()
            .map_or(Ok(None), UserListViewModel::snapshot)
    }
}

impl ScreenModel for UserListScreen {
    type State = UserListState;
    type Accumulator = UserListAccumulator;
    type Deps = Arc<UserRepository>;

    fn init(
        &mut self,
        accumulator: UserListAccumulator,
        initial_state: UserListState,
        repository: Arc<UserRepository>,
    ) -> Result<(), PipelineError> {
        let dispatch = UserListDispatch::new(repository);
        if let Some(view_model) = &mut self.view_model {
            view_model.replace_dispatch(dispatch)?;
            return view_model.init(accumulator, initial_state);
        }

        let middleware = LoggingMiddleware::new(self.config.name.clone());
        let mut view_model =
            ViewModel::new(dispatch, self.config.clone()).with_middleware(middleware);
        let initialized = view_model.init(accumulator, initial_state);
        self.view_model = Some(view_model);
        initialized
    }
}

/// Error messages phrased for the user list
#[derive(Debug, Clone, Copy, Default)]
pub struct UserListMessages;

impl ErrorMessageFactory<UserListEvent, UserListError> for UserListMessages {
    fn message(&self, error: &UserListError, trigger: &Trigger<UserListEvent>) -> String {
        match trigger.event() {
            Some(UserListEvent::GetPaginatedUsers(after_id)) => {
                format!("Could not load users after #{after_id}: {error}")
            },
            Some(UserListEvent::DeleteUsers(logins)) => {
                format!("Could not delete {}: {error}", logins.join(", "))
            },
            Some(UserListEvent::Search(query)) => format!("Search for '{query}' failed: {error}"),
            Some(UserListEvent::OpenUser(login)) => format!("Could not open {login}: {error}"),
            None => error.to_string(),
        }
    }
}

/// Renders the screen as lines of text
#[derive(Debug)]
pub struct TerminalView<W> {
    out: W,
}

impl<W: Write> TerminalView<W> {
    /// Write to `out`
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    /// Take the writer back
    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) {
        if let Err(error) = writeln!(self.out, "{text}") {
            tracing::warn!(error = %error, "Failed to write view output");
        }
    }
}

impl<W: Write> View<UserListEvent, UserListState, UserListEffect> for TerminalView<W> {
    fn toggle_loading(&mut self, is_loading: bool, trigger: &Trigger<UserListEvent>) {
        if is_loading {
            self.line(&format!("… loading ({trigger})"));
        }
    }

    fn show_error(&mut self, message: &str, _trigger: &Trigger<UserListEvent>) {
        self.line(&format!("✗ {message}"));
    }

    fn render_success(&mut self, state: &UserListState) {
        let first = state.users.first().map_or("-", |user| user.login.as_str());
        let last = state.users.last().map_or("-", |user| user.login.as_str());
        self.line(&format!(
            "✓ {} users [{first} .. {last}], next page after #{}",
            state.users.len(),
            state.last_id
        ));
        if let Some(search) = &state.search {
            self.line(&format!(
                "  search '{}': {} matches",
                search.query,
                search.matches.len()
            ));
        }
    }

    fn show_effect(&mut self, effect: &UserListEffect, _trigger: &Trigger<UserListEvent>) {
        match effect {
            UserListEffect::OpenDetail(user) => {
                self.line(&format!("→ open {} (#{})", user.login, user.id));
            },
        }
    }
}

/// The sink the binary drives
pub type UserListObserver<W> =
    ViewObserver<TerminalView<W>, UserListMessages, UserListEvent, UserListError>;

/// Observe models with a terminal view writing to `out`
pub const fn observer<W: Write>(out: W) -> UserListObserver<W> {
    ViewObserver::with_messages(TerminalView::new(out), UserListMessages)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: u64) -> User {
        User {
            id,
            login: format!("user-{id:03}"),
        }
    }

    #[test]
    fn pages_append_without_duplicates() {
        let state = UserListAccumulator.accumulate(
            UserListPayload::Page(vec![user(1), user(2)]),
            &UserListEvent::GetPaginatedUsers(0),
            &UserListState::default(),
        );
        let state = UserListAccumulator.accumulate(
            UserListPayload::Page(vec![user(2), user(3)]),
            &UserListEvent::GetPaginatedUsers(1),
            &state,
        );

        assert_eq!(state.users, vec![user(1), user(2), user(3)]);
        assert_eq!(state.last_id, 3);
    }

    #[test]
    fn empty_page_keeps_cursor() {
        let previous = UserListState {
            users: vec![user(7)],
            last_id: 7,
            search: None,
        };
        let state = UserListAccumulator.accumulate(
            UserListPayload::Page(Vec::new()),
            &UserListEvent::GetPaginatedUsers(7),
            &previous,
        );
        assert_eq!(state, previous);
    }

    #[test]
    fn deletion_removes_from_list_and_search() {
        let previous = UserListState {
            users: vec![user(1), user(2)],
            last_id: 2,
            search: Some(SearchState {
                query: "user-00".into(),
                matches: vec![user(1), user(2)],
            }),
        };
        let state = UserListAccumulator.accumulate(
            UserListPayload::Deleted(vec!["user-001".into()]),
            &UserListEvent::DeleteUsers(vec!["user-001".into()]),
            &previous,
        );

        assert_eq!(state.users, vec![user(2)]);
        assert_eq!(state.search.map(|s| s.matches), Some(vec![user(2)]));
    }

    #[test]
    fn empty_search_clears_results() {
        let previous = UserListState {
            search: Some(SearchState::default()),
            ..UserListState::default()
        };
        let state = UserListAccumulator.accumulate(
            UserListPayload::SearchResults {
                query: String::new(),
                users: Vec::new(),
            },
            &UserListEvent::Search(String::new()),
            &previous,
        );
        assert_eq!(state.search, None);
    }

    #[test]
    fn messages_name_the_failed_request() {
        let messages = UserListMessages;
        let trigger = Trigger::Event(UserListEvent::GetPaginatedUsers(20));
        assert_eq!(
            messages.message(&UserListError::Offline, &trigger),
            "Could not load users after #20: user service is unreachable"
        );

        let trigger = Trigger::Event(UserListEvent::DeleteUsers(vec!["ghost".into()]));
        let error = UserListError::UnknownUsers(vec!["ghost".into()]);
        assert_eq!(
            messages.message(&error, &trigger),
            "Could not delete ghost: unknown users: ghost"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn repository_rejects_unknown_deletions() {
        let repository = UserRepository::with_users(3, Duration::from_millis(5));
        let result = repository.delete(&["user-002".into(), "ghost".into()]).await;
        assert_eq!(result, Err(UserListError::UnknownUsers(vec!["ghost".into()])));
        assert_eq!(repository.page(0, 10).await.map(|users| users.len()), Ok(3));
    }

    #[tokio::test(start_paused = true)]
    async fn opening_a_user_emits_an_effect() {
        use futures::StreamExt;

        let dispatch =
            UserListDispatch::new(Arc::new(UserRepository::with_users(3, Duration::from_millis(5))));
        let opened: Vec<_> = dispatch
            .dispatch(&UserListEvent::OpenUser("user-002".into()))
            .collect()
            .await;
        assert_eq!(opened, vec![Ok(Emission::Effect(UserListEffect::OpenDetail(user(2))))]);

        let missing: Vec<_> = dispatch
            .dispatch(&UserListEvent::OpenUser("ghost".into()))
            .collect()
            .await;
        assert_eq!(missing, vec![Err(UserListError::UnknownUsers(vec!["ghost".into()]))]);
    }
}
