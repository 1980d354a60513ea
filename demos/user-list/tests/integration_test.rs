//! Integration tests for the user list screen

#![allow(clippy::unwrap_used)] // Tests can unwrap

use statefold_core::{Trigger, UiModelKind};
use statefold_runtime::{OrderingPolicy, PipelineConfig, PipelineError, ScreenModel};
use statefold_testing::assertions;
use std::sync::Arc;
use std::time::Duration;
use user_list::{
    User, UserListAccumulator, UserListEffect, UserListError, UserListEvent, UserListScreen,
    UserListState, UserRepository, observer,
};

fn screen(repository: &Arc<UserRepository>) -> UserListScreen {
    let mut screen = UserListScreen::new(
        PipelineConfig::default()
            .with_name("user-list-test")
            .with_ordering(OrderingPolicy::Sequential),
    );
    screen
        .init(UserListAccumulator, UserListState::default(), Arc::clone(repository))
        .unwrap();
    screen
}

fn repository() -> Arc<UserRepository> {
    Arc::new(UserRepository::with_users(25, Duration::from_millis(30)))
}

#[tokio::test]
async fn bind_before_init_is_rejected() {
    let mut screen = UserListScreen::new(PipelineConfig::default());
    let result = screen.bind(futures::stream::empty()).await;
    assert!(matches!(result, Err(PipelineError::AccumulatorMissing)));
    assert!(matches!(screen.unbind().await, Err(PipelineError::NotActive)));
}

#[tokio::test(start_paused = true)]
async fn pages_accumulate_across_binds() {
    let repository = repository();
    let mut screen = screen(&repository);

    let models = screen
        .bind(futures::stream::iter([
            UserListEvent::GetPaginatedUsers(0),
            UserListEvent::GetPaginatedUsers(10),
        ]))
        .await
        .unwrap()
        .collect_all()
        .await;
    screen.unbind().await.unwrap();

    assertions::assert_kinds(
        &models,
        &[
            UiModelKind::Idle,
            UiModelKind::Loading,
            UiModelKind::Success,
            UiModelKind::Loading,
            UiModelKind::Success,
        ],
    );
    let state = screen.latest_state().unwrap();
    assert_eq!(state.users.len(), 20);
    assert_eq!(state.last_id, 20);

    let models = screen
        .bind(futures::stream::iter([UserListEvent::GetPaginatedUsers(20)]))
        .await
        .unwrap()
        .collect_all()
        .await;
    screen.unbind().await.unwrap();

    assert_eq!(models[0].state().users.len(), 20);
    let state = screen.latest_state().unwrap();
    assert_eq!(state.users.len(), 25);
    assert_eq!(state.last_id, 25);
}

#[tokio::test(start_paused = true)]
async fn outage_keeps_last_good_state() {
    let repository = repository();
    let mut screen = screen(&repository);

    drop(
        screen
            .bind(futures::stream::iter([UserListEvent::GetPaginatedUsers(0)]))
            .await
            .unwrap()
            .collect_all()
            .await,
    );
    screen.unbind().await.unwrap();

    repository.set_offline(true);
    let models = screen
        .bind(futures::stream::iter([UserListEvent::GetPaginatedUsers(10)]))
        .await
        .unwrap()
        .collect_all()
        .await;
    screen.unbind().await.unwrap();

    assertions::assert_kinds(
        &models,
        &[UiModelKind::Idle, UiModelKind::Loading, UiModelKind::Error],
    );
    assert_eq!(models[2].error_ref(), &UserListError::Offline);
    assert_eq!(
        models[2].trigger(),
        &Trigger::Event(UserListEvent::GetPaginatedUsers(10))
    );
    assert_eq!(models[2].state().users.len(), 10);
    assert_eq!(screen.latest_state().unwrap().last_id, 10);
}

#[tokio::test(start_paused = true)]
async fn deleting_unknown_user_reports_and_keeps_list() {
    let repository = repository();
    let mut screen = screen(&repository);

    let models = screen
        .bind(futures::stream::iter([
            UserListEvent::GetPaginatedUsers(0),
            UserListEvent::DeleteUsers(vec!["user-002".into(), "ghost".into()]),
            UserListEvent::DeleteUsers(vec!["user-002".into()]),
        ]))
        .await
        .unwrap()
        .collect_all()
        .await;
    screen.unbind().await.unwrap();

    assertions::assert_error_count(&models, 1);
    let state = screen.latest_state().unwrap();
    assert_eq!(state.users.len(), 9);
    assert!(state.users.iter().all(|user| user.login != "user-002"));
}

#[tokio::test(start_paused = true)]
async fn snapshot_restores_into_a_fresh_screen() {
    let repository = repository();
    let mut first = screen(&repository);

    drop(
        first
            .bind(futures::stream::iter([
                UserListEvent::GetPaginatedUsers(0),
                UserListEvent::Search("user-00".into()),
            ]))
            .await
            .unwrap()
            .collect_all()
            .await,
    );
    first.unbind().await.unwrap();
    let json = first.snapshot().unwrap().unwrap();

    let restored: UserListState = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.search.as_ref().map(|s| s.matches.len()), Some(9));

    let mut second = UserListScreen::new(PipelineConfig::default());
    second
        .init(UserListAccumulator, restored.clone(), Arc::clone(&repository))
        .unwrap();
    let models = second
        .bind(futures::stream::empty())
        .await
        .unwrap()
        .collect_all()
        .await;
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].state(), &restored);
}

#[tokio::test(start_paused = true)]
async fn terminal_view_renders_each_model() {
    let repository = repository();
    repository.set_offline(true);
    let mut screen = screen(&repository);

    let mut view = observer(Vec::new());
    let mut models = screen
        .bind(futures::stream::iter([UserListEvent::Search("user".into())]))
        .await
        .unwrap();
    let delivered = models.deliver_to(&mut view).await;
    screen.unbind().await.unwrap();

    assert_eq!(delivered, 3);
    let output = String::from_utf8(view.into_view().into_inner()).unwrap();
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(
        lines,
        vec![
            "… loading (Search(\"user\"))",
            "✗ Search for 'user' failed: user service is unreachable",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn second_init_switches_repository() {
    let offline = repository();
    offline.set_offline(true);
    let online = repository();

    let mut screen = screen(&offline);
    screen
        .init(UserListAccumulator, UserListState::default(), Arc::clone(&online))
        .unwrap();

    let models = screen
        .bind(futures::stream::iter([UserListEvent::GetPaginatedUsers(0)]))
        .await
        .unwrap()
        .collect_all()
        .await;
    screen.unbind().await.unwrap();

    assertions::assert_error_count(&models, 0);
    assert_eq!(screen.latest_state().unwrap().users.len(), 10);
}

#[tokio::test]
async fn init_while_bound_is_rejected() {
    let repository = repository();
    let mut screen = screen(&repository);

    let _models = screen.bind(futures::stream::pending()).await.unwrap();
    let result = screen.init(UserListAccumulator, UserListState::default(), repository);
    assert!(matches!(result, Err(PipelineError::AlreadyActive { .. })));
    screen.unbind().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn opening_users_emits_effects_without_touching_state() {
    let repository = repository();
    let mut screen = screen(&repository);

    let models = screen
        .bind(futures::stream::iter([
            UserListEvent::GetPaginatedUsers(0),
            UserListEvent::OpenUser("user-003".into()),
            UserListEvent::OpenUser("ghost".into()),
        ]))
        .await
        .unwrap()
        .collect_all()
        .await;
    screen.unbind().await.unwrap();

    assertions::assert_kinds(
        &models,
        &[
            UiModelKind::Idle,
            UiModelKind::Loading,
            UiModelKind::Success,
            UiModelKind::Loading,
            UiModelKind::Effect,
            UiModelKind::Loading,
            UiModelKind::Error,
        ],
    );
    assert_eq!(
        assertions::effects(&models),
        vec![UserListEffect::OpenDetail(User {
            id: 3,
            login: "user-003".into(),
        })]
    );
    assert_eq!(
        models[6].error_ref(),
        &UserListError::UnknownUsers(vec!["ghost".into()])
    );
    assert_eq!(models[4].state(), models[2].state());
    assert_eq!(screen.latest_state().unwrap().users.len(), 10);
}

#[tokio::test(start_paused = true)]
async fn terminal_view_announces_navigation() {
    let repository = repository();
    let mut screen = screen(&repository);

    let mut view = observer(Vec::new());
    let mut models = screen
        .bind(futures::stream::iter([UserListEvent::OpenUser("user-007".into())]))
        .await
        .unwrap();
    models.deliver_to(&mut view).await;
    screen.unbind().await.unwrap();

    let output = String::from_utf8(view.into_view().into_inner()).unwrap();
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(
        lines,
        vec!["… loading (OpenUser(\"user-007\"))", "→ open user-007 (#7)"]
    );
}
