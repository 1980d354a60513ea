//! User list example binary
//!
//! Walks a paginated user list through bind, unbind, an outage and a
//! restored session.

use statefold_runtime::{OrderingPolicy, PipelineConfig, ScreenModel};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use user_list::{
    UserListAccumulator, UserListEvent, UserListScreen, UserListState, UserRepository, observer,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "user_list=debug,statefold_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== User List Example: Statefold Architecture ===\n");

    let repository = Arc::new(UserRepository::with_users(25, Duration::from_millis(40)));
    let config = PipelineConfig::default()
        .with_name("user-list")
        .with_ordering(OrderingPolicy::Sequential);

    let mut screen = UserListScreen::new(config.clone());
    screen.init(UserListAccumulator, UserListState::default(), Arc::clone(&repository))?;

    let mut view = observer(std::io::stdout());

    // First session: two pages, a search and a tap on a user
    println!(">>> Session 1: load two pages, search, then open a user");
    let mut models = screen
        .bind(futures::stream::iter([
            UserListEvent::GetPaginatedUsers(0),
            UserListEvent::GetPaginatedUsers(10),
            UserListEvent::Search("user-01".into()),
            UserListEvent::OpenUser("user-012".into()),
        ]))
        .await?;
    let delivered = models.deliver_to(&mut view).await;
    screen.unbind().await?;
    println!("({delivered} models delivered)\n");

    let snapshot = screen.snapshot()?;
    if let Some(json) = &snapshot {
        println!("Snapshot: {} bytes of JSON\n", json.len());
    }

    // Second session: the service goes away mid-way
    println!(">>> Session 2: delete a user, then the service goes offline");
    let mut models = screen
        .bind(futures::stream::iter([UserListEvent::DeleteUsers(vec![
            "user-003".into(),
        ])]))
        .await?;
    models.deliver_to(&mut view).await;
    screen.unbind().await?;

    repository.set_offline(true);
    let mut models = screen
        .bind(futures::stream::iter([UserListEvent::GetPaginatedUsers(20)]))
        .await?;
    models.deliver_to(&mut view).await;
    screen.unbind().await?;
    repository.set_offline(false);
    println!();

    // A fresh screen restored from the snapshot continues where session 1 ended
    println!(">>> Session 3: fresh screen restored from the snapshot");
    let restored = match &snapshot {
        Some(json) => serde_json::from_str(json)?,
        None => UserListState::default(),
    };
    let next_page = restored.last_id;
    let mut fresh = UserListScreen::new(config);
    fresh.init(UserListAccumulator, restored, repository)?;
    let mut models = fresh
        .bind(futures::stream::iter([UserListEvent::GetPaginatedUsers(
            next_page,
        )]))
        .await?;
    models.deliver_to(&mut view).await;
    fresh.unbind().await?;

    if let Some(state) = fresh.latest_state() {
        println!("\nFinal: {} users, last id {}", state.users.len(), state.last_id);
    }

    println!("\n=== Architecture Demonstration Complete ===");
    println!("\nKey concepts demonstrated:");
    println!("  • Dispatch: event → async repository computation");
    println!("  • Accumulator: pure fold of results into UserListState");
    println!("  • UiModel: Idle, Loading, Success and Error models");
    println!("  • Effects: one-shot navigation that never touches the state");
    println!("  • ViewModel: state carried across bind/unbind");
    println!("  • Snapshot: state restored into a fresh screen");

    Ok(())
}
