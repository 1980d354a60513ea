//! Integration tests for cross-event ordering policies
//!
//! All tests run on a paused tokio clock so computation delays are
//! deterministic.

#![allow(clippy::unwrap_used)] // Tests can unwrap

use statefold_core::{StateSeed, UiModel, UiModelKind};
use statefold_runtime::{OrderingPolicy, Pipeline, PipelineConfig};
use statefold_testing::{Script, ScriptedDispatch, assertions};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Fetch {
    Slow,
    Fast,
}

type Model = UiModel<Fetch, Vec<Fetch>, String>;

/// `Slow` resolves after 100ms, `Fast` after 10ms. The state lists events
/// in the order their successes were folded.
fn racing(ordering: OrderingPolicy) -> (Pipeline<Fetch, ScriptedDispatch<Fetch, u8, String>, Vec<Fetch>>, ScriptedDispatch<Fetch, u8, String>) {
    let dispatch = ScriptedDispatch::new()
        .on(Fetch::Slow, Script::new().delay(Duration::from_millis(100)).emit(1))
        .on(Fetch::Fast, Script::new().delay(Duration::from_millis(10)).emit(2));
    let log = dispatch.clone();
    let pipeline = Pipeline::new(
        dispatch,
        |_: u8, event: &Fetch, seen: &Vec<Fetch>| {
            let mut seen = seen.clone();
            seen.push(event.clone());
            seen
        },
        PipelineConfig::default()
            .with_name(ordering.to_string())
            .with_ordering(ordering),
    );
    (pipeline, log)
}

async fn run_all(
    pipeline: &Pipeline<Fetch, ScriptedDispatch<Fetch, u8, String>, Vec<Fetch>>,
    events: impl futures::Stream<Item = Fetch> + Send + 'static,
) -> (Vec<Model>, Vec<Fetch>) {
    let (handle, models) = pipeline.activate(events, StateSeed::new(Vec::new()));
    let models = models.collect_all().await;
    let state = handle.join().await.unwrap().into_inner();
    (models, state)
}

#[tokio::test(start_paused = true)]
async fn concurrent_results_follow_completion_order() {
    let (pipeline, log) = racing(OrderingPolicy::Concurrent);

    let (models, state) = run_all(&pipeline, futures::stream::iter([Fetch::Slow, Fetch::Fast])).await;

    // Both Loading markers arrive back to back and collapse into one.
    assertions::assert_kinds(
        &models,
        &[
            UiModelKind::Idle,
            UiModelKind::Loading,
            UiModelKind::Success,
            UiModelKind::Success,
        ],
    );
    assertions::assert_no_consecutive_loading(&models);
    assert_eq!(state, vec![Fetch::Fast, Fetch::Slow]);
    assert_eq!(log.dispatch_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn sequential_runs_one_event_at_a_time() {
    let (pipeline, _) = racing(OrderingPolicy::Sequential);

    let (models, state) = run_all(&pipeline, futures::stream::iter([Fetch::Slow, Fetch::Fast])).await;

    let trace: Vec<_> = models
        .iter()
        .map(|m| (m.kind(), m.event().cloned()))
        .collect();
    assert_eq!(
        trace,
        vec![
            (UiModelKind::Idle, None),
            (UiModelKind::Loading, Some(Fetch::Slow)),
            (UiModelKind::Success, Some(Fetch::Slow)),
            (UiModelKind::Loading, Some(Fetch::Fast)),
            (UiModelKind::Success, Some(Fetch::Fast)),
        ]
    );
    assert_eq!(state, vec![Fetch::Slow, Fetch::Fast]);
}

#[tokio::test(start_paused = true)]
async fn latest_aborts_superseded_computation() {
    let (pipeline, log) = racing(OrderingPolicy::Latest);

    // Fast arrives while Slow is still in flight.
    let events = async_stream::stream! {
        yield Fetch::Slow;
        tokio::time::sleep(Duration::from_millis(20)).await;
        yield Fetch::Fast;
    };
    let (models, state) = run_all(&pipeline, events).await;

    assertions::assert_kinds(
        &models,
        &[UiModelKind::Idle, UiModelKind::Loading, UiModelKind::Success],
    );
    assert_eq!(models[1].event(), Some(&Fetch::Slow));
    assert_eq!(models[2].event(), Some(&Fetch::Fast));
    assert_eq!(state, vec![Fetch::Fast]);
    assert_eq!(log.dispatched(), vec![Fetch::Slow, Fetch::Fast]);
}

#[tokio::test(start_paused = true)]
async fn latest_keeps_finished_computations() {
    let (pipeline, _) = racing(OrderingPolicy::Latest);

    // Fast finishes long before Slow arrives, so nothing is aborted.
    let events = async_stream::stream! {
        yield Fetch::Fast;
        tokio::time::sleep(Duration::from_millis(50)).await;
        yield Fetch::Slow;
    };
    let (_, state) = run_all(&pipeline, events).await;

    assert_eq!(state, vec![Fetch::Fast, Fetch::Slow]);
}
