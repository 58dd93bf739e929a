//! Integration tests for workout execution.
//!
//! Drives sessions through the async `SessionDriver`:
//! - Starting a stored plan and recording sets through the handle
//! - Advancing rest with manual and interval tickers
//! - Personal record, completion and persistence-failure events
//! - Teardown when the handle goes away

use chrono::Utc;
use setpace::storage::config::SessionSettings;
use setpace::storage::store::SessionStore;
use setpace::workouts::clock::ManualTicker;
use setpace::workouts::driver::{SessionAction, SessionDriver, SessionEvent};
use setpace::workouts::engine::SessionEngine;
use setpace::workouts::ports::{
    InMemoryHistory, InMemoryPlans, MemorySink, SessionPorts, SessionSink,
};
use setpace::workouts::types::{
    CompletedSet, PersistenceTarget, PhaseKind, PlannedExercise, PlannedSet, SessionSummary,
    SetObservation, WorkoutPlan,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// One exercise, two sets, 30 s rest.
fn create_test_plan() -> WorkoutPlan {
    WorkoutPlan::new(
        "legs",
        "Leg Day",
        vec![PlannedExercise::new(
            "squat",
            "Back Squat",
            Some(30),
            vec![PlannedSet::new(50.0, 10), PlannedSet::new(55.0, 8)],
        )],
    )
}

fn create_memory_engine(sink: Arc<MemorySink>) -> SessionEngine {
    let ports = SessionPorts::new(
        Arc::new(InMemoryPlans::new()),
        Arc::new(InMemoryHistory::new()),
        sink,
    );
    SessionEngine::with_plan(create_test_plan(), ports, SessionSettings::default()).unwrap()
}

/// Store a finished earlier session with a 52.5 x 10 squat.
fn seed_previous_session(store: &SessionStore) {
    let session_id = Uuid::new_v4();
    let set = CompletedSet {
        exercise_id: "squat".to_string(),
        exercise_index: 0,
        set_index: 0,
        weight: 52.5,
        reps: 10,
        rpe: None,
        notes: None,
        completed_at: Utc::now(),
        is_pr: false,
    };
    let summary = SessionSummary {
        total_duration_seconds: 900,
        total_sets: 1,
        total_volume: 525.0,
        pr_count: 0,
        exercises_completed: 1,
    };

    store.persist_completed_set(session_id, "legs", &set).unwrap();
    store
        .persist_session_summary(session_id, "legs", &summary)
        .unwrap();
}

#[tokio::test]
async fn test_stored_plan_runs_to_completion() {
    let store = Arc::new(SessionStore::open_in_memory().unwrap());
    store.save_plan(&create_test_plan()).unwrap();
    seed_previous_session(&store);

    let ports = SessionPorts::new(store.clone(), store.clone(), store.clone());
    let engine = SessionEngine::new("legs", ports, SessionSettings::default());
    let session_id = engine.session_id();

    let (ticker, source) = ManualTicker::new();
    let handle = SessionDriver::spawn(engine, ticker);
    let mut events = handle.subscribe();

    handle.start().await.unwrap();
    handle
        .complete_set(SetObservation::new(50.0, 10))
        .await
        .unwrap();
    assert_eq!(handle.latest().rest.unwrap().total_seconds, 30);

    assert!(source.fire(30));
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.phase, PhaseKind::Active);
    assert_eq!(snapshot.cursor.set_index, 1);
    assert_eq!(snapshot.rest, None);

    let transition = handle
        .complete_set(SetObservation::new(55.0, 8))
        .await
        .unwrap();
    assert_eq!(transition.target(), Some(PhaseKind::PersonalRecord));
    assert!(handle.latest().summary.is_none());

    handle.dismiss_pr_celebration().await.unwrap();
    let snapshot = handle.latest();
    assert_eq!(snapshot.phase, PhaseKind::Complete);
    assert_eq!(snapshot.elapsed_seconds, 30);

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    let phases: Vec<(PhaseKind, PhaseKind)> = seen
        .iter()
        .filter_map(|event| match event {
            SessionEvent::PhaseChanged { from, to } => Some((*from, *to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![
            (PhaseKind::Preparing, PhaseKind::Active),
            (PhaseKind::Active, PhaseKind::Rest),
            (PhaseKind::Rest, PhaseKind::Active),
            (PhaseKind::Active, PhaseKind::PersonalRecord),
            (PhaseKind::PersonalRecord, PhaseKind::Complete),
        ]
    );
    assert!(seen
        .iter()
        .any(|event| matches!(event, SessionEvent::PersonalRecord(pr) if pr.weight == 55.0)));
    assert!(seen
        .iter()
        .any(|event| matches!(event, SessionEvent::Completed(summary) if summary.pr_count == 1)));

    handle.shutdown().await.unwrap();

    let summary = store.summary_for_session(&session_id).unwrap().unwrap();
    assert_eq!(summary.total_sets, 2);
    assert!((summary.total_volume - 940.0).abs() < f64::EPSILON);
    assert_eq!(store.sets_for_session(&session_id).unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_paused_rest_does_not_count_down() {
    let handle = SessionDriver::spawn_interval(create_memory_engine(Arc::new(MemorySink::new())));

    handle.start().await.unwrap();
    handle
        .complete_set(SetObservation::new(50.0, 10))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(10_500)).await;
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.rest.unwrap().remaining_seconds, 20);
    assert_eq!(snapshot.elapsed_seconds, 10);

    handle.pause().await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.paused_from, Some(PhaseKind::Rest));
    assert_eq!(snapshot.rest.unwrap().remaining_seconds, 20);
    assert_eq!(snapshot.elapsed_seconds, 10);

    handle.resume().await.unwrap();
    assert_eq!(handle.latest().rest.unwrap().remaining_seconds, 20);

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.rest.unwrap().remaining_seconds, 19);
    assert_eq!(snapshot.elapsed_seconds, 11);
}

#[tokio::test]
async fn test_manual_ticks_during_pause_are_discarded() {
    let (ticker, source) = ManualTicker::new();
    let handle = SessionDriver::spawn(create_memory_engine(Arc::new(MemorySink::new())), ticker);

    handle.start().await.unwrap();
    handle
        .complete_set(SetObservation::new(50.0, 10))
        .await
        .unwrap();
    assert!(source.fire(10));
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.rest.unwrap().remaining_seconds, 20);
    assert_eq!(snapshot.elapsed_seconds, 10);

    handle.pause().await.unwrap();
    assert!(source.fire(10));
    handle.resume().await.unwrap();

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.phase, PhaseKind::Rest);
    assert_eq!(snapshot.rest.unwrap().remaining_seconds, 20);
    assert_eq!(snapshot.elapsed_seconds, 10);

    assert!(source.fire(1));
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.rest.unwrap().remaining_seconds, 19);
    assert_eq!(snapshot.elapsed_seconds, 11);
}

#[tokio::test]
async fn test_manual_ticks_before_start_are_discarded() {
    let (ticker, source) = ManualTicker::new();
    let handle = SessionDriver::spawn(create_memory_engine(Arc::new(MemorySink::new())), ticker);

    assert!(source.fire(5));
    assert_eq!(handle.snapshot().await.unwrap().elapsed_seconds, 0);

    handle.start().await.unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.phase, PhaseKind::Active);
    assert_eq!(snapshot.elapsed_seconds, 0);

    assert!(source.fire(2));
    assert_eq!(handle.snapshot().await.unwrap().elapsed_seconds, 2);
}

#[tokio::test]
async fn test_rest_extension_through_handle() {
    let (ticker, source) = ManualTicker::new();
    let handle = SessionDriver::spawn(create_memory_engine(Arc::new(MemorySink::new())), ticker);

    handle.start().await.unwrap();
    handle
        .complete_set(SetObservation::new(50.0, 10))
        .await
        .unwrap();
    assert!(source.fire(25));

    handle.act(SessionAction::ExtendRest).await.unwrap();
    let rest = handle.snapshot().await.unwrap().rest.unwrap();
    assert_eq!(rest.remaining_seconds, 20);
    assert_eq!(rest.total_seconds, 45);

    // Capped at the configured ceiling
    handle.act(SessionAction::AddRestTime(10_000)).await.unwrap();
    assert_eq!(handle.latest().rest.unwrap().remaining_seconds, 320);

    handle.skip_rest().await.unwrap();
    assert_eq!(handle.latest().phase, PhaseKind::Active);
}

#[tokio::test]
async fn test_failed_writes_are_reported_not_fatal() {
    let sink = Arc::new(MemorySink::new());
    sink.set_failing(true);
    let (ticker, _source) = ManualTicker::new();
    let handle = SessionDriver::spawn(create_memory_engine(sink.clone()), ticker);
    let mut events = handle.subscribe();

    handle.start().await.unwrap();
    handle
        .complete_set(SetObservation::new(50.0, 10))
        .await
        .unwrap();

    let snapshot = handle.latest();
    assert_eq!(snapshot.phase, PhaseKind::Rest);
    assert_eq!(snapshot.all_completed_sets.len(), 1);
    assert_eq!(snapshot.persistence_failures.len(), 1);

    let mut reported = None;
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::PersistenceFailed(failure) = event {
            reported = Some(failure);
        }
    }
    assert_eq!(
        reported.unwrap().target,
        PersistenceTarget::Set {
            exercise_index: 0,
            set_index: 0
        }
    );

    let failures = handle.take_persistence_failures().await.unwrap();
    assert_eq!(failures.len(), 1);
    assert!(handle.latest().persistence_failures.is_empty());
    assert!(sink.sets().is_empty());
}

#[tokio::test]
async fn test_dropping_handle_stops_ticker() {
    let (ticker, source) = ManualTicker::new();
    let handle = SessionDriver::spawn(create_memory_engine(Arc::new(MemorySink::new())), ticker);
    handle.start().await.unwrap();
    drop(handle);

    let mut released = false;
    for _ in 0..100 {
        if !source.fire(1) {
            released = true;
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(released, "driver task kept the ticker alive");
}
