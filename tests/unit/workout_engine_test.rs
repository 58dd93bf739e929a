//! Unit tests for the SessionEngine state machine.

use chrono::{TimeZone, Utc};
use setpace::storage::config::SessionSettings;
use setpace::workouts::clock::ManualClock;
use setpace::workouts::engine::SessionEngine;
use setpace::workouts::ports::{InMemoryHistory, InMemoryPlans, MemorySink, SessionPorts};
use setpace::workouts::types::{
    HistoricalBest, PhaseKind, PlannedExercise, PlannedSet, SetObservation, SetRejection,
    Transition, WorkoutPlan,
};
use std::sync::Arc;

struct Harness {
    history: Arc<InMemoryHistory>,
    sink: Arc<MemorySink>,
    ports: SessionPorts,
}

fn create_harness() -> Harness {
    let history = Arc::new(InMemoryHistory::new());
    let sink = Arc::new(MemorySink::new());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 2, 18, 0, 0).unwrap(),
    ));
    let ports = SessionPorts::new(Arc::new(InMemoryPlans::new()), history.clone(), sink.clone())
        .with_clock(clock);

    Harness {
        history,
        sink,
        ports,
    }
}

/// One exercise, two sets, 30 s rest.
fn create_squat_plan() -> WorkoutPlan {
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

fn create_engine(harness: &Harness, plan: WorkoutPlan) -> SessionEngine {
    SessionEngine::with_plan(plan, harness.ports.clone(), SessionSettings::default())
        .expect("plan is valid")
}

fn tick_n(engine: &mut SessionEngine, n: u32) {
    for _ in 0..n {
        engine.tick();
    }
}

#[test]
fn test_scenario_straight_through() {
    let harness = create_harness();
    let mut engine = create_engine(&harness, create_squat_plan());

    engine.start_workout().unwrap();
    assert_eq!(engine.phase(), PhaseKind::Active);

    engine.complete_set(SetObservation::new(50.0, 10)).unwrap();
    assert_eq!(engine.phase(), PhaseKind::Rest);
    assert_eq!(engine.rest().unwrap().total_seconds, 30);

    tick_n(&mut engine, 29);
    assert_eq!(engine.phase(), PhaseKind::Rest);
    assert_eq!(engine.rest().unwrap().remaining_seconds, 1);

    engine.tick();
    assert_eq!(engine.phase(), PhaseKind::Active);
    assert_eq!(engine.cursor().set_index, 1);

    engine.complete_set(SetObservation::new(55.0, 8)).unwrap();
    assert_eq!(engine.phase(), PhaseKind::Complete);

    let summary = engine.summary().unwrap();
    assert_eq!(summary.total_sets, 2);
    assert!((summary.total_volume - 940.0).abs() < f64::EPSILON);
    assert_eq!(summary.total_duration_seconds, 30);
    assert_eq!(harness.sink.summaries(), vec![summary.clone()]);
}

#[test]
fn test_scenario_record_on_final_set() {
    let harness = create_harness();
    harness
        .history
        .set_best("squat", HistoricalBest::new(52.5, 10));
    let mut engine = create_engine(&harness, create_squat_plan());

    engine.start_workout().unwrap();
    engine.complete_set(SetObservation::new(50.0, 10)).unwrap();
    assert_eq!(engine.phase(), PhaseKind::Rest);
    engine.skip_rest();

    let transition = engine.complete_set(SetObservation::new(55.0, 8)).unwrap();
    assert_eq!(transition.target(), Some(PhaseKind::PersonalRecord));
    assert!(engine.summary().is_none());
    assert!(harness.sink.summaries().is_empty());

    let pr = engine.pending_pr().unwrap();
    assert_eq!(pr.exercise_name, "Back Squat");
    assert_eq!(pr.previous_best, Some(52.5));

    engine.dismiss_pr_celebration();
    assert_eq!(engine.phase(), PhaseKind::Complete);
    assert_eq!(engine.summary().unwrap().pr_count, 1);
    assert!(engine.all_completed_sets()[1].is_pr);
}

#[test]
fn test_scenario_pause_during_rest() {
    let harness = create_harness();
    let mut engine = create_engine(&harness, create_squat_plan());

    engine.start_workout().unwrap();
    engine.complete_set(SetObservation::new(50.0, 10)).unwrap();
    tick_n(&mut engine, 10);
    assert_eq!(engine.rest().unwrap().remaining_seconds, 20);

    engine.pause();
    tick_n(&mut engine, 10);
    assert_eq!(engine.phase(), PhaseKind::Paused);
    assert_eq!(engine.rest().unwrap().remaining_seconds, 20);
    assert_eq!(engine.elapsed_seconds(), 10);

    engine.resume();
    assert_eq!(engine.phase(), PhaseKind::Rest);
    assert_eq!(engine.rest().unwrap().remaining_seconds, 20);

    engine.tick();
    assert_eq!(engine.rest().unwrap().remaining_seconds, 19);
    assert_eq!(engine.elapsed_seconds(), 11);
}

#[test]
fn test_pause_is_idempotent() {
    let harness = create_harness();
    let mut engine = create_engine(&harness, create_squat_plan());
    engine.start_workout().unwrap();
    tick_n(&mut engine, 4);

    assert!(engine.pause().is_applied());
    let once = engine.snapshot();
    assert_eq!(engine.pause(), Transition::Ignored);
    let twice = engine.snapshot();

    assert_eq!(once, twice);
}

#[test]
fn test_end_after_complete_is_noop() {
    let harness = create_harness();
    let mut engine = create_engine(&harness, create_squat_plan());
    engine.start_workout().unwrap();
    engine.pause();
    engine.end_workout();
    assert!(engine.is_complete());

    assert_eq!(engine.end_workout(), Transition::Ignored);
    assert_eq!(engine.resume(), Transition::Ignored);
    assert_eq!(engine.start_workout().unwrap(), Transition::Ignored);
    assert_eq!(harness.sink.summaries().len(), 1);
}

#[test]
fn test_out_of_order_calls_are_ignored() {
    let harness = create_harness();
    let mut engine = create_engine(&harness, create_squat_plan());

    assert_eq!(engine.pause(), Transition::Ignored);
    assert_eq!(engine.skip_rest(), Transition::Ignored);
    assert_eq!(engine.dismiss_pr_celebration(), Transition::Ignored);
    assert_eq!(engine.tick(), Transition::Ignored);
    assert_eq!(engine.phase(), PhaseKind::Preparing);

    engine.start_workout().unwrap();
    assert_eq!(engine.resume(), Transition::Ignored);
    assert_eq!(engine.skip_exercise(), Transition::Ignored);
    assert_eq!(engine.end_workout(), Transition::Ignored);
    assert_eq!(engine.phase(), PhaseKind::Active);
}

#[test]
fn test_set_cannot_be_completed_twice() {
    let harness = create_harness();
    let mut engine = create_engine(&harness, create_squat_plan());
    engine.start_workout().unwrap();

    let first = setpace::workouts::types::ExerciseCursor::new(0, 0);
    engine
        .complete_set(SetObservation::new(50.0, 10).for_slot(first))
        .unwrap();
    engine.skip_rest();

    let err = engine
        .complete_set(SetObservation::new(50.0, 10).for_slot(first))
        .unwrap_err();
    assert!(matches!(err, SetRejection::CursorMismatch { .. }));
    assert_eq!(engine.all_completed_sets().len(), 1);
}

#[test]
fn test_skip_exercise_from_rest_pause() {
    let harness = create_harness();
    let plan = WorkoutPlan::new(
        "upper",
        "Upper",
        vec![
            PlannedExercise::new(
                "bench",
                "Bench Press",
                Some(90),
                vec![PlannedSet::new(80.0, 5); 3],
            ),
            PlannedExercise::new("row", "Barbell Row", Some(60), vec![PlannedSet::new(70.0, 8)]),
        ],
    );
    let mut engine = create_engine(&harness, plan);

    engine.start_workout().unwrap();
    engine.complete_set(SetObservation::new(80.0, 5)).unwrap();
    engine.pause();
    engine.skip_exercise();

    assert_eq!(engine.phase(), PhaseKind::Rest);
    assert_eq!(engine.cursor().exercise_index, 1);
    assert_eq!(engine.rest().unwrap().total_seconds, 90);
    assert!(engine.completed_sets_for_current_exercise().is_empty());

    engine.skip_rest();
    engine.complete_set(SetObservation::new(70.0, 8)).unwrap();
    let summary = engine.summary().unwrap();
    assert_eq!(summary.total_sets, 2);
    assert_eq!(summary.exercises_completed, 2);
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Start,
    Heavy,
    Light,
    Invalid,
    Tick,
    Pause,
    Resume,
    SkipRest,
    SkipExercise,
    End,
    Dismiss,
}

const STEPS: [Step; 11] = [
    Step::Start,
    Step::Heavy,
    Step::Light,
    Step::Invalid,
    Step::Tick,
    Step::Pause,
    Step::Resume,
    Step::SkipRest,
    Step::SkipExercise,
    Step::End,
    Step::Dismiss,
];

fn create_short_plan() -> WorkoutPlan {
    WorkoutPlan::new(
        "short",
        "Short",
        vec![
            PlannedExercise::new(
                "squat",
                "Squat",
                Some(3),
                vec![PlannedSet::new(60.0, 5), PlannedSet::new(60.0, 5)],
            ),
            PlannedExercise::new("curl", "Curl", Some(0), vec![PlannedSet::new(15.0, 10); 2]),
        ],
    )
}

/// Apply `step`, returning whether a set was accepted.
fn apply(engine: &mut SessionEngine, step: Step) -> bool {
    match step {
        Step::Start => {
            engine.start_workout().unwrap();
        }
        Step::Heavy => return engine.complete_set(SetObservation::new(60.0, 6)).is_ok(),
        Step::Light => return engine.complete_set(SetObservation::new(40.0, 5)).is_ok(),
        Step::Invalid => {
            assert!(engine.complete_set(SetObservation::new(60.0, 0)).is_err());
        }
        Step::Tick => {
            let before = engine.phase();
            let elapsed = engine.elapsed_seconds();
            engine.tick();
            engine.tick();
            if matches!(before, PhaseKind::Paused | PhaseKind::Preparing | PhaseKind::Complete) {
                assert_eq!(engine.elapsed_seconds(), elapsed);
            }
        }
        Step::Pause => {
            engine.pause();
        }
        Step::Resume => {
            engine.resume();
        }
        Step::SkipRest => {
            engine.skip_rest();
        }
        Step::SkipExercise => {
            engine.skip_exercise();
        }
        Step::End => {
            engine.end_workout();
        }
        Step::Dismiss => {
            engine.dismiss_pr_celebration();
        }
    }
    false
}

#[test]
fn test_invariants_hold_for_all_short_sequences() {
    let plan = create_short_plan();

    for a in STEPS {
        for b in STEPS {
            for c in STEPS {
                for d in STEPS {
                    let harness = create_harness();
                    harness.history.set_best("squat", HistoricalBest::new(60.0, 5));
                    let mut engine = create_engine(&harness, plan.clone());
                    let mut accepted = 0;
                    let mut elapsed = 0;
                    // Lead with start and a set so the interesting phases are reachable
                    let sequence = [Step::Start, Step::Light, a, b, c, d, Step::Tick];

                    for step in sequence {
                        if apply(&mut engine, step) {
                            accepted += 1;
                        }

                        assert!(engine.elapsed_seconds() >= elapsed, "{:?}", sequence);
                        elapsed = engine.elapsed_seconds();

                        if engine.phase() == PhaseKind::Rest {
                            assert!(engine.rest().unwrap().remaining_seconds > 0);
                        }
                    }

                    let sets = engine.all_completed_sets();
                    assert_eq!(sets.len(), accepted, "{:?}", sequence);
                    assert_eq!(harness.sink.sets().len(), accepted);
                    for set in sets {
                        let exercise = &plan.exercises[set.exercise_index];
                        assert!(set.set_index < exercise.sets.len());
                    }
                    assert_eq!(engine.summary().is_some(), engine.is_complete());
                }
            }
        }
    }
}
