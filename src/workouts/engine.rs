//! Guided workout session engine.
//!
//! The engine is a finite-state machine over [`SessionPhase`]. Every user
//! action and every clock tick is a synchronous transition function; illegal
//! calls leave the session untouched and report [`Transition::Ignored`].
//! Collaborators (history lookup, persistence) are called after the local
//! transition has been applied, and their failures never undo it.

use crate::storage::config::SessionSettings;
use crate::workouts::clock::SessionClock;
use crate::workouts::ports::SessionPorts;
use crate::workouts::recorder::SetRecorder;
use crate::workouts::records::PrDetector;
use crate::workouts::rest_timer::RestTimer;
use crate::workouts::summary::SummaryBuilder;
use crate::workouts::types::{
    CompletedSet, ExerciseCursor, ExerciseView, HistoricalBest, PersistenceFailure,
    PersistenceTarget, PhaseKind, PlannedExercise, PrEvent, RestState, SessionError,
    SessionSnapshot, SessionSummary, SetObservation, SetRejection, TrackingMode, Transition,
    WorkoutPlan,
};
use uuid::Uuid;

/// Where the session goes once a set has been recorded or an exercise skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NextStep {
    /// Rest for the given number of seconds
    Rest(u32),
    /// Go straight to the next set
    Active,
    /// No sets left
    Complete,
}

/// Sub-state frozen by a pause.
#[derive(Debug, Clone, PartialEq)]
enum Suspended {
    Active,
    Rest(RestTimer),
}

/// Session phase with the data that only exists in that phase.
#[derive(Debug, Clone, PartialEq)]
enum SessionPhase {
    Preparing,
    Active,
    Rest(RestTimer),
    Paused(Suspended),
    PersonalRecord { event: PrEvent, next: NextStep },
    Complete(SessionSummary),
}

impl SessionPhase {
    fn kind(&self) -> PhaseKind {
        match self {
            SessionPhase::Preparing => PhaseKind::Preparing,
            SessionPhase::Active => PhaseKind::Active,
            SessionPhase::Rest(_) => PhaseKind::Rest,
            SessionPhase::Paused(_) => PhaseKind::Paused,
            SessionPhase::PersonalRecord { .. } => PhaseKind::PersonalRecord,
            SessionPhase::Complete(_) => PhaseKind::Complete,
        }
    }
}

/// Drives one user through one workout.
///
/// Owns all session state exclusively; hosts observe it through
/// [`SessionEngine::snapshot`].
pub struct SessionEngine {
    /// Unique id of this session
    session_id: Uuid,
    /// Plan identifier the session was created for
    workout_id: String,
    /// Plan snapshot, once loaded
    plan: Option<WorkoutPlan>,
    /// Current phase
    phase: SessionPhase,
    /// Set expected next
    cursor: ExerciseCursor,
    /// Elapsed-time accounting
    clock: SessionClock,
    /// Every recorded set in completion order
    all_completed_sets: Vec<CompletedSet>,
    /// Recorded sets grouped by exercise index
    sets_by_exercise: Vec<Vec<CompletedSet>>,
    /// Personal records hit so far
    pr_events_seen: u32,
    /// Writes that failed and have not been drained
    persistence_failures: Vec<PersistenceFailure>,
    /// External collaborators
    ports: SessionPorts,
    /// Tunables
    settings: SessionSettings,
    recorder: SetRecorder,
    detector: PrDetector,
    summary_builder: SummaryBuilder,
}

impl SessionEngine {
    /// Create a session for `workout_id`. The plan is fetched lazily.
    pub fn new(workout_id: &str, ports: SessionPorts, settings: SessionSettings) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            workout_id: workout_id.to_string(),
            plan: None,
            phase: SessionPhase::Preparing,
            cursor: ExerciseCursor::default(),
            clock: SessionClock::new(),
            all_completed_sets: Vec::new(),
            sets_by_exercise: Vec::new(),
            pr_events_seen: 0,
            persistence_failures: Vec::new(),
            ports,
            settings,
            recorder: SetRecorder::new(),
            detector: PrDetector::new(),
            summary_builder: SummaryBuilder::new(),
        }
    }

    /// Create a session around an already fetched plan.
    pub fn with_plan(
        plan: WorkoutPlan,
        ports: SessionPorts,
        settings: SessionSettings,
    ) -> Result<Self, SessionError> {
        let mut engine = Self::new(&plan.id, ports, settings);
        engine.install_plan(plan)?;
        Ok(engine)
    }

    /// Fetch and validate the plan. Safe to retry after a failure.
    pub fn load_plan(&mut self) -> Result<(), SessionError> {
        if self.plan.is_some() {
            return Ok(());
        }

        let plan = self
            .ports
            .plans
            .load_workout_plan(&self.workout_id)
            .map_err(|source| {
                tracing::warn!("Failed to load workout {}: {}", self.workout_id, source);
                SessionError::LoadFailed {
                    workout_id: self.workout_id.clone(),
                    source,
                }
            })?;

        self.install_plan(plan)
    }

    fn install_plan(&mut self, plan: WorkoutPlan) -> Result<(), SessionError> {
        plan.validate()?;

        self.sets_by_exercise = vec![Vec::new(); plan.exercises.len()];
        tracing::info!(
            "Workout plan loaded: {} ({} exercises, {} sets)",
            plan.name,
            plan.exercises.len(),
            plan.total_sets()
        );
        self.plan = Some(plan);
        Ok(())
    }

    /// Begin the workout. Only legal from `preparing`.
    ///
    /// Loads the plan first if needed; a load failure keeps the session in
    /// `preparing`.
    pub fn start_workout(&mut self) -> Result<Transition, SessionError> {
        if self.phase != SessionPhase::Preparing {
            return Ok(Transition::Ignored);
        }

        self.load_plan()?;

        self.clock.run(self.ports.clock.now());
        self.phase = SessionPhase::Active;

        tracing::info!("Workout started");
        Ok(Transition::Applied {
            from: PhaseKind::Preparing,
            to: PhaseKind::Active,
        })
    }

    /// Record the set under the cursor.
    pub fn complete_set(&mut self, observation: SetObservation) -> Result<Transition, SetRejection> {
        if self.phase != SessionPhase::Active {
            return Err(SetRejection::WrongPhase {
                phase: self.phase.kind(),
            });
        }

        if let Some(slot) = observation.slot {
            if slot != self.cursor {
                return Err(SetRejection::CursorMismatch {
                    expected: self.cursor,
                    actual: slot,
                });
            }
        }

        let cursor = self.cursor;
        let exercise = self
            .current_exercise()
            .filter(|e| cursor.set_index < e.sets.len())
            .ok_or(SetRejection::SlotOutOfRange { cursor })?;
        validate_observation(exercise.tracking, &observation)?;

        let exercise_id = exercise.id.clone();
        let exercise_name = exercise.name.clone();

        let best = self.lookup_best(&exercise_id);
        let pr_event =
            self.detector
                .evaluate(&exercise_name, observation.weight, observation.reps, best);

        let set = self.recorder.record(
            &exercise_id,
            cursor,
            observation,
            self.ports.clock.now(),
            pr_event.is_some(),
        );
        self.all_completed_sets.push(set.clone());
        if let Some(sets) = self.sets_by_exercise.get_mut(cursor.exercise_index) {
            sets.push(set.clone());
        }

        let next = self.advance_after_set();
        match pr_event {
            Some(event) => {
                self.pr_events_seen += 1;
                self.phase = SessionPhase::PersonalRecord { event, next };
            }
            None => self.enter(next),
        }

        self.persist_set(&set);

        Ok(Transition::Applied {
            from: PhaseKind::Active,
            to: self.phase.kind(),
        })
    }

    /// Acknowledge a personal record and continue where the session was headed.
    pub fn dismiss_pr_celebration(&mut self) -> Transition {
        let next = match &self.phase {
            SessionPhase::PersonalRecord { next, .. } => *next,
            _ => return Transition::Ignored,
        };

        self.enter(next);
        Transition::Applied {
            from: PhaseKind::PersonalRecord,
            to: self.phase.kind(),
        }
    }

    /// End the current rest early.
    pub fn skip_rest(&mut self) -> Transition {
        match &mut self.phase {
            SessionPhase::Rest(timer) => timer.skip(),
            _ => return Transition::Ignored,
        }

        self.phase = SessionPhase::Active;
        tracing::debug!("Rest skipped");
        Transition::Applied {
            from: PhaseKind::Rest,
            to: PhaseKind::Active,
        }
    }

    /// Add time to the rest countdown, capped per call.
    ///
    /// Applies while resting and while paused from a rest.
    pub fn add_rest_time(&mut self, seconds: u32) -> Transition {
        let cap = self.settings.max_rest_extension_seconds;
        let kind = self.phase.kind();
        let timer = match &mut self.phase {
            SessionPhase::Rest(timer) | SessionPhase::Paused(Suspended::Rest(timer)) => timer,
            _ => return Transition::Ignored,
        };

        let added = timer.add_seconds(seconds, cap);
        if added == 0 {
            return Transition::Ignored;
        }

        tracing::debug!("Rest extended by {}s", added);
        Transition::Applied {
            from: kind,
            to: kind,
        }
    }

    /// Add the configured rest increment.
    pub fn extend_rest(&mut self) -> Transition {
        self.add_rest_time(self.settings.rest_increment_seconds)
    }

    /// Freeze the session clock and any rest countdown.
    pub fn pause(&mut self) -> Transition {
        let suspended = match &self.phase {
            SessionPhase::Active => Suspended::Active,
            SessionPhase::Rest(timer) => {
                let mut timer = timer.clone();
                timer.freeze();
                Suspended::Rest(timer)
            }
            _ => return Transition::Ignored,
        };

        let from = self.phase.kind();
        self.clock.halt();
        self.phase = SessionPhase::Paused(suspended);

        tracing::info!("Workout paused");
        Transition::Applied {
            from,
            to: PhaseKind::Paused,
        }
    }

    /// Restore the phase that was paused.
    pub fn resume(&mut self) -> Transition {
        let restored = match &self.phase {
            SessionPhase::Paused(Suspended::Active) => SessionPhase::Active,
            SessionPhase::Paused(Suspended::Rest(timer)) => {
                let mut timer = timer.clone();
                timer.unfreeze();
                SessionPhase::Rest(timer)
            }
            _ => return Transition::Ignored,
        };

        self.clock.run(self.ports.clock.now());
        self.phase = restored;

        tracing::info!("Workout resumed");
        Transition::Applied {
            from: PhaseKind::Paused,
            to: self.phase.kind(),
        }
    }

    /// Abandon the remaining sets of the current exercise. Only legal while paused.
    pub fn skip_exercise(&mut self) -> Transition {
        if !matches!(self.phase, SessionPhase::Paused(_)) {
            return Transition::Ignored;
        }

        let skipped = self.cursor.exercise_index;
        let next = self.advance_to_next_exercise();
        self.enter(next);

        tracing::info!("Skipped exercise {}", skipped + 1);
        Transition::Applied {
            from: PhaseKind::Paused,
            to: self.phase.kind(),
        }
    }

    /// Finish the workout early. Only legal while paused; a no-op once complete.
    pub fn end_workout(&mut self) -> Transition {
        if !matches!(self.phase, SessionPhase::Paused(_)) {
            return Transition::Ignored;
        }

        self.finish();
        Transition::Applied {
            from: PhaseKind::Paused,
            to: PhaseKind::Complete,
        }
    }

    /// Advance time by one second.
    ///
    /// Elapsed time accrues in `active`, `rest` and `pr`. While resting, the
    /// countdown is decremented too and the session returns to `active` on
    /// the tick that reaches zero.
    pub fn tick(&mut self) -> Transition {
        let from = self.phase.kind();
        let rest_expired = match &mut self.phase {
            SessionPhase::Active | SessionPhase::PersonalRecord { .. } => false,
            SessionPhase::Rest(timer) => timer.tick(),
            _ => return Transition::Ignored,
        };

        self.clock.tick();

        if rest_expired {
            self.phase = SessionPhase::Active;
            tracing::debug!("Rest finished");
        }

        Transition::Applied {
            from,
            to: self.phase.kind(),
        }
    }

    /// Move the cursor past the set just recorded and decide what follows.
    fn advance_after_set(&mut self) -> NextStep {
        let Some(exercise) = self.current_exercise() else {
            return NextStep::Complete;
        };
        let set_count = exercise.sets.len();
        let rest = exercise.rest_seconds;

        if self.cursor.set_index + 1 < set_count {
            self.cursor.set_index += 1;
            self.rest_step(rest)
        } else if self.cursor.exercise_index + 1 < self.exercise_count() {
            self.cursor = ExerciseCursor::new(self.cursor.exercise_index + 1, 0);
            self.rest_step(rest)
        } else {
            self.cursor.set_index = set_count;
            NextStep::Complete
        }
    }

    /// Move the cursor to the first set of the next exercise.
    fn advance_to_next_exercise(&mut self) -> NextStep {
        let Some(exercise) = self.current_exercise() else {
            return NextStep::Complete;
        };
        let set_count = exercise.sets.len();
        let rest = exercise.rest_seconds;

        if self.cursor.exercise_index + 1 < self.exercise_count() {
            self.cursor = ExerciseCursor::new(self.cursor.exercise_index + 1, 0);
            self.rest_step(rest)
        } else {
            self.cursor.set_index = set_count;
            NextStep::Complete
        }
    }

    fn rest_step(&self, rest_seconds: Option<u32>) -> NextStep {
        match rest_seconds.unwrap_or(self.settings.default_rest_seconds) {
            0 => NextStep::Active,
            seconds => NextStep::Rest(seconds),
        }
    }

    fn enter(&mut self, next: NextStep) {
        match next {
            NextStep::Rest(seconds) => {
                self.clock.run(self.ports.clock.now());
                self.phase = SessionPhase::Rest(RestTimer::start(seconds));
            }
            NextStep::Active => {
                self.clock.run(self.ports.clock.now());
                self.phase = SessionPhase::Active;
                tracing::debug!("Next set: {}", self.cursor);
            }
            NextStep::Complete => self.finish(),
        }
    }

    fn finish(&mut self) {
        self.clock.halt();
        let summary = self.summary_builder.build(
            &self.all_completed_sets,
            self.clock.elapsed_seconds(),
            self.pr_events_seen,
        );
        self.phase = SessionPhase::Complete(summary.clone());

        tracing::info!(
            "Workout completed: {} sets, {:.1} kg volume, {} PRs",
            summary.total_sets,
            summary.total_volume,
            summary.pr_count
        );

        if let Err(e) =
            self.ports
                .sink
                .persist_session_summary(self.session_id, &self.workout_id, &summary)
        {
            tracing::warn!("Failed to save session summary: {}", e);
            self.record_failure(PersistenceTarget::Summary, e.to_string());
        }
    }

    fn lookup_best(&self, exercise_id: &str) -> Option<HistoricalBest> {
        match self.ports.history.get_historical_best(exercise_id) {
            Ok(best) => best,
            Err(e) => {
                tracing::warn!("Historical best lookup failed for {}: {}", exercise_id, e);
                None
            }
        }
    }

    fn persist_set(&mut self, set: &CompletedSet) {
        if let Err(e) =
            self.ports
                .sink
                .persist_completed_set(self.session_id, &self.workout_id, set)
        {
            tracing::warn!(
                "Failed to save set {} of exercise {}: {}",
                set.set_index + 1,
                set.exercise_index + 1,
                e
            );
            self.record_failure(
                PersistenceTarget::Set {
                    exercise_index: set.exercise_index,
                    set_index: set.set_index,
                },
                e.to_string(),
            );
        }
    }

    fn record_failure(&mut self, target: PersistenceTarget, message: String) {
        self.persistence_failures.push(PersistenceFailure {
            target,
            message,
            occurred_at: self.ports.clock.now(),
        });
    }

    /// Drain failed writes for an external retry mechanism.
    pub fn take_persistence_failures(&mut self) -> Vec<PersistenceFailure> {
        std::mem::take(&mut self.persistence_failures)
    }

    fn current_exercise(&self) -> Option<&PlannedExercise> {
        self.plan
            .as_ref()
            .and_then(|p| p.exercises.get(self.cursor.exercise_index))
    }

    fn exercise_count(&self) -> usize {
        self.plan.as_ref().map(|p| p.exercises.len()).unwrap_or(0)
    }

    /// Session identifier.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Tunables in effect.
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Plan identifier.
    pub fn workout_id(&self) -> &str {
        &self.workout_id
    }

    /// Loaded plan, if any.
    pub fn plan(&self) -> Option<&WorkoutPlan> {
        self.plan.as_ref()
    }

    /// Current phase.
    pub fn phase(&self) -> PhaseKind {
        self.phase.kind()
    }

    /// Set expected next.
    pub fn cursor(&self) -> ExerciseCursor {
        self.cursor
    }

    /// Active session time in seconds.
    pub fn elapsed_seconds(&self) -> u64 {
        self.clock.elapsed_seconds()
    }

    /// Rest countdown while resting or paused from a rest.
    pub fn rest(&self) -> Option<RestState> {
        match &self.phase {
            SessionPhase::Rest(timer) | SessionPhase::Paused(Suspended::Rest(timer)) => {
                Some(timer.state())
            }
            _ => None,
        }
    }

    /// Personal record awaiting dismissal.
    pub fn pending_pr(&self) -> Option<&PrEvent> {
        match &self.phase {
            SessionPhase::PersonalRecord { event, .. } => Some(event),
            _ => None,
        }
    }

    /// Final summary once complete.
    pub fn summary(&self) -> Option<&SessionSummary> {
        match &self.phase {
            SessionPhase::Complete(summary) => Some(summary),
            _ => None,
        }
    }

    /// Every recorded set.
    pub fn all_completed_sets(&self) -> &[CompletedSet] {
        &self.all_completed_sets
    }

    /// Recorded sets of the exercise under the cursor.
    pub fn completed_sets_for_current_exercise(&self) -> &[CompletedSet] {
        self.sets_by_exercise
            .get(self.cursor.exercise_index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether the session has finished.
    pub fn is_complete(&self) -> bool {
        matches!(self.phase, SessionPhase::Complete(_))
    }

    /// Whether ticks currently have any effect.
    pub fn is_timed(&self) -> bool {
        self.phase.kind().is_timed()
    }

    /// Read-only projection for observers.
    pub fn snapshot(&self) -> SessionSnapshot {
        let paused_from = match &self.phase {
            SessionPhase::Paused(Suspended::Active) => Some(PhaseKind::Active),
            SessionPhase::Paused(Suspended::Rest(_)) => Some(PhaseKind::Rest),
            _ => None,
        };

        let current_exercise = self.current_exercise().map(|e| ExerciseView {
            id: e.id.clone(),
            name: e.name.clone(),
            tracking: e.tracking,
            planned_sets: e.sets.len(),
            target: e.sets.get(self.cursor.set_index).cloned(),
        });

        SessionSnapshot {
            session_id: self.session_id,
            workout_id: self.workout_id.clone(),
            phase: self.phase.kind(),
            paused_from,
            cursor: self.cursor,
            current_exercise,
            total_exercises: self.exercise_count(),
            total_planned_sets: self.plan.as_ref().map(|p| p.total_sets()).unwrap_or(0),
            all_completed_sets: self.all_completed_sets.clone(),
            completed_sets_for_current_exercise: self.completed_sets_for_current_exercise().to_vec(),
            rest: self.rest(),
            elapsed_seconds: self.clock.elapsed_seconds(),
            running_since: self.clock.running_since(),
            pending_pr: self.pending_pr().cloned(),
            summary: self.summary().cloned(),
            persistence_failures: self.persistence_failures.clone(),
        }
    }
}

fn validate_observation(
    tracking: TrackingMode,
    observation: &SetObservation,
) -> Result<(), SetRejection> {
    let weight = observation.weight;
    let weight_ok = match tracking {
        TrackingMode::WeightAndReps => weight.is_finite() && weight > 0.0,
        TrackingMode::RepsOnly => weight.is_finite() && weight >= 0.0,
    };
    if !weight_ok {
        return Err(SetRejection::NonPositiveWeight { weight });
    }

    if observation.reps == 0 {
        return Err(SetRejection::NonPositiveReps);
    }

    if let Some(rpe) = observation.rpe {
        if !(0.0..=10.0).contains(&rpe) {
            return Err(SetRejection::InvalidRpe { rpe });
        }
    }

    Ok(())
}
