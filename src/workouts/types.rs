//! Workout session types and enums.
//!
//! Plan structures are read-only inputs supplied by the host. Everything else
//! here is produced by the session engine and exposed to the UI layer through
//! [`SessionSnapshot`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// How sets of an exercise are measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    /// Loaded lift: weight and reps must both be positive
    #[default]
    WeightAndReps,
    /// Bodyweight movement: weight may be zero, reps must be positive
    RepsOnly,
}

impl std::fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackingMode::WeightAndReps => write!(f, "Weight & Reps"),
            TrackingMode::RepsOnly => write!(f, "Reps Only"),
        }
    }
}

/// A planned set within an exercise.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlannedSet {
    /// Target weight in kilograms
    pub weight: Option<f64>,
    /// Target repetitions
    pub reps: Option<u32>,
}

impl PlannedSet {
    /// Create a planned set with a weight and rep target.
    pub fn new(weight: f64, reps: u32) -> Self {
        Self {
            weight: Some(weight),
            reps: Some(reps),
        }
    }

    /// Create a bodyweight set with only a rep target.
    pub fn reps_only(reps: u32) -> Self {
        Self {
            weight: None,
            reps: Some(reps),
        }
    }
}

/// A single exercise within a workout plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedExercise {
    /// Stable exercise identifier (used for history lookups)
    pub id: String,
    /// Display name
    pub name: String,
    /// Rest between sets in seconds (`None` falls back to the configured default)
    pub rest_seconds: Option<u32>,
    /// Measurement mode
    #[serde(default)]
    pub tracking: TrackingMode,
    /// Ordered planned sets
    pub sets: Vec<PlannedSet>,
}

impl PlannedExercise {
    /// Create a weighted exercise with the given rest and sets.
    pub fn new(id: &str, name: &str, rest_seconds: Option<u32>, sets: Vec<PlannedSet>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            rest_seconds,
            tracking: TrackingMode::WeightAndReps,
            sets,
        }
    }

    /// Switch the exercise to a different tracking mode.
    pub fn with_tracking(mut self, tracking: TrackingMode) -> Self {
        self.tracking = tracking;
        self
    }
}

/// A strength workout: ordered exercises, each with ordered sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutPlan {
    /// Workout identifier
    pub id: String,
    /// Workout name
    pub name: String,
    /// Ordered exercises
    pub exercises: Vec<PlannedExercise>,
}

impl WorkoutPlan {
    /// Create a plan with the given exercises.
    pub fn new(id: &str, name: &str, exercises: Vec<PlannedExercise>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            exercises,
        }
    }

    /// Total number of planned sets across all exercises.
    pub fn total_sets(&self) -> usize {
        self.exercises.iter().map(|e| e.sets.len()).sum()
    }

    /// Check the plan is well formed enough to drive a session.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.exercises.is_empty() {
            return Err(SessionError::InvalidPlan(format!(
                "workout {} has no exercises",
                self.id
            )));
        }

        for (i, exercise) in self.exercises.iter().enumerate() {
            if exercise.id.trim().is_empty() {
                return Err(SessionError::InvalidPlan(format!(
                    "exercise {} has an empty id",
                    i
                )));
            }
            if exercise.sets.is_empty() {
                return Err(SessionError::InvalidPlan(format!(
                    "exercise {} has no planned sets",
                    exercise.name
                )));
            }
            let bad_weight = exercise
                .sets
                .iter()
                .filter_map(|s| s.weight)
                .any(|w| !w.is_finite() || w < 0.0);
            if bad_weight {
                return Err(SessionError::InvalidPlan(format!(
                    "exercise {} has an invalid planned weight",
                    exercise.name
                )));
            }
        }

        Ok(())
    }
}

/// Position of the set currently expected to be completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExerciseCursor {
    /// Index into the plan's exercises
    pub exercise_index: usize,
    /// Index into the current exercise's sets
    pub set_index: usize,
}

impl ExerciseCursor {
    /// Create a cursor at the given position.
    pub fn new(exercise_index: usize, set_index: usize) -> Self {
        Self {
            exercise_index,
            set_index,
        }
    }
}

impl std::fmt::Display for ExerciseCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "exercise {} set {}",
            self.exercise_index + 1,
            self.set_index + 1
        )
    }
}

/// What the user reports when finishing a set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SetObservation {
    /// Weight lifted in kilograms
    pub weight: f64,
    /// Repetitions performed
    pub reps: u32,
    /// Rate of perceived exertion (0-10)
    pub rpe: Option<f32>,
    /// Free-form notes
    pub notes: Option<String>,
    /// Slot the UI believes it is completing, checked against the engine cursor
    pub slot: Option<ExerciseCursor>,
}

impl SetObservation {
    /// Create an observation with weight and reps.
    pub fn new(weight: f64, reps: u32) -> Self {
        Self {
            weight,
            reps,
            ..Default::default()
        }
    }

    /// Attach an RPE rating.
    pub fn with_rpe(mut self, rpe: f32) -> Self {
        self.rpe = Some(rpe);
        self
    }

    /// Attach notes.
    pub fn with_notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }

    /// Assert which slot this observation is for.
    pub fn for_slot(mut self, cursor: ExerciseCursor) -> Self {
        self.slot = Some(cursor);
        self
    }
}

/// A recorded set. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedSet {
    /// Stable id of the exercise the set belongs to
    pub exercise_id: String,
    /// Exercise position in the plan
    pub exercise_index: usize,
    /// Set position within the exercise
    pub set_index: usize,
    /// Weight lifted in kilograms
    pub weight: f64,
    /// Repetitions performed
    pub reps: u32,
    /// Rate of perceived exertion
    pub rpe: Option<f32>,
    /// Free-form notes
    pub notes: Option<String>,
    /// Completion timestamp
    pub completed_at: DateTime<Utc>,
    /// Whether the set beat the historical best
    pub is_pr: bool,
}

impl CompletedSet {
    /// Training volume of this set (weight x reps).
    pub fn volume(&self) -> f64 {
        self.weight * self.reps as f64
    }
}

/// Best historical performance for an exercise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoricalBest {
    /// Heaviest weight lifted
    pub weight: f64,
    /// Most reps performed at that weight
    pub reps: u32,
}

impl HistoricalBest {
    /// Create a historical best.
    pub fn new(weight: f64, reps: u32) -> Self {
        Self { weight, reps }
    }
}

/// A personal record awaiting acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrEvent {
    /// Display name of the exercise
    pub exercise_name: String,
    /// Weight of the record set
    pub weight: f64,
    /// Reps of the record set
    pub reps: u32,
    /// Previous best weight, if any
    pub previous_best: Option<f64>,
}

/// Read-only view of the rest countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestState {
    /// Seconds left
    pub remaining_seconds: u32,
    /// Total seconds of this rest (including extensions)
    pub total_seconds: u32,
    /// Whether the countdown is running (false while paused)
    pub is_active: bool,
}

impl RestState {
    /// Fraction of the rest already elapsed (0.0 to 1.0).
    pub fn progress(&self) -> f32 {
        if self.total_seconds == 0 {
            return 1.0;
        }
        let elapsed = self.total_seconds.saturating_sub(self.remaining_seconds);
        (elapsed as f32 / self.total_seconds as f32).clamp(0.0, 1.0)
    }
}

/// Aggregated result of a finished session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Active session time in seconds
    pub total_duration_seconds: u64,
    /// Number of recorded sets
    pub total_sets: usize,
    /// Sum of weight x reps over all recorded sets
    pub total_volume: f64,
    /// Personal records hit during the session
    pub pr_count: u32,
    /// Distinct exercises with at least one recorded set
    pub exercises_completed: usize,
}

/// Named session phase, as exposed to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    /// Waiting for the workout to start
    Preparing,
    /// Performing a set
    Active,
    /// Resting between sets
    Rest,
    /// Paused by the user
    Paused,
    /// Celebrating a personal record
    #[serde(rename = "pr")]
    PersonalRecord,
    /// Finished (terminal)
    Complete,
}

impl PhaseKind {
    /// Whether elapsed session time accrues in this phase.
    pub fn is_timed(self) -> bool {
        matches!(
            self,
            PhaseKind::Active | PhaseKind::Rest | PhaseKind::PersonalRecord
        )
    }
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhaseKind::Preparing => write!(f, "preparing"),
            PhaseKind::Active => write!(f, "active"),
            PhaseKind::Rest => write!(f, "rest"),
            PhaseKind::Paused => write!(f, "paused"),
            PhaseKind::PersonalRecord => write!(f, "pr"),
            PhaseKind::Complete => write!(f, "complete"),
        }
    }
}

/// Outcome of an engine action or tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Session state changed (the phase may stay the same)
    Applied { from: PhaseKind, to: PhaseKind },
    /// Not applicable in the current phase; nothing changed
    Ignored,
}

impl Transition {
    /// Whether the action changed anything.
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied { .. })
    }

    /// Phase after the action, if it was applied.
    pub fn target(&self) -> Option<PhaseKind> {
        match self {
            Transition::Applied { to, .. } => Some(*to),
            Transition::Ignored => None,
        }
    }
}

/// Current exercise as shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseView {
    /// Stable exercise identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Measurement mode
    pub tracking: TrackingMode,
    /// Number of planned sets
    pub planned_sets: usize,
    /// Planned target for the set under the cursor, if any remain
    pub target: Option<PlannedSet>,
}

/// Which write failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceTarget {
    /// A completed set
    Set { exercise_index: usize, set_index: usize },
    /// The final session summary
    Summary,
}

/// A non-fatal persistence failure kept for external retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceFailure {
    /// What was being written
    pub target: PersistenceTarget,
    /// Error description from the sink
    pub message: String,
    /// When the failure was observed
    pub occurred_at: DateTime<Utc>,
}

/// Read-only projection of session state for the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Session identifier
    pub session_id: Uuid,
    /// Workout plan identifier
    pub workout_id: String,
    /// Current phase
    pub phase: PhaseKind,
    /// Phase that `resume` will restore, while paused
    pub paused_from: Option<PhaseKind>,
    /// Position within the plan
    pub cursor: ExerciseCursor,
    /// Exercise under the cursor
    pub current_exercise: Option<ExerciseView>,
    /// Number of exercises in the plan
    pub total_exercises: usize,
    /// Number of sets in the plan
    pub total_planned_sets: usize,
    /// Every recorded set, in completion order
    pub all_completed_sets: Vec<CompletedSet>,
    /// Recorded sets of the exercise under the cursor
    pub completed_sets_for_current_exercise: Vec<CompletedSet>,
    /// Rest countdown, while resting (or paused from rest)
    pub rest: Option<RestState>,
    /// Active session time in seconds
    pub elapsed_seconds: u64,
    /// When the current accrual period started
    pub running_since: Option<DateTime<Utc>>,
    /// Personal record awaiting dismissal
    pub pending_pr: Option<PrEvent>,
    /// Final summary, once complete
    pub summary: Option<SessionSummary>,
    /// Writes that failed and have not been drained
    pub persistence_failures: Vec<PersistenceFailure>,
}

/// Errors related to session setup.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Plan could not be fetched
    #[error("Failed to load workout {workout_id}: {source}")]
    LoadFailed {
        workout_id: String,
        #[source]
        source: PortError,
    },

    /// Plan data is malformed
    #[error("Invalid workout plan: {0}")]
    InvalidPlan(String),
}

/// Reasons a set observation is rejected. State is unchanged on rejection.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SetRejection {
    /// Sets can only be completed while active
    #[error("Cannot complete a set while {phase}")]
    WrongPhase { phase: PhaseKind },

    /// Observation targets a different slot than the cursor
    #[error("Observation is for {actual} but the session is at {expected}")]
    CursorMismatch {
        expected: ExerciseCursor,
        actual: ExerciseCursor,
    },

    /// Cursor does not point at a planned set
    #[error("No planned set at {cursor}")]
    SlotOutOfRange { cursor: ExerciseCursor },

    /// Weight must be positive (or non-negative for bodyweight)
    #[error("Invalid weight: {weight}")]
    NonPositiveWeight { weight: f64 },

    /// Reps must be positive
    #[error("Reps must be greater than zero")]
    NonPositiveReps,

    /// RPE outside 0-10
    #[error("RPE must be between 0 and 10, got {rpe}")]
    InvalidRpe { rpe: f32 },
}

/// Errors reported by external collaborators.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PortError {
    /// Requested item does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Backend temporarily unavailable
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Storage failure
    #[error("Storage error: {0}")]
    Storage(String),
}
