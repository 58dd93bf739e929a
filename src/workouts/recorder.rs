//! Set recorder.
//!
//! Turns a validated observation into an immutable [`CompletedSet`]. Validation
//! belongs to the engine; the recorder never rejects its input and never
//! touches storage.

use crate::workouts::types::{CompletedSet, ExerciseCursor, SetObservation};
use chrono::{DateTime, Utc};

/// Builds completed sets for one exercise slot.
#[derive(Debug, Default, Clone, Copy)]
pub struct SetRecorder;

impl SetRecorder {
    /// Create a recorder.
    pub fn new() -> Self {
        Self
    }

    /// Record an observation at the given cursor.
    pub fn record(
        &self,
        exercise_id: &str,
        cursor: ExerciseCursor,
        observation: SetObservation,
        completed_at: DateTime<Utc>,
        is_pr: bool,
    ) -> CompletedSet {
        tracing::debug!(
            "Recorded {} x {} at {}",
            observation.weight,
            observation.reps,
            cursor
        );

        CompletedSet {
            exercise_id: exercise_id.to_string(),
            exercise_index: cursor.exercise_index,
            set_index: cursor.set_index,
            weight: observation.weight,
            reps: observation.reps,
            rpe: observation.rpe,
            notes: observation.notes,
            completed_at,
            is_pr,
        }
    }
}
