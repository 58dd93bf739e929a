//! SQLite-backed implementation of the session collaborator interfaces.

use crate::storage::database::{Database, DatabaseError};
use crate::workouts::ports::{HistoricalBests, PlanSource, SessionSink};
use crate::workouts::types::{CompletedSet, HistoricalBest, PortError, SessionSummary, WorkoutPlan};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Plan source, history and sink sharing one database connection.
pub struct SessionStore {
    db: Mutex<Database>,
}

impl SessionStore {
    /// Wrap an open database.
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// Open or create the store at the given path.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::new(Database::open(path)?))
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// Add or replace a workout plan.
    pub fn save_plan(&self, plan: &WorkoutPlan) -> Result<(), PortError> {
        self.lock()?.save_plan(plan).map_err(to_port_error)
    }

    /// Sets persisted for a session.
    pub fn sets_for_session(&self, session_id: &Uuid) -> Result<Vec<CompletedSet>, PortError> {
        self.lock()?
            .sets_for_session(session_id)
            .map_err(to_port_error)
    }

    /// Summary persisted for a session.
    pub fn summary_for_session(
        &self,
        session_id: &Uuid,
    ) -> Result<Option<SessionSummary>, PortError> {
        self.lock()?.get_summary(session_id).map_err(to_port_error)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>, PortError> {
        self.db
            .lock()
            .map_err(|e| PortError::Storage(format!("database lock poisoned: {}", e)))
    }
}

impl PlanSource for SessionStore {
    fn load_workout_plan(&self, workout_id: &str) -> Result<WorkoutPlan, PortError> {
        self.lock()?
            .get_plan(workout_id)
            .map_err(to_port_error)?
            .ok_or_else(|| PortError::NotFound(format!("workout {}", workout_id)))
    }
}

impl HistoricalBests for SessionStore {
    fn get_historical_best(&self, exercise_id: &str) -> Result<Option<HistoricalBest>, PortError> {
        self.lock()?
            .historical_best(exercise_id)
            .map_err(to_port_error)
    }
}

impl SessionSink for SessionStore {
    fn persist_completed_set(
        &self,
        session_id: Uuid,
        workout_id: &str,
        set: &CompletedSet,
    ) -> Result<(), PortError> {
        self.lock()?
            .insert_completed_set(&session_id, workout_id, set)
            .map_err(to_port_error)?;
        tracing::debug!(
            "Stored set {}/{} of {} for session {}",
            set.exercise_index + 1,
            set.set_index + 1,
            set.exercise_id,
            session_id
        );
        Ok(())
    }

    fn persist_session_summary(
        &self,
        session_id: Uuid,
        workout_id: &str,
        summary: &SessionSummary,
    ) -> Result<(), PortError> {
        self.lock()?
            .insert_summary(&session_id, workout_id, summary)
            .map_err(to_port_error)?;
        tracing::info!(
            "Stored summary for session {} ({} sets, {:.1} volume)",
            session_id,
            summary.total_sets,
            summary.total_volume
        );
        Ok(())
    }
}

fn to_port_error(e: DatabaseError) -> PortError {
    match e {
        DatabaseError::NotFound(what) => PortError::NotFound(what),
        DatabaseError::ConnectionFailed(msg) | DatabaseError::IoError(msg) => {
            PortError::Unavailable(msg)
        }
        other => PortError::Storage(other.to_string()),
    }
}
