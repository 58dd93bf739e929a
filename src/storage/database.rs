//! Database operations using rusqlite.

use crate::storage::schema::{CURRENT_VERSION, SCHEMA, SCHEMA_VERSION_TABLE};
use crate::workouts::types::{CompletedSet, HistoricalBest, SessionSummary, WorkoutPlan};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, Result as SqliteResult};
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

/// Database wrapper for SQLite operations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::IoError(e.to_string()))?;
        }

        let conn =
            Connection::open(path).map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let db = Self { conn };
        db.initialize()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let db = Self { conn };
        db.initialize()?;

        Ok(db)
    }

    /// Initialize the database schema.
    fn initialize(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(SCHEMA_VERSION_TABLE)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

        let current_version = self.schema_version()?;

        if current_version < CURRENT_VERSION {
            self.migrate(current_version)?;
        }

        Ok(())
    }

    /// Get the current schema version.
    pub fn schema_version(&self) -> Result<i32, DatabaseError> {
        let result: SqliteResult<i32> = self.conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        );

        match result {
            Ok(version) => Ok(version),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }

    /// Run database migrations.
    fn migrate(&self, from_version: i32) -> Result<(), DatabaseError> {
        if from_version < 1 {
            self.conn
                .execute_batch(SCHEMA)
                .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

            self.conn
                .execute(
                    "INSERT INTO schema_version (version, applied_at) VALUES (?, datetime('now'))",
                    [CURRENT_VERSION],
                )
                .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

            tracing::info!("Database migrated to version {}", CURRENT_VERSION);
        }

        Ok(())
    }

    // ========== Workout Plans ==========

    /// Insert or replace a workout plan.
    pub fn save_plan(&self, plan: &WorkoutPlan) -> Result<(), DatabaseError> {
        let plan_json = serde_json::to_string(plan)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

        self.conn
            .execute(
                "INSERT OR REPLACE INTO workout_plans (id, name, plan_json, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![plan.id, plan.name, plan_json, Utc::now().to_rfc3339()],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    /// Get a workout plan by ID.
    pub fn get_plan(&self, id: &str) -> Result<Option<WorkoutPlan>, DatabaseError> {
        let result: SqliteResult<String> = self.conn.query_row(
            "SELECT plan_json FROM workout_plans WHERE id = ?1",
            params![id],
            |row| row.get(0),
        );

        match result {
            Ok(json) => {
                let plan = serde_json::from_str(&json)
                    .map_err(|e| DatabaseError::DeserializationError(e.to_string()))?;
                Ok(Some(plan))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }

    /// List workout plan ids and names, ordered by name.
    pub fn list_plans(&self) -> Result<Vec<(String, String)>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM workout_plans ORDER BY name")
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        rows.collect::<SqliteResult<Vec<_>>>()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))
    }

    // ========== Completed Sets ==========

    /// Insert a completed set.
    pub fn insert_completed_set(
        &self,
        session_id: &Uuid,
        workout_id: &str,
        set: &CompletedSet,
    ) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "INSERT INTO completed_sets (session_id, workout_id, exercise_id, exercise_index,
                 set_index, weight, reps, rpe, notes, is_pr, completed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    session_id.to_string(),
                    workout_id,
                    set.exercise_id,
                    set.exercise_index as i64,
                    set.set_index as i64,
                    set.weight,
                    set.reps,
                    set.rpe,
                    set.notes,
                    set.is_pr,
                    set.completed_at.to_rfc3339(),
                ],
            )
            .map_err(map_write_error)?;

        Ok(())
    }

    /// Get all sets recorded for a session, in completion order.
    pub fn sets_for_session(&self, session_id: &Uuid) -> Result<Vec<CompletedSet>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT exercise_id, exercise_index, set_index, weight, reps, rpe, notes,
                 is_pr, completed_at FROM completed_sets WHERE session_id = ?1 ORDER BY id",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(params![session_id.to_string()], |row| {
                Ok(SetRow {
                    exercise_id: row.get(0)?,
                    exercise_index: row.get(1)?,
                    set_index: row.get(2)?,
                    weight: row.get(3)?,
                    reps: row.get(4)?,
                    rpe: row.get(5)?,
                    notes: row.get(6)?,
                    is_pr: row.get(7)?,
                    completed_at: row.get(8)?,
                })
            })
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut sets = Vec::new();
        for row in rows {
            let row = row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            sets.push(row.into_set()?);
        }

        Ok(sets)
    }

    /// Best set for an exercise across finished sessions.
    ///
    /// Heaviest weight first, then most reps at that weight. Sets of sessions
    /// without a summary are ignored.
    pub fn historical_best(&self, exercise_id: &str) -> Result<Option<HistoricalBest>, DatabaseError> {
        let result: SqliteResult<(f64, u32)> = self.conn.query_row(
            "SELECT cs.weight, cs.reps FROM completed_sets cs
             JOIN session_summaries ss ON ss.session_id = cs.session_id
             WHERE cs.exercise_id = ?1
             ORDER BY cs.weight DESC, cs.reps DESC
             LIMIT 1",
            params![exercise_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        );

        match result {
            Ok((weight, reps)) => Ok(Some(HistoricalBest::new(weight, reps))),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }

    // ========== Session Summaries ==========

    /// Insert the summary of a finished session.
    pub fn insert_summary(
        &self,
        session_id: &Uuid,
        workout_id: &str,
        summary: &SessionSummary,
    ) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "INSERT INTO session_summaries (session_id, workout_id, total_duration_seconds,
                 total_sets, total_volume, pr_count, exercises_completed, finished_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    session_id.to_string(),
                    workout_id,
                    summary.total_duration_seconds as i64,
                    summary.total_sets as i64,
                    summary.total_volume,
                    summary.pr_count,
                    summary.exercises_completed as i64,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(map_write_error)?;

        Ok(())
    }

    /// Get the summary of a finished session.
    pub fn get_summary(&self, session_id: &Uuid) -> Result<Option<SessionSummary>, DatabaseError> {
        let result = self.conn.query_row(
            "SELECT total_duration_seconds, total_sets, total_volume, pr_count, exercises_completed
             FROM session_summaries WHERE session_id = ?1",
            params![session_id.to_string()],
            |row| {
                Ok(SessionSummary {
                    total_duration_seconds: row.get::<_, i64>(0)?.max(0) as u64,
                    total_sets: row.get::<_, i64>(1)?.max(0) as usize,
                    total_volume: row.get(2)?,
                    pr_count: row.get(3)?,
                    exercises_completed: row.get::<_, i64>(4)?.max(0) as usize,
                })
            },
        );

        match result {
            Ok(summary) => Ok(Some(summary)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }
}

fn map_write_error(e: rusqlite::Error) -> DatabaseError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
            DatabaseError::ConstraintViolation(e.to_string())
        }
        _ => DatabaseError::QueryFailed(e.to_string()),
    }
}

/// Raw completed-set row.
struct SetRow {
    exercise_id: String,
    exercise_index: i64,
    set_index: i64,
    weight: f64,
    reps: u32,
    rpe: Option<f32>,
    notes: Option<String>,
    is_pr: bool,
    completed_at: String,
}

impl SetRow {
    fn into_set(self) -> Result<CompletedSet, DatabaseError> {
        let completed_at = DateTime::parse_from_rfc3339(&self.completed_at)
            .map_err(|e| DatabaseError::DeserializationError(e.to_string()))?
            .with_timezone(&Utc);

        Ok(CompletedSet {
            exercise_id: self.exercise_id,
            exercise_index: self.exercise_index.max(0) as usize,
            set_index: self.set_index.max(0) as usize,
            weight: self.weight,
            reps: self.reps,
            rpe: self.rpe,
            notes: self.notes,
            completed_at,
            is_pr: self.is_pr,
        })
    }
}

/// Database errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}
