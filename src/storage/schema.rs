//! Database schema definitions.

/// SQL schema for creating all database tables.
pub const SCHEMA: &str = r#"
-- Workout plans
CREATE TABLE IF NOT EXISTS workout_plans (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    plan_json TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Sets recorded during sessions
CREATE TABLE IF NOT EXISTS completed_sets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    workout_id TEXT NOT NULL,
    exercise_id TEXT NOT NULL,
    exercise_index INTEGER NOT NULL,
    set_index INTEGER NOT NULL,
    weight REAL NOT NULL,
    reps INTEGER NOT NULL,
    rpe REAL,
    notes TEXT,
    is_pr INTEGER NOT NULL DEFAULT 0,
    completed_at TEXT NOT NULL,
    UNIQUE(session_id, exercise_index, set_index)
);

-- Finished sessions
CREATE TABLE IF NOT EXISTS session_summaries (
    session_id TEXT PRIMARY KEY,
    workout_id TEXT NOT NULL,
    total_duration_seconds INTEGER NOT NULL,
    total_sets INTEGER NOT NULL,
    total_volume REAL NOT NULL,
    pr_count INTEGER NOT NULL,
    exercises_completed INTEGER NOT NULL,
    finished_at TEXT NOT NULL
);

-- Indexes for common queries
CREATE INDEX IF NOT EXISTS idx_completed_sets_exercise ON completed_sets(exercise_id);
CREATE INDEX IF NOT EXISTS idx_completed_sets_session ON completed_sets(session_id);
"#;

/// Schema version table.
pub const SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
"#;

/// Current schema version.
pub const CURRENT_VERSION: i32 = 1;
