//! Collaborator interfaces the session engine calls out to.
//!
//! The engine only needs plan data, historical bests, and somewhere to write
//! results. In-memory implementations are provided for hosts without a
//! backend and for tests; `storage::SessionStore` is the SQLite-backed one.

use crate::workouts::clock::{Clock, SystemClock};
use crate::workouts::types::{CompletedSet, HistoricalBest, PortError, SessionSummary, WorkoutPlan};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Source of workout plans.
pub trait PlanSource: Send + Sync {
    /// Fetch the plan with the given id.
    fn load_workout_plan(&self, workout_id: &str) -> Result<WorkoutPlan, PortError>;
}

/// Source of historical bests for PR comparison.
pub trait HistoricalBests: Send + Sync {
    /// Best recorded performance for an exercise, if any.
    fn get_historical_best(&self, exercise_id: &str) -> Result<Option<HistoricalBest>, PortError>;
}

/// Destination for session results.
pub trait SessionSink: Send + Sync {
    /// Persist one completed set.
    fn persist_completed_set(
        &self,
        session_id: Uuid,
        workout_id: &str,
        set: &CompletedSet,
    ) -> Result<(), PortError>;

    /// Persist the final summary.
    fn persist_session_summary(
        &self,
        session_id: Uuid,
        workout_id: &str,
        summary: &SessionSummary,
    ) -> Result<(), PortError>;
}

/// Everything a session engine needs from the outside world.
#[derive(Clone)]
pub struct SessionPorts {
    /// Plan lookup
    pub plans: Arc<dyn PlanSource>,
    /// Historical best lookup
    pub history: Arc<dyn HistoricalBests>,
    /// Result persistence
    pub sink: Arc<dyn SessionSink>,
    /// Wall-clock source
    pub clock: Arc<dyn Clock>,
}

impl SessionPorts {
    /// Bundle collaborators using the system clock.
    pub fn new(
        plans: Arc<dyn PlanSource>,
        history: Arc<dyn HistoricalBests>,
        sink: Arc<dyn SessionSink>,
    ) -> Self {
        Self {
            plans,
            history,
            sink,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the wall-clock source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Plans held in memory.
#[derive(Debug, Default)]
pub struct InMemoryPlans {
    plans: RwLock<HashMap<String, WorkoutPlan>>,
    unavailable: AtomicBool,
}

impl InMemoryPlans {
    /// Create an empty plan source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a plan.
    pub fn insert(&self, plan: WorkoutPlan) {
        if let Ok(mut plans) = self.plans.write() {
            plans.insert(plan.id.clone(), plan);
        }
    }

    /// Simulate the backend being unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl PlanSource for InMemoryPlans {
    fn load_workout_plan(&self, workout_id: &str) -> Result<WorkoutPlan, PortError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PortError::Unavailable("plan source offline".to_string()));
        }

        let plans = self
            .plans
            .read()
            .map_err(|e| PortError::Storage(e.to_string()))?;
        plans
            .get(workout_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("workout {}", workout_id)))
    }
}

/// Historical bests held in memory.
#[derive(Debug, Default)]
pub struct InMemoryHistory {
    bests: RwLock<HashMap<String, HistoricalBest>>,
}

impl InMemoryHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the best for an exercise.
    pub fn set_best(&self, exercise_id: &str, best: HistoricalBest) {
        if let Ok(mut bests) = self.bests.write() {
            bests.insert(exercise_id.to_string(), best);
        }
    }
}

impl HistoricalBests for InMemoryHistory {
    fn get_historical_best(&self, exercise_id: &str) -> Result<Option<HistoricalBest>, PortError> {
        let bests = self
            .bests
            .read()
            .map_err(|e| PortError::Storage(e.to_string()))?;
        Ok(bests.get(exercise_id).copied())
    }
}

/// Sink that keeps everything it is given, optionally failing on demand.
#[derive(Debug, Default)]
pub struct MemorySink {
    sets: RwLock<Vec<(Uuid, CompletedSet)>>,
    summaries: RwLock<Vec<(Uuid, SessionSummary)>>,
    fail_writes: AtomicBool,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    /// Sets written so far.
    pub fn sets(&self) -> Vec<CompletedSet> {
        self.sets
            .read()
            .map(|sets| sets.iter().map(|(_, s)| s.clone()).collect())
            .unwrap_or_default()
    }

    /// Summaries written so far.
    pub fn summaries(&self) -> Vec<SessionSummary> {
        self.summaries
            .read()
            .map(|all| all.iter().map(|(_, s)| s.clone()).collect())
            .unwrap_or_default()
    }

    fn check_available(&self) -> Result<(), PortError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(PortError::Unavailable("write rejected".to_string()))
        } else {
            Ok(())
        }
    }
}

impl SessionSink for MemorySink {
    fn persist_completed_set(
        &self,
        session_id: Uuid,
        _workout_id: &str,
        set: &CompletedSet,
    ) -> Result<(), PortError> {
        self.check_available()?;
        self.sets
            .write()
            .map_err(|e| PortError::Storage(e.to_string()))?
            .push((session_id, set.clone()));
        Ok(())
    }

    fn persist_session_summary(
        &self,
        session_id: Uuid,
        _workout_id: &str,
        summary: &SessionSummary,
    ) -> Result<(), PortError> {
        self.check_available()?;
        self.summaries
            .write()
            .map_err(|e| PortError::Storage(e.to_string()))?
            .push((session_id, summary.clone()));
        Ok(())
    }
}
