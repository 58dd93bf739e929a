//! Workout module for guided strength sessions.

pub mod clock;
pub mod driver;
pub mod engine;
pub mod ports;
pub mod recorder;
pub mod records;
pub mod rest_timer;
pub mod summary;
pub mod types;

pub use clock::{Clock, IntervalTicker, ManualClock, ManualTickSource, ManualTicker, SystemClock, Ticker};
pub use driver::{DriverError, SessionAction, SessionDriver, SessionEvent, SessionHandle};
pub use engine::SessionEngine;
pub use ports::{
    HistoricalBests, InMemoryHistory, InMemoryPlans, MemorySink, PlanSource, SessionPorts,
    SessionSink,
};
pub use recorder::SetRecorder;
pub use records::PrDetector;
pub use rest_timer::RestTimer;
pub use summary::SummaryBuilder;
pub use types::{
    CompletedSet, ExerciseCursor, ExerciseView, HistoricalBest, PersistenceFailure,
    PersistenceTarget, PhaseKind, PlannedExercise, PlannedSet, PortError, PrEvent, RestState,
    SessionError, SessionSnapshot, SessionSummary, SetObservation, SetRejection, TrackingMode,
    Transition, WorkoutPlan,
};
