//! SetPace - Guided Strength Workout Sessions
//!
//! Drives a lifter through a planned workout: records sets, runs rest timers,
//! detects personal records against past sessions, and produces a summary.
//! The session state machine is synchronous; an async driver hosts it on a
//! tokio task with a one-second ticker, and a SQLite store provides plans,
//! history and persistence.

pub mod logging;
pub mod storage;
pub mod workouts;

// Re-export commonly used types
pub use storage::config::AppConfig;
pub use storage::store::SessionStore;
pub use workouts::driver::{SessionDriver, SessionHandle};
pub use workouts::engine::SessionEngine;
pub use workouts::ports::SessionPorts;
