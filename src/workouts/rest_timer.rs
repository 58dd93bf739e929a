//! Rest countdown between sets.

use crate::workouts::types::RestState;

/// Default ceiling for a single `add_seconds` call.
pub const DEFAULT_MAX_EXTENSION_SECONDS: u32 = 300;

/// Pausable countdown driven by one-second ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestTimer {
    remaining_seconds: u32,
    total_seconds: u32,
    is_active: bool,
}

impl RestTimer {
    /// Start a countdown of `total_seconds`.
    pub fn start(total_seconds: u32) -> Self {
        tracing::debug!("Rest started: {}s", total_seconds);
        Self {
            remaining_seconds: total_seconds,
            total_seconds,
            is_active: true,
        }
    }

    /// Advance one second. Returns true once the countdown has reached zero.
    ///
    /// Does nothing while frozen.
    pub fn tick(&mut self) -> bool {
        if self.is_active {
            self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        }
        self.is_expired()
    }

    /// Add time to the countdown, at most `cap` seconds per call.
    ///
    /// Returns the seconds actually added.
    pub fn add_seconds(&mut self, seconds: u32, cap: u32) -> u32 {
        let added = seconds.min(cap);
        self.remaining_seconds = self.remaining_seconds.saturating_add(added);
        self.total_seconds = self.total_seconds.saturating_add(added);
        added
    }

    /// End the rest immediately.
    pub fn skip(&mut self) {
        self.remaining_seconds = 0;
    }

    /// Whether the countdown has run out.
    pub fn is_expired(&self) -> bool {
        self.remaining_seconds == 0
    }

    /// Stop the countdown from advancing.
    pub fn freeze(&mut self) {
        self.is_active = false;
    }

    /// Let the countdown advance again.
    pub fn unfreeze(&mut self) {
        self.is_active = true;
    }

    /// Seconds left.
    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    /// Total length including extensions.
    pub fn total_seconds(&self) -> u32 {
        self.total_seconds
    }

    /// Whether ticks currently decrement the countdown.
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Read-only view for snapshots.
    pub fn state(&self) -> RestState {
        RestState {
            remaining_seconds: self.remaining_seconds,
            total_seconds: self.total_seconds,
            is_active: self.is_active,
        }
    }
}
