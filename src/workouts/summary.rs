//! Session summary aggregation.

use crate::workouts::types::{CompletedSet, SessionSummary};
use std::collections::HashSet;

/// Aggregates recorded sets into a [`SessionSummary`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SummaryBuilder;

impl SummaryBuilder {
    /// Create a builder.
    pub fn new() -> Self {
        Self
    }

    /// Build the summary for a finished session.
    pub fn build(
        &self,
        all_completed_sets: &[CompletedSet],
        elapsed_seconds: u64,
        pr_events_seen: u32,
    ) -> SessionSummary {
        let total_volume = all_completed_sets.iter().map(CompletedSet::volume).sum();
        let exercises_completed = all_completed_sets
            .iter()
            .map(|s| s.exercise_index)
            .collect::<HashSet<_>>()
            .len();

        SessionSummary {
            total_duration_seconds: elapsed_seconds,
            total_sets: all_completed_sets.len(),
            total_volume,
            pr_count: pr_events_seen,
            exercises_completed,
        }
    }
}
