//! Personal-record detection.

use crate::workouts::types::{HistoricalBest, PrEvent};

/// Compares new sets against the historical best for the same exercise.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrDetector;

impl PrDetector {
    /// Create a detector.
    pub fn new() -> Self {
        Self
    }

    /// Whether `weight` x `reps` beats `best`.
    ///
    /// Heavier weight wins; at equal weight more reps win. Ties and missing
    /// history are never records.
    pub fn is_record(&self, weight: f64, reps: u32, best: Option<HistoricalBest>) -> bool {
        match best {
            None => false,
            Some(best) => {
                weight > best.weight || (weight == best.weight && reps > best.reps)
            }
        }
    }

    /// Build the celebration event for a set, if it is a record.
    pub fn evaluate(
        &self,
        exercise_name: &str,
        weight: f64,
        reps: u32,
        best: Option<HistoricalBest>,
    ) -> Option<PrEvent> {
        if !self.is_record(weight, reps, best) {
            return None;
        }

        tracing::info!("New PR on {}: {} x {}", exercise_name, weight, reps);
        Some(PrEvent {
            exercise_name: exercise_name.to_string(),
            weight,
            reps,
            previous_best: best.map(|b| b.weight),
        })
    }
}
