use chrono::Duration;

use crate::model::{ErrorCategory, ErrorLog, Procedure, Score, ScoringWeights};
use crate::time::minutes;

/// Computes the composite score of a finished run.
///
/// - accuracy is proportional to the step reached,
/// - safety loses a flat penalty per safety error, resolved or not,
/// - efficiency loses points per minute beyond the procedure's expected time.
///
/// Components are floored at zero; the total is their plain sum.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scorer {
    weights: ScoringWeights,
}

impl Scorer {
    #[must_use]
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    #[must_use]
    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    #[must_use]
    pub fn accuracy(&self, completed_step: u8, total_steps: u8) -> f64 {
        if total_steps == 0 {
            return 0.0;
        }
        f64::from(completed_step) / f64::from(total_steps) * self.weights.accuracy_max()
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn safety(&self, errors: &ErrorLog) -> f64 {
        let count = errors.count(ErrorCategory::Safety) as f64;
        (self.weights.safety_max() - self.weights.safety_penalty() * count).max(0.0)
    }

    #[must_use]
    pub fn efficiency(&self, elapsed_minutes: f64, expected_minutes: f64) -> f64 {
        let max = self.weights.efficiency_max();
        if elapsed_minutes <= expected_minutes {
            return max;
        }
        let overtime = elapsed_minutes - expected_minutes;
        (max - self.weights.overtime_penalty_per_minute() * overtime).max(0.0)
    }

    #[must_use]
    pub fn score(
        &self,
        procedure: Procedure,
        completed_step: u8,
        errors: &ErrorLog,
        elapsed: Duration,
    ) -> Score {
        Score::from_components(
            self.accuracy(completed_step, procedure.step_count()),
            self.safety(errors),
            self.efficiency(minutes(elapsed), procedure.expected_minutes()),
        )
    }
}
