use chrono::{DateTime, Utc};
use serde::Serialize;

use lab_core::model::{
    LabError, LabMode, LabSession, Measurements, Procedure, SafetyGear, Score,
};
use lab_core::time::minutes;
use lab_core::validator::StepFailure;

use super::deferred::{RunId, TaskKind};
use super::progress::SessionProgress;

/// Presentation-agnostic picture of a session at one instant.
///
/// Timestamps stay as UTC values and elapsed time as fractional minutes; the
/// UI decides how to format them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabSnapshot {
    pub taken_at: DateTime<Utc>,
    pub run: RunId,
    pub procedure: Procedure,
    pub mode: LabMode,
    pub safety: SafetyGear,
    pub measurements: Measurements,
    pub errors: Vec<LabError>,
    pub score: Score,
    pub elapsed_minutes: f64,
    pub progress: SessionProgress,
    /// Why the current step would not pass right now, if it would not.
    pub blocking: Option<StepFailure>,
    pub pending_tasks: Vec<TaskKind>,
}

impl LabSnapshot {
    #[must_use]
    pub fn capture(
        session: &LabSession,
        run: RunId,
        pending_tasks: Vec<TaskKind>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            taken_at: now,
            run,
            procedure: session.procedure(),
            mode: session.mode(),
            safety: session.safety(),
            measurements: session.measurements().clone(),
            errors: session.errors().entries().to_vec(),
            score: session.score(),
            elapsed_minutes: minutes(session.elapsed(now)),
            progress: SessionProgress::of(session),
            blocking: session.current_validation().failure().cloned(),
            pending_tasks,
        }
    }

    /// # Errors
    ///
    /// Returns `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
