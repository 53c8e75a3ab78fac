use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{
    ErrorCategory, ErrorId, ErrorLog, ErrorLogError, LabSettings, MeasurementError,
    MeasurementKey, MeasurementValue, Measurements, PracticePolicy, Procedure, Score,
};
use crate::scorer::Scorer;
use crate::time::SessionClock;
use crate::validator::{StepFailure, Validation, validate};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransitionError {
    #[error("session already completed")]
    Completed,
}

//
// ─── MODE & SAFETY ─────────────────────────────────────────────────────────────
//

/// How strictly `advance` enforces step rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabMode {
    /// Invalid steps block advancement and are logged.
    #[default]
    Guided,
    /// Invalid steps are handled by the configured [`PracticePolicy`].
    Practice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyItem {
    Gloves,
    Goggles,
}

/// Protective gear currently worn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SafetyGear {
    pub gloves: bool,
    pub goggles: bool,
}

impl SafetyGear {
    /// Both gloves and goggles are on.
    #[must_use]
    pub fn is_worn(&self) -> bool {
        self.gloves && self.goggles
    }

    #[must_use]
    pub fn has(&self, item: SafetyItem) -> bool {
        match item {
            SafetyItem::Gloves => self.gloves,
            SafetyItem::Goggles => self.goggles,
        }
    }

    fn slot(&mut self, item: SafetyItem) -> &mut bool {
        match item {
            SafetyItem::Gloves => &mut self.gloves,
            SafetyItem::Goggles => &mut self.goggles,
        }
    }
}

//
// ─── ADVANCE OUTCOME ───────────────────────────────────────────────────────────
//

/// What a call to [`LabSession::advance`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum AdvanceOutcome {
    /// The step passed and the next one is current.
    Advanced { from: u8, to: u8 },
    /// The final step passed; the session is complete and scored.
    Completed { score: Score },
    /// Guided mode refused an invalid step and logged it.
    Blocked {
        failure: StepFailure,
        error_id: ErrorId,
    },
    /// Practice mode moved past an invalid step.
    Forced {
        from: u8,
        to: u8,
        failure: StepFailure,
        error_id: Option<ErrorId>,
        completed: bool,
    },
    /// Practice mode stayed on an invalid step without logging.
    Held { failure: StepFailure },
}

impl AdvanceOutcome {
    /// True when the session moved forward or completed.
    #[must_use]
    pub fn progressed(&self) -> bool {
        matches!(
            self,
            AdvanceOutcome::Advanced { .. }
                | AdvanceOutcome::Completed { .. }
                | AdvanceOutcome::Forced { .. }
        )
    }

    #[must_use]
    pub fn failure(&self) -> Option<&StepFailure> {
        match self {
            AdvanceOutcome::Blocked { failure, .. }
            | AdvanceOutcome::Forced { failure, .. }
            | AdvanceOutcome::Held { failure } => Some(failure),
            AdvanceOutcome::Advanced { .. } | AdvanceOutcome::Completed { .. } => None,
        }
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// State of one practice run of a procedure.
///
/// The step index is 1-based and stays within `1..=step_count`. It only moves
/// forward through [`LabSession::advance`] and only back through
/// [`LabSession::retreat`]. Reaching the final step is not completion by itself:
/// the final step must also pass (or be forced past in practice mode).
#[derive(Debug, Clone, PartialEq)]
pub struct LabSession {
    procedure: Procedure,
    current_step: u8,
    mode: LabMode,
    safety: SafetyGear,
    measurements: Measurements,
    errors: ErrorLog,
    score: Score,
    is_complete: bool,
    clock: SessionClock,
}

impl LabSession {
    #[must_use]
    pub fn new(procedure: Procedure) -> Self {
        Self {
            procedure,
            current_step: 1,
            mode: LabMode::default(),
            safety: SafetyGear::default(),
            measurements: Measurements::new(),
            errors: ErrorLog::new(),
            score: Score::initial(),
            is_complete: false,
            clock: SessionClock::new(),
        }
    }

    #[must_use]
    pub fn procedure(&self) -> Procedure {
        self.procedure
    }

    #[must_use]
    pub fn current_step(&self) -> u8 {
        self.current_step
    }

    #[must_use]
    pub fn step_count(&self) -> u8 {
        self.procedure.step_count()
    }

    #[must_use]
    pub fn mode(&self) -> LabMode {
        self.mode
    }

    #[must_use]
    pub fn safety(&self) -> SafetyGear {
        self.safety
    }

    #[must_use]
    pub fn measurements(&self) -> &Measurements {
        &self.measurements
    }

    #[must_use]
    pub fn errors(&self) -> &ErrorLog {
        &self.errors
    }

    /// Last computed score; the initial placeholder until completion.
    #[must_use]
    pub fn score(&self) -> Score {
        self.score
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    #[must_use]
    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    #[must_use]
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        self.clock.current_elapsed(now)
    }

    // ─── Mutations from the workspace ──────────────────────────────────────────

    pub fn set_mode(&mut self, mode: LabMode) {
        self.mode = mode;
    }

    /// Flips one piece of gear and returns whether it is now worn.
    pub fn toggle_safety(&mut self, item: SafetyItem) -> bool {
        let slot = self.safety.slot(item);
        *slot = !*slot;
        *slot
    }

    pub fn set_safety(&mut self, item: SafetyItem, worn: bool) {
        *self.safety.slot(item) = worn;
    }

    /// Records a measurement and returns the value it replaced.
    ///
    /// # Errors
    ///
    /// Returns `MeasurementError` if the value does not fit the key.
    pub fn set_measurement(
        &mut self,
        key: MeasurementKey,
        value: impl Into<MeasurementValue>,
    ) -> Result<Option<MeasurementValue>, MeasurementError> {
        self.measurements.set(key, value)
    }

    /// Logs a violation against the current step.
    pub fn log_error(
        &mut self,
        category: ErrorCategory,
        message: impl Into<String>,
        at: DateTime<Utc>,
    ) -> ErrorId {
        self.errors.add(self.current_step, category, message, at)
    }

    /// # Errors
    ///
    /// Returns `ErrorLogError::NotFound` for an unknown id.
    pub fn resolve_error(&mut self, id: ErrorId) -> Result<(), ErrorLogError> {
        self.errors.resolve(id)
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    // ─── Clock ─────────────────────────────────────────────────────────────────

    pub fn start_clock(&mut self, now: DateTime<Utc>) -> bool {
        self.clock.start(now)
    }

    pub fn stop_clock(&mut self, now: DateTime<Utc>) {
        self.clock.stop(now);
    }

    // ─── Validation ────────────────────────────────────────────────────────────

    #[must_use]
    pub fn validation(&self, step: u8) -> Validation {
        validate(self.procedure, step, self)
    }

    #[must_use]
    pub fn current_validation(&self) -> Validation {
        self.validation(self.current_step)
    }

    // ─── State machine ─────────────────────────────────────────────────────────

    /// Tries to move past the current step.
    ///
    /// A passing step advances (or completes the session on the final step).
    /// A failing step is blocked and logged in guided mode; in practice mode
    /// the settings' [`PracticePolicy`] decides.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError::Completed` if the final step was already committed.
    pub fn advance(
        &mut self,
        settings: &LabSettings,
        now: DateTime<Utc>,
    ) -> Result<AdvanceOutcome, TransitionError> {
        let from = self.current_step;
        if self.is_complete && from >= self.step_count() {
            return Err(TransitionError::Completed);
        }

        let failure = match self.current_validation() {
            Validation::Valid => {
                let (to, completed) = self.step_forward(settings, now);
                return Ok(if completed {
                    AdvanceOutcome::Completed { score: self.score }
                } else {
                    AdvanceOutcome::Advanced { from, to }
                });
            }
            Validation::Invalid(failure) => failure,
        };

        let outcome = match (self.mode, settings.practice_policy()) {
            (LabMode::Guided, _) => {
                let error_id = self.log_error(failure.category, failure.message.clone(), now);
                AdvanceOutcome::Blocked { failure, error_id }
            }
            (LabMode::Practice, PracticePolicy::Hold) => AdvanceOutcome::Held { failure },
            (LabMode::Practice, policy) => {
                let error_id = (policy == PracticePolicy::LogAndAdvance)
                    .then(|| self.log_error(failure.category, failure.message.clone(), now));
                let (to, completed) = self.step_forward(settings, now);
                AdvanceOutcome::Forced {
                    from,
                    to,
                    failure,
                    error_id,
                    completed,
                }
            }
        };
        Ok(outcome)
    }

    /// Steps back one step, never below the first. Never validated or logged.
    pub fn retreat(&mut self) -> u8 {
        self.current_step = self.current_step.saturating_sub(1).max(1);
        self.current_step
    }

    /// Returns to step 1 and clears everything recorded during the run.
    ///
    /// Procedure and mode are kept. A running clock restarts from `now`.
    /// The error log is emptied but keeps counting, so ids from an earlier
    /// run never name a new entry.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        let was_running = self.clock.is_running();
        let mut errors = std::mem::take(&mut self.errors);
        errors.clear();
        *self = Self {
            mode: self.mode,
            errors,
            ..Self::new(self.procedure)
        };
        if was_running {
            self.clock.start(now);
        }
    }

    /// Switches procedure and resets the run.
    pub fn select_procedure(&mut self, procedure: Procedure, now: DateTime<Utc>) {
        self.procedure = procedure;
        self.reset(now);
    }

    /// Recomputes the score from the reached step, the error log and elapsed time.
    pub fn recompute_score(&mut self, settings: &LabSettings, now: DateTime<Utc>) -> Score {
        self.score = Scorer::new(*settings.scoring()).score(
            self.procedure,
            self.current_step,
            &self.errors,
            self.clock.current_elapsed(now),
        );
        self.score
    }

    fn step_forward(&mut self, settings: &LabSettings, now: DateTime<Utc>) -> (u8, bool) {
        if self.current_step < self.step_count() {
            self.current_step += 1;
            return (self.current_step, false);
        }
        self.clock.stop(now);
        self.is_complete = true;
        self.recompute_score(settings, now);
        (self.current_step, true)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
