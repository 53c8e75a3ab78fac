use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use std::fmt;

use lab_core::Clock;
use lab_core::model::{
    AdvanceOutcome, ErrorCategory, ErrorId, LabError, LabMode, LabSession, LabSettings,
    MeasurementKey, MeasurementValue, Procedure, SafetyItem, Score, StepDefinition, TaskId,
};
use lab_core::validator::Validation;

use super::deferred::{DeferredQueue, RunId, TaskKind};
use super::progress::SessionProgress;
use super::view::LabSnapshot;
use crate::error::SessionError;

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Presentation-facing facade over one lab session.
///
/// This service owns:
/// - the time source (`Clock`)
/// - the settings the session runs under
/// - the pending device tasks and the run they belong to
///
/// Every operation reads `now` from the clock, so a fixed clock makes the whole
/// session deterministic.
///
/// Due device tasks land on `tick`, which `advance`, `current_validation` and
/// `snapshot` run first. The `&self` reads (`validation`, `is_task_pending`,
/// `task_progress`, `session`) show the queue as of the last tick, so an
/// embedding layer on the system clock calls `tick` from its frame or timer.
pub struct LabSessionService {
    clock: Clock,
    settings: LabSettings,
    session: LabSession,
    run: RunId,
    tasks: DeferredQueue,
}

impl LabSessionService {
    #[must_use]
    pub fn new(procedure: Procedure) -> Self {
        Self {
            clock: Clock::default(),
            settings: LabSettings::default_lab(),
            session: LabSession::new(procedure),
            run: RunId::new_v4(),
            tasks: DeferredQueue::new(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: LabSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    #[must_use]
    pub fn settings(&self) -> &LabSettings {
        &self.settings
    }

    #[must_use]
    pub fn session(&self) -> &LabSession {
        &self.session
    }

    #[must_use]
    pub fn run(&self) -> RunId {
        self.run
    }

    // ─── Lifecycle ─────────────────────────────────────────────────────────────

    /// The learner opened the workspace: start the stopwatch.
    pub fn enter(&mut self) -> bool {
        let started = self.session.start_clock(self.clock.now());
        if started {
            info!("lab session entered: {} run={}", self.session.procedure(), self.run);
        }
        started
    }

    /// The learner left the workspace: stop the stopwatch and drop pending device work.
    pub fn leave(&mut self) {
        self.session.stop_clock(self.clock.now());
        let cancelled = self.tasks.cancel_all();
        info!(
            "lab session left after {:.1} min, {cancelled} task(s) cancelled",
            lab_core::time::minutes(self.elapsed())
        );
    }

    pub fn select_procedure(&mut self, procedure: Procedure) {
        self.session.select_procedure(procedure, self.clock.now());
        self.begin_new_run();
        info!("procedure selected: {procedure} run={}", self.run);
    }

    /// # Errors
    ///
    /// Returns `SessionError::Procedure` for anything other than COD or BOD.
    pub fn select_procedure_by_name(&mut self, name: &str) -> Result<Procedure, SessionError> {
        let procedure: Procedure = name.parse()?;
        self.select_procedure(procedure);
        Ok(procedure)
    }

    pub fn reset(&mut self) {
        self.session.reset(self.clock.now());
        self.begin_new_run();
        info!("lab session reset: {} run={}", self.session.procedure(), self.run);
    }

    pub fn set_mode(&mut self, mode: LabMode) {
        debug!("mode -> {mode:?}");
        self.session.set_mode(mode);
    }

    fn begin_new_run(&mut self) {
        let cancelled = self.tasks.cancel_all();
        if cancelled > 0 {
            debug!("cancelled {cancelled} pending device task(s)");
        }
        self.run = RunId::new_v4();
    }

    // ─── Workspace input ───────────────────────────────────────────────────────

    pub fn toggle_safety(&mut self, item: SafetyItem) -> bool {
        let worn = self.session.toggle_safety(item);
        debug!("{item:?} worn={worn}");
        worn
    }

    /// Records a measurement and re-evaluates the current step.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Measurement` if the value does not fit the key.
    pub fn set_measurement(
        &mut self,
        key: MeasurementKey,
        value: impl Into<MeasurementValue>,
    ) -> Result<Validation, SessionError> {
        let value = value.into();
        self.session.set_measurement(key, value)?;
        debug!("measurement {key} = {value:?}");
        Ok(self.session.current_validation())
    }

    /// Like [`Self::set_measurement`], with the key given by its wire name.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Measurement` for an unknown key or a mismatched value.
    pub fn set_measurement_by_name(
        &mut self,
        name: &str,
        value: impl Into<MeasurementValue>,
    ) -> Result<Validation, SessionError> {
        let key: MeasurementKey = name.parse()?;
        self.set_measurement(key, value)
    }

    /// Logs a violation against the current step.
    pub fn record_error(&mut self, category: ErrorCategory, message: impl Into<String>) -> ErrorId {
        let message = message.into();
        warn!("step {} {category}: {message}", self.session.current_step());
        self.session.log_error(category, message, self.clock.now())
    }

    // ─── Progression ───────────────────────────────────────────────────────────

    /// Applies due device tasks, then tries to move past the current step.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Transition` if the session was already completed.
    pub fn advance(&mut self) -> Result<AdvanceOutcome, SessionError> {
        self.tick();
        let now = self.clock.now();
        let outcome = self.session.advance(&self.settings, now)?;
        match &outcome {
            AdvanceOutcome::Advanced { from, to } => debug!("step {from} -> {to}"),
            AdvanceOutcome::Completed { score } => info!(
                "{} completed: total {:.1} (accuracy {:.1}, safety {:.1}, efficiency {:.1})",
                self.session.procedure(),
                score.total,
                score.accuracy,
                score.safety,
                score.efficiency
            ),
            AdvanceOutcome::Blocked { failure, .. } => warn!(
                "step {} blocked ({}): {}",
                self.session.current_step(),
                failure.category,
                failure.message
            ),
            AdvanceOutcome::Forced { from, to, failure, .. } => {
                debug!("step {from} -> {to} forced past {}", failure.category);
            }
            AdvanceOutcome::Held { failure } => {
                debug!("step {} held: {}", self.session.current_step(), failure.message);
            }
        }
        Ok(outcome)
    }

    pub fn retreat(&mut self) -> u8 {
        let step = self.session.retreat();
        debug!("retreated to step {step}");
        step
    }

    #[must_use]
    pub fn validation(&self, step: u8) -> Validation {
        self.session.validation(step)
    }

    /// Applies due tasks, then validates the current step.
    pub fn current_validation(&mut self) -> Validation {
        self.tick();
        self.session.current_validation()
    }

    // ─── Results ───────────────────────────────────────────────────────────────

    #[must_use]
    pub fn score(&self) -> Score {
        self.session.score()
    }

    #[must_use]
    pub fn errors(&self) -> &[LabError] {
        self.session.errors().entries()
    }

    /// # Errors
    ///
    /// Returns `SessionError::ErrorLog` for an unknown id.
    pub fn resolve_error(&mut self, id: ErrorId) -> Result<(), SessionError> {
        self.session.resolve_error(id)?;
        debug!("{id} resolved");
        Ok(())
    }

    pub fn clear_errors(&mut self) {
        self.session.clear_errors();
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.session.elapsed(self.clock.now())
    }

    #[must_use]
    pub fn steps(&self) -> &'static [StepDefinition] {
        self.session.procedure().steps()
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress::of(&self.session)
    }

    /// Applies due tasks, then captures the session.
    pub fn snapshot(&mut self) -> LabSnapshot {
        self.tick();
        let pending = self.tasks.pending().iter().map(|t| t.kind).collect();
        LabSnapshot::capture(&self.session, self.run, pending, self.clock.now())
    }

    /// # Errors
    ///
    /// Returns `SessionError::Snapshot` if serialization fails.
    pub fn snapshot_json(&mut self) -> Result<String, SessionError> {
        self.snapshot().to_json().map_err(SessionError::Snapshot)
    }

    // ─── Deferred device work ──────────────────────────────────────────────────

    /// Queues measurement writes to land after `delay`, tagged with the current run.
    pub fn schedule(
        &mut self,
        kind: TaskKind,
        delay: Duration,
        writes: Vec<(MeasurementKey, MeasurementValue)>,
    ) -> TaskId {
        let id = self
            .tasks
            .schedule(self.run, kind, self.clock.now(), delay, writes);
        debug!("{id} scheduled: {kind:?} in {} ms", delay.num_milliseconds());
        id
    }

    /// Applies every due task of the current run and returns their kinds.
    ///
    /// Tasks left over from an earlier run are dropped.
    pub fn tick(&mut self) -> Vec<TaskKind> {
        let due = self.tasks.drain_due(self.clock.now(), self.run);
        for task in &due.stale {
            debug!("dropping stale {} from run {}", task.id, task.run);
        }

        let mut applied = Vec::with_capacity(due.live.len());
        for task in due.live {
            for (key, value) in task.writes {
                if let Err(err) = self.session.set_measurement(key, value) {
                    warn!("{} could not write {key}: {err}", task.id);
                }
            }
            debug!("{} applied: {:?}", task.id, task.kind);
            applied.push(task.kind);
        }
        applied
    }

    /// Moves a fixed clock forward and applies whatever became due.
    pub fn advance_clock(&mut self, delta: Duration) -> Vec<TaskKind> {
        self.clock.advance(delta);
        self.tick()
    }

    /// As of the last `tick`.
    #[must_use]
    pub fn is_task_pending(&self, kind: TaskKind) -> bool {
        self.tasks.is_pending(kind)
    }

    #[must_use]
    pub fn task_progress(&self, kind: TaskKind) -> Option<f64> {
        self.tasks.progress(kind, self.clock.now())
    }
}

impl fmt::Debug for LabSessionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LabSessionService")
            .field("procedure", &self.session.procedure())
            .field("current_step", &self.session.current_step())
            .field("is_complete", &self.session.is_complete())
            .field("run", &self.run)
            .field("pending_tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use lab_core::time::fixed_clock;

    fn service(procedure: Procedure) -> LabSessionService {
        LabSessionService::new(procedure).with_clock(fixed_clock())
    }

    #[test]
    fn set_measurement_returns_fresh_validation() {
        let mut lab = service(Procedure::Cod);
        lab.toggle_safety(SafetyItem::Gloves);
        lab.toggle_safety(SafetyItem::Goggles);
        lab.advance().unwrap();

        let v = lab.set_measurement(MeasurementKey::Volume, 2.7).unwrap();
        assert_eq!(v.category(), Some(ErrorCategory::Measurement));
        let v = lab.set_measurement(MeasurementKey::Volume, 2.5).unwrap();
        assert!(v.is_valid());
    }

    #[test]
    fn set_measurement_by_name_rejects_unknown_key() {
        let mut lab = service(Procedure::Bod);
        let err = lab.set_measurement_by_name("salinity", 1.0).unwrap_err();
        assert!(matches!(err, SessionError::Measurement(_)));

        lab.set_measurement_by_name("do0", 8.0).unwrap();
        assert_eq!(lab.session().measurements().number(MeasurementKey::Do0), Some(8.0));
    }

    #[test]
    fn wrong_kind_is_rejected() {
        let mut lab = service(Procedure::Cod);
        let err = lab.set_measurement(MeasurementKey::IsCapped, 1.0).unwrap_err();
        assert!(matches!(err, SessionError::Measurement(_)));
    }

    #[test]
    fn select_procedure_by_name_is_case_insensitive() {
        let mut lab = service(Procedure::Cod);
        assert_eq!(lab.select_procedure_by_name("bod").unwrap(), Procedure::Bod);
        assert_eq!(lab.steps().len(), 7);
        assert!(matches!(
            lab.select_procedure_by_name("TSS").unwrap_err(),
            SessionError::Procedure(_)
        ));
    }

    #[test]
    fn reset_changes_run_and_cancels_tasks() {
        let mut lab = service(Procedure::Cod);
        let before = lab.run();
        lab.schedule(TaskKind::Shake, Duration::seconds(2), Vec::new());
        lab.reset();
        assert_ne!(lab.run(), before);
        assert!(!lab.is_task_pending(TaskKind::Shake));
    }

    #[test]
    fn enter_and_leave_measure_elapsed_time() {
        let mut lab = service(Procedure::Bod);
        assert!(lab.enter());
        assert!(!lab.enter());
        lab.advance_clock(Duration::minutes(3));
        lab.leave();
        lab.advance_clock(Duration::minutes(10));
        assert_eq!(lab.elapsed(), Duration::minutes(3));
    }

    #[test]
    fn advance_applies_due_tasks_first() {
        let mut lab = service(Procedure::Bod);
        lab.schedule(
            TaskKind::Mixing,
            Duration::seconds(1),
            vec![
                (MeasurementKey::IsCapped, MeasurementValue::Flag(true)),
            ],
        );
        lab.clock.advance(Duration::seconds(1));
        let _ = lab.advance().unwrap();
        assert!(lab.session().measurements().flag(MeasurementKey::IsCapped));
    }

    #[test]
    fn snapshot_lands_tasks_that_came_due_without_a_tick() {
        let mut lab = service(Procedure::Cod);
        lab.schedule(
            TaskKind::Heating,
            Duration::seconds(5),
            vec![(MeasurementKey::HeatingComplete, MeasurementValue::Flag(true))],
        );
        lab.clock.advance(Duration::seconds(5));
        assert!(lab.is_task_pending(TaskKind::Heating));

        let snapshot = lab.snapshot();
        assert!(snapshot.pending_tasks.is_empty());
        assert!(!lab.is_task_pending(TaskKind::Heating));
        assert!(lab.session().measurements().flag(MeasurementKey::HeatingComplete));
    }

    #[test]
    fn current_validation_sees_writes_that_came_due() {
        let mut lab = service(Procedure::Cod);
        lab.set_mode(LabMode::Practice);
        for _ in 0..5 {
            lab.advance().unwrap();
        }
        assert_eq!(lab.session().current_step(), 6);
        lab.set_measurement(MeasurementKey::Temperature, 150.0).unwrap();
        lab.schedule(
            TaskKind::Heating,
            Duration::seconds(5),
            vec![(MeasurementKey::HeatingComplete, MeasurementValue::Flag(true))],
        );
        assert!(!lab.current_validation().is_valid());

        lab.clock.advance(Duration::seconds(5));
        assert!(lab.current_validation().is_valid());
    }

    #[test]
    fn resolve_unknown_error_fails() {
        let mut lab = service(Procedure::Cod);
        let id = lab.record_error(ErrorCategory::Warning, "note");
        lab.resolve_error(id).unwrap();
        assert!(lab.errors()[0].resolved);
        assert!(matches!(
            lab.resolve_error(ErrorId::new(99)).unwrap_err(),
            SessionError::ErrorLog(_)
        ));
    }
}
