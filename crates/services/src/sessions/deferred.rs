use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use lab_core::model::{MeasurementKey, MeasurementValue, TaskId};

//
// ─── RUN ID ────────────────────────────────────────────────────────────────────
//

/// Identifies one reset-to-reset lifetime of a session.
///
/// Deferred device writes carry the run they were scheduled in; a write whose
/// run no longer matches the session's is stale and must not land.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RunId(Uuid);

impl RunId {
    #[must_use]
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl fmt::Debug for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RunId({})", self.0)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//
// ─── TASKS ─────────────────────────────────────────────────────────────────────
//

/// Instrument activity that takes simulated time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Shake,
    Mixing,
    Heating,
    Cooling,
    Incubation,
}

/// Measurement writes that land once `due_at` has passed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceTask {
    pub id: TaskId,
    pub run: RunId,
    pub kind: TaskKind,
    pub scheduled_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub writes: Vec<(MeasurementKey, MeasurementValue)>,
}

impl DeviceTask {
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.due_at
    }

    /// Fraction of the delay that has passed, in `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(&self, now: DateTime<Utc>) -> f64 {
        let total = (self.due_at - self.scheduled_at).num_milliseconds();
        if total <= 0 {
            return 1.0;
        }
        let done = (now - self.scheduled_at).num_milliseconds();
        (done as f64 / total as f64).clamp(0.0, 1.0)
    }
}

/// Due tasks split by whether they belong to the current run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DueTasks {
    pub live: Vec<DeviceTask>,
    pub stale: Vec<DeviceTask>,
}

//
// ─── QUEUE ─────────────────────────────────────────────────────────────────────
//

/// Pending device tasks, polled against an injected clock.
#[derive(Debug, Clone, Default)]
pub struct DeferredQueue {
    tasks: Vec<DeviceTask>,
    next_id: u64,
}

impl DeferredQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(
        &mut self,
        run: RunId,
        kind: TaskKind,
        now: DateTime<Utc>,
        delay: Duration,
        writes: Vec<(MeasurementKey, MeasurementValue)>,
    ) -> TaskId {
        self.next_id += 1;
        let id = TaskId::new(self.next_id);
        self.tasks.push(DeviceTask {
            id,
            run,
            kind,
            scheduled_at: now,
            due_at: now + delay.max(Duration::zero()),
            writes,
        });
        id
    }

    /// Removes every task due at `now`, ordered by due time then id.
    pub fn drain_due(&mut self, now: DateTime<Utc>, current: RunId) -> DueTasks {
        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.tasks.drain(..).partition(|t| t.is_due(now));
        self.tasks = pending;
        due.sort_by_key(|t| (t.due_at, t.id));

        let (live, stale) = due.into_iter().partition(|t| t.run == current);
        DueTasks { live, stale }
    }

    /// Drops every pending task and returns how many there were.
    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.tasks.len();
        self.tasks.clear();
        cancelled
    }

    #[must_use]
    pub fn is_pending(&self, kind: TaskKind) -> bool {
        self.tasks.iter().any(|t| t.kind == kind)
    }

    /// Progress of the earliest pending task of this kind.
    #[must_use]
    pub fn progress(&self, kind: TaskKind, now: DateTime<Utc>) -> Option<f64> {
        self.tasks
            .iter()
            .filter(|t| t.kind == kind)
            .min_by_key(|t| (t.due_at, t.id))
            .map(|t| t.progress(now))
    }

    #[must_use]
    pub fn pending(&self) -> &[DeviceTask] {
        &self.tasks
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use lab_core::time::fixed_now;

    fn shaken() -> Vec<(MeasurementKey, MeasurementValue)> {
        vec![(MeasurementKey::IsShaken, MeasurementValue::Flag(true))]
    }

    #[test]
    fn task_is_not_due_before_its_delay() {
        let run = RunId::new_v4();
        let mut queue = DeferredQueue::new();
        queue.schedule(run, TaskKind::Shake, fixed_now(), Duration::seconds(2), shaken());

        let due = queue.drain_due(fixed_now() + Duration::milliseconds(1_999), run);
        assert!(due.live.is_empty());
        assert!(queue.is_pending(TaskKind::Shake));

        let due = queue.drain_due(fixed_now() + Duration::seconds(2), run);
        assert_eq!(due.live.len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn due_tasks_come_out_in_due_order() {
        let run = RunId::new_v4();
        let now = fixed_now();
        let mut queue = DeferredQueue::new();
        queue.schedule(run, TaskKind::Heating, now, Duration::seconds(5), Vec::new());
        queue.schedule(run, TaskKind::Shake, now, Duration::seconds(2), Vec::new());

        let due = queue.drain_due(now + Duration::seconds(10), run);
        let kinds: Vec<_> = due.live.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TaskKind::Shake, TaskKind::Heating]);
    }

    #[test]
    fn tasks_from_another_run_are_stale() {
        let old = RunId::new_v4();
        let current = RunId::new_v4();
        let now = fixed_now();
        let mut queue = DeferredQueue::new();
        queue.schedule(old, TaskKind::Shake, now, Duration::seconds(1), shaken());
        queue.schedule(current, TaskKind::Mixing, now, Duration::seconds(1), Vec::new());

        let due = queue.drain_due(now + Duration::seconds(1), current);
        assert_eq!(due.live.len(), 1);
        assert_eq!(due.live[0].kind, TaskKind::Mixing);
        assert_eq!(due.stale.len(), 1);
        assert_eq!(due.stale[0].run, old);
    }

    #[test]
    fn progress_tracks_elapsed_fraction() {
        let run = RunId::new_v4();
        let now = fixed_now();
        let mut queue = DeferredQueue::new();
        queue.schedule(run, TaskKind::Incubation, now, Duration::seconds(5), Vec::new());

        assert_eq!(queue.progress(TaskKind::Incubation, now), Some(0.0));
        assert_eq!(
            queue.progress(TaskKind::Incubation, now + Duration::seconds(2)),
            Some(0.4)
        );
        assert_eq!(queue.progress(TaskKind::Cooling, now), None);
    }

    #[test]
    fn cancel_all_empties_queue() {
        let run = RunId::new_v4();
        let mut queue = DeferredQueue::new();
        queue.schedule(run, TaskKind::Cooling, fixed_now(), Duration::seconds(3), Vec::new());
        queue.schedule(run, TaskKind::Shake, fixed_now(), Duration::seconds(2), Vec::new());
        assert_eq!(queue.cancel_all(), 2);
        assert!(!queue.is_pending(TaskKind::Cooling));
    }

    #[test]
    fn task_ids_keep_increasing_after_cancel() {
        let run = RunId::new_v4();
        let mut queue = DeferredQueue::new();
        let first = queue.schedule(run, TaskKind::Shake, fixed_now(), Duration::seconds(1), Vec::new());
        queue.cancel_all();
        let second = queue.schedule(run, TaskKind::Shake, fixed_now(), Duration::seconds(1), Vec::new());
        assert!(second > first);
    }
}
