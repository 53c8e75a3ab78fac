use chrono::{DateTime, Duration, Utc};

/// Time source shared by the session, its stopwatch and the deferred device tasks.
///
/// `Fixed` never moves on its own; tests push it forward with [`Clock::advance`]
/// to simulate heating, incubation and elapsed practice time.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// Moves a fixed clock forward. No effect on `Clock::System`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }

    #[must_use]
    pub fn is_fixed(&self) -> bool {
        matches!(self, Clock::Fixed(_))
    }
}

/// Stopwatch for active practice time.
///
/// Either stopped (`started_at == None`) or running since a wall-clock mark.
/// Elapsed time from earlier start/stop pairs is folded into `accumulated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionClock {
    accumulated: Duration,
    started_at: Option<DateTime<Utc>>,
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            accumulated: Duration::zero(),
            started_at: None,
        }
    }

    /// Starts the stopwatch unless it is already running.
    ///
    /// Returns `true` when this call started it.
    pub fn start(&mut self, now: DateTime<Utc>) -> bool {
        if self.started_at.is_some() {
            return false;
        }
        self.started_at = Some(now);
        true
    }

    /// Folds the running segment into the accumulator. Idempotent when stopped.
    pub fn stop(&mut self, now: DateTime<Utc>) {
        if let Some(mark) = self.started_at.take() {
            self.accumulated = self.accumulated + span(mark, now);
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Time folded in by completed start/stop pairs only.
    #[must_use]
    pub fn accumulated(&self) -> Duration {
        self.accumulated
    }

    /// Accumulated time plus the running segment, if any.
    #[must_use]
    pub fn current_elapsed(&self, now: DateTime<Utc>) -> Duration {
        match self.started_at {
            Some(mark) => self.accumulated + span(mark, now),
            None => self.accumulated,
        }
    }

    /// Stops the stopwatch and zeroes the accumulator.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

// A mark later than `now` (clock skew) counts as no time at all.
fn span(from: DateTime<Utc>, to: DateTime<Utc>) -> Duration {
    (to - from).max(Duration::zero())
}

/// Converts a duration to fractional minutes.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn minutes(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / 60_000.0
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}
