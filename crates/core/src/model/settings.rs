use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("scoring weight `{0}` must be finite and >= 0")]
    InvalidWeight(&'static str),

    #[error("device timing `{0}` must be > 0 ms")]
    InvalidTiming(&'static str),
}

//
// ─── PRACTICE POLICY ───────────────────────────────────────────────────────────
//

/// What `advance` does with an invalid step while in practice mode.
///
/// Guided mode always blocks and logs; this only relaxes practice mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PracticePolicy {
    /// Record the violation, then move on as if the step had passed.
    #[default]
    LogAndAdvance,
    /// Move on without recording anything.
    AdvanceSilently,
    /// Stay on the step and record nothing.
    Hold,
}

//
// ─── SCORING ───────────────────────────────────────────────────────────────────
//

/// Point budget of the three score components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    accuracy_max: f64,
    safety_max: f64,
    safety_penalty: f64,
    efficiency_max: f64,
    overtime_penalty_per_minute: f64,
}

impl ScoringWeights {
    /// 40 accuracy, 30 safety (5 per safety error), 30 efficiency (0.5 per minute over).
    #[must_use]
    pub fn standard() -> Self {
        Self {
            accuracy_max: 40.0,
            safety_max: 30.0,
            safety_penalty: 5.0,
            efficiency_max: 30.0,
            overtime_penalty_per_minute: 0.5,
        }
    }

    /// # Errors
    ///
    /// Returns `SettingsError::InvalidWeight` if any weight is negative or not finite.
    pub fn new(
        accuracy_max: f64,
        safety_max: f64,
        safety_penalty: f64,
        efficiency_max: f64,
        overtime_penalty_per_minute: f64,
    ) -> Result<Self, SettingsError> {
        check_weight("accuracy_max", accuracy_max)?;
        check_weight("safety_max", safety_max)?;
        check_weight("safety_penalty", safety_penalty)?;
        check_weight("efficiency_max", efficiency_max)?;
        check_weight("overtime_penalty_per_minute", overtime_penalty_per_minute)?;
        Ok(Self {
            accuracy_max,
            safety_max,
            safety_penalty,
            efficiency_max,
            overtime_penalty_per_minute,
        })
    }

    #[must_use]
    pub fn accuracy_max(&self) -> f64 {
        self.accuracy_max
    }

    #[must_use]
    pub fn safety_max(&self) -> f64 {
        self.safety_max
    }

    #[must_use]
    pub fn safety_penalty(&self) -> f64 {
        self.safety_penalty
    }

    #[must_use]
    pub fn efficiency_max(&self) -> f64 {
        self.efficiency_max
    }

    #[must_use]
    pub fn overtime_penalty_per_minute(&self) -> f64 {
        self.overtime_penalty_per_minute
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self::standard()
    }
}

fn check_weight(name: &'static str, value: f64) -> Result<(), SettingsError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SettingsError::InvalidWeight(name))
    }
}

//
// ─── DEVICE TIMINGS ────────────────────────────────────────────────────────────
//

/// Fast-forwarded durations of the simulated instruments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceTimings {
    shake_ms: u32,
    mix_ms: u32,
    heating_ms: u32,
    cooling_ms: u32,
    incubation_day_ms: u32,
}

impl DeviceTimings {
    /// Shake 2 s, mix 1.5 s, heating 5 s, cooling 3 s, one incubation day per second.
    #[must_use]
    pub fn fast_forward() -> Self {
        Self {
            shake_ms: 2_000,
            mix_ms: 1_500,
            heating_ms: 5_000,
            cooling_ms: 3_000,
            incubation_day_ms: 1_000,
        }
    }

    /// # Errors
    ///
    /// Returns `SettingsError::InvalidTiming` if any duration is zero.
    pub fn new(
        shake_ms: u32,
        mix_ms: u32,
        heating_ms: u32,
        cooling_ms: u32,
        incubation_day_ms: u32,
    ) -> Result<Self, SettingsError> {
        for (name, value) in [
            ("shake_ms", shake_ms),
            ("mix_ms", mix_ms),
            ("heating_ms", heating_ms),
            ("cooling_ms", cooling_ms),
            ("incubation_day_ms", incubation_day_ms),
        ] {
            if value == 0 {
                return Err(SettingsError::InvalidTiming(name));
            }
        }
        Ok(Self {
            shake_ms,
            mix_ms,
            heating_ms,
            cooling_ms,
            incubation_day_ms,
        })
    }

    #[must_use]
    pub fn shake(&self) -> Duration {
        Duration::milliseconds(i64::from(self.shake_ms))
    }

    #[must_use]
    pub fn mix(&self) -> Duration {
        Duration::milliseconds(i64::from(self.mix_ms))
    }

    #[must_use]
    pub fn heating(&self) -> Duration {
        Duration::milliseconds(i64::from(self.heating_ms))
    }

    #[must_use]
    pub fn cooling(&self) -> Duration {
        Duration::milliseconds(i64::from(self.cooling_ms))
    }

    #[must_use]
    pub fn incubation_day(&self) -> Duration {
        Duration::milliseconds(i64::from(self.incubation_day_ms))
    }
}

impl Default for DeviceTimings {
    fn default() -> Self {
        Self::fast_forward()
    }
}

//
// ─── LAB SETTINGS ──────────────────────────────────────────────────────────────
//

/// Everything the embedding layer can tune about a lab session.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LabSettings {
    practice_policy: PracticePolicy,
    scoring: ScoringWeights,
    timings: DeviceTimings,
}

impl LabSettings {
    /// Practice mode logs and advances; standard scoring; fast-forwarded devices.
    #[must_use]
    pub fn default_lab() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new(
        practice_policy: PracticePolicy,
        scoring: ScoringWeights,
        timings: DeviceTimings,
    ) -> Self {
        Self {
            practice_policy,
            scoring,
            timings,
        }
    }

    #[must_use]
    pub fn with_practice_policy(mut self, policy: PracticePolicy) -> Self {
        self.practice_policy = policy;
        self
    }

    #[must_use]
    pub fn practice_policy(&self) -> PracticePolicy {
        self.practice_policy
    }

    #[must_use]
    pub fn scoring(&self) -> &ScoringWeights {
        &self.scoring
    }

    #[must_use]
    pub fn timings(&self) -> &DeviceTimings {
        &self.timings
    }
}

/// Partially specified settings, e.g. as read from a config file.
///
/// Missing fields fall back to [`LabSettings::default_lab`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LabSettingsDraft {
    pub practice_policy: Option<PracticePolicy>,
    pub accuracy_max: Option<f64>,
    pub safety_max: Option<f64>,
    pub safety_penalty: Option<f64>,
    pub efficiency_max: Option<f64>,
    pub overtime_penalty_per_minute: Option<f64>,
    pub shake_ms: Option<u32>,
    pub mix_ms: Option<u32>,
    pub heating_ms: Option<u32>,
    pub cooling_ms: Option<u32>,
    pub incubation_day_ms: Option<u32>,
}

impl LabSettingsDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill gaps from the defaults and validate.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if a weight or timing is out of range.
    pub fn validate(self) -> Result<LabSettings, SettingsError> {
        let base = LabSettings::default_lab();
        let w = base.scoring;
        let t = base.timings;

        let scoring = ScoringWeights::new(
            self.accuracy_max.unwrap_or(w.accuracy_max),
            self.safety_max.unwrap_or(w.safety_max),
            self.safety_penalty.unwrap_or(w.safety_penalty),
            self.efficiency_max.unwrap_or(w.efficiency_max),
            self.overtime_penalty_per_minute
                .unwrap_or(w.overtime_penalty_per_minute),
        )?;
        let timings = DeviceTimings::new(
            self.shake_ms.unwrap_or(t.shake_ms),
            self.mix_ms.unwrap_or(t.mix_ms),
            self.heating_ms.unwrap_or(t.heating_ms),
            self.cooling_ms.unwrap_or(t.cooling_ms),
            self.incubation_day_ms.unwrap_or(t.incubation_day_ms),
        )?;

        Ok(LabSettings::new(
            self.practice_policy.unwrap_or(base.practice_policy),
            scoring,
            timings,
        ))
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
