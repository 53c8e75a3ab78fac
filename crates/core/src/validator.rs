//! Per-step acceptance rules for both procedures.
//!
//! Rules live in a static table keyed by `(procedure, step)`. Each rule is a
//! plain function of the session state, so validation has no side effects and
//! the same state always yields the same verdict.

use serde::Serialize;

use crate::model::{ErrorCategory, LabSession, MeasurementKey, Procedure};

//
// ─── TOLERANCES ────────────────────────────────────────────────────────────────
//

/// Inclusive acceptance band around a target value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tolerance {
    pub min: f64,
    pub max: f64,
    pub target: f64,
}

impl Tolerance {
    #[must_use]
    pub const fn new(min: f64, max: f64, target: f64) -> Self {
        Self { min, max, target }
    }

    /// Both bounds are accepted.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Water sample for the COD tube, ml.
pub const COD_SAMPLE_VOLUME: Tolerance = Tolerance::new(2.4, 2.6, 2.5);
/// 0.25N potassium dichromate, ml.
pub const COD_K2CR2O7_VOLUME: Tolerance = Tolerance::new(1.4, 1.6, 1.5);
/// Sulfuric acid with silver sulfate, ml.
pub const COD_H2SO4_VOLUME: Tolerance = Tolerance::new(3.4, 3.6, 3.5);
/// Digestion temperature, °C.
pub const COD_HEATING_TEMPERATURE: Tolerance = Tolerance::new(148.0, 152.0, 150.0);
/// The tube may be handled only strictly below this temperature, °C.
pub const COD_SAFE_HANDLING_TEMPERATURE: f64 = 40.0;
/// BOD bottle fill, ml.
pub const BOD_BOTTLE_VOLUME: Tolerance = Tolerance::new(295.0, 305.0, 300.0);
/// Incubator temperature, °C.
pub const BOD_INCUBATOR_TEMPERATURE: Tolerance = Tolerance::new(19.0, 21.0, 20.0);

//
// ─── RESULT TYPES ──────────────────────────────────────────────────────────────
//

/// Why a step is not acceptable yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepFailure {
    pub category: ErrorCategory,
    pub message: String,
}

impl StepFailure {
    #[must_use]
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

/// Verdict for one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid,
    Invalid(StepFailure),
}

impl Validation {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }

    #[must_use]
    pub fn failure(&self) -> Option<&StepFailure> {
        match self {
            Validation::Valid => None,
            Validation::Invalid(failure) => Some(failure),
        }
    }

    #[must_use]
    pub fn category(&self) -> Option<ErrorCategory> {
        self.failure().map(|f| f.category)
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.failure().map(|f| f.message.as_str())
    }
}

impl From<Result<(), StepFailure>> for Validation {
    fn from(outcome: Result<(), StepFailure>) -> Self {
        match outcome {
            Ok(()) => Validation::Valid,
            Err(failure) => Validation::Invalid(failure),
        }
    }
}

type Check = Result<(), StepFailure>;

//
// ─── RULE TABLE ────────────────────────────────────────────────────────────────
//

/// Acceptance rule for one step of one procedure.
#[derive(Clone, Copy)]
pub struct StepRule {
    pub procedure: Procedure,
    pub step: u8,
    /// Short description of what the rule requires.
    pub requires: &'static str,
    check: fn(&LabSession) -> Check,
}

impl StepRule {
    #[must_use]
    pub fn check(&self, session: &LabSession) -> Validation {
        (self.check)(session).into()
    }
}

impl std::fmt::Debug for StepRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRule")
            .field("procedure", &self.procedure)
            .field("step", &self.step)
            .field("requires", &self.requires)
            .finish_non_exhaustive()
    }
}

const fn rule(
    procedure: Procedure,
    step: u8,
    requires: &'static str,
    check: fn(&LabSession) -> Check,
) -> StepRule {
    StepRule {
        procedure,
        step,
        requires,
        check,
    }
}

static COD_RULES: [StepRule; 8] = [
    rule(Procedure::Cod, 1, "gloves and goggles worn", cod_safety_gear),
    rule(Procedure::Cod, 2, "sample volume 2.4-2.6 ml", cod_sample),
    rule(Procedure::Cod, 3, "K2Cr2O7 volume 1.4-1.6 ml", cod_dichromate),
    rule(Procedure::Cod, 4, "K2Cr2O7 first, H2SO4 volume 3.4-3.6 ml", cod_acid),
    rule(Procedure::Cod, 5, "tube capped, then shaken", cod_cap_and_shake),
    rule(Procedure::Cod, 6, "148-152 \u{b0}C and heating finished", cod_heating),
    rule(Procedure::Cod, 7, "tube below 40 \u{b0}C", cod_cooling),
    rule(Procedure::Cod, 8, "absorbance measured", cod_absorbance),
];

static BOD_RULES: [StepRule; 7] = [
    rule(Procedure::Bod, 1, "gloves and goggles worn", bod_safety_gear),
    rule(Procedure::Bod, 2, "nutrient and microorganisms added", bod_seeding),
    rule(Procedure::Bod, 3, "bottle 295-305 ml, no bubbles", bod_fill),
    rule(Procedure::Bod, 4, "DO\u{2080} measured", bod_initial_do),
    rule(Procedure::Bod, 5, "bottle capped, then incubated", bod_cap_and_store),
    rule(Procedure::Bod, 6, "19-21 \u{b0}C and incubation finished", bod_incubation),
    rule(Procedure::Bod, 7, "DO\u{2085} measured", bod_final_do),
];

/// All rules of a procedure, ordered by step.
#[must_use]
pub fn rules(procedure: Procedure) -> &'static [StepRule] {
    match procedure {
        Procedure::Cod => &COD_RULES,
        Procedure::Bod => &BOD_RULES,
    }
}

#[must_use]
pub fn rule_for(procedure: Procedure, step: u8) -> Option<&'static StepRule> {
    rules(procedure).iter().find(|r| r.step == step)
}

/// Validates `step` of `procedure` against the session state.
///
/// A step without a rule (outside `1..=N`) is accepted.
#[must_use]
pub fn validate(procedure: Procedure, step: u8, session: &LabSession) -> Validation {
    rule_for(procedure, step).map_or(Validation::Valid, |r| r.check(session))
}

//
// ─── SHARED CHECKS ─────────────────────────────────────────────────────────────
//

const GEAR_BEFORE_WORK: &str = "Put on full protective gear before working with chemicals";
const GEAR_REQUIRED: &str = "Full protective gear is required";

fn require_gear(session: &LabSession, message: &str) -> Check {
    if session.safety().is_worn() {
        Ok(())
    } else {
        Err(StepFailure::new(ErrorCategory::Safety, message))
    }
}

fn require_number(
    session: &LabSession,
    key: MeasurementKey,
    category: ErrorCategory,
    message: &str,
) -> Result<f64, StepFailure> {
    session
        .measurements()
        .number(key)
        .ok_or_else(|| StepFailure::new(category, message))
}

fn require_flag(
    session: &LabSession,
    key: MeasurementKey,
    category: ErrorCategory,
    message: &str,
) -> Check {
    if session.measurements().flag(key) {
        Ok(())
    } else {
        Err(StepFailure::new(category, message))
    }
}

fn require_within(
    value: f64,
    tolerance: Tolerance,
    message: impl FnOnce(f64) -> String,
) -> Check {
    if tolerance.contains(value) {
        Ok(())
    } else {
        Err(StepFailure::new(ErrorCategory::Measurement, message(value)))
    }
}

//
// ─── COD RULES ─────────────────────────────────────────────────────────────────
//

fn cod_safety_gear(s: &LabSession) -> Check {
    require_gear(s, GEAR_BEFORE_WORK)
}

fn cod_sample(s: &LabSession) -> Check {
    require_gear(s, GEAR_REQUIRED)?;
    let volume = require_number(
        s,
        MeasurementKey::Volume,
        ErrorCategory::Measurement,
        "Pipette 2.5 ml of the water sample (\u{b1}0.1 ml)",
    )?;
    require_within(volume, COD_SAMPLE_VOLUME, |v| {
        format!("Take exactly 2.5 ml (\u{b1}0.1 ml); you took {v:.1} ml")
    })
}

fn cod_dichromate(s: &LabSession) -> Check {
    require_gear(s, GEAR_REQUIRED)?;
    let volume = require_number(
        s,
        MeasurementKey::K2Cr2O7Volume,
        ErrorCategory::Measurement,
        "Add 1.5 ml of 0.25N K\u{2082}Cr\u{2082}O\u{2087} (\u{b1}0.1 ml)",
    )?;
    require_within(volume, COD_K2CR2O7_VOLUME, |v| {
        format!("Add 1.5 ml (\u{b1}0.1 ml); you added {v:.1} ml")
    })
}

fn cod_acid(s: &LabSession) -> Check {
    require_gear(s, GEAR_REQUIRED)?;
    require_number(
        s,
        MeasurementKey::K2Cr2O7Volume,
        ErrorCategory::Procedure,
        "K\u{2082}Cr\u{2082}O\u{2087} must be added before H\u{2082}SO\u{2084}",
    )?;
    let volume = require_number(
        s,
        MeasurementKey::H2So4Volume,
        ErrorCategory::Measurement,
        "Add 3.5 ml of H\u{2082}SO\u{2084}-Ag\u{2082}SO\u{2084} (\u{b1}0.1 ml)",
    )?;
    require_within(volume, COD_H2SO4_VOLUME, |v| {
        format!("Add 3.5 ml (\u{b1}0.1 ml); you added {v:.1} ml")
    })
}

fn cod_cap_and_shake(s: &LabSession) -> Check {
    require_flag(
        s,
        MeasurementKey::IsCapped,
        ErrorCategory::Procedure,
        "Cap the tube before shaking",
    )?;
    require_flag(
        s,
        MeasurementKey::IsShaken,
        ErrorCategory::Procedure,
        "Shake the COD tube well",
    )
}

fn cod_heating(s: &LabSession) -> Check {
    let temperature = require_number(
        s,
        MeasurementKey::Temperature,
        ErrorCategory::Measurement,
        "Place the tube in the heater and set the temperature",
    )?;
    require_within(temperature, COD_HEATING_TEMPERATURE, |t| {
        format!("Hold the temperature at 150\u{b0}C \u{b1}2\u{b0}C; currently {t:.0}\u{b0}C")
    })?;
    require_flag(
        s,
        MeasurementKey::HeatingComplete,
        ErrorCategory::Warning,
        "Heating has not run long enough (2 hours required)",
    )
}

fn cod_cooling(s: &LabSession) -> Check {
    match s.measurements().number(MeasurementKey::Temperature) {
        Some(t) if t < COD_SAFE_HANDLING_TEMPERATURE => Ok(()),
        reading => {
            let shown = reading.map_or_else(|| "?".to_string(), |t| format!("{t:.0}"));
            Err(StepFailure::new(
                ErrorCategory::Safety,
                format!("DANGER! The tube is still hot ({shown}\u{b0}C); cool it below 40\u{b0}C"),
            ))
        }
    }
}

fn cod_absorbance(s: &LabSession) -> Check {
    require_number(
        s,
        MeasurementKey::Absorbance,
        ErrorCategory::Measurement,
        "Measure the absorbance at 600 nm",
    )
    .map(|_| ())
}

//
// ─── BOD RULES ─────────────────────────────────────────────────────────────────
//

fn bod_safety_gear(s: &LabSession) -> Check {
    require_gear(s, GEAR_BEFORE_WORK)
}

fn bod_seeding(s: &LabSession) -> Check {
    require_gear(s, GEAR_REQUIRED)?;
    let m = s.measurements();
    if m.flag(MeasurementKey::HasNutrient) && m.flag(MeasurementKey::HasMicroorganism) {
        Ok(())
    } else {
        Err(StepFailure::new(
            ErrorCategory::Measurement,
            "Add both the nutrient solution and the microorganisms",
        ))
    }
}

fn bod_fill(s: &LabSession) -> Check {
    let volume = require_number(
        s,
        MeasurementKey::BodVolume,
        ErrorCategory::Measurement,
        "Pour 300 ml into the BOD bottle (\u{b1}5 ml)",
    )?;
    require_within(volume, BOD_BOTTLE_VOLUME, |v| {
        format!("Pour 300 ml (\u{b1}5 ml); currently {v:.0} ml")
    })?;
    if s.measurements().flag(MeasurementKey::HasBubbles) {
        return Err(StepFailure::new(
            ErrorCategory::Procedure,
            "The BOD bottle must not contain air bubbles",
        ));
    }
    Ok(())
}

fn bod_initial_do(s: &LabSession) -> Check {
    require_number(
        s,
        MeasurementKey::Do0,
        ErrorCategory::Measurement,
        "Measure the initial dissolved oxygen (DO\u{2080})",
    )
    .map(|_| ())
}

fn bod_cap_and_store(s: &LabSession) -> Check {
    require_flag(
        s,
        MeasurementKey::IsCapped,
        ErrorCategory::Procedure,
        "Seal the bottle to keep out atmospheric oxygen",
    )?;
    require_flag(
        s,
        MeasurementKey::IsIncubated,
        ErrorCategory::Procedure,
        "Place the bottle in the incubator",
    )
}

fn bod_incubation(s: &LabSession) -> Check {
    let in_band = s
        .measurements()
        .number(MeasurementKey::IncubatorTemperature)
        .is_some_and(|t| BOD_INCUBATOR_TEMPERATURE.contains(t));
    if !in_band {
        return Err(StepFailure::new(
            ErrorCategory::Measurement,
            "The incubator must be at 20\u{b0}C \u{b1}1\u{b0}C",
        ));
    }
    require_flag(
        s,
        MeasurementKey::IncubationComplete,
        ErrorCategory::Warning,
        "Incubation has not run long enough (5 days required)",
    )
}

fn bod_final_do(s: &LabSession) -> Check {
    require_number(
        s,
        MeasurementKey::Do5,
        ErrorCategory::Measurement,
        "Measure dissolved oxygen after 5 days (DO\u{2085})",
    )
    .map(|_| ())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
