use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use lab_core::model::{ErrorCategory, MeasurementKey, MeasurementValue, Procedure};
use lab_core::validator::{BOD_BOTTLE_VOLUME, BOD_INCUBATOR_TEMPERATURE};

use super::{BenchOutcome, GEAR_FOR_CHEMICALS, at_step, check_safety_gear, reject};
use crate::error::SessionError;
use crate::sessions::{LabSessionService, TaskKind};

/// Simulated days in the BOD incubation.
pub const INCUBATION_DAYS: i32 = 5;
/// Chance that a freshly filled bottle traps air.
pub const BUBBLE_CHANCE: f64 = 0.3;
/// DO₀ assumed when DO₅ is read without an initial reading, mg/L.
pub const FALLBACK_DO0: f64 = 7.0;

/// Seeding bottles, BOD bottle, DO meter and incubator.
#[derive(Debug, Clone)]
pub struct BodBench<R = StdRng> {
    rng: R,
    incubator_set_point: f64,
}

impl BodBench<StdRng> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }
}

impl Default for BodBench<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> BodBench<R> {
    #[must_use]
    pub fn with_rng(rng: R) -> Self {
        Self {
            rng,
            incubator_set_point: BOD_INCUBATOR_TEMPERATURE.target,
        }
    }

    #[must_use]
    pub fn incubator_set_point(&self) -> f64 {
        self.incubator_set_point
    }

    pub fn check_safety_gear(&mut self, lab: &mut LabSessionService) -> BenchOutcome {
        check_safety_gear(lab, Procedure::Bod)
    }

    /// # Errors
    ///
    /// Propagates measurement store errors.
    pub fn add_nutrient(
        &mut self,
        lab: &mut LabSessionService,
    ) -> Result<BenchOutcome, SessionError> {
        add_seed(lab, MeasurementKey::HasNutrient)
    }

    /// # Errors
    ///
    /// Propagates measurement store errors.
    pub fn add_microorganism(
        &mut self,
        lab: &mut LabSessionService,
    ) -> Result<BenchOutcome, SessionError> {
        add_seed(lab, MeasurementKey::HasMicroorganism)
    }

    pub fn mix_sample(&mut self, lab: &mut LabSessionService) -> BenchOutcome {
        if !at_step(lab, Procedure::Bod, 2) {
            return BenchOutcome::Ignored;
        }
        let m = lab.session().measurements();
        if !(m.flag(MeasurementKey::HasNutrient) && m.flag(MeasurementKey::HasMicroorganism)) {
            return reject(
                lab,
                ErrorCategory::Procedure,
                "Add both the nutrient solution and the microorganisms",
            );
        }
        let delay = lab.settings().timings().mix();
        BenchOutcome::Scheduled(lab.schedule(TaskKind::Mixing, delay, Vec::new()))
    }

    /// Inspects the bottle for trapped air and records what was seen.
    ///
    /// # Errors
    ///
    /// Propagates measurement store errors.
    pub fn detect_bubbles(
        &mut self,
        lab: &mut LabSessionService,
    ) -> Result<BenchOutcome, SessionError> {
        if !at_step(lab, Procedure::Bod, 3) {
            return Ok(BenchOutcome::Ignored);
        }
        let found = self.rng.random_bool(BUBBLE_CHANCE);
        lab.set_measurement(MeasurementKey::HasBubbles, found)?;
        if found {
            return Ok(reject(
                lab,
                ErrorCategory::Procedure,
                "Air bubbles in the bottle! Refill it without bubbles",
            ));
        }
        Ok(BenchOutcome::Applied)
    }

    /// # Errors
    ///
    /// Returns `SessionError::Measurement` if `volume` is not finite.
    pub fn fill_bottle(
        &mut self,
        lab: &mut LabSessionService,
        volume: f64,
    ) -> Result<BenchOutcome, SessionError> {
        if !at_step(lab, Procedure::Bod, 3) {
            return Ok(BenchOutcome::Ignored);
        }
        if !BOD_BOTTLE_VOLUME.contains(volume) {
            return Ok(reject(
                lab,
                ErrorCategory::Measurement,
                format!("Wrong volume: {volume:.0} ml; 300 ml \u{b1}5 ml is needed"),
            ));
        }
        if lab.session().measurements().flag(MeasurementKey::HasBubbles) {
            return Ok(reject(
                lab,
                ErrorCategory::Procedure,
                "The BOD bottle must not contain air bubbles",
            ));
        }
        lab.set_measurement(MeasurementKey::BodVolume, volume)?;
        Ok(BenchOutcome::Applied)
    }

    /// Reads initial dissolved oxygen, 7-10 mg/L.
    ///
    /// # Errors
    ///
    /// Propagates measurement store errors.
    pub fn measure_do0(
        &mut self,
        lab: &mut LabSessionService,
    ) -> Result<BenchOutcome, SessionError> {
        if !at_step(lab, Procedure::Bod, 4) {
            return Ok(BenchOutcome::Ignored);
        }
        if !lab.session().measurements().contains(MeasurementKey::BodVolume) {
            return Ok(reject(
                lab,
                ErrorCategory::Procedure,
                "Fill the BOD bottle before measuring DO",
            ));
        }
        let do0 = self.rng.random_range(7.0..10.0);
        lab.set_measurement(MeasurementKey::Do0, do0)?;
        Ok(BenchOutcome::Applied)
    }

    /// # Errors
    ///
    /// Propagates measurement store errors.
    pub fn cap_bottle(
        &mut self,
        lab: &mut LabSessionService,
    ) -> Result<BenchOutcome, SessionError> {
        if !at_step(lab, Procedure::Bod, 5) {
            return Ok(BenchOutcome::Ignored);
        }
        lab.set_measurement(MeasurementKey::IsCapped, true)?;
        Ok(BenchOutcome::Applied)
    }

    /// # Errors
    ///
    /// Propagates measurement store errors.
    pub fn place_in_incubator(
        &mut self,
        lab: &mut LabSessionService,
    ) -> Result<BenchOutcome, SessionError> {
        if !at_step(lab, Procedure::Bod, 5) {
            return Ok(BenchOutcome::Ignored);
        }
        if !lab.session().measurements().flag(MeasurementKey::IsCapped) {
            return Ok(reject(
                lab,
                ErrorCategory::Procedure,
                "Seal the BOD bottle before placing it in the incubator",
            ));
        }
        lab.set_measurement(MeasurementKey::IsIncubated, true)?;
        Ok(BenchOutcome::Applied)
    }

    /// Turns the incubator dial. Locked while incubation runs.
    pub fn set_incubator_temperature(
        &mut self,
        lab: &LabSessionService,
        temperature: f64,
    ) -> BenchOutcome {
        if !at_step(lab, Procedure::Bod, 6) || lab.is_task_pending(TaskKind::Incubation) {
            return BenchOutcome::Ignored;
        }
        self.incubator_set_point = temperature;
        BenchOutcome::Staged
    }

    /// Starts the five-day incubation at the dial temperature.
    ///
    /// # Errors
    ///
    /// Propagates measurement store errors.
    pub fn start_incubation(
        &mut self,
        lab: &mut LabSessionService,
    ) -> Result<BenchOutcome, SessionError> {
        lab.tick();
        if !at_step(lab, Procedure::Bod, 6) || lab.is_task_pending(TaskKind::Incubation) {
            return Ok(BenchOutcome::Ignored);
        }
        if !lab.session().measurements().flag(MeasurementKey::IsIncubated) {
            return Ok(reject(
                lab,
                ErrorCategory::Procedure,
                "Place the bottle in the incubator before starting incubation",
            ));
        }
        let set_point = self.incubator_set_point;
        if !BOD_INCUBATOR_TEMPERATURE.contains(set_point) {
            return Ok(reject(
                lab,
                ErrorCategory::Measurement,
                format!("Wrong temperature: {set_point}\u{b0}C; 20\u{b0}C \u{b1}1\u{b0}C is needed"),
            ));
        }
        lab.set_measurement(MeasurementKey::IncubatorTemperature, set_point)?;
        let delay = lab.settings().timings().incubation_day() * INCUBATION_DAYS;
        Ok(BenchOutcome::Scheduled(lab.schedule(
            TaskKind::Incubation,
            delay,
            vec![(MeasurementKey::IncubationComplete, MeasurementValue::Flag(true))],
        )))
    }

    /// Reads dissolved oxygen after incubation and derives BOD₅.
    ///
    /// # Errors
    ///
    /// Propagates measurement store errors.
    pub fn measure_do5(
        &mut self,
        lab: &mut LabSessionService,
    ) -> Result<BenchOutcome, SessionError> {
        if !at_step(lab, Procedure::Bod, 7) {
            return Ok(BenchOutcome::Ignored);
        }
        let m = lab.session().measurements();
        if !m.flag(MeasurementKey::IncubationComplete) {
            return Ok(reject(
                lab,
                ErrorCategory::Procedure,
                "Finish the 5-day incubation before measuring DO again",
            ));
        }
        let do0 = m.number(MeasurementKey::Do0).unwrap_or(FALLBACK_DO0);
        let consumed = self.rng.random_range(2.0..5.0);
        let do5 = (do0 - consumed).max(0.0);
        lab.set_measurement(MeasurementKey::Do5, do5)?;
        lab.set_measurement(MeasurementKey::Bod5, (do0 - do5) * 100.0)?;
        Ok(BenchOutcome::Applied)
    }
}

fn add_seed(lab: &mut LabSessionService, key: MeasurementKey) -> Result<BenchOutcome, SessionError> {
    if !at_step(lab, Procedure::Bod, 2) {
        return Ok(BenchOutcome::Ignored);
    }
    if !lab.session().safety().is_worn() {
        return Ok(reject(lab, ErrorCategory::Safety, GEAR_FOR_CHEMICALS));
    }
    lab.set_measurement(key, true)?;
    Ok(BenchOutcome::Applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use lab_core::model::{LabMode, LabSettings, PracticePolicy, SafetyItem};
    use lab_core::time::fixed_clock;

    fn bench(seed: u64) -> BodBench<StdRng> {
        BodBench::with_rng(StdRng::seed_from_u64(seed))
    }

    fn lab_at_step(step: u8) -> LabSessionService {
        let settings =
            LabSettings::default_lab().with_practice_policy(PracticePolicy::AdvanceSilently);
        let mut lab = LabSessionService::new(Procedure::Bod)
            .with_clock(fixed_clock())
            .with_settings(settings);
        lab.set_mode(LabMode::Practice);
        while lab.session().current_step() < step {
            lab.advance().unwrap();
        }
        lab
    }

    #[test]
    fn seeding_requires_gear() {
        let mut lab = lab_at_step(2);
        let mut bod = bench(1);
        assert!(bod.add_nutrient(&mut lab).unwrap().is_rejected());
        assert_eq!(lab.errors()[0].category, ErrorCategory::Safety);

        lab.toggle_safety(SafetyItem::Gloves);
        lab.toggle_safety(SafetyItem::Goggles);
        assert_eq!(bod.add_nutrient(&mut lab).unwrap(), BenchOutcome::Applied);
        assert_eq!(bod.add_microorganism(&mut lab).unwrap(), BenchOutcome::Applied);
        assert!(matches!(bod.mix_sample(&mut lab), BenchOutcome::Scheduled(_)));
        assert!(lab.is_task_pending(TaskKind::Mixing));
    }

    #[test]
    fn mixing_needs_both_additions() {
        let mut lab = lab_at_step(2);
        assert!(bench(1).mix_sample(&mut lab).is_rejected());
        assert_eq!(lab.errors()[0].category, ErrorCategory::Procedure);
    }

    #[test]
    fn bubble_check_records_the_flag_either_way() {
        let mut seen_bubbles = false;
        let mut seen_clear = false;
        for seed in 0..64 {
            let mut lab = lab_at_step(3);
            let outcome = bench(seed).detect_bubbles(&mut lab).unwrap();
            let flagged = lab.session().measurements().flag(MeasurementKey::HasBubbles);
            assert!(lab.session().measurements().contains(MeasurementKey::HasBubbles));
            assert_eq!(outcome.is_rejected(), flagged);
            seen_bubbles |= flagged;
            seen_clear |= !flagged;
        }
        assert!(seen_bubbles && seen_clear);
    }

    #[test]
    fn fill_rejects_bad_volume_and_bubbles() {
        let mut lab = lab_at_step(3);
        let mut bod = bench(1);
        assert!(bod.fill_bottle(&mut lab, 310.0).unwrap().is_rejected());
        assert_eq!(lab.errors()[0].category, ErrorCategory::Measurement);

        lab.set_measurement(MeasurementKey::HasBubbles, true).unwrap();
        assert!(bod.fill_bottle(&mut lab, 300.0).unwrap().is_rejected());
        assert_eq!(lab.errors()[1].category, ErrorCategory::Procedure);

        lab.set_measurement(MeasurementKey::HasBubbles, false).unwrap();
        assert_eq!(bod.fill_bottle(&mut lab, 300.0).unwrap(), BenchOutcome::Applied);
        assert!(lab.current_validation().is_valid());
    }

    #[test]
    fn do0_needs_filled_bottle_and_stays_in_range() {
        let mut lab = lab_at_step(4);
        let mut bod = bench(3);
        assert!(bod.measure_do0(&mut lab).unwrap().is_rejected());

        lab.set_measurement(MeasurementKey::BodVolume, 300.0).unwrap();
        assert_eq!(bod.measure_do0(&mut lab).unwrap(), BenchOutcome::Applied);
        let do0 = lab.session().measurements().number(MeasurementKey::Do0).unwrap();
        assert!((7.0..10.0).contains(&do0));
    }

    #[test]
    fn incubator_needs_capped_bottle() {
        let mut lab = lab_at_step(5);
        let mut bod = bench(1);
        assert!(bod.place_in_incubator(&mut lab).unwrap().is_rejected());
        bod.cap_bottle(&mut lab).unwrap();
        assert_eq!(bod.place_in_incubator(&mut lab).unwrap(), BenchOutcome::Applied);
        assert!(lab.current_validation().is_valid());
    }

    #[test]
    fn incubation_checks_set_point_and_locks_dial() {
        let mut lab = lab_at_step(6);
        let mut bod = bench(1);
        lab.set_measurement(MeasurementKey::IsIncubated, true).unwrap();

        assert_eq!(bod.set_incubator_temperature(&lab, 25.0), BenchOutcome::Staged);
        assert!(bod.start_incubation(&mut lab).unwrap().is_rejected());
        assert_eq!(lab.errors()[0].category, ErrorCategory::Measurement);

        bod.set_incubator_temperature(&lab, 20.0);
        assert!(matches!(bod.start_incubation(&mut lab).unwrap(), BenchOutcome::Scheduled(_)));
        assert_eq!(bod.set_incubator_temperature(&lab, 30.0), BenchOutcome::Ignored);
        assert_eq!(bod.incubator_set_point(), 20.0);

        lab.advance_clock(Duration::seconds(3));
        assert_eq!(lab.task_progress(TaskKind::Incubation), Some(0.6));
        lab.advance_clock(Duration::seconds(2));
        assert!(lab.session().measurements().flag(MeasurementKey::IncubationComplete));
        assert!(lab.current_validation().is_valid());
    }

    #[test]
    fn do5_is_derived_from_do0() {
        let mut lab = lab_at_step(7);
        let mut bod = bench(9);
        assert!(bod.measure_do5(&mut lab).unwrap().is_rejected());

        lab.set_measurement(MeasurementKey::IncubationComplete, true).unwrap();
        lab.set_measurement(MeasurementKey::Do0, 8.0).unwrap();
        assert_eq!(bod.measure_do5(&mut lab).unwrap(), BenchOutcome::Applied);

        let m = lab.session().measurements();
        let do5 = m.number(MeasurementKey::Do5).unwrap();
        assert!(do5 > 3.0 && do5 <= 6.0);
        assert_eq!(m.number(MeasurementKey::Bod5), Some((8.0 - do5) * 100.0));
    }
}
