use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use lab_core::model::{ErrorCategory, MeasurementKey, MeasurementValue, Procedure};
use lab_core::validator::{
    COD_H2SO4_VOLUME, COD_K2CR2O7_VOLUME, COD_SAFE_HANDLING_TEMPERATURE, COD_SAMPLE_VOLUME,
};

use super::{BenchOutcome, GEAR_FOR_CHEMICALS, at_step, check_safety_gear, reject};
use crate::error::SessionError;
use crate::sessions::{LabSessionService, TaskKind};

/// Heater dial position before the learner touches it, °C.
pub const ROOM_TEMPERATURE: f64 = 25.0;
/// Where the cooling bath leaves the tube, °C.
pub const COOLED_TEMPERATURE: f64 = 35.0;

/// Pipette, reagent bottles, heater, cooling bath and spectrophotometer.
#[derive(Debug, Clone)]
pub struct CodBench<R = StdRng> {
    rng: R,
    pipette_volume: f64,
    heater_set_point: f64,
}

impl CodBench<StdRng> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }
}

impl Default for CodBench<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> CodBench<R> {
    #[must_use]
    pub fn with_rng(rng: R) -> Self {
        Self {
            rng,
            pipette_volume: 0.0,
            heater_set_point: ROOM_TEMPERATURE,
        }
    }

    #[must_use]
    pub fn pipette_volume(&self) -> f64 {
        self.pipette_volume
    }

    #[must_use]
    pub fn heater_set_point(&self) -> f64 {
        self.heater_set_point
    }

    pub fn check_safety_gear(&mut self, lab: &mut LabSessionService) -> BenchOutcome {
        check_safety_gear(lab, Procedure::Cod)
    }

    /// Draws `volume` ml into the pipette.
    ///
    /// An acceptable draw is recorded as the sample volume straight away; an
    /// overdraw is logged; an underdraw stays on the pipette.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Measurement` if `volume` is not finite.
    pub fn set_pipette_volume(
        &mut self,
        lab: &mut LabSessionService,
        volume: f64,
    ) -> Result<BenchOutcome, SessionError> {
        if !at_step(lab, Procedure::Cod, 2) {
            return Ok(BenchOutcome::Ignored);
        }
        self.pipette_volume = volume;
        if COD_SAMPLE_VOLUME.contains(volume) {
            lab.set_measurement(MeasurementKey::Volume, volume)?;
            Ok(BenchOutcome::Applied)
        } else if volume > COD_SAMPLE_VOLUME.max {
            Ok(reject(
                lab,
                ErrorCategory::Measurement,
                format!("Volume too large: {volume:.1} ml; 2.5 ml \u{b1}0.1 ml is needed"),
            ))
        } else {
            Ok(BenchOutcome::Staged)
        }
    }

    /// Empties the pipette into the tube if it holds an acceptable volume.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Measurement` if the pipette volume is not finite.
    pub fn dispense_sample(
        &mut self,
        lab: &mut LabSessionService,
    ) -> Result<BenchOutcome, SessionError> {
        if !at_step(lab, Procedure::Cod, 2) || !COD_SAMPLE_VOLUME.contains(self.pipette_volume) {
            return Ok(BenchOutcome::Ignored);
        }
        lab.set_measurement(MeasurementKey::Volume, self.pipette_volume)?;
        Ok(BenchOutcome::Applied)
    }

    /// # Errors
    ///
    /// Returns `SessionError::Measurement` if `volume` is not finite.
    pub fn add_k2cr2o7(
        &mut self,
        lab: &mut LabSessionService,
        volume: f64,
    ) -> Result<BenchOutcome, SessionError> {
        if !at_step(lab, Procedure::Cod, 3) {
            return Ok(BenchOutcome::Ignored);
        }
        if !lab.session().safety().is_worn() {
            return Ok(reject(lab, ErrorCategory::Safety, GEAR_FOR_CHEMICALS));
        }
        if !COD_K2CR2O7_VOLUME.contains(volume) {
            return Ok(reject(
                lab,
                ErrorCategory::Measurement,
                format!("Wrong volume: {volume:.1} ml; 1.5 ml \u{b1}0.1 ml is needed"),
            ));
        }
        lab.set_measurement(MeasurementKey::K2Cr2O7Volume, volume)?;
        Ok(BenchOutcome::Applied)
    }

    /// # Errors
    ///
    /// Returns `SessionError::Measurement` if `volume` is not finite.
    pub fn add_h2so4(
        &mut self,
        lab: &mut LabSessionService,
        volume: f64,
    ) -> Result<BenchOutcome, SessionError> {
        if !at_step(lab, Procedure::Cod, 4) {
            return Ok(BenchOutcome::Ignored);
        }
        if !lab.session().measurements().contains(MeasurementKey::K2Cr2O7Volume) {
            return Ok(reject(
                lab,
                ErrorCategory::Procedure,
                "K\u{2082}Cr\u{2082}O\u{2087} must be added before H\u{2082}SO\u{2084}",
            ));
        }
        if !COD_H2SO4_VOLUME.contains(volume) {
            return Ok(reject(
                lab,
                ErrorCategory::Measurement,
                format!("Wrong volume: {volume:.1} ml; 3.5 ml \u{b1}0.1 ml is needed"),
            ));
        }
        lab.set_measurement(MeasurementKey::H2So4Volume, volume)?;
        Ok(BenchOutcome::Applied)
    }

    /// # Errors
    ///
    /// Propagates measurement store errors.
    pub fn cap_tube(&mut self, lab: &mut LabSessionService) -> Result<BenchOutcome, SessionError> {
        if !at_step(lab, Procedure::Cod, 5) {
            return Ok(BenchOutcome::Ignored);
        }
        lab.set_measurement(MeasurementKey::IsCapped, true)?;
        Ok(BenchOutcome::Applied)
    }

    /// Shakes a capped tube; `isShaken` lands after the shake delay.
    pub fn shake_tube(&mut self, lab: &mut LabSessionService) -> BenchOutcome {
        if !at_step(lab, Procedure::Cod, 5) {
            return BenchOutcome::Ignored;
        }
        if !lab.session().measurements().flag(MeasurementKey::IsCapped) {
            return reject(lab, ErrorCategory::Procedure, "Cap the tube before shaking");
        }
        let delay = lab.settings().timings().shake();
        BenchOutcome::Scheduled(lab.schedule(
            TaskKind::Shake,
            delay,
            vec![(MeasurementKey::IsShaken, MeasurementValue::Flag(true))],
        ))
    }

    /// Turns the heater dial; read by the next `start_heating`.
    pub fn set_heater_temperature(
        &mut self,
        lab: &LabSessionService,
        temperature: f64,
    ) -> BenchOutcome {
        if !at_step(lab, Procedure::Cod, 6) {
            return BenchOutcome::Ignored;
        }
        self.heater_set_point = temperature;
        BenchOutcome::Staged
    }

    /// Puts the shaken tube in the heater at the dial temperature.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Measurement` if the set-point is not finite.
    pub fn start_heating(
        &mut self,
        lab: &mut LabSessionService,
    ) -> Result<BenchOutcome, SessionError> {
        lab.tick();
        if !at_step(lab, Procedure::Cod, 6) || lab.is_task_pending(TaskKind::Heating) {
            return Ok(BenchOutcome::Ignored);
        }
        if !lab.session().measurements().flag(MeasurementKey::IsShaken) {
            return Ok(reject(
                lab,
                ErrorCategory::Procedure,
                "Shake the tube well before heating",
            ));
        }
        lab.set_measurement(MeasurementKey::Temperature, self.heater_set_point)?;
        let delay = lab.settings().timings().heating();
        Ok(BenchOutcome::Scheduled(lab.schedule(
            TaskKind::Heating,
            delay,
            vec![(MeasurementKey::HeatingComplete, MeasurementValue::Flag(true))],
        )))
    }

    /// Cools the digested tube; the temperature drops after the cooling delay.
    pub fn start_cooling(&mut self, lab: &mut LabSessionService) -> BenchOutcome {
        lab.tick();
        if !at_step(lab, Procedure::Cod, 7) || lab.is_task_pending(TaskKind::Cooling) {
            return BenchOutcome::Ignored;
        }
        if !lab.session().measurements().flag(MeasurementKey::HeatingComplete) {
            return reject(
                lab,
                ErrorCategory::Procedure,
                "Finish heating before cooling the tube",
            );
        }
        let delay = lab.settings().timings().cooling();
        BenchOutcome::Scheduled(lab.schedule(
            TaskKind::Cooling,
            delay,
            vec![(
                MeasurementKey::Temperature,
                MeasurementValue::Number(COOLED_TEMPERATURE),
            )],
        ))
    }

    /// Reads absorbance at 600 nm and derives COD (mg/L) from it.
    ///
    /// # Errors
    ///
    /// Propagates measurement store errors.
    pub fn measure_absorbance(
        &mut self,
        lab: &mut LabSessionService,
    ) -> Result<BenchOutcome, SessionError> {
        if !at_step(lab, Procedure::Cod, 8) {
            return Ok(BenchOutcome::Ignored);
        }
        let temperature = lab
            .session()
            .measurements()
            .number(MeasurementKey::Temperature)
            .unwrap_or(ROOM_TEMPERATURE);
        if temperature > COD_SAFE_HANDLING_TEMPERATURE {
            return Ok(reject(
                lab,
                ErrorCategory::Safety,
                format!("The tube is too hot ({temperature:.0}\u{b0}C); cool it below 40\u{b0}C"),
            ));
        }
        let absorbance = self.rng.random_range(0.3..0.7);
        lab.set_measurement(MeasurementKey::Absorbance, absorbance)?;
        lab.set_measurement(MeasurementKey::Cod, absorbance * 1000.0)?;
        Ok(BenchOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use lab_core::model::{LabMode, LabSettings, PracticePolicy, SafetyItem};
    use lab_core::time::fixed_clock;

    fn bench() -> CodBench<StdRng> {
        CodBench::with_rng(StdRng::seed_from_u64(7))
    }

    fn lab_at_step(step: u8) -> LabSessionService {
        let settings =
            LabSettings::default_lab().with_practice_policy(PracticePolicy::AdvanceSilently);
        let mut lab = LabSessionService::new(Procedure::Cod)
            .with_clock(fixed_clock())
            .with_settings(settings);
        lab.set_mode(LabMode::Practice);
        lab.toggle_safety(SafetyItem::Gloves);
        lab.toggle_safety(SafetyItem::Goggles);
        while lab.session().current_step() < step {
            lab.advance().unwrap();
        }
        lab
    }

    #[test]
    fn actions_off_step_are_ignored() {
        let mut lab = lab_at_step(1);
        let mut cod = bench();
        assert_eq!(cod.add_k2cr2o7(&mut lab, 1.5).unwrap(), BenchOutcome::Ignored);
        assert_eq!(cod.cap_tube(&mut lab).unwrap(), BenchOutcome::Ignored);
        assert!(lab.session().measurements().is_empty());
    }

    #[test]
    fn safety_check_logs_each_missing_item() {
        let mut lab = LabSessionService::new(Procedure::Cod).with_clock(fixed_clock());
        let outcome = bench().check_safety_gear(&mut lab);
        match outcome {
            BenchOutcome::Rejected(ids) => assert_eq!(ids.len(), 2),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(lab.errors().len(), 2);
    }

    #[test]
    fn pipette_records_only_acceptable_draws() {
        let mut lab = lab_at_step(2);
        let mut cod = bench();

        assert_eq!(cod.set_pipette_volume(&mut lab, 2.0).unwrap(), BenchOutcome::Staged);
        assert_eq!(cod.dispense_sample(&mut lab).unwrap(), BenchOutcome::Ignored);
        assert!(!lab.session().measurements().contains(MeasurementKey::Volume));

        assert!(cod.set_pipette_volume(&mut lab, 2.8).unwrap().is_rejected());
        assert_eq!(lab.errors()[0].category, ErrorCategory::Measurement);

        assert_eq!(cod.set_pipette_volume(&mut lab, 2.5).unwrap(), BenchOutcome::Applied);
        assert_eq!(
            lab.session().measurements().number(MeasurementKey::Volume),
            Some(2.5)
        );
    }

    #[test]
    fn acid_without_dichromate_is_a_procedure_error() {
        let mut lab = lab_at_step(4);
        let outcome = bench().add_h2so4(&mut lab, 3.5).unwrap();
        assert!(outcome.is_rejected());
        assert_eq!(lab.errors()[0].category, ErrorCategory::Procedure);
    }

    #[test]
    fn shaking_lands_after_delay() {
        let mut lab = lab_at_step(5);
        let mut cod = bench();
        assert!(cod.shake_tube(&mut lab).is_rejected());

        cod.cap_tube(&mut lab).unwrap();
        assert!(matches!(cod.shake_tube(&mut lab), BenchOutcome::Scheduled(_)));
        assert!(!lab.session().measurements().flag(MeasurementKey::IsShaken));

        lab.advance_clock(Duration::seconds(2));
        assert!(lab.session().measurements().flag(MeasurementKey::IsShaken));
    }

    #[test]
    fn heating_writes_set_point_then_completes() {
        let mut lab = lab_at_step(5);
        let mut cod = bench();
        cod.cap_tube(&mut lab).unwrap();
        cod.shake_tube(&mut lab);
        lab.advance_clock(Duration::seconds(2));
        lab.advance().unwrap();

        assert_eq!(cod.set_heater_temperature(&lab, 150.0), BenchOutcome::Staged);
        assert!(matches!(cod.start_heating(&mut lab).unwrap(), BenchOutcome::Scheduled(_)));
        assert_eq!(
            lab.session().measurements().number(MeasurementKey::Temperature),
            Some(150.0)
        );
        assert!(lab.is_task_pending(TaskKind::Heating));
        assert_eq!(cod.start_heating(&mut lab).unwrap(), BenchOutcome::Ignored);

        lab.advance_clock(Duration::seconds(5));
        assert!(lab.session().measurements().flag(MeasurementKey::HeatingComplete));
        assert!(lab.current_validation().is_valid());
    }

    #[test]
    fn cooling_requires_finished_heating_and_writes_temperature() {
        let mut lab = lab_at_step(7);
        let mut cod = bench();
        assert!(cod.start_cooling(&mut lab).is_rejected());

        lab.set_measurement(MeasurementKey::HeatingComplete, true).unwrap();
        lab.set_measurement(MeasurementKey::Temperature, 150.0).unwrap();
        assert!(matches!(cod.start_cooling(&mut lab), BenchOutcome::Scheduled(_)));
        lab.advance_clock(Duration::seconds(3));
        assert_eq!(
            lab.session().measurements().number(MeasurementKey::Temperature),
            Some(COOLED_TEMPERATURE)
        );
    }

    #[test]
    fn absorbance_refused_while_hot_and_in_range_when_cool() {
        let mut lab = lab_at_step(8);
        let mut cod = bench();
        lab.set_measurement(MeasurementKey::Temperature, 90.0).unwrap();
        let outcome = cod.measure_absorbance(&mut lab).unwrap();
        assert!(outcome.is_rejected());
        assert_eq!(lab.errors().last().unwrap().category, ErrorCategory::Safety);

        lab.set_measurement(MeasurementKey::Temperature, 35.0).unwrap();
        assert_eq!(cod.measure_absorbance(&mut lab).unwrap(), BenchOutcome::Applied);
        let m = lab.session().measurements();
        let absorbance = m.number(MeasurementKey::Absorbance).unwrap();
        assert!((0.3..0.7).contains(&absorbance));
        assert_eq!(m.number(MeasurementKey::Cod), Some(absorbance * 1000.0));
    }
}
