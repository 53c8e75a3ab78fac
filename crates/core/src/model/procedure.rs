use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProcedureParseError {
    #[error("unknown procedure: {0:?} (expected COD or BOD)")]
    Unknown(String),
}

//
// ─── STEP DEFINITIONS ──────────────────────────────────────────────────────────
//

/// Read-only metadata for one step of a procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepDefinition {
    pub id: u8,
    pub title: &'static str,
    pub description: &'static str,
    pub hint: Option<&'static str>,
}

const fn step(
    id: u8,
    title: &'static str,
    description: &'static str,
    hint: &'static str,
) -> StepDefinition {
    StepDefinition {
        id,
        title,
        description,
        hint: Some(hint),
    }
}

static COD_STEPS: [StepDefinition; 8] = [
    step(
        1,
        "Safety preparation",
        "Put on gloves and safety goggles before working",
        "Pick the gloves and goggles from the equipment cabinet",
    ),
    step(
        2,
        "Take the water sample",
        "Pipette 2.5 ml of the water sample into the COD tube",
        "Select the sample beaker, then the pipette",
    ),
    step(
        3,
        "Add K\u{2082}Cr\u{2082}O\u{2087}",
        "Add 1.5 ml of 0.25N K\u{2082}Cr\u{2082}O\u{2087} to the COD tube",
        "Take the K\u{2082}Cr\u{2082}O\u{2087} bottle from the chemical cabinet",
    ),
    step(
        4,
        "Add H\u{2082}SO\u{2084}-Ag\u{2082}SO\u{2084}",
        "Add 3.5 ml of H\u{2082}SO\u{2084} containing Ag\u{2082}SO\u{2084} to the COD tube",
        "Take the H\u{2082}SO\u{2084} bottle from the chemical cabinet",
    ),
    step(
        5,
        "Cap and shake",
        "Cap the COD tube and shake it well",
        "Click the cap to close the tube, then click the tube to shake it",
    ),
    step(
        6,
        "Heat",
        "Place the tube in the heater at 150\u{b0}C for 2 hours",
        "Drag the tube into the heater and set the temperature",
    ),
    step(
        7,
        "Cool down",
        "Let the tube cool below 40\u{b0}C",
        "Take the tube out of the heater and wait for it to cool",
    ),
    step(
        8,
        "Measure and compute COD",
        "Place the tube in the spectrophotometer to read the absorbance",
        "Drag the tube into the spectrophotometer",
    ),
];

static BOD_STEPS: [StepDefinition; 7] = [
    step(
        1,
        "Safety preparation",
        "Put on gloves and safety goggles before working",
        "Pick the gloves and goggles from the equipment cabinet",
    ),
    step(
        2,
        "Prepare the sample",
        "Take the water sample and add nutrient solution and microorganisms",
        "Select the sample beaker, then add both solutions",
    ),
    step(
        3,
        "Fill the BOD bottle",
        "Pour the prepared sample into the 300 ml BOD bottle",
        "Click the beaker to pour into the BOD bottle",
    ),
    step(
        4,
        "Measure initial DO (DO\u{2080})",
        "Dip the DO meter probe into the bottle and read DO\u{2080}",
        "Click the DO meter and dip it into the BOD bottle",
    ),
    step(
        5,
        "Cap and store",
        "Seal the BOD bottle and place it in the incubator",
        "Click the bottle cap to seal it, then move it into the incubator",
    ),
    step(
        6,
        "Incubate 5 days",
        "Incubate the BOD bottle at 20\u{b0}C for 5 days",
        "Put the bottle in the incubator and wait 5 days",
    ),
    step(
        7,
        "Measure DO after 5 days (DO\u{2085})",
        "Take the bottle out and read DO\u{2085}",
        "Click the DO meter and dip it into the BOD bottle",
    ),
];

//
// ─── PROCEDURE ─────────────────────────────────────────────────────────────────
//

/// The two lab procedures a session can practise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Procedure {
    /// Chemical Oxygen Demand, eight steps.
    #[serde(rename = "COD")]
    Cod,
    /// Biochemical Oxygen Demand with a five-day incubation, seven steps.
    #[serde(rename = "BOD")]
    Bod,
}

impl Procedure {
    pub const ALL: [Procedure; 2] = [Procedure::Cod, Procedure::Bod];

    /// Ordered step metadata.
    #[must_use]
    pub fn steps(self) -> &'static [StepDefinition] {
        match self {
            Procedure::Cod => &COD_STEPS,
            Procedure::Bod => &BOD_STEPS,
        }
    }

    #[must_use]
    pub fn step_count(self) -> u8 {
        match self {
            Procedure::Cod => 8,
            Procedure::Bod => 7,
        }
    }

    /// Looks up a step by its 1-based index.
    #[must_use]
    pub fn step(self, index: u8) -> Option<&'static StepDefinition> {
        let slot = usize::from(index).checked_sub(1)?;
        self.steps().get(slot)
    }

    /// Minutes a trainee is expected to need before efficiency starts dropping.
    #[must_use]
    pub fn expected_minutes(self) -> f64 {
        match self {
            Procedure::Cod => 20.0,
            Procedure::Bod => 15.0,
        }
    }

    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Procedure::Cod => "COD",
            Procedure::Bod => "BOD",
        }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Procedure {
    type Err = ProcedureParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "COD" => Ok(Procedure::Cod),
            "BOD" => Ok(Procedure::Bod),
            _ => Err(ProcedureParseError::Unknown(s.to_string())),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_tables_match_step_counts() {
        for procedure in Procedure::ALL {
            let steps = procedure.steps();
            assert_eq!(steps.len(), usize::from(procedure.step_count()));
            for (slot, def) in steps.iter().enumerate() {
                assert_eq!(usize::from(def.id), slot + 1);
                assert!(def.hint.is_some());
            }
        }
    }

    #[test]
    fn step_lookup_is_one_based() {
        assert_eq!(Procedure::Cod.step(1).unwrap().title, "Safety preparation");
        assert_eq!(Procedure::Bod.step(7).unwrap().id, 7);
        assert!(Procedure::Cod.step(0).is_none());
        assert!(Procedure::Bod.step(8).is_none());
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("cod".parse::<Procedure>().unwrap(), Procedure::Cod);
        assert_eq!(" BOD ".parse::<Procedure>().unwrap(), Procedure::Bod);
        let err = "TOC".parse::<Procedure>().unwrap_err();
        assert!(matches!(err, ProcedureParseError::Unknown(_)));
    }

    #[test]
    fn expected_minutes_per_procedure() {
        assert_eq!(Procedure::Cod.expected_minutes(), 20.0);
        assert_eq!(Procedure::Bod.expected_minutes(), 15.0);
    }

    #[test]
    fn serializes_as_upper_case_code() {
        let json = serde_json::to_string(&Procedure::Bod).unwrap();
        assert_eq!(json, "\"BOD\"");
    }
}
