use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum MeasurementError {
    #[error("unknown measurement key: {0:?}")]
    UnknownKey(String),

    #[error("{key} expects a {expected} value")]
    KindMismatch {
        key: MeasurementKey,
        expected: MeasurementKind,
    },

    #[error("{key} must be a finite number, got {value}")]
    NotFinite { key: MeasurementKey, value: f64 },
}

//
// ─── KEYS ──────────────────────────────────────────────────────────────────────
//

/// Whether a measurement holds a reading or a yes/no fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementKind {
    Number,
    Flag,
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasurementKind::Number => f.write_str("numeric"),
            MeasurementKind::Flag => f.write_str("boolean"),
        }
    }
}

/// The fixed vocabulary of facts the workspace can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MeasurementKey {
    /// COD sample volume, ml.
    #[serde(rename = "volume")]
    Volume,
    /// Dichromate volume, ml.
    #[serde(rename = "k2cr2o7Volume")]
    K2Cr2O7Volume,
    /// Sulfuric acid / silver sulfate volume, ml.
    #[serde(rename = "h2so4Volume")]
    H2So4Volume,
    /// COD tube temperature, °C.
    #[serde(rename = "temperature")]
    Temperature,
    /// Dissolved oxygen before incubation, mg/L.
    #[serde(rename = "do0")]
    Do0,
    /// Dissolved oxygen after incubation, mg/L.
    #[serde(rename = "do5")]
    Do5,
    #[serde(rename = "absorbance")]
    Absorbance,
    #[serde(rename = "cod")]
    Cod,
    #[serde(rename = "bod5")]
    Bod5,
    /// BOD bottle fill volume, ml.
    #[serde(rename = "bodVolume")]
    BodVolume,
    /// °C
    #[serde(rename = "incubatorTemperature")]
    IncubatorTemperature,
    #[serde(rename = "isCapped")]
    IsCapped,
    #[serde(rename = "isShaken")]
    IsShaken,
    #[serde(rename = "isIncubated")]
    IsIncubated,
    #[serde(rename = "heatingComplete")]
    HeatingComplete,
    #[serde(rename = "incubationComplete")]
    IncubationComplete,
    #[serde(rename = "hasNutrient")]
    HasNutrient,
    #[serde(rename = "hasMicroorganism")]
    HasMicroorganism,
    #[serde(rename = "hasBubbles")]
    HasBubbles,
}

impl MeasurementKey {
    pub const ALL: [MeasurementKey; 19] = [
        MeasurementKey::Volume,
        MeasurementKey::K2Cr2O7Volume,
        MeasurementKey::H2So4Volume,
        MeasurementKey::Temperature,
        MeasurementKey::Do0,
        MeasurementKey::Do5,
        MeasurementKey::Absorbance,
        MeasurementKey::Cod,
        MeasurementKey::Bod5,
        MeasurementKey::BodVolume,
        MeasurementKey::IncubatorTemperature,
        MeasurementKey::IsCapped,
        MeasurementKey::IsShaken,
        MeasurementKey::IsIncubated,
        MeasurementKey::HeatingComplete,
        MeasurementKey::IncubationComplete,
        MeasurementKey::HasNutrient,
        MeasurementKey::HasMicroorganism,
        MeasurementKey::HasBubbles,
    ];

    /// Name used by the presentation layer and in serialized snapshots.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MeasurementKey::Volume => "volume",
            MeasurementKey::K2Cr2O7Volume => "k2cr2o7Volume",
            MeasurementKey::H2So4Volume => "h2so4Volume",
            MeasurementKey::Temperature => "temperature",
            MeasurementKey::Do0 => "do0",
            MeasurementKey::Do5 => "do5",
            MeasurementKey::Absorbance => "absorbance",
            MeasurementKey::Cod => "cod",
            MeasurementKey::Bod5 => "bod5",
            MeasurementKey::BodVolume => "bodVolume",
            MeasurementKey::IncubatorTemperature => "incubatorTemperature",
            MeasurementKey::IsCapped => "isCapped",
            MeasurementKey::IsShaken => "isShaken",
            MeasurementKey::IsIncubated => "isIncubated",
            MeasurementKey::HeatingComplete => "heatingComplete",
            MeasurementKey::IncubationComplete => "incubationComplete",
            MeasurementKey::HasNutrient => "hasNutrient",
            MeasurementKey::HasMicroorganism => "hasMicroorganism",
            MeasurementKey::HasBubbles => "hasBubbles",
        }
    }

    #[must_use]
    pub fn kind(self) -> MeasurementKind {
        match self {
            MeasurementKey::Volume
            | MeasurementKey::K2Cr2O7Volume
            | MeasurementKey::H2So4Volume
            | MeasurementKey::Temperature
            | MeasurementKey::Do0
            | MeasurementKey::Do5
            | MeasurementKey::Absorbance
            | MeasurementKey::Cod
            | MeasurementKey::Bod5
            | MeasurementKey::BodVolume
            | MeasurementKey::IncubatorTemperature => MeasurementKind::Number,
            MeasurementKey::IsCapped
            | MeasurementKey::IsShaken
            | MeasurementKey::IsIncubated
            | MeasurementKey::HeatingComplete
            | MeasurementKey::IncubationComplete
            | MeasurementKey::HasNutrient
            | MeasurementKey::HasMicroorganism
            | MeasurementKey::HasBubbles => MeasurementKind::Flag,
        }
    }
}

impl fmt::Display for MeasurementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeasurementKey {
    type Err = MeasurementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MeasurementKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| MeasurementError::UnknownKey(s.to_string()))
    }
}

//
// ─── VALUES ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MeasurementValue {
    Number(f64),
    Flag(bool),
}

impl MeasurementValue {
    #[must_use]
    pub fn kind(self) -> MeasurementKind {
        match self {
            MeasurementValue::Number(_) => MeasurementKind::Number,
            MeasurementValue::Flag(_) => MeasurementKind::Flag,
        }
    }

    #[must_use]
    pub fn as_number(self) -> Option<f64> {
        match self {
            MeasurementValue::Number(v) => Some(v),
            MeasurementValue::Flag(_) => None,
        }
    }

    #[must_use]
    pub fn as_flag(self) -> Option<bool> {
        match self {
            MeasurementValue::Flag(v) => Some(v),
            MeasurementValue::Number(_) => None,
        }
    }
}

impl From<f64> for MeasurementValue {
    fn from(value: f64) -> Self {
        MeasurementValue::Number(value)
    }
}

impl From<bool> for MeasurementValue {
    fn from(value: bool) -> Self {
        MeasurementValue::Flag(value)
    }
}

//
// ─── STORE ─────────────────────────────────────────────────────────────────────
//

/// Measurement facts recorded during one run.
///
/// A key that was never written means "not yet measured". Writes overwrite;
/// values are kept exactly as given.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Measurements {
    values: BTreeMap<MeasurementKey, MeasurementValue>,
}

impl Measurements {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a value and returns the one it replaced.
    ///
    /// # Errors
    ///
    /// Returns `MeasurementError::KindMismatch` if the value kind does not match the key,
    /// or `MeasurementError::NotFinite` for NaN or infinite readings.
    pub fn set(
        &mut self,
        key: MeasurementKey,
        value: impl Into<MeasurementValue>,
    ) -> Result<Option<MeasurementValue>, MeasurementError> {
        let value = value.into();
        if value.kind() != key.kind() {
            return Err(MeasurementError::KindMismatch {
                key,
                expected: key.kind(),
            });
        }
        if let MeasurementValue::Number(v) = value {
            if !v.is_finite() {
                return Err(MeasurementError::NotFinite { key, value: v });
            }
        }
        Ok(self.values.insert(key, value))
    }

    #[must_use]
    pub fn get(&self, key: MeasurementKey) -> Option<MeasurementValue> {
        self.values.get(&key).copied()
    }

    /// Numeric reading, `None` when not yet measured.
    #[must_use]
    pub fn number(&self, key: MeasurementKey) -> Option<f64> {
        self.get(key).and_then(MeasurementValue::as_number)
    }

    /// Flag value; an unset flag reads as `false`.
    #[must_use]
    pub fn flag(&self, key: MeasurementKey) -> bool {
        self.get(key)
            .and_then(MeasurementValue::as_flag)
            .unwrap_or(false)
    }

    #[must_use]
    pub fn contains(&self, key: MeasurementKey) -> bool {
        self.values.contains_key(&key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MeasurementKey, MeasurementValue)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_value_reads_back_exactly() {
        let mut m = Measurements::new();
        m.set(MeasurementKey::Do0, 7.2).unwrap();
        assert_eq!(m.number(MeasurementKey::Do0), Some(7.2));
    }

    #[test]
    fn last_write_wins() {
        let mut m = Measurements::new();
        assert_eq!(m.set(MeasurementKey::Volume, 2.0).unwrap(), None);
        let previous = m.set(MeasurementKey::Volume, 2.5).unwrap();
        assert_eq!(previous, Some(MeasurementValue::Number(2.0)));
        assert_eq!(m.number(MeasurementKey::Volume), Some(2.5));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn unset_flag_reads_false_and_unset_number_reads_none() {
        let m = Measurements::new();
        assert!(!m.flag(MeasurementKey::IsCapped));
        assert_eq!(m.number(MeasurementKey::Temperature), None);
        assert!(!m.contains(MeasurementKey::IsCapped));
    }

    #[test]
    fn wrong_kind_is_rejected() {
        let mut m = Measurements::new();
        let err = m.set(MeasurementKey::IsCapped, 1.0).unwrap_err();
        assert!(matches!(
            err,
            MeasurementError::KindMismatch {
                key: MeasurementKey::IsCapped,
                expected: MeasurementKind::Flag
            }
        ));
        assert!(m.set(MeasurementKey::Volume, true).is_err());
        assert!(m.is_empty());
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        let mut m = Measurements::new();
        assert!(matches!(
            m.set(MeasurementKey::Absorbance, f64::NAN),
            Err(MeasurementError::NotFinite { .. })
        ));
        assert!(m.set(MeasurementKey::Absorbance, f64::INFINITY).is_err());
    }

    #[test]
    fn keys_parse_from_their_names() {
        for key in MeasurementKey::ALL {
            assert_eq!(key.as_str().parse::<MeasurementKey>().unwrap(), key);
        }
        assert!(matches!(
            "ph".parse::<MeasurementKey>(),
            Err(MeasurementError::UnknownKey(_))
        ));
    }

    #[test]
    fn serde_names_match_display_names() {
        for key in MeasurementKey::ALL {
            let json = serde_json::to_string(&key).unwrap();
            assert_eq!(json, format!("\"{}\"", key.as_str()));
        }
    }

    #[test]
    fn store_serializes_as_flat_object() {
        let mut m = Measurements::new();
        m.set(MeasurementKey::BodVolume, 300.0).unwrap();
        m.set(MeasurementKey::HasBubbles, false).unwrap();
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["bodVolume"], 300.0);
        assert_eq!(json["hasBubbles"], false);
    }
}
