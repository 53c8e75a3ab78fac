//! Loading `LabSettings` from JSON.
//!
//! Every field is optional; anything omitted keeps the `default_lab()` value.
//!
//! ```json
//! { "practice_policy": "hold", "overtime_penalty_per_minute": 1.0, "heating_ms": 500 }
//! ```

use lab_core::model::{LabSettings, LabSettingsDraft};

use crate::error::ConfigError;

/// Parses and validates settings from a JSON document.
///
/// # Errors
///
/// Returns `ConfigError::Parse` for malformed JSON or unknown fields and
/// `ConfigError::Settings` for out-of-range values.
pub fn settings_from_json(json: &str) -> Result<LabSettings, ConfigError> {
    let draft: LabSettingsDraft = serde_json::from_str(json)?;
    let settings = draft.validate()?;
    log::debug!(
        "loaded lab settings: practice_policy={:?}",
        settings.practice_policy()
    );
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lab_core::model::{PracticePolicy, SettingsError};

    #[test]
    fn empty_object_yields_defaults() {
        let settings = settings_from_json("{}").unwrap();
        assert_eq!(settings, LabSettings::default_lab());
    }

    #[test]
    fn partial_document_overrides_named_fields() {
        let settings =
            settings_from_json(r#"{ "practice_policy": "hold", "safety_penalty": 10.0 }"#).unwrap();
        assert_eq!(settings.practice_policy(), PracticePolicy::Hold);
        assert_eq!(settings.scoring().safety_penalty(), 10.0);
        assert_eq!(settings.scoring().accuracy_max(), 40.0);
    }

    #[test]
    fn unknown_field_is_a_parse_error() {
        let err = settings_from_json(r#"{ "colour": "blue" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn negative_weight_is_rejected() {
        let err = settings_from_json(r#"{ "safety_max": -1.0 }"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Settings(SettingsError::InvalidWeight(_))
        ));
    }

    #[test]
    fn zero_timing_is_rejected() {
        let err = settings_from_json(r#"{ "cooling_ms": 0 }"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Settings(SettingsError::InvalidTiming(_))
        ));
    }
}
