//! Shared error types for the services crate.

use thiserror::Error;

use lab_core::model::{
    ErrorLogError, MeasurementError, ProcedureParseError, SettingsError, TransitionError,
};

/// Errors emitted by `LabSessionService` and the device benches.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error(transparent)]
    Measurement(#[from] MeasurementError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    ErrorLog(#[from] ErrorLogError),
    #[error(transparent)]
    Procedure(#[from] ProcedureParseError),
    #[error("failed to serialize session snapshot")]
    Snapshot(#[source] serde_json::Error),
}

/// Errors emitted while loading lab settings.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid settings JSON")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}
