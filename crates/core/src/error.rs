use thiserror::Error;

use crate::model::{
    ErrorLogError, MeasurementError, ParseIdError, ProcedureParseError, SettingsError,
    TransitionError,
};

/// Any error raised by the lab model.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Measurement(#[from] MeasurementError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    ErrorLog(#[from] ErrorLogError),
    #[error(transparent)]
    Procedure(#[from] ProcedureParseError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Id(#[from] ParseIdError),
}
