mod error_log;
mod ids;
mod measurements;
mod procedure;
mod score;
mod session;
mod settings;

pub use ids::{ErrorId, ParseIdError, TaskId};

pub use error_log::{ErrorCategory, ErrorLog, ErrorLogError, LabError};
pub use measurements::{
    MeasurementError, MeasurementKey, MeasurementKind, MeasurementValue, Measurements,
};
pub use procedure::{Procedure, ProcedureParseError, StepDefinition};
pub use score::Score;
pub use session::{AdvanceOutcome, LabMode, LabSession, SafetyGear, SafetyItem, TransitionError};
pub use settings::{
    DeviceTimings, LabSettings, LabSettingsDraft, PracticePolicy, ScoringWeights, SettingsError,
};
