#![forbid(unsafe_code)]

pub mod config;
pub mod devices;
pub mod error;
pub mod sessions;

pub use lab_core::Clock;
pub use sessions as session;

pub use config::settings_from_json;
pub use devices::{BenchOutcome, BodBench, CodBench};
pub use error::{ConfigError, SessionError};

pub use sessions::{
    LabSessionService, LabSnapshot, RunId, SessionProgress, StepStatus, TaskKind,
};
