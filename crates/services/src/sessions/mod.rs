mod deferred;
mod progress;
mod service;
mod view;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use deferred::{DeferredQueue, DeviceTask, DueTasks, RunId, TaskKind};
pub use progress::{SessionProgress, StepProgress, StepStatus};
pub use service::LabSessionService;
pub use view::LabSnapshot;
