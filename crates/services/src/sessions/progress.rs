use serde::Serialize;

use lab_core::model::{LabSession, StepDefinition};

/// Where a step stands relative to the session's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
}

/// One row of the step list shown beside the workspace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepProgress {
    pub step: &'static StepDefinition,
    pub status: StepStatus,
}

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionProgress {
    pub current_step: u8,
    pub total_steps: u8,
    pub completed_steps: u8,
    pub is_complete: bool,
    pub steps: Vec<StepProgress>,
}

impl SessionProgress {
    #[must_use]
    pub fn of(session: &LabSession) -> Self {
        let current = session.current_step();
        let complete = session.is_complete();
        let status = |id: u8| {
            if id < current || (complete && id == current) {
                StepStatus::Completed
            } else if id == current {
                StepStatus::InProgress
            } else {
                StepStatus::Pending
            }
        };

        let steps: Vec<StepProgress> = session
            .procedure()
            .steps()
            .iter()
            .map(|step| StepProgress {
                step,
                status: status(step.id),
            })
            .collect();
        let completed_steps = steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count();

        Self {
            current_step: current,
            total_steps: session.step_count(),
            completed_steps: u8::try_from(completed_steps).unwrap_or(u8::MAX),
            is_complete: complete,
            steps,
        }
    }
}
