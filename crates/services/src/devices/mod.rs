//! Simulated instruments on the COD and BOD benches.
//!
//! A bench action only does something while the session is on the step the
//! action belongs to. Results land in the session's measurement store, either
//! at once or through a deferred task; mistakes are logged as lab errors.

mod bod;
mod cod;

pub use bod::BodBench;
pub use cod::CodBench;

use lab_core::model::{ErrorCategory, ErrorId, Procedure, SafetyItem, TaskId};

use crate::sessions::LabSessionService;

/// What a bench action did.
#[derive(Debug, Clone, PartialEq)]
pub enum BenchOutcome {
    /// The action took effect on the session.
    Applied,
    /// Only the instrument changed (a dial, a pipette draw); nothing was recorded.
    Staged,
    /// The action started device work that finishes later.
    Scheduled(TaskId),
    /// The action was refused and logged.
    Rejected(Vec<ErrorId>),
    /// Not the right procedure or step for this action.
    Ignored,
}

impl BenchOutcome {
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, BenchOutcome::Rejected(_))
    }
}

pub(crate) fn at_step(lab: &LabSessionService, procedure: Procedure, step: u8) -> bool {
    let session = lab.session();
    session.procedure() == procedure && session.current_step() == step
}

pub(crate) fn reject(
    lab: &mut LabSessionService,
    category: ErrorCategory,
    message: impl Into<String>,
) -> BenchOutcome {
    BenchOutcome::Rejected(vec![lab.record_error(category, message)])
}

pub(crate) const GEAR_FOR_CHEMICALS: &str = "Wear protective gear when adding chemicals";

/// Step 1 on either bench: logs one safety error per missing item.
pub(crate) fn check_safety_gear(lab: &mut LabSessionService, procedure: Procedure) -> BenchOutcome {
    if !at_step(lab, procedure, 1) {
        return BenchOutcome::Ignored;
    }
    let safety = lab.session().safety();
    let mut logged = Vec::new();
    if !safety.has(SafetyItem::Gloves) {
        logged.push(lab.record_error(ErrorCategory::Safety, "Put on gloves before starting work"));
    }
    if !safety.has(SafetyItem::Goggles) {
        logged.push(lab.record_error(ErrorCategory::Safety, "Put on goggles before starting work"));
    }
    if logged.is_empty() {
        BenchOutcome::Applied
    } else {
        BenchOutcome::Rejected(logged)
    }
}
