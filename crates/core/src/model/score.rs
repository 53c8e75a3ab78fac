use serde::{Deserialize, Serialize};

/// Composite result of a practice run.
///
/// Only meaningful once the session is complete; before that it holds the
/// initial placeholder `{0, 30, 30, 0}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub accuracy: f64,
    pub safety: f64,
    pub efficiency: f64,
    pub total: f64,
}

impl Score {
    #[must_use]
    pub fn initial() -> Self {
        Self {
            accuracy: 0.0,
            safety: 30.0,
            efficiency: 30.0,
            total: 0.0,
        }
    }

    /// Builds a score whose total is the plain sum of the components.
    #[must_use]
    pub fn from_components(accuracy: f64, safety: f64, efficiency: f64) -> Self {
        Self {
            accuracy,
            safety,
            efficiency,
            total: accuracy + safety + efficiency,
        }
    }
}

impl Default for Score {
    fn default() -> Self {
        Self::initial()
    }
}
