use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::ids::ErrorId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ErrorLogError {
    #[error("no error log entry with id {0}")]
    NotFound(ErrorId),
}

//
// ─── CATEGORY ──────────────────────────────────────────────────────────────────
//

/// Kind of lab-rule violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Missing protective gear or a dangerous temperature. Costs safety points.
    Safety,
    /// Actions done in the wrong order.
    Procedure,
    /// A reading outside tolerance, or missing.
    Measurement,
    /// Informational, e.g. heating or incubation not finished yet.
    Warning,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorCategory::Safety => "safety",
            ErrorCategory::Procedure => "procedure",
            ErrorCategory::Measurement => "measurement",
            ErrorCategory::Warning => "warning",
        };
        f.write_str(label)
    }
}

//
// ─── ENTRY ─────────────────────────────────────────────────────────────────────
//

/// One recorded violation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabError {
    pub id: ErrorId,
    pub step: u8,
    pub category: ErrorCategory,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub resolved: bool,
}

//
// ─── LOG ───────────────────────────────────────────────────────────────────────
//

/// Append-only, insertion-ordered record of violations.
///
/// Entries are only removed by [`ErrorLog::clear`]. Resolving an entry flags it
/// but keeps it, so scoring still sees it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorLog {
    entries: Vec<LabError>,
    next_id: u64,
}

impl ErrorLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry, stamping a fresh id and the given timestamp.
    pub fn add(
        &mut self,
        step: u8,
        category: ErrorCategory,
        message: impl Into<String>,
        at: DateTime<Utc>,
    ) -> ErrorId {
        self.next_id += 1;
        let id = ErrorId::new(self.next_id);
        self.entries.push(LabError {
            id,
            step,
            category,
            message: message.into(),
            timestamp: at,
            resolved: false,
        });
        id
    }

    /// Marks an entry as resolved without removing it.
    ///
    /// # Errors
    ///
    /// Returns `ErrorLogError::NotFound` if no entry has this id.
    pub fn resolve(&mut self, id: ErrorId) -> Result<(), ErrorLogError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(ErrorLogError::NotFound(id))?;
        entry.resolved = true;
        Ok(())
    }

    /// Drops every entry. Ids already handed out are not reused.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn entries(&self) -> &[LabError] {
        &self.entries
    }

    #[must_use]
    pub fn get(&self, id: ErrorId) -> Option<&LabError> {
        self.entries.iter().find(|e| e.id == id)
    }

    #[must_use]
    pub fn last(&self) -> Option<&LabError> {
        self.entries.last()
    }

    /// Number of entries in a category, resolved or not.
    #[must_use]
    pub fn count(&self, category: ErrorCategory) -> usize {
        self.entries.iter().filter(|e| e.category == category).count()
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &LabError> {
        self.entries.iter().filter(|e| !e.resolved)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn add_preserves_insertion_order_and_stamps_ids() {
        let mut log = ErrorLog::new();
        let a = log.add(1, ErrorCategory::Safety, "no gloves", fixed_now());
        let b = log.add(2, ErrorCategory::Measurement, "too much", fixed_now());

        assert_ne!(a, b);
        let steps: Vec<_> = log.entries().iter().map(|e| e.step).collect();
        assert_eq!(steps, vec![1, 2]);
        assert_eq!(log.get(b).unwrap().message, "too much");
        assert_eq!(log.last().unwrap().timestamp, fixed_now());
    }

    #[test]
    fn resolve_flags_but_keeps_entry() {
        let mut log = ErrorLog::new();
        let id = log.add(1, ErrorCategory::Safety, "no goggles", fixed_now());
        log.resolve(id).unwrap();

        assert_eq!(log.len(), 1);
        assert!(log.get(id).unwrap().resolved);
        assert_eq!(log.count(ErrorCategory::Safety), 1);
        assert_eq!(log.unresolved().count(), 0);
    }

    #[test]
    fn resolve_unknown_id_fails() {
        let mut log = ErrorLog::new();
        let err = log.resolve(ErrorId::new(99)).unwrap_err();
        assert_eq!(err, ErrorLogError::NotFound(ErrorId::new(99)));
    }

    #[test]
    fn ids_stay_unique_across_clear() {
        let mut log = ErrorLog::new();
        let first = log.add(1, ErrorCategory::Warning, "a", fixed_now());
        log.clear();
        assert!(log.is_empty());
        let second = log.add(1, ErrorCategory::Warning, "b", fixed_now());
        assert_ne!(first, second);
    }

    #[test]
    fn count_filters_by_category() {
        let mut log = ErrorLog::new();
        log.add(1, ErrorCategory::Safety, "x", fixed_now());
        log.add(2, ErrorCategory::Procedure, "y", fixed_now());
        log.add(7, ErrorCategory::Safety, "z", fixed_now());
        assert_eq!(log.count(ErrorCategory::Safety), 2);
        assert_eq!(log.count(ErrorCategory::Measurement), 0);
    }
}
