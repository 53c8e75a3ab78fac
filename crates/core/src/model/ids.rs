use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of an entry in a session's error log.
///
/// Ids are handed out by the log itself and are never reused, not even after
/// the log has been cleared.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ErrorId(u64);

impl ErrorId {
    /// Creates a new `ErrorId`
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying u64 value
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Identifier of a deferred device task.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(u64);

impl TaskId {
    /// Creates a new `TaskId`
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying u64 value
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ErrorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ErrorId({})", self.0)
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskId({})", self.0)
    }
}

// ─── Display Implementations ───────────────────────────────────────────────────

impl fmt::Display for ErrorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error-{}", self.0)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

// ─── FromStr Implementations ───────────────────────────────────────────────────

/// Error type for parsing an id from its display form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

fn parse_prefixed(s: &str, prefix: &str, kind: &'static str) -> Result<u64, ParseIdError> {
    s.strip_prefix(prefix)
        .unwrap_or(s)
        .parse::<u64>()
        .map_err(|_| ParseIdError { kind })
}

impl FromStr for ErrorId {
    type Err = ParseIdError;

    /// Accepts both `error-7` and the bare number `7`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_prefixed(s, "error-", "ErrorId").map(ErrorId::new)
    }
}

impl FromStr for TaskId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_prefixed(s, "task-", "TaskId").map(TaskId::new)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_id_display_is_prefixed() {
        assert_eq!(ErrorId::new(42).to_string(), "error-42");
    }

    #[test]
    fn error_id_parses_prefixed_and_bare_forms() {
        let prefixed: ErrorId = "error-12".parse().unwrap();
        let bare: ErrorId = "12".parse().unwrap();
        assert_eq!(prefixed, ErrorId::new(12));
        assert_eq!(bare, prefixed);
    }

    #[test]
    fn error_id_from_str_invalid() {
        assert!("error-x".parse::<ErrorId>().is_err());
        assert!("not-a-number".parse::<ErrorId>().is_err());
    }

    #[test]
    fn task_id_display_roundtrips() {
        let original = TaskId::new(9);
        let parsed: TaskId = original.to_string().parse().unwrap();
        assert_eq!(parsed, original);
    }
}
