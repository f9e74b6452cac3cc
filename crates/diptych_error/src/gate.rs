//! Export gate failures.

use std::fmt;

/// Export was refused because one or more readiness checks failed.
///
/// Carries every failing reason, in check order, so a caller can fix all of
/// them in one pass.
///
/// # Examples
///
/// ```
/// use diptych_error::GateBlockedError;
///
/// let err = GateBlockedError::new(vec![
///     "missing artifact for lang='en'".to_string(),
///     "artifact 'fr' must have reviewed=true".to_string(),
/// ]);
/// assert_eq!(err.reasons.len(), 2);
/// assert!(err.to_string().contains("Export blocked by strict gates"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Error)]
pub struct GateBlockedError {
    /// Every failing check, in evaluation order
    pub reasons: Vec<String>,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl GateBlockedError {
    /// Create a new GateBlockedError with automatic location tracking.
    #[track_caller]
    pub fn new(reasons: Vec<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            reasons,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Message without source location.
    pub fn message(&self) -> String {
        format!("Export blocked by strict gates: {}", self.reasons.join("; "))
    }
}

impl fmt::Display for GateBlockedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at line {} in {}", self.message(), self.line, self.file)
    }
}
