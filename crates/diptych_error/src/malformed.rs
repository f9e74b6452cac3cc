//! Malformed generation output.

/// Raised when no extraction strategy yields a payload matching the
/// generation schema.
///
/// # Examples
///
/// ```
/// use diptych_error::MalformedOutputError;
///
/// let err = MalformedOutputError::new("missing artifacts.en");
/// assert!(err.to_string().contains("artifacts.en"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Malformed Output: {} at line {} in {}", message, line, file)]
pub struct MalformedOutputError {
    /// What was wrong with the output
    pub message: String,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl MalformedOutputError {
    /// Create a new MalformedOutputError at the current location.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: location.line(),
            file: location.file(),
        }
    }
}
