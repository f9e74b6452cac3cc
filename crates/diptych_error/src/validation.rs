//! Request validation errors.

/// Specific validation conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ValidationErrorKind {
    /// A batch was requested without topics
    #[display("topic_ids must be non-empty")]
    EmptyTopicIds,
    /// Another topic already uses this slug
    #[display("slug already exists: {}", _0)]
    SlugTaken(String),
    /// The batch was never submitted to the provider
    #[display("Batch {} has no provider job id", _0)]
    MissingJobHandle(String),
    /// A field carries a value outside its domain
    #[display("Invalid field value for '{}': {}", field, reason)]
    InvalidField {
        /// The field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
    /// A closed enumeration received an unknown value
    #[display("Unknown {} value: '{}'", field, value)]
    UnknownValue {
        /// The field name
        field: String,
        /// The rejected value
        value: String,
    },
}

impl ValidationErrorKind {
    /// Whether this condition conflicts with current state rather than
    /// being malformed input.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            ValidationErrorKind::SlugTaken(_) | ValidationErrorKind::MissingJobHandle(_)
        )
    }
}

/// Validation error with location tracking.
///
/// # Examples
///
/// ```
/// use diptych_error::{ValidationError, ValidationErrorKind};
///
/// let err = ValidationError::new(ValidationErrorKind::EmptyTopicIds);
/// assert!(err.to_string().contains("non-empty"));
/// assert!(!err.kind().is_conflict());
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Validation Error: {} at line {} in {}", kind, line, file)]
pub struct ValidationError {
    kind: ValidationErrorKind,
    line: u32,
    file: &'static str,
}

impl ValidationError {
    /// Create a new validation error with caller location tracking.
    #[track_caller]
    pub fn new(kind: ValidationErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &ValidationErrorKind {
        &self.kind
    }
}
