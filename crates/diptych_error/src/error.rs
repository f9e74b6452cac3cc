//! Top-level error wrapper types.

use crate::{
    ConfigError, ExportError, GateBlockedError, JsonError, MalformedOutputError, NotFoundError,
    ProviderError, StoreError, ValidationError,
};

/// Aggregate of every error family in the workspace.
///
/// # Examples
///
/// ```
/// use diptych_error::{DiptychError, MalformedOutputError};
///
/// let err: DiptychError = MalformedOutputError::new("no JSON object").into();
/// assert!(format!("{}", err).contains("Malformed Output"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum DiptychErrorKind {
    /// Referenced record does not exist
    #[from(NotFoundError)]
    NotFound(NotFoundError),
    /// Request failed validation
    #[from(ValidationError)]
    Validation(ValidationError),
    /// Generation provider call failed
    #[from(ProviderError)]
    Provider(ProviderError),
    /// Provider output did not match the generation schema
    #[from(MalformedOutputError)]
    MalformedOutput(MalformedOutputError),
    /// Export readiness checks failed
    #[from(GateBlockedError)]
    GateBlocked(GateBlockedError),
    /// Required configuration is missing
    #[from(ConfigError)]
    Config(ConfigError),
    /// Persistence failure
    #[from(StoreError)]
    Store(StoreError),
    /// Export file writing failure
    #[from(ExportError)]
    Export(ExportError),
    /// JSON serialization/deserialization error
    #[from(JsonError)]
    Json(JsonError),
}

/// Coarse classification used by the produced surface (CLI exit codes,
/// HTTP status mapping).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ErrorClass {
    /// Unknown id
    #[display("not-found")]
    NotFound,
    /// Malformed request
    #[display("validation")]
    Validation,
    /// Request conflicts with current state
    #[display("conflict")]
    Conflict,
    /// Upstream provider failure
    #[display("provider")]
    Provider,
    /// Provider answered with unusable output
    #[display("malformed-output")]
    MalformedOutput,
    /// Export gate refused
    #[display("gate-blocked")]
    GateBlocked,
    /// Server misconfiguration
    #[display("configuration")]
    Configuration,
    /// Persistence or local I/O failure
    #[display("storage")]
    Storage,
}

/// Diptych error with kind discrimination.
///
/// # Examples
///
/// ```
/// use diptych_error::{ConfigError, DiptychResult, ErrorClass};
///
/// fn might_fail() -> DiptychResult<()> {
///     Err(ConfigError::new("BLOG_REPO_PATH is not configured"))?
/// }
///
/// let err = might_fail().unwrap_err();
/// assert_eq!(err.class(), ErrorClass::Configuration);
/// assert!(!err.should_retry());
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Diptych Error: {}", _0)]
pub struct DiptychError(Box<DiptychErrorKind>);

impl DiptychError {
    /// Create a new error from a kind.
    pub fn new(kind: DiptychErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &DiptychErrorKind {
        &self.0
    }

    /// Classify the error for the produced surface.
    pub fn class(&self) -> ErrorClass {
        match self.kind() {
            DiptychErrorKind::NotFound(_) => ErrorClass::NotFound,
            DiptychErrorKind::Validation(e) if e.kind().is_conflict() => ErrorClass::Conflict,
            DiptychErrorKind::Validation(_) => ErrorClass::Validation,
            DiptychErrorKind::Provider(_) => ErrorClass::Provider,
            DiptychErrorKind::MalformedOutput(_) => ErrorClass::MalformedOutput,
            DiptychErrorKind::GateBlocked(_) => ErrorClass::GateBlocked,
            DiptychErrorKind::Config(_) => ErrorClass::Configuration,
            DiptychErrorKind::Store(_) | DiptychErrorKind::Export(_) | DiptychErrorKind::Json(_) => {
                ErrorClass::Storage
            }
        }
    }

    /// Whether a task that failed with this error should be retried.
    ///
    /// Provider failures and malformed output are retried, as are transient
    /// storage faults. Everything else is a terminal response.
    pub fn should_retry(&self) -> bool {
        match self.kind() {
            DiptychErrorKind::Provider(_) | DiptychErrorKind::MalformedOutput(_) => true,
            DiptychErrorKind::Store(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Human-readable message without source location, suitable for
    /// persisting into an `error` column.
    pub fn summary(&self) -> String {
        match self.kind() {
            DiptychErrorKind::NotFound(e) => e.message(),
            DiptychErrorKind::Validation(e) => e.kind().to_string(),
            DiptychErrorKind::Provider(e) => e.kind.to_string(),
            DiptychErrorKind::MalformedOutput(e) => e.message.clone(),
            DiptychErrorKind::GateBlocked(e) => e.message(),
            DiptychErrorKind::Config(e) => e.message.clone(),
            DiptychErrorKind::Store(e) => e.kind.to_string(),
            DiptychErrorKind::Export(e) => e.kind.to_string(),
            DiptychErrorKind::Json(e) => e.message.clone(),
        }
    }
}

// Generic From implementation for any type that converts to DiptychErrorKind
impl<T> From<T> for DiptychError
where
    T: Into<DiptychErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Diptych operations.
pub type DiptychResult<T> = std::result::Result<T, DiptychError>;
