//! Persistence error types.

/// Persistence error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum StoreErrorKind {
    /// Connection failed
    #[display("Database connection error: {}", _0)]
    Connection(String),
    /// Query execution failed
    #[display("Database query error: {}", _0)]
    Query(String),
    /// Serialization/deserialization error
    #[display("Serialization error: {}", _0)]
    Serialization(String),
    /// Migration error
    #[display("Migration error: {}", _0)]
    Migration(String),
    /// A row expected to exist was gone at write time
    #[display("Record not found")]
    RowMissing,
    /// A stored column held a value outside its closed domain
    #[display("Invalid value '{}' in column {}", value, column)]
    InvalidValue {
        /// The column name
        column: String,
        /// The stored value
        value: String,
    },
    /// A unique constraint rejected the write
    #[display("Unique constraint violated: {}", _0)]
    UniqueViolation(String),
}

/// Persistence error with source location tracking.
///
/// # Examples
///
/// ```
/// use diptych_error::{StoreError, StoreErrorKind};
///
/// let err = StoreError::new(StoreErrorKind::InvalidValue {
///     column: "runs.status".to_string(),
///     value: "paused".to_string(),
/// });
/// assert!(format!("{}", err).contains("paused"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Store Error: {} at line {} in {}", kind, line, file)]
pub struct StoreError {
    /// The kind of error that occurred
    pub kind: StoreErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl StoreError {
    /// Create a new StoreError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: StoreErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Whether retrying the surrounding task may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            StoreErrorKind::Connection(_) | StoreErrorKind::Query(_)
        )
    }
}

// Diesel error conversions (only available with database feature)
#[cfg(feature = "database")]
impl From<diesel::result::Error> for StoreError {
    #[track_caller]
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};
        match err {
            Error::NotFound => StoreError::new(StoreErrorKind::RowMissing),
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                let name = info.constraint_name().unwrap_or("unknown").to_string();
                StoreError::new(StoreErrorKind::UniqueViolation(name))
            }
            _ => StoreError::new(StoreErrorKind::Query(err.to_string())),
        }
    }
}

#[cfg(feature = "database")]
impl From<diesel::ConnectionError> for StoreError {
    #[track_caller]
    fn from(err: diesel::ConnectionError) -> Self {
        StoreError::new(StoreErrorKind::Connection(err.to_string()))
    }
}

#[cfg(feature = "database")]
impl From<serde_json::Error> for StoreError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        StoreError::new(StoreErrorKind::Serialization(err.to_string()))
    }
}
