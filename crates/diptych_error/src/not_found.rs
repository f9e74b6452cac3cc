//! Missing entity errors.

use std::fmt;

/// The kind of record that could not be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum Entity {
    /// A topic
    #[display("topic")]
    Topic,
    /// A generation run
    #[display("run")]
    Run,
    /// A language artifact
    #[display("artifact")]
    Artifact,
    /// A batch job
    #[display("batch")]
    Batch,
}

/// One or more records referenced by id do not exist.
///
/// Batch submission names every unknown topic id at once, so the error
/// carries a list.
///
/// # Examples
///
/// ```
/// use diptych_error::{Entity, NotFoundError};
///
/// let err = NotFoundError::new(Entity::Topic, ["a", "b"]);
/// assert_eq!(err.ids, vec!["a".to_string(), "b".to_string()]);
/// assert!(err.to_string().starts_with("Not Found: topic not found: a, b"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Error)]
pub struct NotFoundError {
    /// What kind of record was looked up
    pub entity: Entity,
    /// The ids that were not found
    pub ids: Vec<String>,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl NotFoundError {
    /// Create a new NotFoundError with automatic location tracking.
    #[track_caller]
    pub fn new<I, S>(entity: Entity, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        let location = std::panic::Location::caller();
        Self {
            entity,
            ids: ids.into_iter().map(|id| id.to_string()).collect(),
            line: location.line(),
            file: location.file(),
        }
    }

    /// Message without source location.
    pub fn message(&self) -> String {
        format!("{} not found: {}", self.entity, self.ids.join(", "))
    }
}

impl fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Not Found: {} at line {} in {}",
            self.message(),
            self.line,
            self.file
        )
    }
}
