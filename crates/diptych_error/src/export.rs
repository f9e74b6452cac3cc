//! Export file writing errors.

/// Export failure conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ExportErrorKind {
    /// Frontmatter could not be rendered as YAML
    #[display("Failed to render frontmatter: {}", _0)]
    Render(String),
    /// A file or directory could not be written
    #[display("Failed to write {}: {}", path, message)]
    Write {
        /// Target path
        path: String,
        /// Underlying I/O error
        message: String,
    },
}

/// Export error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Export Error: {} at line {} in {}", kind, line, file)]
pub struct ExportError {
    /// The kind of error that occurred
    pub kind: ExportErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ExportError {
    /// Create a new ExportError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ExportErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
