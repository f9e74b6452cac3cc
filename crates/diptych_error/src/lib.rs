//! Error types for the Diptych content pipeline.
//!
//! This crate provides the foundation error types used throughout the Diptych workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! # Examples
//!
//! ```
//! use diptych_error::{DiptychResult, Entity, NotFoundError};
//!
//! fn load_topic(id: &str) -> DiptychResult<String> {
//!     Err(NotFoundError::new(Entity::Topic, [id]))?
//! }
//!
//! let err = load_topic("42").unwrap_err();
//! assert!(err.to_string().contains("topic not found: 42"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod export;
mod gate;
mod json;
mod malformed;
mod not_found;
mod provider;
mod store;
mod validation;
mod error;

pub use config::ConfigError;
pub use export::{ExportError, ExportErrorKind};
pub use gate::GateBlockedError;
pub use json::JsonError;
pub use malformed::MalformedOutputError;
pub use not_found::{Entity, NotFoundError};
pub use provider::{ProviderError, ProviderErrorKind, RetryableError};
pub use store::{StoreError, StoreErrorKind};
pub use validation::{ValidationError, ValidationErrorKind};
pub use error::{DiptychError, DiptychErrorKind, DiptychResult, ErrorClass};
