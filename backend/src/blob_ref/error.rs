//! Error types for reference normalization

use thiserror::Error;

/// Result type for reference normalization
pub type ReferenceResult<T> = Result<T, ReferenceError>;

/// Errors that can occur while normalizing a blob reference
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    /// The reference is empty or names no object
    #[error("Blob reference is empty")]
    InvalidReference,

    /// The reference cannot be parsed into a container and object name
    #[error("Malformed blob reference: {0}")]
    MalformedReference(String),
}
