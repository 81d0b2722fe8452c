//! Error types for access URL issuance

use chrono::TimeDelta;
use thiserror::Error;

use crate::blob_ref::ReferenceError;

/// Result type for access URL issuance
pub type AccessResult<T> = Result<T, AccessError>;

/// Errors that can occur while issuing an access URL
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// No object name to grant access to
    #[error("Blob reference names no object")]
    InvalidReference,

    /// The reference could not be parsed
    #[error("Malformed blob reference: {0}")]
    MalformedReference(String),

    /// Requested lifetime is not positive or too long
    #[error("Signed URL lifetime out of range: {0}")]
    InvalidTtl(TimeDelta),

    /// No usable account key is configured
    #[error("Blob signing credentials unavailable: {0}")]
    CredentialsUnavailable(String),
}

impl From<ReferenceError> for AccessError {
    fn from(err: ReferenceError) -> Self {
        match err {
            ReferenceError::InvalidReference => Self::InvalidReference,
            ReferenceError::MalformedReference(msg) => Self::MalformedReference(msg),
        }
    }
}
