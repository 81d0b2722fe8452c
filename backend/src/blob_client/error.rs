//! Error types for blob store writes

use thiserror::Error;

use crate::blob_access::AccessError;

/// Result type for blob store writes
pub type BlobClientResult<T> = Result<T, BlobClientError>;

/// Errors that can occur while writing to the blob store
#[derive(Error, Debug)]
pub enum BlobClientError {
    /// The request could not be built
    #[error("Invalid blob request: {0}")]
    InvalidRequest(String),

    /// The request could not be signed
    #[error(transparent)]
    Signing(#[from] AccessError),

    /// Transport failure or timeout
    #[error("Blob store request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The store refused the request (4xx)
    #[error("Blob store rejected the request with {status}: {code}")]
    Rejected {
        /// HTTP status
        status: u16,
        /// `x-ms-error-code`, empty when absent
        code: String,
    },

    /// The store failed (5xx)
    #[error("Blob store upstream error {status}: {code}")]
    Upstream {
        /// HTTP status
        status: u16,
        /// `x-ms-error-code`, empty when absent
        code: String,
    },
}
