//! Error types for the attachment workflow

use record_storage::DocumentStorageError;
use thiserror::Error;

use crate::blob_access::AccessError;
use crate::blob_client::BlobClientError;
use crate::blob_ref::ReferenceError;

/// Result type for attachment operations
pub type AttachmentResult<T> = Result<T, AttachmentError>;

/// Errors that can occur while resolving or granting access to a record's file
#[derive(Error, Debug)]
pub enum AttachmentError {
    /// No record with this key
    #[error("Document not found: {0}")]
    NotFound(String),

    /// The record has neither a `blobPath` nor a `fileUrl`
    #[error("Document {0} has no attached file")]
    NoAttachment(String),

    /// The reference points outside the configured container
    #[error("Blob container '{0}' is not managed by this service")]
    ForeignContainer(String),

    /// Uploads need a blob writer and none is configured
    #[error("Uploads are not configured")]
    UploadUnavailable,

    /// The blob store refused or failed the upload
    #[error(transparent)]
    Upload(#[from] BlobClientError),

    /// Reference normalization or URL issuance failed
    #[error(transparent)]
    Access(#[from] AccessError),

    /// The record store failed
    #[error(transparent)]
    Storage(#[from] DocumentStorageError),
}

impl From<ReferenceError> for AttachmentError {
    fn from(err: ReferenceError) -> Self {
        Self::Access(err.into())
    }
}
