//! Universal error mapping for the HTTP layer
//!
//! Library errors stay transport-agnostic; this maps them onto a status code and the JSON
//! envelope the web client expects.

use http::StatusCode;
use record_storage::DocumentStorageError;
use serde::Serialize;

use crate::attachments::AttachmentError;
use crate::blob_access::AccessError;
use crate::blob_client::BlobClientError;
use crate::blob_ref::ReferenceError;

/// API error response envelope
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    /// Whether the client should retry the request
    pub allow_retry: bool,
    /// Error details
    error: ErrorBody,
}

impl ApiErrorResponse {
    /// Machine-readable error code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.error.code
    }

    /// Human-readable error message
    #[must_use]
    pub const fn message(&self) -> &'static str {
        self.error.message
    }
}

/// Error body containing code and message
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    /// Machine-readable error code
    pub code: &'static str,
    /// Human-readable error message
    pub message: &'static str,
}

/// Application error type that wraps the API error response
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    inner: ApiErrorResponse,
}

impl AppError {
    /// Create a new application error
    #[must_use]
    pub const fn new(
        status: StatusCode,
        code: &'static str,
        msg: &'static str,
        retry: bool,
    ) -> Self {
        Self {
            status,
            inner: ApiErrorResponse {
                allow_retry: retry,
                error: ErrorBody { code, message: msg },
            },
        }
    }

    /// HTTP status to answer with
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Response body
    #[must_use]
    pub const fn body(&self) -> &ApiErrorResponse {
        &self.inner
    }

    /// Logs the error by severity and hands out status and body for the response
    #[must_use]
    pub fn into_response_parts(self) -> (StatusCode, ApiErrorResponse) {
        match self.status.as_u16() {
            400..=499 => tracing::warn!(
                "Client error: {} - {}",
                self.inner.error.code,
                self.inner.error.message
            ),
            500..=599 => tracing::error!(
                "Server error: {} - {}",
                self.inner.error.code,
                self.inner.error.message
            ),
            _ => {}
        }

        (self.status, self.inner)
    }
}

/// Convert reference errors to application errors
impl From<ReferenceError> for AppError {
    fn from(err: ReferenceError) -> Self {
        AccessError::from(err).into()
    }
}

/// Convert access URL errors to application errors
impl From<AccessError> for AppError {
    fn from(err: AccessError) -> Self {
        match &err {
            AccessError::InvalidReference => Self::new(
                StatusCode::BAD_REQUEST,
                "invalid_reference",
                "A blob path is required",
                false,
            ),
            AccessError::MalformedReference(msg) => {
                tracing::debug!("Malformed reference: {msg}");
                Self::new(
                    StatusCode::BAD_REQUEST,
                    "malformed_reference",
                    "The blob path could not be parsed",
                    false,
                )
            }
            AccessError::InvalidTtl(ttl) => {
                tracing::debug!("Invalid ttl: {ttl}");
                Self::new(
                    StatusCode::BAD_REQUEST,
                    "invalid_ttl",
                    "The requested lifetime is out of range",
                    false,
                )
            }
            AccessError::CredentialsUnavailable(msg) => {
                tracing::error!("Signing credentials unavailable: {msg}");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                    false,
                )
            }
        }
    }
}

/// Convert blob store write errors to application errors
impl From<BlobClientError> for AppError {
    fn from(err: BlobClientError) -> Self {
        match err {
            BlobClientError::InvalidRequest(msg) => {
                tracing::debug!("Invalid blob request: {msg}");
                Self::new(
                    StatusCode::BAD_REQUEST,
                    "invalid_upload",
                    "The upload request is not valid",
                    false,
                )
            }
            BlobClientError::Signing(err) => err.into(),
            BlobClientError::Rejected { .. } => {
                tracing::error!("Blob store rejected a write: {err}");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                    false,
                )
            }
            BlobClientError::Network(_) | BlobClientError::Upstream { .. } => {
                tracing::error!("Blob store error: {err}");
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "upstream_error",
                    "Blob store temporarily unavailable",
                    true,
                )
            }
        }
    }
}

/// Convert record storage errors to application errors
impl From<DocumentStorageError> for AppError {
    fn from(err: DocumentStorageError) -> Self {
        match &err {
            DocumentStorageError::RecordNotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, "not_found", "Not found", false)
            }
            DocumentStorageError::SerializationError(msg) => {
                tracing::error!("Document serialization error: {msg}");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                    false,
                )
            }
            _ => {
                tracing::error!("Document store error: {err}");
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "upstream_error",
                    "Document store temporarily unavailable",
                    true,
                )
            }
        }
    }
}

/// Convert attachment errors to application errors
impl From<AttachmentError> for AppError {
    fn from(err: AttachmentError) -> Self {
        match err {
            AttachmentError::NotFound(id) => {
                tracing::debug!("Document not found: {id}");
                Self::new(StatusCode::NOT_FOUND, "not_found", "Not found", false)
            }
            AttachmentError::NoAttachment(id) => {
                tracing::debug!("Document without attachment: {id}");
                Self::new(
                    StatusCode::NOT_FOUND,
                    "no_attachment",
                    "No file attached",
                    false,
                )
            }
            AttachmentError::ForeignContainer(container) => {
                tracing::debug!("Foreign container: {container}");
                Self::new(
                    StatusCode::BAD_REQUEST,
                    "foreign_container",
                    "The blob lives outside the managed container",
                    false,
                )
            }
            AttachmentError::UploadUnavailable => {
                tracing::error!("Upload requested without a blob writer");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                    false,
                )
            }
            AttachmentError::Upload(err) => err.into(),
            AttachmentError::Access(err) => err.into(),
            AttachmentError::Storage(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_reference_errors_are_client_errors() {
        let err = AppError::from(ReferenceError::InvalidReference);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.body().code(), "invalid_reference");

        let err = AppError::from(ReferenceError::MalformedReference("ftp://bad".to_string()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.body().code(), "malformed_reference");

        let err = AppError::from(AccessError::InvalidTtl(TimeDelta::zero()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_missing_credentials_is_a_server_error() {
        let err = AppError::from(AccessError::CredentialsUnavailable("unset".to_string()));

        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.body().allow_retry);
        assert!(!err.body().message().contains("unset"));
    }

    #[test]
    fn test_attachment_errors() {
        let cases = [
            (
                AttachmentError::NotFound("doc-1".to_string()),
                StatusCode::NOT_FOUND,
                "not_found",
            ),
            (
                AttachmentError::NoAttachment("doc-1".to_string()),
                StatusCode::NOT_FOUND,
                "no_attachment",
            ),
            (
                AttachmentError::ForeignContainer("archive".to_string()),
                StatusCode::BAD_REQUEST,
                "foreign_container",
            ),
            (
                AttachmentError::Storage(DocumentStorageError::RecordNotFound("doc-1".to_string())),
                StatusCode::NOT_FOUND,
                "not_found",
            ),
            (
                AttachmentError::Storage(DocumentStorageError::SerializationError(
                    "bad item".to_string(),
                )),
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
            ),
        ];

        for (err, status, code) in cases {
            let app_err = AppError::from(err);
            assert_eq!(app_err.status(), status);
            assert_eq!(app_err.body().code(), code);
        }
    }

    #[test]
    fn test_blob_client_errors() {
        let cases = [
            (
                BlobClientError::InvalidRequest("content type".to_string()),
                StatusCode::BAD_REQUEST,
                false,
            ),
            (
                BlobClientError::Rejected {
                    status: 403,
                    code: "AuthenticationFailed".to_string(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
                false,
            ),
            (
                BlobClientError::Upstream {
                    status: 503,
                    code: "ServerBusy".to_string(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
                true,
            ),
            (
                BlobClientError::Signing(AccessError::CredentialsUnavailable(
                    "bad key".to_string(),
                )),
                StatusCode::INTERNAL_SERVER_ERROR,
                false,
            ),
        ];

        for (err, status, retry) in cases {
            let app_err = AppError::from(AttachmentError::Upload(err));
            assert_eq!(app_err.status(), status);
            assert_eq!(app_err.body().allow_retry, retry);
        }

        let app_err = AppError::from(AttachmentError::UploadUnavailable);
        assert_eq!(app_err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(app_err.body().code(), "internal_error");
    }

    #[test]
    fn test_envelope_shape() {
        let (status, body) = AppError::from(AttachmentError::NoAttachment("doc-1".to_string()))
            .into_response_parts();
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            json,
            serde_json::json!({
                "allowRetry": false,
                "error": { "code": "no_attachment", "message": "No file attached" }
            })
        );
    }
}
