//! Error types for document record storage operations

use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::{
    get_item::GetItemError, put_item::PutItemError, update_item::UpdateItemError,
};
use thiserror::Error;

/// Result type alias for document storage operations
pub type DocumentStorageResult<T> = Result<T, DocumentStorageError>;

/// Storage error types for document record operations
#[derive(Debug, Error)]
pub enum DocumentStorageError {
    /// Failed to write a document record into `DynamoDB`
    #[error("Failed to insert document into DynamoDB: {0:?}")]
    DynamoDbPutError(#[from] SdkError<PutItemError>),

    /// Failed to read a document record from `DynamoDB`
    #[error("Failed to get document from DynamoDB: {0:?}")]
    DynamoDbGetError(#[from] SdkError<GetItemError>),

    /// Failed to update a document record in `DynamoDB`
    #[error("Failed to update document in DynamoDB: {0:?}")]
    DynamoDbUpdateError(#[from] SdkError<UpdateItemError>),

    /// The addressed record does not exist
    #[error("Document not found: {0}")]
    RecordNotFound(String),

    /// Failed to convert a document to or from a `DynamoDB` item
    #[error("Failed to parse document: {0}")]
    SerializationError(String),
}

impl From<serde_dynamo::Error> for DocumentStorageError {
    fn from(err: serde_dynamo::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
