//! Document record storage for docvault
//!
//! Records are addressed by `(pk, id)`: `pk` is the partition (hash) key and `id` the
//! sort key. Only the attachment fields are typed; every other document field is carried
//! through untouched.

mod error;

use std::sync::Arc;

use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use chrono::Utc;
pub use error::{DocumentStorageError, DocumentStorageResult};
use serde::{Deserialize, Serialize};
use serde_dynamo::{from_item, to_item};
use strum::Display;

/// A persisted document record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    /// Sort key - document ID
    pub id: String,
    /// Partition key
    pub pk: String,
    /// Canonical `<container>/<objectName>` path of the attached file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_path: Option<String>,
    /// Display URL of the attached file, never carries a SAS token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    /// Filename offered to browsers on download
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_filename: Option<String>,
    /// Timestamp of the last write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    /// Remaining document metadata
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl DocumentRecord {
    /// Creates an empty record for the given key
    #[must_use]
    pub fn new(id: impl Into<String>, pk: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            pk: pk.into(),
            blob_path: None,
            file_url: None,
            pdf_filename: None,
            updated_at: None,
            fields: serde_json::Map::new(),
        }
    }
}

/// `DynamoDB` attribute names for the documents table
#[derive(Debug, Display)]
#[strum(serialize_all = "camelCase")]
pub enum DocumentAttribute {
    /// Partition key
    Pk,
    /// Sort key
    Id,
    /// Canonical blob path
    BlobPath,
    /// Last write timestamp
    UpdatedAt,
}

/// Storage client for document records
pub struct DocumentStorage {
    dynamodb_client: Arc<DynamoDbClient>,
    table_name: String,
}

impl DocumentStorage {
    /// Creates a new storage instance
    ///
    /// # Arguments
    ///
    /// * `dynamodb_client` - Pre-configured `DynamoDB` client
    /// * `table_name` - `DynamoDB` table name for documents
    #[must_use]
    pub const fn new(dynamodb_client: Arc<DynamoDbClient>, table_name: String) -> Self {
        Self {
            dynamodb_client,
            table_name,
        }
    }

    fn key(id: &str, pk: &str) -> [(String, AttributeValue); 2] {
        [
            (
                DocumentAttribute::Pk.to_string(),
                AttributeValue::S(pk.to_string()),
            ),
            (
                DocumentAttribute::Id.to_string(),
                AttributeValue::S(id.to_string()),
            ),
        ]
    }

    /// Gets a single document by ID and partition key
    ///
    /// # Errors
    ///
    /// Returns `DocumentStorageError` if the `DynamoDB` get operation fails or the item
    /// cannot be parsed
    pub async fn get(&self, id: &str, pk: &str) -> DocumentStorageResult<Option<DocumentRecord>> {
        let [pk_key, id_key] = Self::key(id, pk);

        let response = self
            .dynamodb_client
            .get_item()
            .table_name(&self.table_name)
            .key(pk_key.0, pk_key.1)
            .key(id_key.0, id_key.1)
            .send()
            .await?;

        response
            .item()
            .map(|item| from_item(item.clone()).map_err(DocumentStorageError::from))
            .transpose()
    }

    /// Writes a document, replacing any existing record with the same key
    ///
    /// # Errors
    ///
    /// Returns `DocumentStorageError` if the `DynamoDB` put operation fails
    pub async fn put(&self, mut record: DocumentRecord) -> DocumentStorageResult<DocumentRecord> {
        record.updated_at = Some(Utc::now().timestamp());

        let item = to_item(&record)?;

        self.dynamodb_client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await?;

        tracing::debug!(id = %record.id, pk = %record.pk, "Stored document");

        Ok(record)
    }

    /// Sets the canonical blob path on an existing document
    ///
    /// Writing the same value twice is harmless, so concurrent callers need no coordination.
    ///
    /// # Errors
    ///
    /// Returns `DocumentStorageError::RecordNotFound` if the document does not exist
    /// Returns `DocumentStorageError` if the `DynamoDB` update operation fails
    pub async fn set_blob_path(
        &self,
        id: &str,
        pk: &str,
        blob_path: &str,
    ) -> DocumentStorageResult<()> {
        let [pk_key, id_key] = Self::key(id, pk);

        self.dynamodb_client
            .update_item()
            .table_name(&self.table_name)
            .key(pk_key.0, pk_key.1)
            .key(id_key.0, id_key.1)
            .update_expression("SET #blob_path = :blob_path, #updated_at = :updated_at")
            .condition_expression("attribute_exists(#id)")
            .expression_attribute_names("#id", DocumentAttribute::Id.to_string())
            .expression_attribute_names("#blob_path", DocumentAttribute::BlobPath.to_string())
            .expression_attribute_values(":blob_path", AttributeValue::S(blob_path.to_string()))
            .expression_attribute_names("#updated_at", DocumentAttribute::UpdatedAt.to_string())
            .expression_attribute_values(
                ":updated_at",
                AttributeValue::N(Utc::now().timestamp().to_string()),
            )
            .send()
            .await
            .map_err(|err| {
                if matches!(
                    err,
                    SdkError::ServiceError(ref svc) if svc.err().is_conditional_check_failed_exception()
                ) {
                    DocumentStorageError::RecordNotFound(id.to_string())
                } else {
                    err.into()
                }
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_document_record_uses_camel_case_fields() {
        let mut record = DocumentRecord::new("doc-1", "tenant-a");
        record.blob_path = Some("files/2024/a.pdf".to_string());
        record.pdf_filename = Some("Invoice.pdf".to_string());

        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["blobPath"], "files/2024/a.pdf");
        assert_eq!(json["pdfFilename"], "Invoice.pdf");
        assert!(json.get("fileUrl").is_none());
        assert!(json.get("updatedAt").is_none());
    }

    #[test]
    fn test_document_record_keeps_unknown_fields() {
        let raw = serde_json::json!({
            "id": "doc-1",
            "pk": "tenant-a",
            "fileUrl": "https://acct.blob.core.windows.net/files/a.pdf",
            "customer": "ACME",
            "pages": 3
        });

        let record: DocumentRecord = serde_json::from_value(raw.clone()).unwrap();

        assert_eq!(record.blob_path, None);
        assert_eq!(record.fields.get("customer").unwrap(), "ACME");
        assert_eq!(serde_json::to_value(&record).unwrap(), raw);
    }

    #[test]
    fn test_document_attribute_names() {
        assert_eq!(DocumentAttribute::BlobPath.to_string(), "blobPath");
        assert_eq!(DocumentAttribute::UpdatedAt.to_string(), "updatedAt");
        assert_eq!(DocumentAttribute::Pk.to_string(), "pk");
    }
}
