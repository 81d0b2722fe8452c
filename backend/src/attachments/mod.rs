//! File access for document records
//!
//! A record refers to its file through `blobPath` (canonical) and/or `fileUrl` (display).
//! Older records only carry `fileUrl`; the first download derives the canonical path from
//! it and writes it back, so later downloads read it directly.

mod error;

use std::sync::Arc;

use async_trait::async_trait;
use record_storage::{DocumentRecord, DocumentStorage, DocumentStorageError};

pub use error::{AttachmentError, AttachmentResult};

use crate::blob_access::{
    AccessGrant, AccessMode, AccessUrlIssuer, SignedUrlRequest, SigningCredentials,
};
use crate::blob_client::BlobWriter;
use crate::blob_ref::{normalize, strip_token, BlobPath};
use crate::types::BlobStoreConfig;

/// Read/write access to persisted document records
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Reads a record, `None` when it does not exist
    async fn get(&self, id: &str, pk: &str) -> Result<Option<DocumentRecord>, DocumentStorageError>;

    /// Writes a whole record
    async fn put(&self, record: DocumentRecord) -> Result<DocumentRecord, DocumentStorageError>;

    /// Sets the canonical blob path of an existing record
    async fn set_blob_path(
        &self,
        id: &str,
        pk: &str,
        blob_path: &str,
    ) -> Result<(), DocumentStorageError>;
}

#[async_trait]
impl RecordStore for DocumentStorage {
    async fn get(&self, id: &str, pk: &str) -> Result<Option<DocumentRecord>, DocumentStorageError> {
        Self::get(self, id, pk).await
    }

    async fn put(&self, record: DocumentRecord) -> Result<DocumentRecord, DocumentStorageError> {
        Self::put(self, record).await
    }

    async fn set_blob_path(
        &self,
        id: &str,
        pk: &str,
        blob_path: &str,
    ) -> Result<(), DocumentStorageError> {
        Self::set_blob_path(self, id, pk, blob_path).await
    }
}

/// Canonical path of a record's file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Normalized path
    pub path: BlobPath,
    /// `true` when the path was derived from `fileUrl` because `blobPath` was missing
    pub derived: bool,
}

/// File content to store and attach to a record
#[derive(Debug, Clone)]
pub struct Upload {
    /// Bare name, `<container>/<name>` or full URL of the target blob
    pub object_name: String,
    /// File content
    pub data: Vec<u8>,
    /// `Content-Type` stored with the blob and answered on reads
    pub content_type: String,
    /// Filename for `Content-Disposition`, defaults to the last path segment
    pub download_name: Option<String>,
}

/// Result of [`AttachmentService::upload`]
#[derive(Debug, Clone)]
pub struct UploadedAttachment {
    /// The record as written
    pub record: DocumentRecord,
    /// Read URL for the uploaded file
    pub grant: AccessGrant,
}

/// Resolves, heals and grants access to the files attached to document records
pub struct AttachmentService {
    store: Arc<dyn RecordStore>,
    config: Arc<BlobStoreConfig>,
    blobs: Option<Arc<dyn BlobWriter>>,
}

impl AttachmentService {
    /// Creates a new attachment service
    ///
    /// # Arguments
    ///
    /// * `store` - Record store collaborator
    /// * `config` - Blob store configuration built at startup
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, config: Arc<BlobStoreConfig>) -> Self {
        Self {
            store,
            config,
            blobs: None,
        }
    }

    /// Enables [`AttachmentService::upload`] through the given writer
    #[must_use]
    pub fn with_blob_writer(mut self, blobs: Arc<dyn BlobWriter>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    fn issuer(&self) -> AccessUrlIssuer<'_> {
        AccessUrlIssuer::new(&self.config)
    }

    async fn load(&self, id: &str, pk: &str) -> AttachmentResult<DocumentRecord> {
        self.store
            .get(id, pk)
            .await?
            .ok_or_else(|| AttachmentError::NotFound(id.to_string()))
    }

    /// Finds the canonical path of a record's file
    ///
    /// # Errors
    ///
    /// Returns `AttachmentError::NoAttachment` if the record references no file
    /// Returns `AttachmentError::Access` if the stored reference cannot be normalized
    pub fn resolve_blob_path(&self, record: &DocumentRecord) -> AttachmentResult<ResolvedPath> {
        if let Some(blob_path) = non_empty(record.blob_path.as_deref()) {
            return Ok(ResolvedPath {
                path: normalize(blob_path, &self.config)?,
                derived: false,
            });
        }

        if let Some(file_url) = non_empty(record.file_url.as_deref()) {
            return Ok(ResolvedPath {
                path: normalize(file_url, &self.config)?,
                derived: true,
            });
        }

        Err(AttachmentError::NoAttachment(record.id.clone()))
    }

    /// Mints a download URL for a record's file
    ///
    /// A record without `blobPath` gets the derived path written back once. That write is
    /// best effort: when it fails the derived path still serves this download.
    ///
    /// # Errors
    ///
    /// Returns `AttachmentError::NotFound` if the record does not exist
    /// Returns `AttachmentError::NoAttachment` if the record references no file
    /// Returns `AttachmentError::Access` if the reference is malformed or signing fails
    /// Returns `AttachmentError::Storage` if the record cannot be read
    pub async fn download_grant(
        &self,
        id: &str,
        pk: &str,
        credentials: Option<&SigningCredentials>,
        mode: AccessMode,
    ) -> AttachmentResult<AccessGrant> {
        let record = self.load(id, pk).await?;
        let resolved = self.resolve_blob_path(&record)?;

        if resolved.derived {
            self.persist_derived_path(&record, &resolved.path).await;
        }

        let filename = non_empty(record.pdf_filename.as_deref())
            .unwrap_or_else(|| resolved.path.file_name())
            .to_string();
        let request = SignedUrlRequest::new(self.config.download_ttl())
            .with_mode(mode)
            .with_filename(filename);

        let grant = self
            .issuer()
            .signed_url(credentials, &resolved.path, &request)?;

        tracing::info!(
            %id,
            blob_path = %resolved.path,
            expires_at = %grant.expires_at,
            "Issued download URL"
        );

        Ok(grant)
    }

    async fn persist_derived_path(&self, record: &DocumentRecord, path: &BlobPath) {
        if !path.is_in_container_of(&self.config) {
            tracing::warn!(
                id = %record.id,
                container = path.container(),
                "Not persisting blob path outside the configured container"
            );
            return;
        }

        let qualified = path.qualified_path();
        match self
            .store
            .set_blob_path(&record.id, &record.pk, &qualified)
            .await
        {
            Ok(()) => tracing::info!(id = %record.id, blob_path = %qualified, "Persisted derived blob path"),
            Err(e) => tracing::warn!(
                id = %record.id,
                error = %e,
                "Failed to persist derived blob path, serving download anyway"
            ),
        }
    }

    /// Mints a URL for any reference form: full URL, `<container>/<name>` or bare name
    ///
    /// # Errors
    ///
    /// Returns `AttachmentError::Access` if the reference is empty or malformed, the
    /// lifetime is not positive, or no credentials are supplied
    pub fn grant_for_reference(
        &self,
        raw: &str,
        credentials: Option<&SigningCredentials>,
        request: &SignedUrlRequest,
    ) -> AttachmentResult<AccessGrant> {
        let path = normalize(raw, &self.config)?;
        Ok(self.issuer().signed_url(credentials, &path, request)?)
    }

    /// Token-free display URL for any reference form
    ///
    /// # Errors
    ///
    /// Returns `AttachmentError::Access` if the reference is empty or malformed
    pub fn public_url_for_reference(&self, raw: &str) -> AttachmentResult<String> {
        let path = normalize(raw, &self.config)?;
        Ok(self.issuer().public_url(&path))
    }

    /// Reads a record prepared for display
    ///
    /// # Errors
    ///
    /// Returns `AttachmentError::NotFound` if the record does not exist
    /// Returns `AttachmentError::Storage` if the record cannot be read
    pub async fn get_record(&self, id: &str, pk: &str) -> AttachmentResult<DocumentRecord> {
        let mut record = self.load(id, pk).await?;
        self.sanitize_record(&mut record);
        Ok(record)
    }

    /// Makes `fileUrl` safe for display: strips any token, or fills it from `blobPath`
    pub fn sanitize_record(&self, record: &mut DocumentRecord) {
        if let Some(file_url) = non_empty(record.file_url.as_deref()) {
            record.file_url = Some(strip_token(file_url).to_string());
            return;
        }

        let Some(blob_path) = non_empty(record.blob_path.as_deref()) else {
            return;
        };

        match normalize(blob_path, &self.config) {
            Ok(path) => record.file_url = Some(self.issuer().public_url(&path)),
            Err(e) => {
                tracing::warn!(id = %record.id, error = %e, "Stored blob path is not usable");
                record.file_url = None;
            }
        }
    }

    /// [`AttachmentService::sanitize_record`] over a page of results
    pub fn sanitize_records(&self, records: &mut [DocumentRecord]) {
        for record in records {
            self.sanitize_record(record);
        }
    }

    /// Attaches a stored file to a record, writing the canonical `blobPath` and a
    /// token-free `fileUrl`
    ///
    /// # Errors
    ///
    /// Returns `AttachmentError::NotFound` if the record does not exist
    /// Returns `AttachmentError::ForeignContainer` if the file lives in another container
    /// Returns `AttachmentError::Access` if the reference is empty or malformed
    /// Returns `AttachmentError::Storage` if the record cannot be read or written
    pub async fn attach(
        &self,
        id: &str,
        pk: &str,
        raw_reference: &str,
    ) -> AttachmentResult<DocumentRecord> {
        let path = normalize(raw_reference, &self.config)?;
        if !path.is_in_container_of(&self.config) {
            return Err(AttachmentError::ForeignContainer(path.container().to_string()));
        }

        let mut record = self.load(id, pk).await?;
        record.blob_path = Some(path.qualified_path());
        record.file_url = Some(self.issuer().public_url(&path));

        let record = self.store.put(record).await?;
        tracing::info!(%id, blob_path = %path, "Attached file to document");

        Ok(record)
    }

    /// Uploads a file into the managed container and attaches it to a record
    ///
    /// The container is created first on a best-effort basis. The read URL is minted before
    /// anything is written, so a request that cannot be signed uploads nothing. The record
    /// is only updated once the blob is stored.
    ///
    /// # Errors
    ///
    /// Returns `AttachmentError::UploadUnavailable` if no blob writer is configured
    /// Returns `AttachmentError::ForeignContainer` if the target lives in another container
    /// Returns `AttachmentError::NotFound` if the record does not exist
    /// Returns `AttachmentError::Access` if the name is malformed or signing fails
    /// Returns `AttachmentError::Upload` if the blob store rejects the upload
    /// Returns `AttachmentError::Storage` if the record cannot be read or written
    pub async fn upload(
        &self,
        id: &str,
        pk: &str,
        upload: Upload,
        credentials: Option<&SigningCredentials>,
    ) -> AttachmentResult<UploadedAttachment> {
        let blobs = self
            .blobs
            .as_ref()
            .ok_or(AttachmentError::UploadUnavailable)?;

        let path = normalize(&upload.object_name, &self.config)?;
        if !path.is_in_container_of(&self.config) {
            return Err(AttachmentError::ForeignContainer(path.container().to_string()));
        }

        let mut record = self.load(id, pk).await?;

        let filename = non_empty(upload.download_name.as_deref())
            .unwrap_or_else(|| path.file_name())
            .to_string();
        let request = ad_hoc_request(&self.config, AccessMode::Inline)
            .with_filename(filename.clone())
            .with_content_type(upload.content_type.clone());
        let grant = self.issuer().signed_url(credentials, &path, &request)?;

        if let Err(e) = blobs.create_container(path.container()).await {
            tracing::warn!(
                container = path.container(),
                error = %e,
                "Could not ensure blob container, uploading anyway"
            );
        }

        blobs
            .put_blob(&path, upload.data, &upload.content_type)
            .await?;

        record.blob_path = Some(path.qualified_path());
        record.file_url = Some(self.issuer().public_url(&path));
        record.pdf_filename = Some(filename);
        let record = self.store.put(record).await?;

        tracing::info!(%id, blob_path = %path, "Uploaded and attached file to document");

        Ok(UploadedAttachment { record, grant })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Default request for ad-hoc access, using the configured ad-hoc lifetime
#[must_use]
pub fn ad_hoc_request(config: &BlobStoreConfig, mode: AccessMode) -> SignedUrlRequest {
    SignedUrlRequest::new(config.ad_hoc_ttl()).with_mode(mode)
}
