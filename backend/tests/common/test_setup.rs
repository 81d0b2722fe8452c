use std::sync::Arc;

use docvault::attachments::AttachmentService;
use docvault::blob_access::SigningCredentials;
use docvault::types::BlobStoreConfig;
use url::Url;

use super::memory_blobs::MemoryBlobWriter;
use super::memory_store::MemoryRecordStore;

pub const ACCOUNT: &str = "acct";
pub const CONTAINER: &str = "files";
/// base64 of `secret-key`
pub const ACCOUNT_KEY: &str = "c2VjcmV0LWtleQ==";
pub const PK: &str = "tenant-1";

pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .try_init()
        .ok();
}

/// Attachment service over in-memory record and blob stores
pub struct TestContext {
    pub store: Arc<MemoryRecordStore>,
    pub blobs: Arc<MemoryBlobWriter>,
    pub config: Arc<BlobStoreConfig>,
    pub service: AttachmentService,
    pub credentials: SigningCredentials,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(BlobStoreConfig::new(ACCOUNT, CONTAINER).unwrap())
    }

    /// Plain-HTTP emulator endpoint with the account in the path
    pub fn emulator() -> Self {
        let endpoint = Url::parse("http://127.0.0.1:10000/devstoreaccount1").unwrap();
        Self::with_config(
            BlobStoreConfig::with_endpoint("devstoreaccount1", CONTAINER, endpoint).unwrap(),
        )
    }

    pub fn with_config(config: BlobStoreConfig) -> Self {
        setup_tracing();

        let store = Arc::new(MemoryRecordStore::default());
        let blobs = Arc::new(MemoryBlobWriter::default());
        let config = Arc::new(config);
        let service =
            AttachmentService::new(store.clone(), config.clone()).with_blob_writer(blobs.clone());
        let credentials = SigningCredentials::from_account_key(ACCOUNT_KEY).unwrap();

        Self {
            store,
            blobs,
            config,
            service,
            credentials,
        }
    }
}
