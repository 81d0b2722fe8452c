use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use docvault::blob_client::{BlobClientError, BlobClientResult, BlobWriter, ContainerStatus};
use docvault::blob_ref::BlobPath;

/// Stored blob content and its content type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// In-memory blob store with failure injection per request kind
#[derive(Default)]
pub struct MemoryBlobWriter {
    containers: Mutex<Vec<String>>,
    blobs: Mutex<HashMap<String, StoredBlob>>,
    fail_containers: AtomicBool,
    fail_puts: AtomicBool,
}

impl MemoryBlobWriter {
    pub fn blob(&self, qualified_path: &str) -> Option<StoredBlob> {
        self.blobs.lock().unwrap().get(qualified_path).cloned()
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }

    pub fn containers(&self) -> Vec<String> {
        self.containers.lock().unwrap().clone()
    }

    pub fn fail_containers(&self, fail: bool) {
        self.fail_containers.store(fail, Ordering::SeqCst);
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobWriter for MemoryBlobWriter {
    async fn create_container(&self, container: &str) -> BlobClientResult<ContainerStatus> {
        if self.fail_containers.load(Ordering::SeqCst) {
            return Err(BlobClientError::Rejected {
                status: 403,
                code: "AuthorizationPermissionMismatch".to_string(),
            });
        }

        let mut containers = self.containers.lock().unwrap();
        if containers.iter().any(|c| c == container) {
            return Ok(ContainerStatus::AlreadyExists);
        }
        containers.push(container.to_string());
        Ok(ContainerStatus::Created)
    }

    async fn put_blob(
        &self,
        path: &BlobPath,
        data: Vec<u8>,
        content_type: &str,
    ) -> BlobClientResult<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(BlobClientError::Upstream {
                status: 503,
                code: "ServerBusy".to_string(),
            });
        }

        self.blobs.lock().unwrap().insert(
            path.qualified_path(),
            StoredBlob {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}
