use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use docvault::attachments::RecordStore;
use record_storage::{DocumentRecord, DocumentStorageError};

/// In-memory record store with write failure injection
#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<HashMap<(String, String), DocumentRecord>>,
    set_blob_path_calls: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryRecordStore {
    pub fn insert(&self, record: DocumentRecord) {
        self.records
            .lock()
            .unwrap()
            .insert((record.pk.clone(), record.id.clone()), record);
    }

    pub fn stored(&self, id: &str, pk: &str) -> Option<DocumentRecord> {
        self.records
            .lock()
            .unwrap()
            .get(&(pk.to_string(), id.to_string()))
            .cloned()
    }

    pub fn set_blob_path_calls(&self) -> usize {
        self.set_blob_path_calls.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), DocumentStorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DocumentStorageError::SerializationError(
                "store offline".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, id: &str, pk: &str) -> Result<Option<DocumentRecord>, DocumentStorageError> {
        let record = self.stored(id, pk);
        // Let concurrent callers interleave between the read and their follow-up write
        tokio::task::yield_now().await;
        Ok(record)
    }

    async fn put(&self, record: DocumentRecord) -> Result<DocumentRecord, DocumentStorageError> {
        self.check_writable()?;
        self.insert(record.clone());
        Ok(record)
    }

    async fn set_blob_path(
        &self,
        id: &str,
        pk: &str,
        blob_path: &str,
    ) -> Result<(), DocumentStorageError> {
        self.set_blob_path_calls.fetch_add(1, Ordering::SeqCst);
        self.check_writable()?;

        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(&(pk.to_string(), id.to_string()))
            .ok_or_else(|| DocumentStorageError::RecordNotFound(id.to_string()))?;
        record.blob_path = Some(blob_path.to_string());
        Ok(())
    }
}
