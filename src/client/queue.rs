//! Local mutations waiting to be replayed against the cloud store.

use parking_lot::Mutex;
use std::sync::Arc;

use super::error::StorageError;
use super::storage::{KeyValueStore, LocalStorage, SYNC_QUEUE_KEY};
use crate::db::SyncChange;

pub trait SyncQueue: Send + Sync {
    fn enqueue(&self, change: SyncChange) -> Result<(), StorageError>;
    /// Queued changes, oldest first
    fn pending(&self) -> Result<Vec<SyncChange>, StorageError>;
    fn clear(&self) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
pub struct MemorySyncQueue {
    changes: Mutex<Vec<SyncChange>>,
}

impl MemorySyncQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SyncQueue for MemorySyncQueue {
    fn enqueue(&self, change: SyncChange) -> Result<(), StorageError> {
        self.changes.lock().push(change);
        Ok(())
    }

    fn pending(&self) -> Result<Vec<SyncChange>, StorageError> {
        Ok(self.changes.lock().clone())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.changes.lock().clear();
        Ok(())
    }
}

/// Queue persisted under `reminders_sync_queue`
pub struct StoredSyncQueue<S> {
    storage: Arc<LocalStorage<S>>,
    // Serializes read-modify-write of the stored array
    write_lock: Mutex<()>,
}

impl<S: KeyValueStore> StoredSyncQueue<S> {
    pub fn new(storage: Arc<LocalStorage<S>>) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }
}

impl<S: KeyValueStore> SyncQueue for StoredSyncQueue<S> {
    fn enqueue(&self, change: SyncChange) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock();
        let mut changes = self.pending()?;
        changes.push(change);
        self.storage.set_item(SYNC_QUEUE_KEY, &changes)
    }

    fn pending(&self) -> Result<Vec<SyncChange>, StorageError> {
        Ok(self
            .storage
            .get_item::<Vec<SyncChange>>(SYNC_QUEUE_KEY)?
            .unwrap_or_default())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock();
        self.storage.remove_item(SYNC_QUEUE_KEY)
    }
}
