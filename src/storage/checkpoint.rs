//! Checkpoint persistence
//!
//! Checkpoints are opaque byte snapshots owned by the workflow engine;
//! this layer only stores them under the ids the registry mints, with a
//! bounded lifetime so abandoned attempts age out.

use crate::storage::StorageError;
use ahash::AHashMap;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Opaque checkpoint byte store
///
/// Used by the workflow engine to suspend and resume executions; this core
/// never inspects the payload.
pub trait CheckpointStore: Send + Sync {
    fn get(&self, checkpoint_id: &str) -> Result<Option<Vec<u8>>, StorageError>;
    fn set(&self, checkpoint_id: &str, data: Vec<u8>) -> Result<(), StorageError>;
    fn delete(&self, checkpoint_id: &str) -> Result<(), StorageError>;
}

/// In-memory checkpoint store with TTL expiry enforced on read
pub struct MemoryCheckpointStore {
    entries: Mutex<AHashMap<String, (Vec<u8>, DateTime<Utc>)>>,
    ttl: Duration,
}

impl MemoryCheckpointStore {
    /// Create a store whose entries expire after `ttl_secs`
    pub fn new(ttl_secs: u64) -> Self {
        Self::with_ttl(Duration::seconds(ttl_secs as i64))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(AHashMap::new()),
            ttl,
        }
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn get(&self, checkpoint_id: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let mut entries = self.entries.lock().expect("checkpoint table poisoned");

        if let Some((_, stored_at)) = entries.get(checkpoint_id) {
            if *stored_at + self.ttl < Utc::now() {
                entries.remove(checkpoint_id);
                return Ok(None);
            }
        }

        Ok(entries.get(checkpoint_id).map(|(data, _)| data.clone()))
    }

    fn set(&self, checkpoint_id: &str, data: Vec<u8>) -> Result<(), StorageError> {
        self.entries
            .lock()
            .expect("checkpoint table poisoned")
            .insert(checkpoint_id.to_string(), (data, Utc::now()));
        Ok(())
    }

    fn delete(&self, checkpoint_id: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .expect("checkpoint table poisoned")
            .remove(checkpoint_id);
        Ok(())
    }
}

/// Wraps a primary checkpoint store with a permanent degrade-to-memory
/// fallback
///
/// After the primary's first failure every operation is served from
/// memory. The switch is logged once; checkpoints written before the
/// degrade are lost to this process, which the approval gate's
/// stale-resume handling already tolerates.
pub struct FallbackCheckpointStore {
    primary: Box<dyn CheckpointStore>,
    fallback: MemoryCheckpointStore,
    degraded: AtomicBool,
}

impl FallbackCheckpointStore {
    pub fn new(primary: Box<dyn CheckpointStore>, ttl_secs: u64) -> Self {
        Self {
            primary,
            fallback: MemoryCheckpointStore::new(ttl_secs),
            degraded: AtomicBool::new(false),
        }
    }

    /// Whether the store has switched to its in-memory fallback
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    fn degrade(&self, error: &StorageError) {
        if !self.degraded.swap(true, Ordering::AcqRel) {
            tracing::warn!(
                error = %error,
                "checkpoint store unavailable; degrading to in-memory fallback"
            );
        }
    }
}

impl CheckpointStore for FallbackCheckpointStore {
    fn get(&self, checkpoint_id: &str) -> Result<Option<Vec<u8>>, StorageError> {
        if self.is_degraded() {
            return self.fallback.get(checkpoint_id);
        }

        match self.primary.get(checkpoint_id) {
            Ok(data) => Ok(data),
            Err(e) => {
                self.degrade(&e);
                self.fallback.get(checkpoint_id)
            }
        }
    }

    fn set(&self, checkpoint_id: &str, data: Vec<u8>) -> Result<(), StorageError> {
        if self.is_degraded() {
            return self.fallback.set(checkpoint_id, data);
        }

        match self.primary.set(checkpoint_id, data.clone()) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.degrade(&e);
                self.fallback.set(checkpoint_id, data)
            }
        }
    }

    fn delete(&self, checkpoint_id: &str) -> Result<(), StorageError> {
        if self.is_degraded() {
            return self.fallback.delete(checkpoint_id);
        }

        match self.primary.delete(checkpoint_id) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.degrade(&e);
                self.fallback.delete(checkpoint_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenStore;

    impl CheckpointStore for BrokenStore {
        fn get(&self, _: &str) -> Result<Option<Vec<u8>>, StorageError> {
            Err(StorageError::Unavailable("connection refused".to_string()))
        }

        fn set(&self, _: &str, _: Vec<u8>) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("connection refused".to_string()))
        }

        fn delete(&self, _: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("connection refused".to_string()))
        }
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryCheckpointStore::new(60);
        store.set("cp-1", b"state".to_vec()).unwrap();

        assert_eq!(store.get("cp-1").unwrap(), Some(b"state".to_vec()));
        store.delete("cp-1").unwrap();
        assert_eq!(store.get("cp-1").unwrap(), None);
    }

    #[test]
    fn test_expired_checkpoint_absent() {
        let store = MemoryCheckpointStore::with_ttl(Duration::zero());
        store.set("cp-1", b"state".to_vec()).unwrap();

        assert_eq!(store.get("cp-1").unwrap(), None);
    }

    #[test]
    fn test_fallback_degrades_on_primary_failure() {
        let store = FallbackCheckpointStore::new(Box::new(BrokenStore), 60);
        assert!(!store.is_degraded());

        store.set("cp-1", b"state".to_vec()).unwrap();
        assert!(store.is_degraded());

        // Served from memory from now on
        assert_eq!(store.get("cp-1").unwrap(), Some(b"state".to_vec()));
    }

    #[test]
    fn test_fallback_passes_through_healthy_primary() {
        let store =
            FallbackCheckpointStore::new(Box::new(MemoryCheckpointStore::new(60)), 60);
        store.set("cp-1", b"state".to_vec()).unwrap();

        assert!(!store.is_degraded());
        assert_eq!(store.get("cp-1").unwrap(), Some(b"state".to_vec()));
    }
}
