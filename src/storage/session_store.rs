//! Session persistence
//!
//! The file store keeps one JSON document per session under
//! `{data_dir}/sessions/`, readable and greppable during operation. The
//! memory store backs tests and the degrade path.

use crate::session::Session;
use crate::storage::StorageError;
use ahash::AHashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Durable session storage
pub trait SessionStore: Send + Sync {
    fn load(&self, session_id: &str) -> Result<Option<Session>, StorageError>;
    fn save(&self, session: &Session) -> Result<(), StorageError>;
}

/// File-backed session store, one JSON file per session
pub struct FileSessionStore {
    data_dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Session ids are caller-supplied; anything unsafe in a file name is
    /// mapped to '_' so ids can never escape the sessions directory.
    fn session_file(&self, session_id: &str) -> PathBuf {
        let safe: String = session_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.data_dir.join("sessions").join(format!("{}.json", safe))
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self, session_id: &str) -> Result<Option<Session>, StorageError> {
        let path = self.session_file(session_id);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path).map_err(|e| StorageError::Io {
            source: e,
            context: format!("Failed to read session file: {}", path.display()),
        })?;
        let session = serde_json::from_str(&content).map_err(|e| StorageError::Json {
            source: e,
            context: format!("Failed to deserialize session: {}", path.display()),
        })?;

        Ok(Some(session))
    }

    fn save(&self, session: &Session) -> Result<(), StorageError> {
        let dir = self.data_dir.join("sessions");
        std::fs::create_dir_all(&dir).map_err(|e| StorageError::Io {
            source: e,
            context: format!("Failed to create sessions directory: {}", dir.display()),
        })?;
        let path = self.session_file(&session.id);

        let content =
            serde_json::to_string_pretty(session).map_err(|e| StorageError::Json {
                source: e,
                context: "Failed to serialize session".to_string(),
            })?;
        std::fs::write(&path, content).map_err(|e| StorageError::Io {
            source: e,
            context: format!("Failed to write session file: {}", path.display()),
        })?;

        Ok(())
    }
}

/// In-memory session store
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<AHashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, session_id: &str) -> Result<Option<Session>, StorageError> {
        Ok(self
            .sessions
            .lock()
            .expect("session table poisoned")
            .get(session_id)
            .cloned())
    }

    fn save(&self, session: &Session) -> Result<(), StorageError> {
        self.sessions
            .lock()
            .expect("session table poisoned")
            .insert(session.id.clone(), session.clone());
        Ok(())
    }
}

/// Wraps a primary session store with a permanent degrade-to-memory
/// fallback, logging the switch once
pub struct FallbackSessionStore {
    primary: Box<dyn SessionStore>,
    fallback: MemorySessionStore,
    degraded: AtomicBool,
}

impl FallbackSessionStore {
    pub fn new(primary: Box<dyn SessionStore>) -> Self {
        Self {
            primary,
            fallback: MemorySessionStore::new(),
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
                "session store unavailable; degrading to in-memory fallback"
            );
        }
    }
}

impl SessionStore for FallbackSessionStore {
    fn load(&self, session_id: &str) -> Result<Option<Session>, StorageError> {
        if self.is_degraded() {
            return self.fallback.load(session_id);
        }

        match self.primary.load(session_id) {
            Ok(session) => Ok(session),
            Err(e) => {
                self.degrade(&e);
                self.fallback.load(session_id)
            }
        }
    }

    fn save(&self, session: &Session) -> Result<(), StorageError> {
        if self.is_degraded() {
            return self.fallback.save(session);
        }

        match self.primary.save(session) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.degrade(&e);
                self.fallback.save(session)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct BrokenStore;

    impl SessionStore for BrokenStore {
        fn load(&self, _: &str) -> Result<Option<Session>, StorageError> {
            Err(StorageError::Unavailable("disk full".to_string()))
        }

        fn save(&self, _: &Session) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("disk full".to_string()))
        }
    }

    #[test]
    fn test_file_store_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = FileSessionStore::new(temp.path().to_path_buf());

        let mut session = Session::new("sess-1");
        session.record_exchange("question", "answer");
        store.save(&session).unwrap();

        let loaded = store.load("sess-1").unwrap().unwrap();
        assert_eq!(loaded.id, "sess-1");
        assert_eq!(loaded.history.len(), 2);
    }

    #[test]
    fn test_file_store_missing_session_is_none() {
        let temp = TempDir::new().unwrap();
        let store = FileSessionStore::new(temp.path().to_path_buf());
        assert!(store.load("absent").unwrap().is_none());
    }

    #[test]
    fn test_hostile_session_id_stays_in_data_dir() {
        let temp = TempDir::new().unwrap();
        let store = FileSessionStore::new(temp.path().to_path_buf());

        let session = Session::new("../../etc/passwd");
        store.save(&session).unwrap();

        let loaded = store.load("../../etc/passwd").unwrap().unwrap();
        assert_eq!(loaded.id, "../../etc/passwd");
        // Nothing escaped the sessions directory
        assert!(temp.path().join("sessions").exists());
        assert!(!temp.path().join("../../etc/passwd.json").exists());
    }

    #[test]
    fn test_fallback_degrades_and_keeps_serving() {
        let store = FallbackSessionStore::new(Box::new(BrokenStore));
        assert!(!store.is_degraded());

        let session = Session::new("sess-1");
        store.save(&session).unwrap();
        assert!(store.is_degraded());

        assert!(store.load("sess-1").unwrap().is_some());
    }
}
