//! Session & checkpoint registry
//!
//! Owns the durable mapping from session id to conversation state, the
//! per-session approval context slot, checkpoint id minting, and the
//! per-session locks that keep approval decisions strictly sequential.
//! Replaces what were package-global mutable maps in earlier designs with
//! one injectable instance.

use crate::approval::ApprovalContext;
use crate::engine::Summarizer;
use crate::session::{compact_history, Session};
use crate::storage::{SessionStore, StorageError};
use ahash::AHashMap;
use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

/// Registry of sessions, approval contexts, and checkpoint identities
pub struct SessionRegistry {
    store: Arc<dyn SessionStore>,
    max_history_len: usize,
    /// At most one approval context per session; process-local, the
    /// stale-resume rule keeps restart loss recoverable
    contexts: Mutex<AHashMap<String, ApprovalContext>>,
    /// Per-session async locks; distinct sessions never contend
    locks: Mutex<AHashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    /// High-water mark for minted checkpoint timestamps
    last_checkpoint_nanos: AtomicI64,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn SessionStore>, max_history_len: usize) -> Self {
        Self {
            store,
            max_history_len,
            contexts: Mutex::new(AHashMap::new()),
            locks: Mutex::new(AHashMap::new()),
            last_checkpoint_nanos: AtomicI64::new(0),
        }
    }

    /// Fetch the session for an id, or a fresh empty one
    ///
    /// Never fails for a well-formed id: a store read failure degrades to
    /// an empty session with a logged warning.
    pub fn get(&self, session_id: &str) -> Session {
        match self.store.load(session_id) {
            Ok(Some(session)) => session,
            Ok(None) => Session::new(session_id),
            Err(e) => {
                tracing::warn!(
                    session_id,
                    error = %e,
                    "session load failed; starting from an empty session"
                );
                Session::new(session_id)
            }
        }
    }

    /// Persist a session
    pub fn save(&self, session: &Session) -> Result<(), StorageError> {
        self.store.save(session)
    }

    /// Mint a checkpoint id for a fresh (non-resume) attempt
    ///
    /// `{session_id}-{nanos}` where the nanosecond timestamp is forced
    /// strictly above every previously minted one, so concurrent fresh
    /// attempts for one session can never collide and an abandoned
    /// attempt's checkpoint is never implicitly reused.
    pub fn new_checkpoint_id(&self, session_id: &str) -> String {
        let now = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX - 1);

        let mut prev = self.last_checkpoint_nanos.load(Ordering::Relaxed);
        loop {
            let next = now.max(prev + 1);
            match self.last_checkpoint_nanos.compare_exchange_weak(
                prev,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return format!("{}-{}", session_id, next),
                Err(actual) => prev = actual,
            }
        }
    }

    /// Acquire the per-session lock
    ///
    /// Approval decisions for one session are strictly sequential; callers
    /// hold this guard for the whole turn.
    pub async fn lock_session(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().expect("session lock table poisoned");
            locks
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Current approval context for a session, if any
    pub fn approval_context(&self, session_id: &str) -> Option<ApprovalContext> {
        self.contexts
            .lock()
            .expect("approval context table poisoned")
            .get(session_id)
            .cloned()
    }

    /// Install (or replace) the approval context for a session
    pub fn put_approval_context(&self, session_id: &str, context: ApprovalContext) {
        self.contexts
            .lock()
            .expect("approval context table poisoned")
            .insert(session_id.to_string(), context);
    }

    /// Remove and return the approval context for a session
    pub fn remove_approval_context(&self, session_id: &str) -> Option<ApprovalContext> {
        self.contexts
            .lock()
            .expect("approval context table poisoned")
            .remove(session_id)
    }

    /// Compact and persist a session off the response path
    ///
    /// Fire-and-forget with logged failure: the caller's response stream
    /// must not wait on summarization or storage. An immediately following
    /// request for the same session may read the pre-compaction state and
    /// later overwrite this save (last writer wins); that race is benign
    /// and intentionally not locked away.
    pub fn spawn_compact_and_save(
        self: &Arc<Self>,
        mut session: Session,
        summarizer: Arc<dyn Summarizer>,
    ) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) =
                compact_history(&mut session, summarizer.as_ref(), registry.max_history_len)
                    .await
            {
                tracing::warn!(
                    session_id = %session.id,
                    error = %e,
                    "history compaction failed; keeping uncompacted history"
                );
            }

            if let Err(e) = registry.save(&session) {
                tracing::warn!(
                    session_id = %session.id,
                    error = %e,
                    "background session save failed"
                );
            }
        })
    }
}
