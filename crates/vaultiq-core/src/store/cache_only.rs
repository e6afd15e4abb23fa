//! Cache-only `SessionManager`.
//!
//! All state lives in the cache. The session entry is written first, then
//! the per-user index is updated with a read-modify-write guarded by an
//! in-process per-user lock — an optimisation, not a correctness crutch,
//! since the index must tolerate a racing replica.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use super::SessionManager;
use crate::cache::{keys, FamilyCache};
use crate::capabilities::Clock;
use crate::error::{Error, Result};
use crate::keylock::KeyLock;
use crate::model::{DeviceMetadata, Session, UserSessionIndex};

pub struct CacheOnlyStore {
    sessions: FamilyCache<Session>,
    index: FamilyCache<UserSessionIndex>,
    user_locks: KeyLock,
    clock: Arc<dyn Clock>,
}

impl CacheOnlyStore {
    pub fn new(
        sessions: FamilyCache<Session>,
        index: FamilyCache<UserSessionIndex>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions,
            index,
            user_locks: KeyLock::new(),
            clock,
        }
    }

    async fn load_index(&self, user_id: &str) -> Result<UserSessionIndex> {
        Ok(self
            .index
            .get(&keys::user_sessions(user_id))
            .await?
            .unwrap_or_else(|| UserSessionIndex::new(user_id)))
    }
}

#[async_trait]
impl SessionManager for CacheOnlyStore {
    async fn create_session(
        &self,
        user_id: &str,
        fingerprint: &str,
        device_metadata: Option<DeviceMetadata>,
    ) -> Result<Session> {
        if user_id.trim().is_empty() {
            return Err(Error::InvalidInput("userId is blank".into()));
        }
        let mut session = Session::new(
            Uuid::new_v4().to_string(),
            user_id,
            fingerprint,
            self.clock.now(),
        );
        session.device_metadata = device_metadata;

        self.sessions
            .put(&keys::session(&session.session_id), &session)
            .await?;

        let _guard = self.user_locks.lock(user_id).await;
        let mut idx = self.load_index(user_id).await?;
        idx.insert(session.session_id.clone(), self.clock.now());
        self.index.put(&keys::user_sessions(user_id), &idx).await?;

        Ok(session)
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        if session_id.trim().is_empty() {
            return Ok(None);
        }
        self.sessions.get(&keys::session(session_id)).await
    }

    async fn get_sessions_by_user(&self, user_id: &str) -> Result<Vec<Session>> {
        let idx = self.load_index(user_id).await?;
        let keys: Vec<String> = idx.session_ids.iter().map(|id| keys::session(id)).collect();
        let found = self.sessions.multi_get(&keys).await?;
        Ok(found.into_values().collect())
    }

    async fn get_active_sessions_by_user(&self, user_id: &str) -> Result<Vec<Session>> {
        Ok(self
            .get_sessions_by_user(user_id)
            .await?
            .into_iter()
            .filter(|s| !s.is_revoked)
            .collect())
    }

    async fn total_user_sessions(&self, user_id: &str) -> Result<usize> {
        Ok(self.load_index(user_id).await?.session_ids.len())
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        if session_id.trim().is_empty() {
            return Ok(());
        }
        let Some(session) = self.sessions.get(&keys::session(session_id)).await? else {
            return Ok(());
        };
        self.sessions.evict(&keys::session(session_id)).await?;

        let _guard = self.user_locks.lock(&session.user_id).await;
        let mut idx = self.load_index(&session.user_id).await?;
        idx.remove(session_id, self.clock.now());
        self.index
            .put(&keys::user_sessions(&session.user_id), &idx)
            .await?;
        Ok(())
    }

    async fn delete_all_sessions(&self, session_ids: &[String]) -> Result<()> {
        if session_ids.is_empty() {
            return Ok(());
        }
        // Fetch first so we know which users' indexes need updating once
        // the entries are gone.
        let mut by_user: std::collections::HashMap<String, HashSet<String>> =
            std::collections::HashMap::new();
        for id in session_ids {
            if let Some(session) = self.sessions.get(&keys::session(id)).await? {
                by_user.entry(session.user_id).or_default().insert(id.clone());
            } else {
                warn!(session_id = %id, "delete_all_sessions: session already absent");
            }
        }

        let cache_keys: Vec<String> = session_ids.iter().map(|id| keys::session(id)).collect();
        self.sessions.multi_evict(&cache_keys).await?;

        for (user_id, removed) in by_user {
            let _guard = self.user_locks.lock(&user_id).await;
            let mut idx = self.load_index(&user_id).await?;
            let now = self.clock.now();
            for id in &removed {
                idx.remove(id, now);
            }
            self.index.put(&keys::user_sessions(&user_id), &idx).await?;
        }
        Ok(())
    }

    async fn get_session_fingerprint(&self, session_id: &str) -> Result<Option<String>> {
        Ok(self
            .get_session(session_id)
            .await?
            .map(|s| s.device_fingerprint))
    }

    async fn mark_session_revoked(&self, session_id: &str, at: OffsetDateTime) -> Result<bool> {
        let Some(mut session) = self.sessions.get(&keys::session(session_id)).await? else {
            return Ok(false);
        };
        session.mark_revoked(at);
        self.sessions.put(&keys::session(session_id), &session).await?;
        Ok(true)
    }
}
