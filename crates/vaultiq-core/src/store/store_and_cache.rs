//! Store+cache `SessionManager`").
//!
//! Reads consult the cache first; on a miss, the store is read and the
//! result populates the cache before returning. Writes go to the store
//! first, then update or evict the dependent cache entries — store-then-
//! cache, so a crash between the two leaves the durable state correct and
//! the cache merely stale.

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{backend::SessionBackend, SessionManager};
use crate::cache::{keys, FamilyCache};
use crate::capabilities::Clock;
use crate::error::{Error, Result};
use crate::model::{DeviceMetadata, Session};

pub struct StoreAndCacheStore {
    backend: Arc<dyn SessionBackend>,
    sessions: FamilyCache<Session>,
    user_lists: FamilyCache<Vec<Session>>,
    fingerprints: FamilyCache<String>,
    clock: Arc<dyn Clock>,
}

impl StoreAndCacheStore {
    pub fn new(
        backend: Arc<dyn SessionBackend>,
        sessions: FamilyCache<Session>,
        user_lists: FamilyCache<Vec<Session>>,
        fingerprints: FamilyCache<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backend,
            sessions,
            user_lists,
            fingerprints,
            clock,
        }
    }

    async fn invalidate_for(&self, session: &Session) -> Result<()> {
        self.sessions.evict(&keys::session(&session.session_id)).await?;
        self.fingerprints.evict(&keys::fingerprint(&session.session_id)).await?;
        self.user_lists.evict(&keys::user_sessions(&session.user_id)).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionManager for StoreAndCacheStore {
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

        self.backend.insert(&session).await?;

        self.sessions
            .put(&keys::session(&session.session_id), &session)
            .await?;
        self.fingerprints
            .put(&keys::fingerprint(&session.session_id), &session.device_fingerprint.clone())
            .await?;
        self.user_lists.evict(&keys::user_sessions(user_id)).await?;

        Ok(session)
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        if session_id.trim().is_empty() {
            return Ok(None);
        }
        let cache_key = keys::session(session_id);
        if let Some(session) = self.sessions.get(&cache_key).await? {
            return Ok(Some(session));
        }
        let Some(session) = self.backend.fetch(session_id).await? else {
            return Ok(None);
        };
        self.sessions.put(&cache_key, &session).await?;
        Ok(Some(session))
    }

    async fn get_sessions_by_user(&self, user_id: &str) -> Result<Vec<Session>> {
        let cache_key = keys::user_sessions(user_id);
        if let Some(list) = self.user_lists.get(&cache_key).await? {
            return Ok(list);
        }
        let list = self.backend.list_by_user(user_id).await?;
        self.user_lists.put(&cache_key, &list).await?;
        Ok(list)
    }

    async fn get_active_sessions_by_user(&self, user_id: &str) -> Result<Vec<Session>> {
        self.backend.list_active_by_user(user_id).await
    }

    async fn total_user_sessions(&self, user_id: &str) -> Result<usize> {
        self.backend.count_by_user(user_id).await
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        if session_id.trim().is_empty() {
            return Ok(());
        }
        let existing = self.backend.fetch(session_id).await?;
        self.backend.delete(session_id).await?;
        if let Some(session) = existing {
            self.invalidate_for(&session).await?;
        } else {
            self.sessions.evict(&keys::session(session_id)).await?;
            self.fingerprints.evict(&keys::fingerprint(session_id)).await?;
        }
        Ok(())
    }

    async fn delete_all_sessions(&self, session_ids: &[String]) -> Result<()> {
        if session_ids.is_empty() {
            return Ok(());
        }
        let mut affected = Vec::new();
        for id in session_ids {
            if let Some(session) = self.backend.fetch(id).await? {
                affected.push(session);
            }
        }
        self.backend.delete_many(session_ids).await?;
        for session in &affected {
            self.invalidate_for(session).await?;
        }
        Ok(())
    }

    async fn get_session_fingerprint(&self, session_id: &str) -> Result<Option<String>> {
        let cache_key = keys::fingerprint(session_id);
        if let Some(fp) = self.fingerprints.get(&cache_key).await? {
            return Ok(Some(fp));
        }
        let Some(session) = self.backend.fetch(session_id).await? else {
            return Ok(None);
        };
        self.fingerprints.put(&cache_key, &session.device_fingerprint).await?;
        Ok(Some(session.device_fingerprint))
    }

    async fn mark_session_revoked(&self, session_id: &str, at: OffsetDateTime) -> Result<bool> {
        let updated = self.backend.mark_revoked(session_id, at).await?;
        if updated {
            if let Some(session) = self.backend.fetch(session_id).await? {
                self.invalidate_for(&session).await?;
            }
        }
        Ok(updated)
    }
}
