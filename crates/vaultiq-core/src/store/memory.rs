//! In-memory store backend for tests and local development.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::backend::{RevocationBackend, SessionBackend};
use crate::error::Result;
use crate::model::{RevocationRecord, Session};

#[derive(Default)]
pub struct InMemoryStore {
    sessions: RwLock<HashMap<String, Session>>,
    revocations: RwLock<HashMap<String, RevocationRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionBackend for InMemoryStore {
    async fn insert(&self, session: &Session) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn fetch(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        Ok(self.sessions.write().await.remove(session_id).is_some())
    }

    async fn delete_many(&self, session_ids: &[String]) -> Result<usize> {
        let mut guard = self.sessions.write().await;
        Ok(session_ids
            .iter()
            .filter(|id| guard.remove(*id).is_some())
            .count())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Session>> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_active_by_user(&self, user_id: &str) -> Result<Vec<Session>> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.user_id == user_id && !s.is_revoked)
            .cloned()
            .collect())
    }

    async fn list_active_by_user_excluding(
        &self,
        user_id: &str,
        excluded: &[String],
    ) -> Result<Vec<Session>> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| {
                s.user_id == user_id && !s.is_revoked && !excluded.contains(&s.session_id)
            })
            .cloned()
            .collect())
    }

    async fn count_by_user(&self, user_id: &str) -> Result<usize> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.user_id == user_id)
            .count())
    }

    async fn mark_revoked(&self, session_id: &str, at: OffsetDateTime) -> Result<bool> {
        let mut guard = self.sessions.write().await;
        if let Some(session) = guard.get_mut(session_id) {
            session.mark_revoked(at);
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[async_trait]
impl RevocationBackend for InMemoryStore {
    async fn insert(&self, record: &RevocationRecord) -> Result<()> {
        self.revocations
            .write()
            .await
            .insert(record.session_id.clone(), record.clone());
        Ok(())
    }

    async fn fetch(&self, session_id: &str) -> Result<Option<RevocationRecord>> {
        Ok(self.revocations.read().await.get(session_id).cloned())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<RevocationRecord>> {
        Ok(self
            .revocations
            .read()
            .await
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        Ok(self.revocations.write().await.remove(session_id).is_some())
    }

    async fn delete_many(&self, session_ids: &[String]) -> Result<usize> {
        let mut guard = self.revocations.write().await;
        Ok(session_ids
            .iter()
            .filter(|id| guard.remove(*id).is_some())
            .count())
    }

    async fn page_older_than(
        &self,
        cutoff: OffsetDateTime,
        page_size: usize,
    ) -> Result<Vec<String>> {
        Ok(self
            .revocations
            .read()
            .await
            .values()
            .filter(|r| r.revoked_at < cutoff)
            .take(page_size)
            .map(|r| r.session_id.clone())
            .collect())
    }

    async fn exists_by_user_and_revoked_after(
        &self,
        user_id: &str,
        after: OffsetDateTime,
    ) -> Result<bool> {
        Ok(self
            .revocations
            .read()
            .await
            .values()
            .any(|r| r.user_id == user_id && r.revoked_at > after))
    }
}
