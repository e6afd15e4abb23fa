//! Store-only `SessionManager`. Straight-through
//! CRUD against a durable [`SessionBackend`]; no cache involved.

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{backend::SessionBackend, SessionManager};
use crate::capabilities::Clock;
use crate::error::{Error, Result};
use crate::model::{DeviceMetadata, Session};

pub struct StoreOnlyStore {
    backend: Arc<dyn SessionBackend>,
    clock: Arc<dyn Clock>,
}

impl StoreOnlyStore {
    pub fn new(backend: Arc<dyn SessionBackend>, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }
}

#[async_trait]
impl SessionManager for StoreOnlyStore {
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
        Ok(session)
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        if session_id.trim().is_empty() {
            return Ok(None);
        }
        self.backend.fetch(session_id).await
    }

    async fn get_sessions_by_user(&self, user_id: &str) -> Result<Vec<Session>> {
        self.backend.list_by_user(user_id).await
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
        self.backend.delete(session_id).await?;
        Ok(())
    }

    async fn delete_all_sessions(&self, session_ids: &[String]) -> Result<()> {
        if session_ids.is_empty() {
            return Ok(());
        }
        self.backend.delete_many(session_ids).await?;
        Ok(())
    }

    async fn get_session_fingerprint(&self, session_id: &str) -> Result<Option<String>> {
        Ok(self
            .backend
            .fetch(session_id)
            .await?
            .map(|s| s.device_fingerprint))
    }

    async fn mark_session_revoked(&self, session_id: &str, at: OffsetDateTime) -> Result<bool> {
        self.backend.mark_revoked(session_id, at).await
    }
}
