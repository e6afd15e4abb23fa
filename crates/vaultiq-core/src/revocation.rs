//! Revocation Engine (C4)
//!
//! Holds the selected [`SessionManager`] for the `SESSION` family as its
//! dependency for computing the canonical active-session snapshot, and
//! treats the cache purely as a write-through sink — it never consults the
//! cache to *decide* who gets revoked.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::cache::{keys, FamilyCache};
use crate::capabilities::{Clock, IdentityProbe};
use crate::config::RevokePolicy;
use crate::error::Result;
use crate::keylock::KeyLock;
use crate::model::{RevocationIntent, RevocationKind, RevocationRecord, UserSessionIndex};
use crate::store::{RevocationBackend, SessionManager};

const CLEANUP_PAGE_SIZE: usize = 1000;
const CLEANUP_MAX_BATCHES: usize = 100;

/// The capability interface exposed to the Validator and to hosts,
/// allowing `gate::Gate` to substitute a `DisabledRevocation` that
/// surfaces `Error::NotConfigured` when the family's mode is "off".
#[async_trait]
pub trait RevocationOps: Send + Sync {
    async fn revoke(&self, intent: RevocationIntent) -> Result<Vec<String>>;
    async fn is_revoked(&self, session_id: &str) -> Result<bool>;
    async fn get_revoked_sessions(&self, user_id: &str) -> Result<Vec<RevocationRecord>>;
    async fn clear_revocation(&self, session_ids: &[String]) -> Result<()>;
    async fn delete_revocations_older_than(&self, retention: Duration) -> Result<usize>;
}

pub struct RevocationEngine<S: SessionManager + ?Sized> {
    sessions: Arc<S>,
    records: FamilyCache<RevocationRecord>,
    revoked_index: FamilyCache<UserSessionIndex>,
    backend: Option<Arc<dyn RevocationBackend>>,
    policy: RevokePolicy,
    identity: Arc<dyn IdentityProbe>,
    clock: Arc<dyn Clock>,
    user_locks: KeyLock,
}

impl<S: SessionManager + ?Sized> RevocationEngine<S> {
    pub fn new(
        sessions: Arc<S>,
        records: FamilyCache<RevocationRecord>,
        revoked_index: FamilyCache<UserSessionIndex>,
        backend: Option<Arc<dyn RevocationBackend>>,
        policy: RevokePolicy,
        identity: Arc<dyn IdentityProbe>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions,
            records,
            revoked_index,
            backend,
            policy,
            identity,
            clock,
            user_locks: KeyLock::new(),
        }
    }

    /// Resolve an intent into the set of target session IDs from a single
    /// snapshot of the store's active sessions.
    async fn resolve_targets(&self, intent: &RevocationIntent) -> Result<Vec<String>> {
        match intent {
            RevocationIntent::One { session_id, .. } => {
                match self.sessions.get_session(session_id).await? {
                    Some(session) if !session.is_revoked => Ok(vec![session_id.clone()]),
                    _ => {
                        info!(session_id = %session_id, "revoke ONE: no matching active session, no-op");
                        Ok(Vec::new())
                    }
                }
            }
            RevocationIntent::All { user_id, .. } => Ok(self
                .sessions
                .active_sessions_snapshot(user_id)
                .await?
                .into_iter()
                .map(|s| s.session_id)
                .collect()),
            RevocationIntent::AllExcept {
                user_id, excluded, ..
            } => {
                let excluded: std::collections::HashSet<String> = excluded
                    .iter()
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect();
                Ok(self
                    .sessions
                    .active_sessions_snapshot(user_id)
                    .await?
                    .into_iter()
                    .map(|s| s.session_id)
                    .filter(|id| !excluded.contains(id))
                    .collect())
            }
        }
    }

    async fn load_revoked_index(&self, user_id: &str) -> Result<UserSessionIndex> {
        Ok(self
            .revoked_index
            .get(&keys::revocation_by_user(user_id))
            .await?
            .unwrap_or_else(|| UserSessionIndex::new(user_id)))
    }

    async fn persist_record(&self, record: &RevocationRecord) -> Result<()> {
        if let Some(backend) = &self.backend {
            backend.insert(record).await?;
        }
        self.records
            .put(&keys::revocation(&record.session_id), record)
            .await?;

        let _guard = self.user_locks.lock(&record.user_id).await;
        let mut idx = self.load_revoked_index(&record.user_id).await?;
        idx.insert(record.session_id.clone(), self.clock.now());
        self.revoked_index
            .put(&keys::revocation_by_user(&record.user_id), &idx)
            .await?;
        Ok(())
    }

    /// Revoke the sessions matched by `intent`. No-op targets and
    /// already-revoked sessions are skipped individually.
    pub async fn revoke(&self, intent: RevocationIntent) -> Result<Vec<String>> {
        let targets = self.resolve_targets(&intent).await?;
        let triggered_by = self.identity.current_principal();
        let mut revoked = Vec::with_capacity(targets.len());

        for session_id in targets {
            if self.is_revoked(&session_id).await? {
                debug!(session_id = %session_id, "revoke: already revoked, no-op");
                continue;
            }

            let Some(session) = self.sessions.get_session(&session_id).await? else {
                info!(session_id = %session_id, "revoke: target vanished before persist, no-op");
                continue;
            };

            let record = RevocationRecord {
                session_id: session_id.clone(),
                user_id: session.user_id.clone(),
                revocation_kind: match &intent {
                    RevocationIntent::One { .. } => RevocationKind::One,
                    RevocationIntent::All { .. } => RevocationKind::All,
                    RevocationIntent::AllExcept { .. } => RevocationKind::AllExcept,
                },
                note: intent.note().map(str::to_string),
                triggered_by: triggered_by.clone(),
                revoked_at: self.clock.now(),
            };
            self.persist_record(&record).await?;

            match self.policy {
                RevokePolicy::DeleteOnRevoke => {
                    self.sessions.delete_session(&session_id).await?;
                }
                RevokePolicy::MarkOnRevoke => {
                    self.sessions
                        .mark_session_revoked(&session_id, record.revoked_at)
                        .await?;
                }
            }
            revoked.push(session_id);
        }

        Ok(revoked)
    }

    /// Read-through: consult the cache first, fall back to the store on a
    /// miss, then backfill the cache.
    pub async fn is_revoked(&self, session_id: &str) -> Result<bool> {
        if session_id.trim().is_empty() {
            return Ok(false);
        }
        if self.records.get(&keys::revocation(session_id)).await?.is_some() {
            return Ok(true);
        }
        let Some(backend) = &self.backend else {
            return Ok(false);
        };
        match backend.fetch(session_id).await? {
            Some(record) => {
                self.records
                    .put(&keys::revocation(session_id), &record)
                    .await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn get_revoked_sessions(&self, user_id: &str) -> Result<Vec<RevocationRecord>> {
        if let Some(backend) = &self.backend {
            return backend.list_by_user(user_id).await;
        }
        let idx = self.load_revoked_index(user_id).await?;
        let keys: Vec<String> = idx
            .session_ids
            .iter()
            .map(|id| keys::revocation(id))
            .collect();
        let found = self.records.multi_get(&keys).await?;
        Ok(found.into_values().collect())
    }

    pub async fn clear_revocation(&self, session_ids: &[String]) -> Result<()> {
        if session_ids.is_empty() {
            return Ok(());
        }
        for session_id in session_ids {
            let user_id = if let Some(record) = self.records.get(&keys::revocation(session_id)).await? {
                Some(record.user_id)
            } else if let Some(backend) = &self.backend {
                backend.fetch(session_id).await?.map(|r| r.user_id)
            } else {
                None
            };

            if let Some(backend) = &self.backend {
                backend.delete(session_id).await?;
            }
            self.records.evict(&keys::revocation(session_id)).await?;

            if let Some(user_id) = user_id {
                let _guard = self.user_locks.lock(&user_id).await;
                let mut idx = self.load_revoked_index(&user_id).await?;
                idx.remove(session_id, self.clock.now());
                self.revoked_index
                    .put(&keys::revocation_by_user(&user_id), &idx)
                    .await?;
            }
        }
        Ok(())
    }

    /// Pages through revocation records older than `retention`, deleting
    /// them in batches of up to 1,000, capped at 100 batches per
    /// invocation. Returns the total deleted.
    ///
    /// A no-op (returns `Ok(0)`) when the `REVOCATION` family has no store
    /// tier configured — paged range scans require the durable backend.
    pub async fn delete_revocations_older_than(&self, retention: Duration) -> Result<usize> {
        let Some(backend) = &self.backend else {
            warn!("delete_revocations_older_than called with no store tier configured");
            return Ok(0);
        };
        let cutoff = self.clock.now() - retention;
        let mut total = 0usize;

        for _ in 0..CLEANUP_MAX_BATCHES {
            let page = backend.page_older_than(cutoff, CLEANUP_PAGE_SIZE).await?;
            if page.is_empty() {
                break;
            }
            let deleted = backend.delete_many(&page).await?;
            let cache_keys: Vec<String> = page.iter().map(|id| keys::revocation(id)).collect();
            self.records.multi_evict(&cache_keys).await?;
            total += deleted;
            if page.len() < CLEANUP_PAGE_SIZE {
                break;
            }
        }

        info!(deleted = total, "revocation cleanup completed");
        Ok(total)
    }
}

#[async_trait]
impl<S: SessionManager + ?Sized> RevocationOps for RevocationEngine<S> {
    async fn revoke(&self, intent: RevocationIntent) -> Result<Vec<String>> {
        RevocationEngine::revoke(self, intent).await
    }

    async fn is_revoked(&self, session_id: &str) -> Result<bool> {
        RevocationEngine::is_revoked(self, session_id).await
    }

    async fn get_revoked_sessions(&self, user_id: &str) -> Result<Vec<RevocationRecord>> {
        RevocationEngine::get_revoked_sessions(self, user_id).await
    }

    async fn clear_revocation(&self, session_ids: &[String]) -> Result<()> {
        RevocationEngine::clear_revocation(self, session_ids).await
    }

    async fn delete_revocations_older_than(&self, retention: Duration) -> Result<usize> {
        RevocationEngine::delete_revocations_older_than(self, retention).await
    }
}

/// Stand-in for the `REVOCATION` family when its mode is "off" — every
/// operation surfaces a diagnostic instead of silently degrading (spec
/// §4.6).
pub struct DisabledRevocation;

#[async_trait]
impl RevocationOps for DisabledRevocation {
    async fn revoke(&self, _intent: RevocationIntent) -> Result<Vec<String>> {
        Err(crate::error::Error::NotConfigured(crate::config::Family::Revocation))
    }

    async fn is_revoked(&self, _session_id: &str) -> Result<bool> {
        Err(crate::error::Error::NotConfigured(crate::config::Family::Revocation))
    }

    async fn get_revoked_sessions(&self, _user_id: &str) -> Result<Vec<RevocationRecord>> {
        Err(crate::error::Error::NotConfigured(crate::config::Family::Revocation))
    }

    async fn clear_revocation(&self, _session_ids: &[String]) -> Result<()> {
        Err(crate::error::Error::NotConfigured(crate::config::Family::Revocation))
    }

    async fn delete_revocations_older_than(&self, _retention: Duration) -> Result<usize> {
        Err(crate::error::Error::NotConfigured(crate::config::Family::Revocation))
    }
}
