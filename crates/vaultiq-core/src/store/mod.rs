//! Session Store (C3)
//!
//! `SessionManager` is the capability interface exposed to the Validator
//! and to hosts; `Gate` selects exactly one of the three implementations
//! below per the resolved `FamilyConfig[SESSION]` mode.

pub mod backend;
pub mod cache_only;
pub mod memory;
pub mod postgres;
pub mod store_and_cache;
pub mod store_only;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{DeviceMetadata, Session};

pub use backend::{RevocationBackend, SessionBackend};
pub use cache_only::CacheOnlyStore;
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store_and_cache::StoreAndCacheStore;
pub use store_only::StoreOnlyStore;

/// The capability interface for session lifecycle operations.
#[async_trait]
pub trait SessionManager: Send + Sync {
    /// Create a new session for `user_id`, already bound to `fingerprint`.
    /// Blank `user_id` is a fatal validation error (`Error::InvalidInput`).
    async fn create_session(
        &self,
        user_id: &str,
        fingerprint: &str,
        device_metadata: Option<DeviceMetadata>,
    ) -> Result<Session>;

    /// Blank/unknown `session_id` resolves to `None`, silently.
    async fn get_session(&self, session_id: &str) -> Result<Option<Session>>;

    async fn get_sessions_by_user(&self, user_id: &str) -> Result<Vec<Session>>;

    async fn get_active_sessions_by_user(&self, user_id: &str) -> Result<Vec<Session>>;

    async fn total_user_sessions(&self, user_id: &str) -> Result<usize>;

    /// Missing `session_id` is a no-op.
    async fn delete_session(&self, session_id: &str) -> Result<()>;

    /// Empty set is a no-op.
    async fn delete_all_sessions(&self, session_ids: &[String]) -> Result<()>;

    async fn get_session_fingerprint(&self, session_id: &str) -> Result<Option<String>>;

    /// Used only by the Revocation Engine to compute a single canonical
    /// snapshot of active sessions for intent resolution. Equivalent to `get_active_sessions_by_user`
    /// but named separately to keep the call site's intent explicit.
    async fn active_sessions_snapshot(&self, user_id: &str) -> Result<Vec<Session>> {
        self.get_active_sessions_by_user(user_id).await
    }

    /// Apply mark-on-revoke in place. Returns `true` if a row was updated.
    async fn mark_session_revoked(
        &self,
        session_id: &str,
        at: time::OffsetDateTime,
    ) -> Result<bool>;
}
