//! Durable-store query surface. Opaque column layouts — the
//! core only requires these access patterns.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::error::Result;
use crate::model::{RevocationRecord, Session};

/// Durable-store operations over `Session` rows.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn insert(&self, session: &Session) -> Result<()>;

    /// §6.5(a): fetch by `sessionId`.
    async fn fetch(&self, session_id: &str) -> Result<Option<Session>>;

    /// §6.5(a): delete by `sessionId`.
    async fn delete(&self, session_id: &str) -> Result<bool>;

    async fn delete_many(&self, session_ids: &[String]) -> Result<usize>;

    /// §6.5(b): query by `userId`.
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Session>>;

    /// §6.5(c): query by `userId AND !isRevoked`.
    async fn list_active_by_user(&self, user_id: &str) -> Result<Vec<Session>>;

    /// §6.5(d): query by `userId AND !isRevoked AND sessionId NOT IN excluded`.
    async fn list_active_by_user_excluding(
        &self,
        user_id: &str,
        excluded: &[String],
    ) -> Result<Vec<Session>>;

    async fn count_by_user(&self, user_id: &str) -> Result<usize>;

    /// Mark-on-revoke: flips `isRevoked`/`revokedAt` in place.
    async fn mark_revoked(&self, session_id: &str, at: OffsetDateTime) -> Result<bool>;
}

/// Durable-store operations over `RevocationRecord` rows.
#[async_trait]
pub trait RevocationBackend: Send + Sync {
    async fn insert(&self, record: &RevocationRecord) -> Result<()>;

    async fn fetch(&self, session_id: &str) -> Result<Option<RevocationRecord>>;

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<RevocationRecord>>;

    async fn delete(&self, session_id: &str) -> Result<bool>;

    async fn delete_many(&self, session_ids: &[String]) -> Result<usize>;

    /// §6.5(e): page-scan by `revokedAt < cutoff`. Returns up to `page_size`
    /// session IDs; callers page until an empty result.
    async fn page_older_than(
        &self,
        cutoff: OffsetDateTime,
        page_size: usize,
    ) -> Result<Vec<String>>;

    /// §6.5(f): `existsByUserIdAndRevokedAtAfter`.
    async fn exists_by_user_and_revoked_after(
        &self,
        user_id: &str,
        after: OffsetDateTime,
    ) -> Result<bool>;
}
