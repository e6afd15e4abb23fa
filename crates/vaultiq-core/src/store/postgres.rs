//! PostgreSQL store backend, grounded on the query shapes in
//! `auth/sessions.rs` and the repository split in `session_repository.rs`
//! of the pack's reference services.

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

use super::backend::{RevocationBackend, SessionBackend};
use crate::error::Result;
use crate::model::{DeviceMetadata, RevocationKind, RevocationRecord, Session};

#[derive(sqlx::FromRow)]
struct SessionRow {
    session_id: String,
    user_id: String,
    device_fingerprint: String,
    created_at: OffsetDateTime,
    is_revoked: bool,
    revoked_at: Option<OffsetDateTime>,
    device_name: Option<String>,
    device_os: Option<String>,
    device_kind: Option<String>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        let device_metadata = if row.device_name.is_some() || row.device_os.is_some() || row.device_kind.is_some() {
            Some(DeviceMetadata {
                name: row.device_name,
                os: row.device_os,
                kind: row.device_kind,
            })
        } else {
            None
        };
        Session {
            session_id: row.session_id,
            user_id: row.user_id,
            device_fingerprint: row.device_fingerprint,
            created_at: row.created_at,
            is_revoked: row.is_revoked,
            revoked_at: row.revoked_at,
            device_metadata,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RevocationRow {
    session_id: String,
    user_id: String,
    revocation_kind: String,
    note: Option<String>,
    triggered_by: String,
    revoked_at: OffsetDateTime,
}

impl From<RevocationRow> for RevocationRecord {
    fn from(row: RevocationRow) -> Self {
        let revocation_kind = match row.revocation_kind.as_str() {
            "ALL" => RevocationKind::All,
            "ALL_EXCEPT" => RevocationKind::AllExcept,
            _ => RevocationKind::One,
        };
        RevocationRecord {
            session_id: row.session_id,
            user_id: row.user_id,
            revocation_kind,
            note: row.note,
            triggered_by: row.triggered_by,
            revoked_at: row.revoked_at,
        }
    }
}

/// PostgreSQL-backed implementation of [`SessionBackend`] and
/// [`RevocationBackend`], expected to run against the schema documented
/// in `migrations/`.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionBackend for PostgresStore {
    async fn insert(&self, session: &Session) -> Result<()> {
        let meta = session.device_metadata.as_ref();
        sqlx::query(
            r#"
            INSERT INTO vaultiq_sessions (
                session_id, user_id, device_fingerprint, created_at,
                is_revoked, revoked_at, device_name, device_os, device_kind
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&session.session_id)
        .bind(&session.user_id)
        .bind(&session.device_fingerprint)
        .bind(session.created_at)
        .bind(session.is_revoked)
        .bind(session.revoked_at)
        .bind(meta.and_then(|m| m.name.clone()))
        .bind(meta.and_then(|m| m.os.clone()))
        .bind(meta.and_then(|m| m.kind.clone()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch(&self, session_id: &str) -> Result<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT session_id, user_id, device_fingerprint, created_at,
                   is_revoked, revoked_at, device_name, device_os, device_kind
            FROM vaultiq_sessions
            WHERE session_id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM vaultiq_sessions WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_many(&self, session_ids: &[String]) -> Result<usize> {
        if session_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM vaultiq_sessions WHERE session_id = ANY($1)")
            .bind(session_ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Session>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT session_id, user_id, device_fingerprint, created_at,
                   is_revoked, revoked_at, device_name, device_os, device_kind
            FROM vaultiq_sessions
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_active_by_user(&self, user_id: &str) -> Result<Vec<Session>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT session_id, user_id, device_fingerprint, created_at,
                   is_revoked, revoked_at, device_name, device_os, device_kind
            FROM vaultiq_sessions
            WHERE user_id = $1 AND is_revoked = FALSE
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_active_by_user_excluding(
        &self,
        user_id: &str,
        excluded: &[String],
    ) -> Result<Vec<Session>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT session_id, user_id, device_fingerprint, created_at,
                   is_revoked, revoked_at, device_name, device_os, device_kind
            FROM vaultiq_sessions
            WHERE user_id = $1 AND is_revoked = FALSE AND NOT (session_id = ANY($2))
            "#,
        )
        .bind(user_id)
        .bind(excluded)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count_by_user(&self, user_id: &str) -> Result<usize> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM vaultiq_sessions WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as usize)
    }

    async fn mark_revoked(&self, session_id: &str, at: OffsetDateTime) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE vaultiq_sessions SET is_revoked = TRUE, revoked_at = $2 WHERE session_id = $1",
        )
        .bind(session_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RevocationBackend for PostgresStore {
    async fn insert(&self, record: &RevocationRecord) -> Result<()> {
        let kind = match record.revocation_kind {
            RevocationKind::One => "ONE",
            RevocationKind::All => "ALL",
            RevocationKind::AllExcept => "ALL_EXCEPT",
        };
        sqlx::query(
            r#"
            INSERT INTO vaultiq_revocations (
                session_id, user_id, revocation_kind, note, triggered_by, revoked_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (session_id) DO UPDATE SET
                revocation_kind = EXCLUDED.revocation_kind,
                note = EXCLUDED.note,
                triggered_by = EXCLUDED.triggered_by,
                revoked_at = EXCLUDED.revoked_at
            "#,
        )
        .bind(&record.session_id)
        .bind(&record.user_id)
        .bind(kind)
        .bind(&record.note)
        .bind(&record.triggered_by)
        .bind(record.revoked_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch(&self, session_id: &str) -> Result<Option<RevocationRecord>> {
        let row = sqlx::query_as::<_, RevocationRow>(
            r#"
            SELECT session_id, user_id, revocation_kind, note, triggered_by, revoked_at
            FROM vaultiq_revocations
            WHERE session_id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<RevocationRecord>> {
        let rows = sqlx::query_as::<_, RevocationRow>(
            r#"
            SELECT session_id, user_id, revocation_kind, note, triggered_by, revoked_at
            FROM vaultiq_revocations
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM vaultiq_revocations WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_many(&self, session_ids: &[String]) -> Result<usize> {
        if session_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM vaultiq_revocations WHERE session_id = ANY($1)")
            .bind(session_ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn page_older_than(
        &self,
        cutoff: OffsetDateTime,
        page_size: usize,
    ) -> Result<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT session_id FROM vaultiq_revocations
            WHERE revoked_at < $1
            ORDER BY revoked_at
            LIMIT $2
            "#,
        )
        .bind(cutoff)
        .bind(page_size as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn exists_by_user_and_revoked_after(
        &self,
        user_id: &str,
        after: OffsetDateTime,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM vaultiq_revocations
                WHERE user_id = $1 AND revoked_at > $2
            )
            "#,
        )
        .bind(user_id)
        .bind(after)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}
