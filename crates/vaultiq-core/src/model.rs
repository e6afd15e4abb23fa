//! Core data model

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Optional descriptive device metadata. Carried verbatim, never
/// semantically interpreted by the core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMetadata {
    pub name: Option<String>,
    pub os: Option<String>,
    pub kind: Option<String>,
}

/// A live authenticated device binding.
///
/// Equality and hashing use `session_id` alone, matching spec invariant 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    pub device_fingerprint: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub is_revoked: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub revoked_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub device_metadata: Option<DeviceMetadata>,
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.session_id == other.session_id
    }
}
impl Eq for Session {}

impl std::hash::Hash for Session {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.session_id.hash(state);
    }
}

impl Session {
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        device_fingerprint: impl Into<String>,
        created_at: OffsetDateTime,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            device_fingerprint: device_fingerprint.into(),
            created_at,
            is_revoked: false,
            revoked_at: None,
            device_metadata: None,
        }
    }

    pub fn mark_revoked(&mut self, at: OffsetDateTime) {
        self.is_revoked = true;
        self.revoked_at = Some(at);
    }
}

/// The kind of revocation a `RevocationRecord`/`RevocationIntent` carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevocationKind {
    One,
    All,
    AllExcept,
}

/// The audit trail entry for a single revoked session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevocationRecord {
    pub session_id: String,
    pub user_id: String,
    pub revocation_kind: RevocationKind,
    pub note: Option<String>,
    pub triggered_by: String,
    #[serde(with = "time::serde::rfc3339")]
    pub revoked_at: OffsetDateTime,
}

/// An immutable request to revoke one or more sessions. Never persisted.
#[derive(Debug, Clone)]
pub enum RevocationIntent {
    One {
        session_id: String,
        note: Option<String>,
    },
    All {
        user_id: String,
        note: Option<String>,
    },
    AllExcept {
        user_id: String,
        excluded: Vec<String>,
        note: Option<String>,
    },
}

impl RevocationIntent {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            RevocationIntent::One { .. } => None,
            RevocationIntent::All { user_id, .. } => Some(user_id),
            RevocationIntent::AllExcept { user_id, .. } => Some(user_id),
        }
    }

    pub fn note(&self) -> Option<&str> {
        match self {
            RevocationIntent::One { note, .. } => note.as_deref(),
            RevocationIntent::All { note, .. } => note.as_deref(),
            RevocationIntent::AllExcept { note, .. } => note.as_deref(),
        }
    }
}

/// Per-user mapping from `userId` to the set of session IDs associated
/// with that user, plus a staleness stamp. Spec invariant 3 & 5.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSessionIndex {
    pub user_id: String,
    pub session_ids: std::collections::HashSet<String>,
    /// Epoch millis of the last mutation.
    pub last_updated: i64,
}

impl UserSessionIndex {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_ids: Default::default(),
            last_updated: 0,
        }
    }

    pub fn touch(&mut self, now: OffsetDateTime) {
        self.last_updated = now.unix_timestamp() * 1000 + i64::from(now.millisecond());
    }

    pub fn insert(&mut self, session_id: impl Into<String>, now: OffsetDateTime) {
        self.session_ids.insert(session_id.into());
        self.touch(now);
    }

    pub fn remove(&mut self, session_id: &str, now: OffsetDateTime) {
        self.session_ids.remove(session_id);
        self.touch(now);
    }
}
