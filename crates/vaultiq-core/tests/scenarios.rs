//! End-to-end scenarios A-F, exercised against the in-memory
//! backends so they run without external services.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::collections::HashMap;
use std::sync::Arc;

use vaultiq_core::cache::{FamilyCache, InMemoryCacheProvider, StaticCacheInfrastructure};
use vaultiq_core::capabilities::{StaticIdentityProbe, SystemClock};
use vaultiq_core::config::{Family, FamilyConfig, RevokePolicy};
use vaultiq_core::config::{resolve, FamilyOverride, PersistenceConfig, RawConfig};
use vaultiq_core::gate::{self, Backends};
use vaultiq_core::model::RevocationIntent;
use vaultiq_core::store::{InMemoryStore, SessionBackend, SessionManager};
use vaultiq_core::validator::{FingerprintGenerator, RequestHandle, SESSION_ID_ATTRIBUTE};

struct TestRequest {
    device_id: &'static str,
    session_id: Option<String>,
}

impl RequestHandle for TestRequest {
    fn header(&self, name: &str) -> Option<String> {
        if name.eq_ignore_ascii_case("X-Device-Id") {
            Some(self.device_id.to_string())
        } else {
            None
        }
    }

    fn attribute(&self, key: &str) -> Option<String> {
        if key == SESSION_ID_ATTRIBUTE {
            self.session_id.clone()
        } else {
            None
        }
    }
}

fn family_config(family: Family, use_store: bool, use_cache: bool, revoke_policy: RevokePolicy) -> FamilyConfig {
    FamilyConfig {
        family,
        use_store,
        use_cache,
        cache_name: family.canonical_cache_alias().to_string(),
        sync_interval: std::time::Duration::from_secs(30),
        revoke_policy,
    }
}

fn store_and_cache_config() -> HashMap<Family, FamilyConfig> {
    let mut map = HashMap::new();
    map.insert(
        Family::Session,
        family_config(Family::Session, true, true, RevokePolicy::MarkOnRevoke),
    );
    map.insert(
        Family::Revocation,
        family_config(Family::Revocation, true, true, RevokePolicy::MarkOnRevoke),
    );
    map.insert(
        Family::UserSessionIndex,
        family_config(Family::UserSessionIndex, false, false, RevokePolicy::MarkOnRevoke),
    );
    map.insert(
        Family::ActivityLog,
        family_config(Family::ActivityLog, false, false, RevokePolicy::MarkOnRevoke),
    );
    map
}

fn build_capabilities(
    resolved: &HashMap<Family, FamilyConfig>,
    cache_infra: &StaticCacheInfrastructure,
) -> gate::Capabilities {
    let session_store = Arc::new(InMemoryStore::new());
    let revocation_store = session_store.clone();
    gate::build(
        resolved,
        cache_infra,
        Backends {
            session_store: Some(session_store as Arc<dyn SessionBackend>),
            revocation_store: Some(revocation_store as Arc<dyn vaultiq_core::store::RevocationBackend>),
        },
        Arc::new(StaticIdentityProbe("system".to_string())),
        Arc::new(SystemClock),
        None,
        None,
    )
    .expect("gate build")
}

#[tokio::test]
async fn scenario_a_basic_lifecycle() {
    let resolved = store_and_cache_config();
    let cache_infra = StaticCacheInfrastructure::new()
        .register("session-pool", Arc::new(InMemoryCacheProvider::new()))
        .register("revoked-session-pool", Arc::new(InMemoryCacheProvider::new()));
    let caps = build_capabilities(&resolved, &cache_infra);

    let session = caps
        .sessions
        .create_session("alice", "fp-a", None)
        .await
        .expect("create");

    let by_user = caps.sessions.get_sessions_by_user("alice").await.expect("list");
    assert_eq!(by_user.len(), 1);
    assert_eq!(by_user[0].session_id, session.session_id);
    assert_eq!(caps.sessions.total_user_sessions("alice").await.expect("count"), 1);

    caps.sessions
        .delete_session(&session.session_id)
        .await
        .expect("delete");
    assert!(caps
        .sessions
        .get_session(&session.session_id)
        .await
        .expect("get")
        .is_none());
    assert_eq!(caps.sessions.total_user_sessions("alice").await.expect("count"), 0);
}

#[tokio::test]
async fn scenario_b_revoke_all_except() {
    let resolved = store_and_cache_config();
    let cache_infra = StaticCacheInfrastructure::new()
        .register("session-pool", Arc::new(InMemoryCacheProvider::new()))
        .register("revoked-session-pool", Arc::new(InMemoryCacheProvider::new()));
    let caps = build_capabilities(&resolved, &cache_infra);

    let mut ids = Vec::new();
    for i in 0..4 {
        let s = caps
            .sessions
            .create_session("bob", &format!("fp-{i}"), None)
            .await
            .expect("create");
        ids.push(s.session_id);
    }
    let excluded = vec![ids[1].clone(), ids[3].clone()];

    caps.revocations
        .revoke(RevocationIntent::AllExcept {
            user_id: "bob".to_string(),
            excluded: excluded.clone(),
            note: None,
        })
        .await
        .expect("revoke");

    assert!(caps.revocations.is_revoked(&ids[0]).await.expect("check"));
    assert!(caps.revocations.is_revoked(&ids[2]).await.expect("check"));
    assert!(!caps.revocations.is_revoked(&ids[1]).await.expect("check"));
    assert!(!caps.revocations.is_revoked(&ids[3]).await.expect("check"));

    let active = caps
        .sessions
        .get_active_sessions_by_user("bob")
        .await
        .expect("active");
    let active_ids: std::collections::HashSet<_> = active.into_iter().map(|s| s.session_id).collect();
    assert_eq!(
        active_ids,
        std::collections::HashSet::from([ids[1].clone(), ids[3].clone()])
    );
}

#[tokio::test]
async fn scenario_c_silent_cache_absent() {
    // Drive the real resolve() -> gate::build() pipeline, the one
    // main.rs actually wires up, rather than hand-building a FamilyConfig.
    let raw = RawConfig {
        persistence: PersistenceConfig {
            use_store: Some(true),
            use_cache: Some(true),
            models: vec![
                FamilyOverride {
                    family: Some(Family::Session),
                    cache_name: Some("missing".to_string()),
                    ..Default::default()
                },
                FamilyOverride {
                    family: Some(Family::UserSessionIndex),
                    use_store: Some(false),
                    use_cache: Some(false),
                    ..Default::default()
                },
                FamilyOverride {
                    family: Some(Family::ActivityLog),
                    use_store: Some(false),
                    use_cache: Some(false),
                    ..Default::default()
                },
            ],
            ..Default::default()
        },
        ..Default::default()
    };

    // "missing" is never registered with any cache infrastructure: startup
    // must still succeed, and SESSION degrades to store-only behaviour.
    let cache_infra = StaticCacheInfrastructure::new();
    let resolved = resolve(&raw, &cache_infra)
        .expect("startup succeeds despite an unresolvable per-family cache name");
    let caps = build_capabilities(&resolved, &cache_infra);

    let session = caps
        .sessions
        .create_session("carol", "fp-c", None)
        .await
        .expect("create");
    assert_eq!(
        caps.sessions
            .get_sessions_by_user("carol")
            .await
            .expect("list")
            .len(),
        1
    );
    caps.sessions
        .delete_session(&session.session_id)
        .await
        .expect("delete");
    assert_eq!(caps.sessions.total_user_sessions("carol").await.expect("count"), 0);
}

#[tokio::test]
async fn scenario_d_fingerprint_mismatch() {
    use vaultiq_core::validator::DefaultFingerprintGenerator;

    let resolved = store_and_cache_config();
    let cache_infra = StaticCacheInfrastructure::new()
        .register("session-pool", Arc::new(InMemoryCacheProvider::new()))
        .register("revoked-session-pool", Arc::new(InMemoryCacheProvider::new()));
    let caps = build_capabilities(&resolved, &cache_infra);

    let generator = DefaultFingerprintGenerator;
    let create_request = TestRequest {
        device_id: "phone",
        session_id: None,
    };
    let fingerprint = generator.generate(&create_request).expect("fingerprint");
    let session = caps
        .sessions
        .create_session("dave", &fingerprint, None)
        .await
        .expect("create");

    let mismatched_request = TestRequest {
        device_id: "laptop",
        session_id: Some(session.session_id.clone()),
    };
    assert!(!caps
        .validator
        .validate_for_request(&mismatched_request)
        .await
        .expect("validate"));
}

#[tokio::test]
async fn scenario_e_revoked_blocks_validate() {
    use vaultiq_core::validator::DefaultFingerprintGenerator;

    let resolved = store_and_cache_config();
    let cache_infra = StaticCacheInfrastructure::new()
        .register("session-pool", Arc::new(InMemoryCacheProvider::new()))
        .register("revoked-session-pool", Arc::new(InMemoryCacheProvider::new()));
    let caps = build_capabilities(&resolved, &cache_infra);

    let generator = DefaultFingerprintGenerator;
    let create_request = TestRequest {
        device_id: "phone",
        session_id: None,
    };
    let fingerprint = generator.generate(&create_request).expect("fingerprint");
    let session = caps
        .sessions
        .create_session("erin", &fingerprint, None)
        .await
        .expect("create");

    let request = TestRequest {
        device_id: "phone",
        session_id: Some(session.session_id.clone()),
    };
    assert!(caps.validator.validate_for_request(&request).await.expect("validate"));

    caps.revocations
        .revoke(RevocationIntent::One {
            session_id: session.session_id.clone(),
            note: None,
        })
        .await
        .expect("revoke");

    assert!(!caps.validator.validate_for_request(&request).await.expect("validate"));
}

#[tokio::test]
async fn scenario_f_retention_cleanup() {
    use time::OffsetDateTime;
    use vaultiq_core::model::{RevocationKind, RevocationRecord};
    use vaultiq_core::store::RevocationBackend;

    let backend = InMemoryStore::new();
    let old = OffsetDateTime::now_utc() - time::Duration::days(40);
    for i in 0..2_500 {
        RevocationBackend::insert(
            &backend,
            &RevocationRecord {
                session_id: format!("s-{i}"),
                user_id: "frank".to_string(),
                revocation_kind: RevocationKind::One,
                note: None,
                triggered_by: "system".to_string(),
                revoked_at: old,
            },
        )
        .await
        .expect("seed revocation");
    }

    let backend: Arc<dyn RevocationBackend> = Arc::new(backend);
    let engine = vaultiq_core::revocation::RevocationEngine::new(
        Arc::new(InMemoryStore::new()) as Arc<dyn SessionManager>,
        FamilyCache::absent("revocation"),
        FamilyCache::absent("revocation-index"),
        Some(backend),
        RevokePolicy::MarkOnRevoke,
        Arc::new(StaticIdentityProbe("system".to_string())),
        Arc::new(SystemClock),
    );

    let deleted = engine
        .delete_revocations_older_than(std::time::Duration::from_secs(30 * 24 * 3600))
        .await
        .expect("cleanup");
    assert_eq!(deleted, 2_500);
}
