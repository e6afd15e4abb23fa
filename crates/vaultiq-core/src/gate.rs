//! Mode Gate (C6)
//!
//! At startup, for each family, selects exactly one variant matching the
//! resolved `(useStore, useCache)` tuple via a factory keyed on that
//! tuple.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::info;

use crate::cache::{CacheInfrastructure, FamilyCache};
use crate::capabilities::{Clock, IdentityProbe};
use crate::config::{Family, FamilyConfig};
use crate::error::{Error, Result};
use crate::model::{DeviceMetadata, Session, UserSessionIndex};
use crate::revocation::{DisabledRevocation, RevocationEngine, RevocationOps};
use crate::store::{
    CacheOnlyStore, RevocationBackend, SessionBackend, SessionManager, StoreAndCacheStore,
    StoreOnlyStore,
};
use crate::validator::{DefaultFingerprintGenerator, FingerprintGenerator, FingerprintValidator, Validator};

/// Stand-in for any family whose mode is "off": every operation surfaces
/// `Error::NotConfigured` rather than silently degrading.
pub struct DisabledStore {
    family: Family,
}

#[async_trait]
impl SessionManager for DisabledStore {
    async fn create_session(
        &self,
        _user_id: &str,
        _fingerprint: &str,
        _device_metadata: Option<DeviceMetadata>,
    ) -> Result<Session> {
        Err(Error::NotConfigured(self.family))
    }

    async fn get_session(&self, _session_id: &str) -> Result<Option<Session>> {
        Err(Error::NotConfigured(self.family))
    }

    async fn get_sessions_by_user(&self, _user_id: &str) -> Result<Vec<Session>> {
        Err(Error::NotConfigured(self.family))
    }

    async fn get_active_sessions_by_user(&self, _user_id: &str) -> Result<Vec<Session>> {
        Err(Error::NotConfigured(self.family))
    }

    async fn total_user_sessions(&self, _user_id: &str) -> Result<usize> {
        Err(Error::NotConfigured(self.family))
    }

    async fn delete_session(&self, _session_id: &str) -> Result<()> {
        Err(Error::NotConfigured(self.family))
    }

    async fn delete_all_sessions(&self, _session_ids: &[String]) -> Result<()> {
        Err(Error::NotConfigured(self.family))
    }

    async fn get_session_fingerprint(&self, _session_id: &str) -> Result<Option<String>> {
        Err(Error::NotConfigured(self.family))
    }

    async fn mark_session_revoked(&self, _session_id: &str, _at: OffsetDateTime) -> Result<bool> {
        Err(Error::NotConfigured(self.family))
    }
}

/// The assembled capability bundle a host consumes after startup.
pub struct Capabilities {
    pub sessions: Arc<dyn SessionManager>,
    pub revocations: Arc<dyn RevocationOps>,
    pub validator: Validator,
    /// Exposed so a host can recompute a fingerprint for `createSession`
    /// with the same generator the Validator uses for comparison.
    pub fingerprints: Arc<dyn FingerprintGenerator>,
}

/// Backends the host must hand to [`build`] when the resolved config
/// requires a store tier for the corresponding family.
pub struct Backends {
    pub session_store: Option<Arc<dyn SessionBackend>>,
    pub revocation_store: Option<Arc<dyn RevocationBackend>>,
}

/// Construct the [`Capabilities`] bundle once at startup from the
/// resolved per-family config, the cache infrastructure handle, and
/// whatever durable backends the host provides.
#[allow(clippy::too_many_arguments)]
pub fn build(
    resolved: &HashMap<Family, FamilyConfig>,
    cache_infra: &dyn CacheInfrastructure,
    backends: Backends,
    identity: Arc<dyn IdentityProbe>,
    clock: Arc<dyn Clock>,
    fingerprints: Option<Arc<dyn FingerprintGenerator>>,
    fingerprint_validator: Option<Arc<dyn FingerprintValidator>>,
) -> Result<Capabilities> {
    let session_cfg = &resolved[&Family::Session];
    let sessions: Arc<dyn SessionManager> = match (session_cfg.use_store, session_cfg.use_cache) {
        (false, false) => {
            info!("SESSION family disabled");
            Arc::new(DisabledStore {
                family: Family::Session,
            })
        }
        (false, true) => {
            info!("SESSION family: cache-only");
            let provider = cache_infra.get(&session_cfg.cache_name);
            let sessions_cache = match &provider {
                Some(p) => FamilyCache::live("session", p.clone()),
                None => FamilyCache::absent("session"),
            };
            let index_cache = match &provider {
                Some(p) => FamilyCache::live("user-session-index", p.clone()),
                None => FamilyCache::absent("user-session-index"),
            };
            Arc::new(CacheOnlyStore::new(sessions_cache, index_cache, clock.clone()))
        }
        (true, false) => {
            info!("SESSION family: store-only");
            let backend = backends.session_store.clone().ok_or_else(|| {
                Error::BackendAbsent("SESSION useStore=true but no session store backend supplied".into())
            })?;
            Arc::new(StoreOnlyStore::new(backend, clock.clone()))
        }
        (true, true) => {
            info!("SESSION family: store+cache");
            let backend = backends.session_store.clone().ok_or_else(|| {
                Error::BackendAbsent("SESSION useStore=true but no session store backend supplied".into())
            })?;
            let provider = cache_infra.get(&session_cfg.cache_name);
            let session_cache = match &provider {
                Some(p) => FamilyCache::live("session", p.clone()),
                None => FamilyCache::absent("session"),
            };
            let user_list_cache = match &provider {
                Some(p) => FamilyCache::live("session-user-list", p.clone()),
                None => FamilyCache::absent("session-user-list"),
            };
            let fingerprint_cache = match &provider {
                Some(p) => FamilyCache::live("session-fingerprint", p.clone()),
                None => FamilyCache::absent("session-fingerprint"),
            };
            Arc::new(StoreAndCacheStore::new(
                backend,
                session_cache,
                user_list_cache,
                fingerprint_cache,
                clock.clone(),
            ))
        }
    };

    let revocation_cfg = &resolved[&Family::Revocation];
    let revocations: Arc<dyn RevocationOps> =
        match (revocation_cfg.use_store, revocation_cfg.use_cache) {
            (false, false) => {
                info!("REVOCATION family disabled");
                Arc::new(DisabledRevocation)
            }
            (use_store, use_cache) => {
                info!(use_store, use_cache, "REVOCATION family active");
                let provider = if use_cache {
                    cache_infra.get(&revocation_cfg.cache_name)
                } else {
                    None
                };
                let records_cache = match &provider {
                    Some(p) => FamilyCache::live("revocation", p.clone()),
                    None => FamilyCache::absent("revocation"),
                };
                let revoked_index_cache: FamilyCache<UserSessionIndex> = match &provider {
                    Some(p) => FamilyCache::live("revocation-index", p.clone()),
                    None => FamilyCache::absent("revocation-index"),
                };
                let backend = if use_store {
                    Some(backends.revocation_store.clone().ok_or_else(|| {
                        Error::BackendAbsent(
                            "REVOCATION useStore=true but no revocation store backend supplied".into(),
                        )
                    })?)
                } else {
                    None
                };
                Arc::new(RevocationEngine::new(
                    sessions.clone(),
                    records_cache,
                    revoked_index_cache,
                    backend,
                    revocation_cfg.revoke_policy,
                    identity.clone(),
                    clock.clone(),
                ))
            }
        };

    let fingerprints = fingerprints.unwrap_or_else(|| Arc::new(DefaultFingerprintGenerator));
    let mut validator = Validator::new(sessions.clone(), revocations.clone(), fingerprints.clone());
    if let Some(fingerprint_validator) = fingerprint_validator {
        validator = validator.with_fingerprint_validator(fingerprint_validator);
    }

    Ok(Capabilities {
        sessions,
        revocations,
        validator,
        fingerprints,
    })
}
