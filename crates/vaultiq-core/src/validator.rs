//! Validator (C5)
//!
//! A single operation, `validate_for_request`, short-circuiting on the
//! first failure. Depends only on the `SessionManager`/`RevocationEngine`
//! capability handles and a `FingerprintGenerator`.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::revocation::RevocationOps;
use crate::store::SessionManager;

/// The canonical request attribute key carrying the claimed session ID.
pub const SESSION_ID_ATTRIBUTE: &str = "vaultiq.sid";

/// Abstract request object: case-insensitive header lookup,
/// string attribute get/set. Implemented by the embedding host.
pub trait RequestHandle: Send + Sync {
    fn header(&self, name: &str) -> Option<String>;
    fn attribute(&self, key: &str) -> Option<String>;
}

/// Recomputes a device fingerprint from a request.
/// `same inputs -> same output, stable across requests from the same
/// device` is the only contract the Validator depends on.
pub trait FingerprintGenerator: Send + Sync {
    fn generate(&self, request: &dyn RequestHandle) -> Option<String>;
}

/// Optional host override of fingerprint comparison; defaults to
/// "recompute and compare" when not supplied.
#[async_trait]
pub trait FingerprintValidator: Send + Sync {
    async fn validate(&self, request: &dyn RequestHandle, stored: &str) -> bool;
}

/// The recommended default fingerprint contract:
/// normalise `Sec-CH-UA-Platform`, else extract a platform keyword from
/// `User-Agent`; take `Accept-Language`; take `X-Device-Id` (fall back to
/// `User-Agent`, fail if both absent); hash `deviceId | language |
/// platform` with SHA-256, lowercase hex.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFingerprintGenerator;

impl DefaultFingerprintGenerator {
    fn platform(request: &dyn RequestHandle) -> String {
        if let Some(hint) = request.header("Sec-CH-UA-Platform") {
            return hint.trim_matches('"').to_string();
        }
        let ua = request.header("User-Agent").unwrap_or_default();
        for (needle, keyword) in [
            ("Windows", "Windows"),
            ("Mac OS", "macOS"),
            ("Android", "Android"),
            ("iPhone", "iOS"),
            ("iPad", "iOS"),
            ("Linux", "Linux"),
        ] {
            if ua.contains(needle) {
                return keyword.to_string();
            }
        }
        "unknown".to_string()
    }
}

impl FingerprintGenerator for DefaultFingerprintGenerator {
    fn generate(&self, request: &dyn RequestHandle) -> Option<String> {
        let device_id = request
            .header("X-Device-Id")
            .or_else(|| request.header("User-Agent"))?;
        let language = request.header("Accept-Language").unwrap_or_default();
        let platform = Self::platform(request);

        let mut hasher = Sha256::new();
        hasher.update(device_id.as_bytes());
        hasher.update(b"|");
        hasher.update(language.as_bytes());
        hasher.update(b"|");
        hasher.update(platform.as_bytes());
        Some(hex::encode(hasher.finalize()))
    }
}

/// Ties the Session Store, Revocation Engine, and a `FingerprintGenerator`
/// together into the single `validateForRequest` operation. A host may
/// supply a [`FingerprintValidator`] to override the comparison step;
/// absent that, the default is "recompute and compare".
pub struct Validator {
    sessions: std::sync::Arc<dyn SessionManager>,
    revocations: std::sync::Arc<dyn RevocationOps>,
    fingerprints: std::sync::Arc<dyn FingerprintGenerator>,
    fingerprint_validator: Option<std::sync::Arc<dyn FingerprintValidator>>,
}

impl Validator {
    pub fn new(
        sessions: std::sync::Arc<dyn SessionManager>,
        revocations: std::sync::Arc<dyn RevocationOps>,
        fingerprints: std::sync::Arc<dyn FingerprintGenerator>,
    ) -> Self {
        Self {
            sessions,
            revocations,
            fingerprints,
            fingerprint_validator: None,
        }
    }

    /// Override the default "recompute and compare" fingerprint check with
    /// a host-supplied [`FingerprintValidator`].
    pub fn with_fingerprint_validator(
        mut self,
        validator: std::sync::Arc<dyn FingerprintValidator>,
    ) -> Self {
        self.fingerprint_validator = Some(validator);
        self
    }

    pub async fn validate_for_request(&self, request: &dyn RequestHandle) -> crate::error::Result<bool> {
        let Some(session_id) = request.attribute(SESSION_ID_ATTRIBUTE) else {
            warn!("validate: no session id attribute on request");
            return Ok(false);
        };

        if self.revocations.is_revoked(&session_id).await? {
            warn!(session_id = %session_id, "validate: session is revoked");
            return Ok(false);
        }

        let Some(session) = self.sessions.get_session(&session_id).await? else {
            warn!(session_id = %session_id, "validate: no such session");
            return Ok(false);
        };
        if session.is_revoked {
            warn!(session_id = %session_id, "validate: session marked revoked");
            return Ok(false);
        }

        let fingerprint_ok = if let Some(validator) = &self.fingerprint_validator {
            validator.validate(request, &session.device_fingerprint).await
        } else {
            let Some(fingerprint) = self.fingerprints.generate(request) else {
                warn!(session_id = %session_id, "validate: unable to compute fingerprint");
                return Ok(false);
            };
            fingerprint == session.device_fingerprint
        };

        if !fingerprint_ok {
            warn!(session_id = %session_id, "validate: fingerprint mismatch");
            return Ok(false);
        }

        debug!(session_id = %session_id, "validate: ok");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::cache::{FamilyCache, InMemoryCacheProvider};
    use crate::capabilities::SystemClock;
    use crate::model::{RevocationIntent, RevocationRecord};
    use crate::revocation::RevocationOps;
    use crate::store::CacheOnlyStore;

    struct NeverRevoked;

    #[async_trait]
    impl RevocationOps for NeverRevoked {
        async fn revoke(&self, _intent: RevocationIntent) -> crate::error::Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn is_revoked(&self, _session_id: &str) -> crate::error::Result<bool> {
            Ok(false)
        }
        async fn get_revoked_sessions(&self, _user_id: &str) -> crate::error::Result<Vec<RevocationRecord>> {
            Ok(Vec::new())
        }
        async fn clear_revocation(&self, _session_ids: &[String]) -> crate::error::Result<()> {
            Ok(())
        }
        async fn delete_revocations_older_than(&self, _retention: Duration) -> crate::error::Result<usize> {
            Ok(0)
        }
    }

    struct FakeRequest {
        headers: HashMap<String, String>,
        attributes: HashMap<String, String>,
    }

    impl RequestHandle for FakeRequest {
        fn header(&self, name: &str) -> Option<String> {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.clone())
        }

        fn attribute(&self, key: &str) -> Option<String> {
            self.attributes.get(key).cloned()
        }
    }

    #[test]
    fn same_inputs_yield_same_fingerprint() {
        let gen = DefaultFingerprintGenerator;
        let request = FakeRequest {
            headers: HashMap::from([
                ("X-Device-Id".to_string(), "phone-1".to_string()),
                ("Accept-Language".to_string(), "en-US".to_string()),
                ("User-Agent".to_string(), "Mozilla/5.0 (iPhone)".to_string()),
            ]),
            attributes: HashMap::new(),
        };
        let a = gen.generate(&request).expect("fingerprint");
        let b = gen.generate(&request).expect("fingerprint");
        assert_eq!(a, b);
    }

    #[test]
    fn missing_device_id_and_user_agent_fails() {
        let gen = DefaultFingerprintGenerator;
        let request = FakeRequest {
            headers: HashMap::new(),
            attributes: HashMap::new(),
        };
        assert_eq!(gen.generate(&request), None);
    }

    struct AlwaysValid;

    #[async_trait]
    impl FingerprintValidator for AlwaysValid {
        async fn validate(&self, _request: &dyn RequestHandle, _stored: &str) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn custom_fingerprint_validator_overrides_recompute_and_compare() {
        let clock: Arc<dyn crate::capabilities::Clock> = Arc::new(SystemClock);
        let sessions: Arc<dyn SessionManager> = Arc::new(CacheOnlyStore::new(
            FamilyCache::live("session", Arc::new(InMemoryCacheProvider::new())),
            FamilyCache::live("user-session-mapping", Arc::new(InMemoryCacheProvider::new())),
            clock,
        ));
        let session = sessions
            .create_session("dave", "stored-fingerprint", None)
            .await
            .expect("create");

        let validator = Validator::new(
            sessions,
            Arc::new(NeverRevoked),
            Arc::new(DefaultFingerprintGenerator),
        )
        .with_fingerprint_validator(Arc::new(AlwaysValid));

        let request = FakeRequest {
            headers: HashMap::new(),
            attributes: HashMap::from([(SESSION_ID_ATTRIBUTE.to_string(), session.session_id)]),
        };

        // No fingerprint headers at all: the default generator would return
        // None and fail validation, but AlwaysValid short-circuits it.
        assert!(validator
            .validate_for_request(&request)
            .await
            .expect("validate"));
    }

    #[test]
    fn different_device_id_yields_different_fingerprint() {
        let gen = DefaultFingerprintGenerator;
        let mut headers = HashMap::from([("X-Device-Id".to_string(), "phone".to_string())]);
        let a = gen
            .generate(&FakeRequest {
                headers: headers.clone(),
                attributes: HashMap::new(),
            })
            .expect("fingerprint");
        headers.insert("X-Device-Id".to_string(), "laptop".to_string());
        let b = gen
            .generate(&FakeRequest {
                headers,
                attributes: HashMap::new(),
            })
            .expect("fingerprint");
        assert_ne!(a, b);
    }
}
