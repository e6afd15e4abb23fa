//! Config Resolver (C1)
//!
//! Reads a declarative per-family policy and produces a total map of
//! resolved `FamilyConfig`, applying the fallback chain
//! family-specific -> global -> production default.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::cache::CacheInfrastructure;
use crate::error::{Error, Result};

/// One of the logical data categories the core manages independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Family {
    Session,
    Revocation,
    UserSessionIndex,
    ActivityLog,
}

impl Family {
    pub const ALL: [Family; 4] = [
        Family::Session,
        Family::Revocation,
        Family::UserSessionIndex,
        Family::ActivityLog,
    ];

    /// The canonical cache alias used when no `cache_name` override is given.
    pub fn canonical_cache_alias(self) -> &'static str {
        match self {
            Family::Session => "session-pool",
            Family::Revocation => "revoked-session-pool",
            Family::UserSessionIndex => "user-session-mapping",
            Family::ActivityLog => "activity-log-pool",
        }
    }
}

/// Whether a revoked session is deleted outright or marked and kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevokePolicy {
    DeleteOnRevoke,
    MarkOnRevoke,
}

/// Per-family override from the raw configuration tree.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FamilyOverride {
    pub family: Option<Family>,
    pub use_store: Option<bool>,
    pub use_cache: Option<bool>,
    pub cache_name: Option<String>,
    #[serde(with = "humantime_serde_opt", default)]
    pub sync_interval: Option<Duration>,
    pub revoke_policy: Option<RevokePolicy>,
}

/// The raw, unresolved configuration tree as bound from the host's config
/// system.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub production_mode: Option<bool>,
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub use_store: Option<bool>,
    pub use_cache: Option<bool>,
    pub cache_infrastructure_name: Option<String>,
    pub models: Vec<FamilyOverride>,
}

/// One resolved record per data family, frozen for the process lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilyConfig {
    pub family: Family,
    pub use_store: bool,
    pub use_cache: bool,
    pub cache_name: String,
    pub sync_interval: Duration,
    pub revoke_policy: RevokePolicy,
}

const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);

/// Resolve a total map (one entry per [`Family`]) from the raw config tree.
///
/// Pure except for one check: if `persistence.cache_infrastructure_name`
/// names the shared cache infrastructure handle, that handle must resolve
/// or startup fails. A family's own `cacheName` resolving to nothing is a
/// *different* condition — that's the Cache Access Layer's silent-no-op
/// case, handled downstream by `FamilyCache::absent`, not a resolver error.
pub fn resolve(
    raw: &RawConfig,
    cache_infra: &dyn CacheInfrastructure,
) -> Result<HashMap<Family, FamilyConfig>> {
    if let Some(name) = &raw.persistence.cache_infrastructure_name {
        if cache_infra.get(name).is_none() {
            return Err(Error::BackendAbsent(format!(
                "cache infrastructure handle {name:?} is missing or unresolvable"
            )));
        }
    }

    let production_default = raw.production_mode.unwrap_or(false);
    let mut resolved = HashMap::new();

    for family in Family::ALL {
        let overrides = raw
            .persistence
            .models
            .iter()
            .find(|m| m.family == Some(family));

        let use_store = overrides
            .and_then(|o| o.use_store)
            .or(raw.persistence.use_store)
            .unwrap_or(production_default);

        let use_cache = overrides
            .and_then(|o| o.use_cache)
            .or(raw.persistence.use_cache)
            .unwrap_or(production_default);

        let cache_name = overrides
            .and_then(|o| o.cache_name.clone())
            .unwrap_or_else(|| family.canonical_cache_alias().to_string());

        let sync_interval = overrides
            .and_then(|o| o.sync_interval)
            .unwrap_or(DEFAULT_SYNC_INTERVAL);

        let revoke_policy = overrides.and_then(|o| o.revoke_policy).unwrap_or(
            if use_cache && !use_store {
                RevokePolicy::DeleteOnRevoke
            } else {
                RevokePolicy::MarkOnRevoke
            },
        );

        resolved.insert(
            family,
            FamilyConfig {
                family,
                use_store,
                use_cache,
                cache_name,
                sync_interval,
                revoke_policy,
            },
        );
    }

    Ok(resolved)
}

/// Minimal `Duration` (de)serializer so `sync_interval` can be written as
/// `"30s"` in config files without pulling in a full humantime dependency.
mod humantime_serde_opt {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        parse(&raw)
            .map(Some)
            .map_err(serde::de::Error::custom)
    }

    fn parse(s: &str) -> std::result::Result<Duration, String> {
        let s = s.trim();
        let (value, unit) = s
            .find(|c: char| !c.is_ascii_digit())
            .map(|idx| s.split_at(idx))
            .ok_or_else(|| format!("duration {s:?} missing unit"))?;
        let value: u64 = value
            .parse()
            .map_err(|_| format!("invalid duration value {value:?}"))?;
        let secs = match unit {
            "s" => value,
            "m" => value * 60,
            "h" => value * 3600,
            other => return Err(format!("unsupported duration unit {other:?}")),
        };
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cache::{CacheProvider, InMemoryCacheProvider};

    struct AllPresent;
    impl CacheInfrastructure for AllPresent {
        fn get(&self, _name: &str) -> Option<Arc<dyn CacheProvider>> {
            Some(Arc::new(InMemoryCacheProvider::new()))
        }
    }

    struct OnlyNamed<'a>(&'a [&'a str]);
    impl CacheInfrastructure for OnlyNamed<'_> {
        fn get(&self, name: &str) -> Option<Arc<dyn CacheProvider>> {
            if self.0.contains(&name) {
                Some(Arc::new(InMemoryCacheProvider::new()))
            } else {
                None
            }
        }
    }

    #[test]
    fn production_mode_defaults_false() {
        let raw = RawConfig::default();
        let resolved = resolve(&raw, &AllPresent).expect("resolve");
        for family in Family::ALL {
            let cfg = &resolved[&family];
            assert!(!cfg.use_store);
            assert!(!cfg.use_cache);
        }
    }

    #[test]
    fn production_mode_enables_both_tiers_globally() {
        let raw = RawConfig {
            production_mode: Some(true),
            ..Default::default()
        };
        let resolved = resolve(&raw, &AllPresent).expect("resolve");
        for family in Family::ALL {
            let cfg = &resolved[&family];
            assert!(cfg.use_store);
            assert!(cfg.use_cache);
        }
    }

    #[test]
    fn family_specific_override_wins_over_global() {
        let raw = RawConfig {
            production_mode: Some(false),
            persistence: PersistenceConfig {
                use_store: Some(false),
                use_cache: Some(false),
                models: vec![FamilyOverride {
                    family: Some(Family::Session),
                    use_store: Some(true),
                    use_cache: Some(true),
                    ..Default::default()
                }],
                ..Default::default()
            },
        };
        let resolved = resolve(&raw, &AllPresent).expect("resolve");
        assert!(resolved[&Family::Session].use_store);
        assert!(resolved[&Family::Session].use_cache);
        assert!(!resolved[&Family::Revocation].use_store);
    }

    #[test]
    fn cache_name_falls_back_to_canonical_alias() {
        let raw = RawConfig::default();
        let resolved = resolve(&raw, &AllPresent).expect("resolve");
        assert_eq!(resolved[&Family::Session].cache_name, "session-pool");
        assert_eq!(
            resolved[&Family::UserSessionIndex].cache_name,
            "user-session-mapping"
        );
    }

    #[test]
    fn missing_cache_infrastructure_handle_fails_startup() {
        let raw = RawConfig {
            persistence: PersistenceConfig {
                cache_infrastructure_name: Some("cacheManager".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let probe = OnlyNamed(&[]);
        let err = resolve(&raw, &probe).unwrap_err();
        assert!(matches!(err, Error::BackendAbsent(_)));
    }

    #[test]
    fn missing_per_family_cache_name_does_not_fail_startup() {
        // "missing" resolves to nothing, but a family's own cacheName is
        // not the shared infrastructure handle — this is the Cache Access
        // Layer's silent-absent case, not a Config Resolver error.
        let raw = RawConfig {
            persistence: PersistenceConfig {
                use_cache: Some(true),
                models: vec![FamilyOverride {
                    family: Some(Family::Session),
                    cache_name: Some("missing".to_string()),
                    ..Default::default()
                }],
                ..Default::default()
            },
            ..Default::default()
        };
        let probe = OnlyNamed(&[]);
        let resolved = resolve(&raw, &probe).expect("startup must succeed");
        assert_eq!(resolved[&Family::Session].cache_name, "missing");
    }

    #[test]
    fn cache_only_mode_defaults_to_delete_on_revoke() {
        let raw = RawConfig {
            persistence: PersistenceConfig {
                models: vec![FamilyOverride {
                    family: Some(Family::Session),
                    use_store: Some(false),
                    use_cache: Some(true),
                    ..Default::default()
                }],
                ..Default::default()
            },
            ..Default::default()
        };
        let resolved = resolve(&raw, &AllPresent).expect("resolve");
        assert_eq!(
            resolved[&Family::Session].revoke_policy,
            RevokePolicy::DeleteOnRevoke
        );
    }
}
