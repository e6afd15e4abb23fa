//! Cache Access Layer (C2)

pub mod family;
pub mod keys;
pub mod provider;

pub use family::FamilyCache;
pub use provider::{
    CacheInfrastructure, CacheProvider, InMemoryCacheProvider, RedisCacheProvider,
    StaticCacheInfrastructure,
};
